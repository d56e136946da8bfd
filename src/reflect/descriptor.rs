//! Data-only descriptions of C structures and unions.

use super::kinds::StructKind;

/// Fixed-size primitive field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    U8,
    U16,
    U32,
    U64,
    I32,
    I64,
}

impl Primitive {
    pub const fn size(self) -> u64 {
        match self {
            Primitive::U8 => 1,
            Primitive::U16 => 2,
            Primitive::U32 | Primitive::I32 => 4,
            Primitive::U64 | Primitive::I64 => 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Primitive::I32 | Primitive::I64)
    }
}

/// What a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Primitive(Primitive),
    /// A named nested structure, reachable as a sub-view.
    Struct(StructKind),
    /// An anonymous structure or union whose members are merged into the
    /// parent view.
    Embed(StructKind),
}

/// One field of a structure or union.
///
/// `bits` marks a bit-field; the primitive's size is its storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub count: Option<usize>,
    pub bits: Option<u32>,
}

impl FieldDescriptor {
    pub const fn prim(name: &'static str, primitive: Primitive) -> Self {
        Self {
            name,
            kind: FieldKind::Primitive(primitive),
            count: None,
            bits: None,
        }
    }

    pub const fn nested(name: &'static str, kind: StructKind) -> Self {
        Self {
            name,
            kind: FieldKind::Struct(kind),
            count: None,
            bits: None,
        }
    }

    pub const fn embed(kind: StructKind) -> Self {
        Self {
            name: "",
            kind: FieldKind::Embed(kind),
            count: None,
            bits: None,
        }
    }

    pub const fn array(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub const fn bits(mut self, bits: u32) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, FieldKind::Embed(_))
    }
}

/// Ordered field list plus the union flag.
#[derive(Debug)]
pub struct StructureDescriptor {
    pub name: &'static str,
    pub is_union: bool,
    pub fields: &'static [FieldDescriptor],
}

impl StructureDescriptor {
    pub const fn structure(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self {
            name,
            is_union: false,
            fields,
        }
    }

    pub const fn union(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self {
            name,
            is_union: true,
            fields,
        }
    }
}

// Shorthands for the layout tables.
pub(crate) const fn u8f(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::prim(name, Primitive::U8)
}

pub(crate) const fn u16f(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::prim(name, Primitive::U16)
}

pub(crate) const fn u32f(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::prim(name, Primitive::U32)
}

pub(crate) const fn u64f(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::prim(name, Primitive::U64)
}

pub(crate) const fn i32f(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::prim(name, Primitive::I32)
}

pub(crate) const fn i64f(name: &'static str) -> FieldDescriptor {
    FieldDescriptor::prim(name, Primitive::I64)
}
