//! Layout computation and view instantiation.

use std::sync::OnceLock;

use tracing::trace;

use super::descriptor::{FieldKind, Primitive, StructureDescriptor};
use super::kinds::StructKind;
use super::view::{TypedView, Value};
use crate::error::Result;
use crate::memory::{decode_uint, Endian, MemoryAccess};

/// Placement of one field inside its structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// Byte offset of the field (or of its bit-field storage unit)
    pub offset: u64,
    /// Bytes occupied, including array length; the storage unit for bit-fields
    pub size: u64,
    pub start_bit: u32,
}

/// Total size plus per-field placement, parallel to the descriptor's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub size: u64,
    pub fields: Vec<FieldLayout>,
}

/// Compute the layout of `desc`, resolving nested kinds through `size_of`.
///
/// Structures are packed (no implicit padding); layout tables spell out
/// padding members where the C layout has them. Consecutive bit-fields
/// share a storage unit until it is full, and only the first segment of a
/// unit adds to the size. A bit-field that does not fit the remaining bits
/// opens a new unit. In a union every member starts at offset 0 and bit 0.
pub fn compute_layout(
    desc: &StructureDescriptor,
    mut size_of: impl FnMut(StructKind) -> u64,
) -> Layout {
    let mut size = 0u64;
    let mut fields = Vec::with_capacity(desc.fields.len());
    // (unit offset, unit size in bytes, next free bit)
    let mut unit: Option<(u64, u64, u32)> = None;

    for field in desc.fields {
        let element = match field.kind {
            FieldKind::Primitive(p) => p.size(),
            FieldKind::Struct(kind) | FieldKind::Embed(kind) => size_of(kind),
        };
        let total = element * field.count.unwrap_or(1) as u64;
        let next = if desc.is_union { 0 } else { size };

        match (field.bits, field.kind) {
            (Some(bits), FieldKind::Primitive(p)) if !desc.is_union => {
                let unit_bits = (p.size() * 8) as u32;
                let (offset, start_bit) = match unit {
                    Some((offset, width, cur)) if width == p.size() && cur + bits <= unit_bits => {
                        (offset, cur)
                    }
                    _ => {
                        size += p.size();
                        (next, 0)
                    }
                };
                let cur = start_bit + bits;
                unit = if cur >= unit_bits {
                    None
                } else {
                    Some((offset, p.size(), cur))
                };
                fields.push(FieldLayout {
                    offset,
                    size: p.size(),
                    start_bit,
                });
            }
            _ => {
                unit = None;
                if desc.is_union {
                    size = size.max(total);
                } else {
                    size += total;
                }
                fields.push(FieldLayout {
                    offset: next,
                    size: total,
                    start_bit: 0,
                });
            }
        }
    }

    Layout { size, fields }
}

/// Memoized layouts for every [`StructKind`].
///
/// Owned by the inspector session; layouts are computed on first use and
/// never change afterwards, so the registry can be shared across threads.
pub struct Registry {
    layouts: Vec<OnceLock<Layout>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            layouts: StructKind::ALL.iter().map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn layout(&self, kind: StructKind) -> &Layout {
        self.layouts[kind.index()].get_or_init(|| {
            let layout = compute_layout(kind.descriptor(), |nested| self.size_of(nested));
            trace!(structure = kind.name(), size = layout.size, "Computed layout");
            layout
        })
    }

    pub fn size_of(&self, kind: StructKind) -> u64 {
        self.layout(kind).size
    }

    /// Byte offset of a named member, looking through embedded members.
    pub fn offset_of(&self, kind: StructKind, field: &str) -> Option<u64> {
        let desc = kind.descriptor();
        let layout = self.layout(kind);
        desc.fields
            .iter()
            .zip(&layout.fields)
            .find_map(|(f, place)| match f.kind {
                FieldKind::Embed(inner) => {
                    self.offset_of(inner, field).map(|o| o + place.offset)
                }
                _ if f.name == field => Some(place.offset),
                _ => None,
            })
    }

    /// Materialize a view of `kind` at `address`.
    ///
    /// The structure is fetched with a single read; any unreadable byte fails
    /// the whole instantiation.
    pub fn instantiate(
        &self,
        memory: &dyn MemoryAccess,
        kind: StructKind,
        address: u64,
        endian: Endian,
    ) -> Result<TypedView> {
        let size = self.size_of(kind);
        let bytes = memory.read_bytes(address, size as usize)?;
        Ok(self.decode(kind, &bytes, address, endian))
    }

    fn decode(&self, kind: StructKind, bytes: &[u8], address: u64, endian: Endian) -> TypedView {
        let desc = kind.descriptor();
        let layout = self.layout(kind);
        let mut fields: Vec<(&'static str, Value)> = Vec::with_capacity(desc.fields.len());

        for (field, place) in desc.fields.iter().zip(&layout.fields) {
            let at = place.offset as usize;
            match field.kind {
                FieldKind::Primitive(p) => {
                    let width = p.size() as usize;
                    let value = match field.count {
                        Some(n) => Value::Scalars(
                            (0..n)
                                .map(|i| read_primitive(&bytes[at + i * width..], p, endian))
                                .collect(),
                        ),
                        None => {
                            let raw = read_primitive(&bytes[at..], p, endian);
                            match field.bits {
                                Some(bits) => {
                                    Value::Scalar(extract_bits(raw, place.start_bit, bits, width))
                                }
                                None => Value::Scalar(raw),
                            }
                        }
                    };
                    fields.push((field.name, value));
                }
                FieldKind::Struct(inner) => {
                    let width = self.size_of(inner) as usize;
                    let sub = |i: usize| {
                        let start = at + i * width;
                        self.decode(
                            inner,
                            &bytes[start..start + width],
                            address + start as u64,
                            endian,
                        )
                    };
                    let value = match field.count {
                        Some(n) => Value::Structs((0..n).map(sub).collect()),
                        None => Value::Struct(sub(0)),
                    };
                    fields.push((field.name, value));
                }
                FieldKind::Embed(inner) => {
                    let width = self.size_of(inner) as usize;
                    let sub = self.decode(inner, &bytes[at..at + width], address + at as u64, endian);
                    for (name, value) in sub.fields {
                        if !fields.iter().any(|(existing, _)| *existing == name) {
                            fields.push((name, value));
                        }
                    }
                }
            }
        }

        TypedView {
            kind,
            address,
            size: layout.size,
            fields,
        }
    }
}

fn read_primitive(bytes: &[u8], primitive: Primitive, endian: Endian) -> u64 {
    let width = primitive.size() as usize;
    let raw = decode_uint(&bytes[..width], endian);
    match primitive {
        Primitive::I32 => raw as u32 as i32 as i64 as u64,
        _ => raw,
    }
}

/// Mask `[start, start + bits)` out of a storage unit and shift it down.
fn extract_bits(raw: u64, start: u32, bits: u32, width: usize) -> u64 {
    if width <= 4 {
        let mask = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
        (((raw as u32) >> start) & mask) as u64
    } else {
        let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
        (raw >> start) & mask
    }
}
