//! Decoded structure instances.

use super::kinds::StructKind;
use crate::error::{ImageError, Result};

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Any primitive or bit-field; signed fields are sign-extended
    Scalar(u64),
    Scalars(Vec<u64>),
    Struct(TypedView),
    Structs(Vec<TypedView>),
}

/// A structure decoded at an address.
///
/// Fields are stored in declaration order; members of embedded structures
/// and unions appear directly on the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedView {
    pub(crate) kind: StructKind,
    pub(crate) address: u64,
    pub(crate) size: u64,
    pub(crate) fields: Vec<(&'static str, Value)>,
}

impl TypedView {
    pub fn kind(&self) -> StructKind {
        self.kind
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// First address past the structure.
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
            .ok_or_else(|| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> ImageError {
        ImageError::UnknownField {
            structure: self.kind.name(),
            field: name.to_string(),
        }
    }

    pub fn scalar(&self, name: &str) -> Result<u64> {
        match self.get(name)? {
            Value::Scalar(v) => Ok(*v),
            _ => Err(self.unknown(name)),
        }
    }

    pub fn u8(&self, name: &str) -> Result<u8> {
        self.scalar(name).map(|v| v as u8)
    }

    pub fn u16(&self, name: &str) -> Result<u16> {
        self.scalar(name).map(|v| v as u16)
    }

    pub fn u32(&self, name: &str) -> Result<u32> {
        self.scalar(name).map(|v| v as u32)
    }

    pub fn u64(&self, name: &str) -> Result<u64> {
        self.scalar(name)
    }

    pub fn i64(&self, name: &str) -> Result<i64> {
        self.scalar(name).map(|v| v as i64)
    }

    pub fn scalars(&self, name: &str) -> Result<&[u64]> {
        match self.get(name)? {
            Value::Scalars(v) => Ok(v),
            _ => Err(self.unknown(name)),
        }
    }

    /// A byte array field, truncating each element to eight bits.
    pub fn bytes(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.scalars(name)?.iter().map(|&b| b as u8).collect())
    }

    pub fn view(&self, name: &str) -> Result<&TypedView> {
        match self.get(name)? {
            Value::Struct(v) => Ok(v),
            _ => Err(self.unknown(name)),
        }
    }

    pub fn views(&self, name: &str) -> Result<&[TypedView]> {
        match self.get(name)? {
            Value::Structs(v) => Ok(v),
            _ => Err(self.unknown(name)),
        }
    }
}
