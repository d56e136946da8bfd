//! A memory provider paired with the registry and a byte order.

use super::kinds::StructKind;
use super::registry::Registry;
use super::view::TypedView;
use crate::error::Result;
use crate::memory::{Endian, MemoryAccess};

/// Typed reads for one image.
#[derive(Clone, Copy)]
pub struct Reader<'a> {
    memory: &'a dyn MemoryAccess,
    registry: &'a Registry,
    endian: Endian,
}

impl<'a> Reader<'a> {
    pub fn new(memory: &'a dyn MemoryAccess, registry: &'a Registry, endian: Endian) -> Self {
        Self {
            memory,
            registry,
            endian,
        }
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn memory(&self) -> &'a dyn MemoryAccess {
        self.memory
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn view(&self, kind: StructKind, address: u64) -> Result<TypedView> {
        self.registry
            .instantiate(self.memory, kind, address, self.endian)
    }

    pub fn size_of(&self, kind: StructKind) -> u64 {
        self.registry.size_of(kind)
    }

    pub fn u8(&self, address: u64) -> Result<u8> {
        self.memory.read_u8(address)
    }

    pub fn u16(&self, address: u64) -> Result<u16> {
        self.memory.read_u16(address, self.endian)
    }

    pub fn u32(&self, address: u64) -> Result<u32> {
        self.memory.read_u32(address, self.endian)
    }

    pub fn u64(&self, address: u64) -> Result<u64> {
        self.memory.read_u64(address, self.endian)
    }

    /// Pointer-sized read.
    pub fn word(&self, address: u64, is_64: bool) -> Result<u64> {
        if is_64 {
            self.u64(address)
        } else {
            self.u32(address).map(u64::from)
        }
    }

    pub fn bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.memory.read_bytes(address, len)
    }

    pub fn string(&self, address: u64, max_len: usize) -> Result<String> {
        self.memory.read_string(address, max_len, false)
    }

    pub fn wide_string(&self, address: u64, max_len: usize) -> Result<String> {
        self.memory.read_string(address, max_len, true)
    }
}

impl std::fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("endian", &self.endian)
            .finish_non_exhaustive()
    }
}
