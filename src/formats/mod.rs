//! Executable container formats.

pub mod detect;
pub mod elf;
pub mod macho;
pub mod pe;

use crate::config::ParseOptions;
use crate::error::{ImageError, Result};
use crate::memory::{Endian, Image};
use crate::reflect::{Reader, Registry};
use crate::resolver::ModuleResolver;

/// Everything a format parser needs besides the image bytes' meaning:
/// the address space, the shared layout registry, walking limits and an
/// optional resolver for sibling modules.
#[derive(Clone, Copy)]
pub struct ParseContext<'a> {
    pub image: Image<'a>,
    pub registry: &'a Registry,
    pub options: &'a ParseOptions,
    pub resolver: Option<&'a dyn ModuleResolver>,
}

impl<'a> ParseContext<'a> {
    pub fn new(image: Image<'a>, registry: &'a Registry, options: &'a ParseOptions) -> Self {
        Self {
            image,
            registry,
            options,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn ModuleResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn reader(&self, endian: Endian) -> Reader<'a> {
        Reader::new(self.image.memory(), self.registry, endian)
    }
}

impl std::fmt::Debug for ParseContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseContext")
            .field("image", &self.image)
            .field("options", self.options)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Round `value` up to a multiple of `align` (a power of two, or 0/1 for none).
/// Saturates at the last aligned value below `u64::MAX`.
pub(crate) fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.saturating_add(align - 1) & !(align - 1)
    }
}

/// `start + offset`, or an unreadable region when the sum leaves the
/// address space.
pub(crate) fn address_at(start: u64, offset: u64) -> Result<u64> {
    start
        .checked_add(offset)
        .ok_or(ImageError::unreadable(start, offset))
}
