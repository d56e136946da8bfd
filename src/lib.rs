//! Executable image introspection over opaque memory.
//!
//! Structures are described declaratively and decoded at any address of a
//! [`MemoryAccess`] provider. PE, ELF and Mach-O parsers are built on that
//! engine and expose their tables as lazy accessors.

/// Walking limits
pub mod config;
/// Crate error type
pub mod error;
/// Format detection and the PE, ELF and Mach-O parsers
pub mod formats;
/// Top-level classify/parse entry point
pub mod inspector;
/// Tracing setup
pub mod logging;
/// Memory providers and the image address-space context
pub mod memory;
/// Descriptor-driven structure reflection
pub mod reflect;
/// Sibling module lookup
pub mod resolver;

pub use config::ParseOptions;
pub use error::{ImageError, Result};
pub use formats::detect::{classify, classify_magic, ImageClassification};
pub use formats::elf::ElfImage;
pub use formats::macho::MachOImage;
pub use formats::pe::PeImage;
pub use formats::ParseContext;
pub use inspector::{ImageInspector, ParsedImage};
pub use memory::{Endian, Image, ImageLayout, MappedFile, MemoryAccess, SliceMemory};
pub use reflect::{Registry, StructKind, TypedView, Value};
pub use resolver::{ModuleRef, ModuleResolver, StaticModules};
