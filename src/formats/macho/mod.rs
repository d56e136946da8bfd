//! Mach-O image parser
//!
//! Only thin little-endian images are accepted. Load commands sit right after
//! the header in both layouts and are decoded on every walk.

pub mod layout;
pub mod load_commands;
pub mod types;

use tracing::debug;
use uuid::Uuid;

use crate::config::ParseOptions;
use crate::error::{degrade, ImageError, Result};
use crate::formats::ParseContext;
use crate::memory::{Endian, Image};
use crate::reflect::{Reader, StructKind, TypedView};

pub use load_commands::{
    BuildTool, BuildVersion, DyldInfo, DylibCommand, Dysymtab, LoadCommand, LoadCommandIter,
    Section, SegmentCommand, Symtab,
};
pub use types::*;

/// A parsed Mach-O image
pub struct MachOImage<'a> {
    ctx: ParseContext<'a>,
    reader: Reader<'a>,
    header: TypedView,
    is_64bit: bool,
}

impl<'a> MachOImage<'a> {
    pub fn parse(ctx: ParseContext<'a>) -> Result<Self> {
        let reader = ctx.reader(Endian::Little);
        let base = ctx.image.base();
        let is_64bit = match reader.u32(base)? {
            MH_MAGIC_64 => true,
            MH_MAGIC => false,
            other => {
                return Err(ImageError::malformed(
                    "Mach-O",
                    format!("unsupported magic {other:#x}"),
                ))
            }
        };
        let kind = if is_64bit {
            StructKind::MachHeader64
        } else {
            StructKind::MachHeader
        };
        let header = reader.view(kind, base)?;
        debug!(
            base,
            is_64bit,
            ncmds = header.u32("ncmds")?,
            "Mach-O image opened"
        );
        Ok(Self {
            ctx,
            reader,
            header,
            is_64bit,
        })
    }

    pub fn image(&self) -> Image<'a> {
        self.ctx.image
    }

    pub fn header(&self) -> &TypedView {
        &self.header
    }

    pub fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    fn header_field(&self, field: &str) -> u64 {
        // Present on both header shapes
        self.header.u64(field).unwrap_or_default()
    }

    pub fn cpu_type(&self) -> CpuType {
        CpuType::from(self.header_field("cputype") as i32)
    }

    pub fn file_type(&self) -> FileType {
        FileType::from(self.header_field("filetype") as u32)
    }

    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(self.header_field("flags") as u32)
    }

    pub fn ncmds(&self) -> u32 {
        self.header_field("ncmds") as u32
    }

    pub fn sizeofcmds(&self) -> u32 {
        self.header_field("sizeofcmds") as u32
    }

    fn options(&self) -> &'a ParseOptions {
        self.ctx.options
    }

    /// Lazy walk over the load commands.
    pub fn load_command_iter(&self) -> LoadCommandIter<'a> {
        LoadCommandIter::new(
            self.reader,
            self.is_64bit,
            self.header.end(),
            self.ncmds(),
            self.sizeofcmds(),
            self.options(),
        )
    }

    /// Every decodable load command, failing on the first unreadable one.
    pub fn try_load_commands(&self) -> Result<Vec<LoadCommand>> {
        self.load_command_iter().collect()
    }

    /// Load commands up to the first unreadable one.
    pub fn load_commands(&self) -> Vec<LoadCommand> {
        let mut commands = Vec::new();
        for command in self.load_command_iter() {
            match degrade("load_commands", command.map(Some)) {
                Some(command) => commands.push(command),
                None => break,
            }
        }
        commands
    }

    pub fn segments(&self) -> Vec<SegmentCommand> {
        self.load_commands()
            .into_iter()
            .filter_map(|c| match c {
                LoadCommand::Segment(segment) => Some(segment),
                _ => None,
            })
            .collect()
    }

    pub fn segment_by_name(&self, name: &str) -> Option<SegmentCommand> {
        self.segments().into_iter().find(|s| s.segname == name)
    }

    /// `LC_UUID`
    pub fn uuid(&self) -> Option<Uuid> {
        self.load_commands().into_iter().find_map(|c| match c {
            LoadCommand::Uuid(uuid) => Some(uuid),
            _ => None,
        })
    }

    pub fn build_version(&self) -> Option<BuildVersion> {
        self.load_commands().into_iter().find_map(|c| match c {
            LoadCommand::BuildVersion(version) => Some(version),
            _ => None,
        })
    }

    /// Referenced libraries, plus the image's own `LC_ID_DYLIB`.
    pub fn dylibs(&self) -> Vec<DylibCommand> {
        self.load_commands()
            .into_iter()
            .filter_map(|c| match c {
                LoadCommand::Dylib(dylib) => Some(dylib),
                _ => None,
            })
            .collect()
    }

    /// `LC_MAIN` entry offset from the start of `__TEXT`
    pub fn entry_point(&self) -> Option<u64> {
        self.load_commands().into_iter().find_map(|c| match c {
            LoadCommand::Main { entry_offset, .. } => Some(entry_offset),
            _ => None,
        })
    }

    /// `__TEXT` starts at the base in both layouts.
    pub fn entry_address(&self) -> Option<u64> {
        self.entry_point()
            .and_then(|offset| self.image().base().checked_add(offset))
    }
}

impl std::fmt::Debug for MachOImage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachOImage")
            .field("image", &self.ctx.image)
            .field("is_64bit", &self.is_64bit)
            .field("cpu_type", &self.cpu_type())
            .field("ncmds", &self.ncmds())
            .finish()
    }
}
