//! PE image parser
//!
//! Headers and the section table are validated when the image is opened;
//! every directory accessor re-walks its table on demand. Plain accessors
//! treat a damaged directory as absent (logging why), `try_*` accessors
//! return the underlying error.

pub mod directories;
pub mod headers;
pub mod layout;
pub mod sections;
pub mod types;
pub mod version;

use tracing::debug;

use crate::config::ParseOptions;
use crate::error::{degrade, ImageError, Result};
use crate::formats::ParseContext;
use crate::memory::{Endian, Image, ImageLayout};
use crate::reflect::{Reader, TypedView};
use crate::resolver::ModuleResolver;

pub use directories::*;
pub use headers::PeHeaders;
pub use sections::{SectionHeader, SectionTable};
pub use types::*;
pub use version::{FixedFileInfo, VersionBlock, VersionInfo, VersionValue};

/// A parsed PE image
pub struct PeImage<'a> {
    ctx: ParseContext<'a>,
    reader: Reader<'a>,
    headers: PeHeaders,
    sections: SectionTable,
}

impl<'a> PeImage<'a> {
    /// Validate headers and read the section table.
    pub fn parse(ctx: ParseContext<'a>) -> Result<Self> {
        let reader = ctx.reader(Endian::Little);
        let headers = headers::parse_headers(&reader, ctx.image.base())?;
        let count = usize::from(headers.number_of_sections);
        if count > ctx.options.max_sections {
            return Err(ImageError::malformed(
                "PE",
                format!("{count} sections exceeds limit of {}", ctx.options.max_sections),
            ));
        }
        let sections = SectionTable::read(&reader, headers.section_table, count)?;
        debug!(base = ctx.image.base(), sections = sections.len(), "PE image opened");
        Ok(Self {
            ctx,
            reader,
            headers,
            sections,
        })
    }

    pub(crate) fn reader(&self) -> &Reader<'a> {
        &self.reader
    }

    pub(crate) fn options(&self) -> &'a ParseOptions {
        self.ctx.options
    }

    pub(crate) fn resolver(&self) -> Option<&'a dyn ModuleResolver> {
        self.ctx.resolver
    }

    pub fn image(&self) -> Image<'a> {
        self.ctx.image
    }

    pub fn headers(&self) -> &PeHeaders {
        &self.headers
    }

    pub fn dos_header(&self) -> &TypedView {
        &self.headers.dos
    }

    pub fn nt_headers(&self) -> &TypedView {
        &self.headers.nt
    }

    fn optional(&self, field: &str) -> u64 {
        // Present on both optional header shapes, validated at parse time
        self.headers
            .optional_header()
            .and_then(|h| h.u64(field))
            .unwrap_or_default()
    }

    fn file(&self, field: &str) -> u64 {
        self.headers
            .file_header()
            .and_then(|h| h.u64(field))
            .unwrap_or_default()
    }

    pub fn is_64bit(&self) -> bool {
        self.headers.is_64bit
    }

    pub fn machine(&self) -> Machine {
        Machine::from(self.file("Machine") as u16)
    }

    pub fn timestamp(&self) -> u32 {
        self.file("TimeDateStamp") as u32
    }

    pub fn subsystem(&self) -> Subsystem {
        Subsystem::from(self.optional("Subsystem") as u16)
    }

    /// Preferred load address from the optional header
    pub fn image_base(&self) -> u64 {
        self.optional("ImageBase")
    }

    pub fn size_of_image(&self) -> u32 {
        self.optional("SizeOfImage") as u32
    }

    pub fn size_of_headers(&self) -> u32 {
        self.optional("SizeOfHeaders") as u32
    }

    /// Entry point RVA
    pub fn entry_point(&self) -> u32 {
        self.optional("AddressOfEntryPoint") as u32
    }

    /// Entry point in this address space, if the image has one
    pub fn entry_address(&self) -> Option<u64> {
        match self.entry_point() {
            0 => None,
            rva => self.rva_to_address(rva),
        }
    }

    /// A present data directory; zero-address slots are `None`.
    pub fn data_directory(&self, id: DirectoryId) -> Option<DataDirectory> {
        Some(self.headers.directories[id.index()]).filter(DataDirectory::is_present)
    }

    pub fn sections(&self) -> &[SectionHeader] {
        self.sections.sections()
    }

    pub fn section_table(&self) -> &SectionTable {
        &self.sections
    }

    /// Translate an RVA into this address space.
    ///
    /// Mapped images add the base. File images add the base to headers and
    /// otherwise go through the section table.
    pub fn rva_to_address(&self, rva: u32) -> Option<u64> {
        let base = self.image().base();
        match self.image().layout() {
            ImageLayout::Mapped => base.checked_add(u64::from(rva)),
            ImageLayout::File if rva < self.size_of_headers() => base.checked_add(u64::from(rva)),
            ImageLayout::File => self
                .sections
                .rva_to_offset(rva)
                .and_then(|offset| base.checked_add(u64::from(offset))),
        }
    }

    pub(crate) fn require_address(&self, rva: u32) -> Result<u64> {
        self.rva_to_address(rva)
            .ok_or(ImageError::unreadable(u64::from(rva), 1))
    }

    /// Iterator over resource leaves. `None` when the directory is absent.
    pub fn try_resources(&self) -> Result<Option<ResourceIter<'_>>> {
        let Some(dir) = self.data_directory(DirectoryId::Resource) else {
            return Ok(None);
        };
        let root = self.require_address(dir.virtual_address)?;
        ResourceIter::new(self, root).map(Some)
    }

    /// Resource leaves in file order, up to the first unreadable entry.
    pub fn resources(&self) -> Vec<ResourceEntry<'_>> {
        let Some(iter) = degrade("resources", self.try_resources()) else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        for entry in iter {
            match degrade("resources", entry.map(Some)) {
                Some(entry) => entries.push(entry),
                None => break,
            }
        }
        entries
    }

    /// Imported modules; empty when the directory is absent or unreadable.
    pub fn imports(&self) -> Vec<ImportModule> {
        degrade("imports", self.try_imports()).unwrap_or_default()
    }

    pub fn delay_imports(&self) -> Vec<ImportModule> {
        degrade("delay_imports", self.try_delay_imports()).unwrap_or_default()
    }

    pub fn exports(&self) -> Option<ExportTable> {
        degrade("exports", self.try_exports())
    }

    pub fn debug_entries(&self) -> Vec<DebugEntry> {
        degrade("debug", self.try_debug_entries()).unwrap_or_default()
    }

    /// First decoded CodeView record
    pub fn codeview(&self) -> Option<CodeViewInfo> {
        self.debug_entries().into_iter().find_map(|e| e.codeview)
    }

    /// Version resource: type 16, name 1, first language.
    pub fn try_version_info(&self) -> Result<Option<VersionInfo>> {
        let Some(iter) = self.try_resources()? else {
            return Ok(None);
        };
        for entry in iter {
            let entry = entry?;
            if entry.resource_type == ResourceType::Version
                && entry.names.get(1) == Some(&ResourceName::Id(1))
            {
                return match entry.content()? {
                    ResourceContent::Version(info) => Ok(Some(*info)),
                    _ => Ok(None),
                };
            }
        }
        Ok(None)
    }

    pub fn version_info(&self) -> Option<VersionInfo> {
        degrade("version", self.try_version_info())
    }
}

impl std::fmt::Debug for PeImage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeImage")
            .field("image", &self.ctx.image)
            .field("is_64bit", &self.is_64bit())
            .field("machine", &self.machine())
            .field("sections", &self.sections.len())
            .finish()
    }
}
