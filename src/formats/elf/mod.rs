//! ELF image parser
//!
//! The identifier, header and program header table are validated when the
//! image is opened. Notes, dynamic entries and the link map are re-read from
//! the image each time they are requested.

pub mod dynamic;
pub mod layout;
pub mod notes;
pub mod segments;
pub mod types;

use tracing::debug;

use crate::config::ParseOptions;
use crate::error::{degrade, ImageError, Result};
use crate::formats::{address_at, ParseContext};
use crate::memory::{Endian, Image, ImageLayout};
use crate::reflect::{Reader, StructKind, TypedView};

pub use dynamic::{DynamicEntry, LinkMapEntry};
pub use notes::{Note, NoteKind};
pub use segments::{ProgramHeader, TranslationRange, TranslationTable};
pub use types::*;

const PAGE_MASK: u64 = !0xfff;

/// A parsed ELF image
pub struct ElfImage<'a> {
    ctx: ParseContext<'a>,
    reader: Reader<'a>,
    class: ElfClass,
    header: TypedView,
    program_headers: Vec<ProgramHeader>,
    translation: TranslationTable,
    load_bias: u64,
}

impl<'a> ElfImage<'a> {
    pub fn parse(ctx: ParseContext<'a>) -> Result<Self> {
        let base = ctx.image.base();
        let ident = ctx.reader(Endian::Little).view(StructKind::ElfIdent, base)?;
        if ident.bytes("ei_magic")? != ELF_MAGIC {
            return Err(ImageError::malformed("ELF", "bad identifier"));
        }

        let raw_class = ident.u8("ei_class")?;
        let class = ElfClass::from_u8(raw_class)
            .ok_or_else(|| ImageError::malformed("ELF", format!("unknown class {raw_class}")))?;
        let endian = match ident.u8("ei_data")? {
            ELFDATA2LSB => Endian::Little,
            ELFDATA2MSB => Endian::Big,
            other => {
                return Err(ImageError::malformed(
                    "ELF",
                    format!("unknown data encoding {other}"),
                ))
            }
        };

        let reader = ctx.reader(endian);
        let (ehdr_kind, phdr_kind) = match class {
            ElfClass::Elf32 => (StructKind::Elf32Ehdr, StructKind::Elf32Phdr),
            ElfClass::Elf64 => (StructKind::Elf64Ehdr, StructKind::Elf64Phdr),
        };
        let header = reader.view(ehdr_kind, base)?;

        let count = usize::from(header.u16("e_phnum")?);
        if count > ctx.options.max_sections {
            return Err(ImageError::malformed(
                "ELF",
                format!("{count} program headers exceeds limit of {}", ctx.options.max_sections),
            ));
        }
        let entsize = u64::from(header.u16("e_phentsize")?);
        let min_entsize = reader.size_of(phdr_kind);
        if count > 0 && entsize < min_entsize {
            return Err(ImageError::malformed(
                "ELF",
                format!("program header size {entsize} smaller than {min_entsize}"),
            ));
        }

        let phoff = header.u64("e_phoff")?;
        let table = base.checked_add(phoff).ok_or_else(|| {
            ImageError::malformed("ELF", format!("program header offset {phoff:#x} out of range"))
        })?;
        let program_headers = (0..count)
            .map(|i| {
                let view = reader.view(phdr_kind, address_at(table, i as u64 * entsize)?)?;
                ProgramHeader::from_view(i, &view)
            })
            .collect::<Result<Vec<_>>>()?;

        let translation = TranslationTable::build(&program_headers);
        let load_bias = match ctx.image.layout() {
            ImageLayout::Mapped => program_headers
                .iter()
                .filter(|ph| ph.is_load())
                .map(|ph| ph.vaddr & PAGE_MASK)
                .min()
                .map_or(0, |lowest| base.wrapping_sub(lowest)),
            ImageLayout::File => 0,
        };

        debug!(
            base,
            class = class.bits(),
            ?endian,
            segments = program_headers.len(),
            load_bias,
            "ELF image opened"
        );
        Ok(Self {
            ctx,
            reader,
            class,
            header,
            program_headers,
            translation,
            load_bias,
        })
    }

    pub(crate) fn reader(&self) -> &Reader<'a> {
        &self.reader
    }

    pub(crate) fn options(&self) -> &'a ParseOptions {
        self.ctx.options
    }

    pub fn image(&self) -> Image<'a> {
        self.ctx.image
    }

    pub fn class(&self) -> ElfClass {
        self.class
    }

    pub fn is_64bit(&self) -> bool {
        self.class.is_64()
    }

    pub fn endian(&self) -> Endian {
        self.reader.endian()
    }

    /// The `Elf32_Ehdr` or `Elf64_Ehdr` view
    pub fn header(&self) -> &TypedView {
        &self.header
    }

    fn header_field(&self, field: &str) -> u64 {
        // Present on both header shapes
        self.header.u64(field).unwrap_or_default()
    }

    pub fn file_type(&self) -> ElfType {
        ElfType::from(self.header_field("e_type") as u16)
    }

    pub fn machine(&self) -> ElfMachine {
        ElfMachine::from(self.header_field("e_machine") as u16)
    }

    /// Entry point virtual address as recorded in the header
    pub fn entry_point(&self) -> u64 {
        self.header_field("e_entry")
    }

    pub fn entry_address(&self) -> Option<u64> {
        match self.entry_point() {
            0 => None,
            vaddr => self.vaddr_to_address(vaddr),
        }
    }

    pub fn program_headers(&self) -> &[ProgramHeader] {
        &self.program_headers
    }

    pub fn translation_table(&self) -> &TranslationTable {
        &self.translation
    }

    pub fn offset_to_vaddr(&self, offset: u64) -> Option<u64> {
        self.translation.offset_to_vaddr(offset)
    }

    pub fn vaddr_to_offset(&self, vaddr: u64) -> Option<u64> {
        self.translation.vaddr_to_offset(vaddr)
    }

    /// Difference between where a mapped image sits and its link-time
    /// addresses. Always 0 for the file layout.
    pub fn load_bias(&self) -> u64 {
        self.load_bias
    }

    /// Translate a link-time virtual address into this address space.
    pub fn vaddr_to_address(&self, vaddr: u64) -> Option<u64> {
        match self.image().layout() {
            ImageLayout::Mapped => Some(vaddr.wrapping_add(self.load_bias)),
            ImageLayout::File => self
                .translation
                .vaddr_to_offset(vaddr)
                .and_then(|offset| self.image().base().checked_add(offset)),
        }
    }

    /// Start of a segment's contents in this address space. File images
    /// have nothing to point at for segments without file bytes.
    pub fn segment_address(&self, segment: &ProgramHeader) -> Option<u64> {
        match self.image().layout() {
            ImageLayout::Mapped => Some(segment.vaddr.wrapping_add(self.load_bias)),
            ImageLayout::File if segment.filesz == 0 => None,
            ImageLayout::File => self.image().base().checked_add(segment.offset),
        }
    }

    fn segments_of(&self, segment_type: SegmentType) -> impl Iterator<Item = &ProgramHeader> {
        self.program_headers
            .iter()
            .filter(move |ph| ph.segment_type == segment_type)
    }

    /// Program interpreter path from PT_INTERP
    pub fn try_interpreter(&self) -> Result<Option<String>> {
        let Some(address) = self
            .segments_of(SegmentType::Interp)
            .next()
            .and_then(|ph| self.segment_address(ph))
        else {
            return Ok(None);
        };
        self.reader
            .string(address, self.options().max_string_length)
            .map(Some)
    }

    pub fn interpreter(&self) -> Option<String> {
        degrade("interpreter", self.try_interpreter())
    }

    /// Notes from every PT_NOTE segment, in program header order.
    pub fn try_notes(&self) -> Result<Option<Vec<Note>>> {
        let mut segments = self.segments_of(SegmentType::Note).peekable();
        if segments.peek().is_none() {
            return Ok(None);
        }
        let max = self.options().max_notes;
        let mut all = Vec::new();
        for segment in segments {
            let Some(address) = self.segment_address(segment) else {
                continue;
            };
            let align = if segment.align == 8 { 8 } else { 4 };
            let remaining = max.saturating_sub(all.len());
            all.extend(notes::read_notes(
                &self.reader,
                address,
                segment.filesz,
                align,
                remaining,
            )?);
        }
        debug!(notes = all.len(), "Notes parsed");
        Ok(Some(all))
    }

    pub fn notes(&self) -> Vec<Note> {
        degrade("notes", self.try_notes()).unwrap_or_default()
    }

    /// Hex-encoded `GNU` build-id
    pub fn build_id(&self) -> Option<String> {
        self.notes().iter().find_map(|note| match note.kind() {
            NoteKind::BuildId(id) => Some(id),
            _ => None,
        })
    }
}

impl std::fmt::Debug for ElfImage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElfImage")
            .field("image", &self.ctx.image)
            .field("class", &self.class)
            .field("endian", &self.endian())
            .field("machine", &self.machine())
            .field("segments", &self.program_headers.len())
            .finish()
    }
}
