//! Program headers and file-offset/virtual-address translation

use serde::Serialize;

use crate::error::Result;
use crate::formats::elf::types::*;
use crate::reflect::TypedView;

/// Program header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramHeader {
    pub index: usize,
    pub segment_type: SegmentType,
    #[serde(serialize_with = "serialize_flags")]
    pub flags: SegmentFlags,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

fn serialize_flags<S: serde::Serializer>(flags: &SegmentFlags, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u32(flags.bits())
}

impl ProgramHeader {
    pub(crate) fn from_view(index: usize, view: &TypedView) -> Result<Self> {
        Ok(Self {
            index,
            segment_type: SegmentType::from(view.u32("p_type")?),
            flags: SegmentFlags::from_bits_retain(view.u32("p_flags")?),
            offset: view.u64("p_offset")?,
            vaddr: view.u64("p_vaddr")?,
            paddr: view.u64("p_paddr")?,
            filesz: view.u64("p_filesz")?,
            memsz: view.u64("p_memsz")?,
            align: view.u64("p_align")?,
        })
    }

    pub fn is_load(&self) -> bool {
        self.segment_type == SegmentType::Load
    }

    pub fn is_executable(&self) -> bool {
        self.flags.contains(SegmentFlags::X)
    }
}

/// One exact file-to-memory mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TranslationRange {
    pub offset: u64,
    pub vaddr: u64,
    pub size: u64,
}

/// File offset <-> virtual address translation built from PT_LOAD segments.
///
/// Only segments whose file and memory sizes match are included, so bytes
/// that exist only in memory (bss-style tails) never translate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslationTable {
    ranges: Vec<TranslationRange>,
}

impl TranslationTable {
    pub fn build(headers: &[ProgramHeader]) -> Self {
        let ranges = headers
            .iter()
            .filter(|ph| ph.is_load() && ph.filesz == ph.memsz && ph.filesz > 0)
            .map(|ph| TranslationRange {
                offset: ph.offset,
                vaddr: ph.vaddr,
                size: ph.filesz,
            })
            .collect();
        Self { ranges }
    }

    pub fn ranges(&self) -> &[TranslationRange] {
        &self.ranges
    }

    pub fn offset_to_vaddr(&self, offset: u64) -> Option<u64> {
        self.ranges
            .iter()
            .find(|r| offset >= r.offset && offset - r.offset < r.size)
            .and_then(|r| r.vaddr.checked_add(offset - r.offset))
    }

    pub fn vaddr_to_offset(&self, vaddr: u64) -> Option<u64> {
        self.ranges
            .iter()
            .find(|r| vaddr >= r.vaddr && vaddr - r.vaddr < r.size)
            .and_then(|r| r.offset.checked_add(vaddr - r.vaddr))
    }
}
