//! Section table and RVA translation

use std::cmp::Ordering;

use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::formats::pe::types::SectionFlags;
use crate::reflect::{Reader, StructKind, TypedView};

/// Section header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionHeader {
    pub name: String,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub pointer_to_raw_data: u32,
    pub size_of_raw_data: u32,
    #[serde(serialize_with = "serialize_flags")]
    pub characteristics: SectionFlags,
}

fn serialize_flags<S: serde::Serializer>(flags: &SectionFlags, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u32(flags.bits())
}

impl SectionHeader {
    pub(crate) fn from_view(view: &TypedView) -> Result<Self> {
        let raw = view.bytes("Name")?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(Self {
            name: String::from_utf8_lossy(&raw[..end]).into_owned(),
            virtual_address: view.u32("VirtualAddress")?,
            virtual_size: view.u32("VirtualSize")?,
            pointer_to_raw_data: view.u32("PointerToRawData")?,
            size_of_raw_data: view.u32("SizeOfRawData")?,
            characteristics: SectionFlags::from_bits_retain(view.u32("Characteristics")?),
        })
    }

    /// Extent in memory; sections with a zero virtual size use their raw size.
    fn span(&self) -> u32 {
        self.virtual_size.max(self.size_of_raw_data)
    }

    pub fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address && rva - self.virtual_address < self.span()
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics.contains(SectionFlags::MEM_EXECUTE)
    }

    pub fn contains_code(&self) -> bool {
        self.characteristics.contains(SectionFlags::CNT_CODE)
    }
}

/// Section table for RVA resolution
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    // File order, as declared
    sections: Vec<SectionHeader>,
    // Indices into `sections`, sorted by virtual address
    by_rva: Vec<usize>,
}

impl SectionTable {
    pub fn new(sections: Vec<SectionHeader>) -> Self {
        let mut by_rva: Vec<usize> = (0..sections.len()).collect();
        by_rva.sort_by_key(|&i| sections[i].virtual_address);
        Self { sections, by_rva }
    }

    /// Read `count` section headers starting at `address`.
    pub(crate) fn read(reader: &Reader<'_>, address: u64, count: usize) -> Result<Self> {
        let stride = reader.size_of(StructKind::ImageSectionHeader);
        let mut sections = Vec::with_capacity(count);
        for i in 0..count as u64 {
            let view = reader.view(StructKind::ImageSectionHeader, address + i * stride)?;
            let header = SectionHeader::from_view(&view)?;
            trace!(name = %header.name, rva = header.virtual_address, "Section header");
            sections.push(header);
        }
        Ok(Self::new(sections))
    }

    /// All sections in file order
    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section_by_name(&self, name: &str) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Find the section containing `rva` by binary search over virtual addresses.
    pub fn section_containing_rva(&self, rva: u32) -> Option<&SectionHeader> {
        let idx = self
            .by_rva
            .binary_search_by(|&i| {
                let s = &self.sections[i];
                if rva < s.virtual_address {
                    Ordering::Greater
                } else if s.contains_rva(rva) {
                    Ordering::Equal
                } else {
                    Ordering::Less
                }
            })
            .ok()?;
        Some(&self.sections[self.by_rva[idx]])
    }

    /// Convert RVA to file offset
    pub fn rva_to_offset(&self, rva: u32) -> Option<u32> {
        let section = self.section_containing_rva(rva)?;
        let delta = rva - section.virtual_address;
        // Bytes past the raw data exist only in memory
        if delta >= section.size_of_raw_data {
            return None;
        }
        section.pointer_to_raw_data.checked_add(delta)
    }

    /// Convert file offset to RVA
    pub fn offset_to_rva(&self, offset: u32) -> Option<u32> {
        self.sections.iter().find_map(|s| {
            let start = s.pointer_to_raw_data;
            (offset >= start && offset - start < s.size_of_raw_data)
                .then(|| s.virtual_address + (offset - start))
        })
    }
}
