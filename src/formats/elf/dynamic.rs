//! Dynamic segment and link-map walking

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::Result;
use crate::formats::elf::types::*;
use crate::formats::address_at;
use crate::formats::elf::ElfImage;
use crate::memory::ImageLayout;
use crate::reflect::StructKind;

/// One dynamic section entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DynamicEntry {
    pub tag: DynamicTag,
    pub raw_tag: i64,
    pub value: u64,
    /// Address of the entry itself
    pub address: u64,
}

/// One module from the runtime link map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkMapEntry {
    pub name: String,
    /// Difference between load address and link-time address
    pub base_address: u64,
    /// Address of the module's dynamic section
    pub dynamic: u64,
    /// Address of the link_map record
    pub address: u64,
}

impl ElfImage<'_> {
    fn dyn_kind(&self) -> StructKind {
        if self.is_64bit() {
            StructKind::Elf64Dyn
        } else {
            StructKind::Elf32Dyn
        }
    }

    /// Every entry of the PT_DYNAMIC segment, walked until its memory size is
    /// exhausted. `None` without a dynamic segment.
    pub fn try_dynamic_entries(&self) -> Result<Option<Vec<DynamicEntry>>> {
        let Some(segment) = self
            .program_headers()
            .iter()
            .find(|ph| ph.segment_type == SegmentType::Dynamic)
        else {
            return Ok(None);
        };
        let Some(start) = self.segment_address(segment) else {
            return Ok(None);
        };
        let reader = self.reader();
        let kind = self.dyn_kind();
        let stride = reader.size_of(kind);
        let count = (segment.memsz / stride).min(self.options().max_dynamic_entries as u64);

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count {
            let address = address_at(start, i * stride)?;
            let view = reader.view(kind, address)?;
            let raw_tag = view.i64("d_tag")?;
            entries.push(DynamicEntry {
                tag: DynamicTag::from(raw_tag),
                raw_tag,
                value: view.u64("d_val")?,
                address,
            });
        }
        debug!(entries = entries.len(), "Dynamic segment parsed");
        Ok(Some(entries))
    }

    pub fn dynamic_entries(&self) -> Vec<DynamicEntry> {
        crate::error::degrade("dynamic", self.try_dynamic_entries()).unwrap_or_default()
    }

    /// Address of a dynamic pointer value in this address space.
    ///
    /// A running loader may already have relocated the pointer, in which case
    /// it lands inside the image as-is.
    fn dynamic_pointer(&self, value: u64) -> Option<u64> {
        match self.image().layout() {
            ImageLayout::Mapped if self.image().contains(value) && self.load_bias() != 0 => {
                Some(value)
            }
            _ => self.vaddr_to_address(value),
        }
    }

    fn dynamic_strings(&self, wanted: DynamicTag) -> Vec<String> {
        let entries = self.dynamic_entries();
        let Some(strtab) = entries
            .iter()
            .find(|e| e.tag == DynamicTag::StrTab)
            .and_then(|e| self.dynamic_pointer(e.value))
        else {
            return Vec::new();
        };
        let max = self.options().max_string_length;
        entries
            .iter()
            .filter(|e| e.tag == wanted)
            .filter_map(|e| strtab.checked_add(e.value))
            .filter_map(|address| self.reader().string(address, max).ok())
            .collect()
    }

    /// `DT_NEEDED` library names
    pub fn needed_libraries(&self) -> Vec<String> {
        self.dynamic_strings(DynamicTag::Needed)
    }

    pub fn soname(&self) -> Option<String> {
        self.dynamic_strings(DynamicTag::SoName).into_iter().next()
    }

    /// Walk `r_debug.r_map` from the `DT_DEBUG` entry of a running process.
    ///
    /// `None` when there is no dynamic segment or the loader has not filled
    /// in `DT_DEBUG`.
    pub fn try_link_map(&self) -> Result<Option<Vec<LinkMapEntry>>> {
        let Some(entries) = self.try_dynamic_entries()? else {
            return Ok(None);
        };
        let Some(r_debug) = entries
            .iter()
            .find(|e| e.tag == DynamicTag::Debug)
            .map(|e| e.value)
            .filter(|&v| v != 0)
        else {
            return Ok(None);
        };

        let reader = self.reader();
        let (debug_kind, map_kind) = if self.is_64bit() {
            (StructKind::RDebug64, StructKind::LinkMap64)
        } else {
            (StructKind::RDebug32, StructKind::LinkMap32)
        };
        let mut next = reader.view(debug_kind, r_debug)?.u64("r_map")?;
        let max = self.options().max_link_map_entries;
        let mut visited = HashSet::new();
        let mut modules = Vec::new();

        while next != 0 && modules.len() < max && visited.insert(next) {
            let map = reader.view(map_kind, next)?;
            let name = match map.u64("l_name")? {
                0 => String::new(),
                addr => reader.string(addr, self.options().max_string_length)?,
            };
            trace!(%name, address = next, "Link map entry");
            modules.push(LinkMapEntry {
                name,
                base_address: map.u64("l_addr")?,
                dynamic: map.u64("l_ld")?,
                address: next,
            });
            next = map.u64("l_next")?;
        }
        Ok(Some(modules))
    }

    pub fn link_map(&self) -> Vec<LinkMapEntry> {
        crate::error::degrade("link_map", self.try_link_map()).unwrap_or_default()
    }
}
