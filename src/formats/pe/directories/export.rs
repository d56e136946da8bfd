//! Export table parsing

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::formats::pe::types::*;
use crate::formats::pe::PeImage;
use crate::memory::{decode_uint, Endian};
use crate::reflect::StructKind;

/// Export entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    /// Biased ordinal (`Base` + function index)
    pub ordinal: u32,
    pub name: Option<String>,
    pub rva: u32,
    pub address: Option<u64>,
    /// `DLL.Function` target for forwarded exports
    pub forwarder: Option<String>,
}

/// Export table containing all exports
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportTable {
    pub dll_name: Option<String>,
    pub ordinal_base: u32,
    pub time_date_stamp: u32,
    pub exports: Vec<ExportEntry>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl ExportTable {
    pub fn get_by_name(&self, name: &str) -> Option<&ExportEntry> {
        self.by_name.get(name).and_then(|&idx| self.exports.get(idx))
    }

    pub fn get_by_ordinal(&self, ordinal: u32) -> Option<&ExportEntry> {
        let idx = ordinal.checked_sub(self.ordinal_base)? as usize;
        self.exports.get(idx)
    }

    pub fn count(&self) -> usize {
        self.exports.len()
    }

    pub fn named_count(&self) -> usize {
        self.exports.iter().filter(|e| e.name.is_some()).count()
    }
}

fn read_array(image: &PeImage<'_>, rva: u32, count: usize, width: usize) -> Result<Vec<u64>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let bytes = image
        .reader()
        .bytes(image.require_address(rva)?, count * width)?;
    Ok(bytes
        .chunks_exact(width)
        .map(|c| decode_uint(c, Endian::Little))
        .collect())
}

/// For each function index, the position of its entry in the name arrays.
///
/// Several names may share one function; the first name wins.
pub(crate) fn invert_name_ordinals(ordinals: &[u64], functions: usize) -> Vec<Option<usize>> {
    let mut named = vec![None; functions];
    for (position, &index) in ordinals.iter().enumerate() {
        if let Some(slot) = named.get_mut(index as usize) {
            if slot.is_none() {
                *slot = Some(position);
            }
        }
    }
    named
}

impl PeImage<'_> {
    /// Parse the export directory. `None` when the directory is absent.
    pub fn try_exports(&self) -> Result<Option<ExportTable>> {
        let Some(dir) = self.data_directory(DirectoryId::Export) else {
            return Ok(None);
        };
        let reader = self.reader();
        let view = reader.view(
            StructKind::ImageExportDirectory,
            self.require_address(dir.virtual_address)?,
        )?;
        let max = self.options().max_exports;
        let max_string = self.options().max_string_length;

        let function_count = (view.u32("NumberOfFunctions")? as usize).min(max);
        let name_count = (view.u32("NumberOfNames")? as usize).min(max);
        let ordinal_base = view.u32("Base")?;

        let functions = read_array(self, view.u32("AddressOfFunctions")?, function_count, 4)?;
        let names = read_array(self, view.u32("AddressOfNames")?, name_count, 4)?;
        let ordinals = read_array(self, view.u32("AddressOfNameOrdinals")?, name_count, 2)?;
        let named = invert_name_ordinals(&ordinals, function_count);

        let mut table = ExportTable {
            dll_name: match view.u32("Name")? {
                0 => None,
                rva => self
                    .rva_to_address(rva)
                    .and_then(|a| reader.string(a, max_string).ok()),
            },
            ordinal_base,
            time_date_stamp: view.u32("TimeDateStamp")?,
            ..Default::default()
        };

        for (index, &rva) in functions.iter().enumerate() {
            let rva = rva as u32;
            let name = match named[index] {
                Some(position) => Some(reader.string(
                    self.require_address(names[position] as u32)?,
                    max_string,
                )?),
                None => None,
            };
            let forwarder = if dir.contains_rva(rva) {
                Some(reader.string(self.require_address(rva)?, max_string)?)
            } else {
                None
            };
            if let Some(name) = &name {
                table
                    .by_name
                    .entry(name.clone())
                    .or_insert(table.exports.len());
            }
            table.exports.push(ExportEntry {
                ordinal: ordinal_base.wrapping_add(index as u32),
                name,
                rva,
                address: if forwarder.is_some() || rva == 0 {
                    None
                } else {
                    self.rva_to_address(rva)
                },
                forwarder,
            });
        }

        debug!(
            exports = table.exports.len(),
            named = table.named_count(),
            "Export table parsed"
        );
        Ok(Some(table))
    }
}
