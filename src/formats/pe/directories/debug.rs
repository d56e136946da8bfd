//! Debug directory parsing

use serde::Serialize;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{degrade, Result};
use crate::formats::pe::types::*;
use crate::formats::pe::PeImage;
use crate::memory::ImageLayout;
use crate::reflect::{StructKind, TypedView};

/// CodeView `RSDS` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeViewInfo {
    pub guid: Uuid,
    pub age: u32,
    pub pdb_path: String,
}

impl CodeViewInfo {
    /// Symbol-server key: GUID without dashes followed by the age in hex.
    pub fn symbol_key(&self) -> String {
        format!("{}{:X}", self.guid.simple().to_string().to_uppercase(), self.age)
    }
}

/// Debug directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugEntry {
    pub characteristics: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub debug_type: DebugType,
    pub size_of_data: u32,
    pub address_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub codeview: Option<CodeViewInfo>,
}

fn guid_from_view(view: &TypedView) -> Result<Uuid> {
    let tail = view.bytes("Data4")?;
    let mut d4 = [0u8; 8];
    d4.copy_from_slice(&tail[..8]);
    Ok(Uuid::from_fields(
        view.u32("Data1")?,
        view.u16("Data2")?,
        view.u16("Data3")?,
        &d4,
    ))
}

impl PeImage<'_> {
    /// Where an entry's payload lives in this address space.
    fn debug_data_address(&self, view: &TypedView) -> Result<Option<u64>> {
        Ok(match self.image().layout() {
            ImageLayout::Mapped => match view.u32("AddressOfRawData")? {
                0 => None,
                rva => self.rva_to_address(rva),
            },
            ImageLayout::File => match view.u32("PointerToRawData")? {
                0 => None,
                offset => self.image().base().checked_add(u64::from(offset)),
            },
        })
    }

    /// Decode an `RSDS` CodeView record. Other signatures yield `None`.
    fn read_codeview(&self, address: u64, size: u32) -> Result<Option<CodeViewInfo>> {
        let reader = self.reader();
        let signature = reader.u32(address)?;
        if signature != CODEVIEW_RSDS {
            trace!(signature, "CodeView signature not decoded");
            return Ok(None);
        }
        let cv = reader.view(StructKind::CvInfoPdb70, address)?;
        let fixed = cv.size();
        let path_len = u64::from(size)
            .saturating_sub(fixed)
            .min(self.options().max_string_length as u64) as usize;
        let pdb_path = if path_len == 0 {
            String::new()
        } else {
            reader.string(address + fixed, path_len)?
        };
        Ok(Some(CodeViewInfo {
            guid: guid_from_view(cv.view("Signature")?)?,
            age: cv.u32("Age")?,
            pdb_path,
        }))
    }

    /// Parse the debug directory. `None` when the directory is absent.
    pub fn try_debug_entries(&self) -> Result<Option<Vec<DebugEntry>>> {
        let Some(dir) = self.data_directory(DirectoryId::Debug) else {
            return Ok(None);
        };
        let reader = self.reader();
        let stride = reader.size_of(StructKind::ImageDebugDirectory);
        let count = (u64::from(dir.size) / stride).min(self.options().max_debug_entries as u64);
        let start = self.require_address(dir.virtual_address)?;

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count {
            let view = reader.view(StructKind::ImageDebugDirectory, start + i * stride)?;
            let debug_type = DebugType::from(view.u32("Type")?);
            let size_of_data = view.u32("SizeOfData")?;

            let codeview = if debug_type == DebugType::CodeView {
                let decoded = self
                    .debug_data_address(&view)
                    .and_then(|addr| match addr {
                        Some(addr) => self.read_codeview(addr, size_of_data),
                        None => Ok(None),
                    });
                degrade("codeview", decoded)
            } else {
                None
            };

            entries.push(DebugEntry {
                characteristics: view.u32("Characteristics")?,
                time_date_stamp: view.u32("TimeDateStamp")?,
                major_version: view.u16("MajorVersion")?,
                minor_version: view.u16("MinorVersion")?,
                debug_type,
                size_of_data,
                address_of_raw_data: view.u32("AddressOfRawData")?,
                pointer_to_raw_data: view.u32("PointerToRawData")?,
                codeview,
            });
        }
        debug!(entries = entries.len(), "Debug directory parsed");
        Ok(Some(entries))
    }
}
