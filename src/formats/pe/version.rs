//! Version resource (`VS_VERSIONINFO`) decoding.
//!
//! A version resource is a tree of self-describing blocks. Each block starts
//! with `wLength`, `wValueLength` and `wType`, followed by a NUL-terminated
//! UTF-16 key, a DWORD-aligned value and DWORD-aligned children filling the
//! rest of `wLength`.

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::Result;
use crate::formats::align_up;
use crate::formats::pe::types::VS_FFI_SIGNATURE;
use crate::memory::{Endian, SliceMemory};
use crate::reflect::{Reader, Registry, StructKind, TypedView};

const HEADER_SIZE: usize = 6;
const MAX_DEPTH: usize = 16;

/// Value carried by a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VersionValue {
    None,
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionBlock {
    pub key: String,
    pub value: VersionValue,
    pub children: Vec<VersionBlock>,
}

impl VersionBlock {
    pub fn child(&self, key: &str) -> Option<&VersionBlock> {
        self.children.iter().find(|c| c.key == key)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            VersionValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Decoded `VS_FIXEDFILEINFO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixedFileInfo {
    pub struc_version: u32,
    pub file_version_ms: u32,
    pub file_version_ls: u32,
    pub product_version_ms: u32,
    pub product_version_ls: u32,
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    pub file_date: u64,
}

fn dotted(ms: u32, ls: u32) -> String {
    format!("{}.{}.{}.{}", ms >> 16, ms & 0xffff, ls >> 16, ls & 0xffff)
}

impl FixedFileInfo {
    fn from_view(view: &TypedView) -> Result<Self> {
        Ok(Self {
            struc_version: view.u32("dwStrucVersion")?,
            file_version_ms: view.u32("dwFileVersionMS")?,
            file_version_ls: view.u32("dwFileVersionLS")?,
            product_version_ms: view.u32("dwProductVersionMS")?,
            product_version_ls: view.u32("dwProductVersionLS")?,
            file_flags_mask: view.u32("dwFileFlagsMask")?,
            file_flags: view.u32("dwFileFlags")?,
            file_os: view.u32("dwFileOS")?,
            file_type: view.u32("dwFileType")?,
            file_subtype: view.u32("dwFileSubtype")?,
            file_date: (view.u64("dwFileDateMS")? << 32) | view.u64("dwFileDateLS")?,
        })
    }

    pub fn file_version(&self) -> String {
        dotted(self.file_version_ms, self.file_version_ls)
    }

    pub fn product_version(&self) -> String {
        dotted(self.product_version_ms, self.product_version_ls)
    }
}

/// A decoded version resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub fixed: Option<FixedFileInfo>,
    pub root: VersionBlock,
}

impl VersionInfo {
    /// Decode a version resource payload.
    pub fn decode(registry: &Registry, data: &[u8]) -> Result<Self> {
        let memory = SliceMemory::new(0, data);
        let reader = Reader::new(&memory, registry, Endian::Little);
        let root = decode_block(&reader, data, 0, data.len(), 0)?.map(|(block, _)| block);
        let root = root.unwrap_or(VersionBlock {
            key: String::new(),
            value: VersionValue::None,
            children: Vec::new(),
        });

        let fixed = match &root.value {
            VersionValue::Binary(bytes) if bytes.len() as u64 >= reader.size_of(StructKind::VsFixedFileInfo) => {
                let fixed_memory = SliceMemory::new(0, bytes.as_slice());
                let view = Reader::new(&fixed_memory, registry, Endian::Little)
                    .view(StructKind::VsFixedFileInfo, 0)?;
                if view.u32("dwSignature")? == VS_FFI_SIGNATURE {
                    Some(FixedFileInfo::from_view(&view)?)
                } else {
                    debug!("VS_FIXEDFILEINFO signature mismatch");
                    None
                }
            }
            _ => None,
        };

        Ok(Self { fixed, root })
    }

    pub fn file_version(&self) -> Option<String> {
        self.fixed
            .as_ref()
            .map(FixedFileInfo::file_version)
            .or_else(|| self.string("FileVersion").map(str::to_string))
    }

    pub fn product_version(&self) -> Option<String> {
        self.fixed
            .as_ref()
            .map(FixedFileInfo::product_version)
            .or_else(|| self.string("ProductVersion").map(str::to_string))
    }

    /// Every `StringFileInfo` key/value pair across all language tables.
    pub fn string_table(&self) -> Vec<(String, String)> {
        self.root
            .child("StringFileInfo")
            .into_iter()
            .flat_map(|info| &info.children)
            .flat_map(|table| &table.children)
            .map(|entry| (entry.key.clone(), entry.text().unwrap_or_default().to_string()))
            .collect()
    }

    /// First string named `key` in any language table.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.root
            .child("StringFileInfo")?
            .children
            .iter()
            .find_map(|table| table.child(key))
            .and_then(VersionBlock::text)
    }

    /// `(language, code page)` pairs from `VarFileInfo\Translation`.
    pub fn translations(&self) -> Vec<(u16, u16)> {
        let Some(VersionValue::Binary(bytes)) = self
            .root
            .child("VarFileInfo")
            .and_then(|var| var.child("Translation"))
            .map(|t| &t.value)
        else {
            return Vec::new();
        };
        bytes
            .chunks_exact(4)
            .map(|c| (u16::from_le_bytes([c[0], c[1]]), u16::from_le_bytes([c[2], c[3]])))
            .collect()
    }
}

/// Decode the block at `offset`, bounded by `limit`. Returns the block and
/// its declared length, or `None` when no whole block fits.
fn decode_block(
    reader: &Reader<'_>,
    data: &[u8],
    offset: usize,
    limit: usize,
    depth: usize,
) -> Result<Option<(VersionBlock, usize)>> {
    if depth > MAX_DEPTH || offset + HEADER_SIZE > limit {
        return Ok(None);
    }
    let header = reader.view(StructKind::VersionBlockHeader, offset as u64)?;
    let length = header.u16("wLength")? as usize;
    let value_length = header.u16("wValueLength")? as usize;
    let is_text = header.u16("wType")? == 1;

    let end = offset + length;
    if length < HEADER_SIZE || end > limit {
        trace!(offset, length, limit, "Version block overruns its parent");
        return Ok(None);
    }

    // Key: UTF-16 up to NUL or the end of the block
    let mut units = Vec::new();
    let mut cursor = offset + HEADER_SIZE;
    while cursor + 2 <= end {
        let unit = u16::from_le_bytes([data[cursor], data[cursor + 1]]);
        cursor += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    let key = String::from_utf16_lossy(&units);

    let value_start = (align_up(cursor as u64, 4) as usize).min(end);
    let value_bytes = if is_text { value_length * 2 } else { value_length };
    let value_end = (value_start + value_bytes).min(end);
    let raw = &data[value_start..value_end];
    let value = if raw.is_empty() {
        VersionValue::None
    } else if is_text {
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        VersionValue::Text(String::from_utf16_lossy(&units))
    } else {
        VersionValue::Binary(raw.to_vec())
    };

    let mut children = Vec::new();
    let mut child = align_up(value_end as u64, 4) as usize;
    while child + HEADER_SIZE <= end {
        match decode_block(reader, data, child, end, depth + 1)? {
            Some((block, child_length)) => {
                children.push(block);
                child = align_up((child + child_length) as u64, 4) as usize;
            }
            None => break,
        }
    }

    Ok(Some((
        VersionBlock {
            key,
            value,
            children,
        },
        length,
    )))
}
