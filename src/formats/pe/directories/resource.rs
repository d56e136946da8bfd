//! Resource directory walking

use encoding_rs::{Encoding, UTF_16LE, UTF_8};
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ParseOptions;
use crate::error::{ImageError, Result};
use crate::formats::pe::types::ResourceType;
use crate::formats::pe::version::VersionInfo;
use crate::formats::pe::PeImage;
use crate::reflect::{Reader, StructKind};

/// One segment of a resource path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResourceName {
    Id(u16),
    Name(String),
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Decoded payload of a resource leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceContent {
    Version(Box<VersionInfo>),
    Text(String),
    Binary(Vec<u8>),
}

/// A data leaf of the resource tree.
#[derive(Debug, Clone)]
pub struct ResourceEntry<'a> {
    /// Names from the root to this leaf
    pub names: Vec<ResourceName>,
    /// Top-level type of the subtree holding this leaf
    pub resource_type: ResourceType,
    pub data_rva: u32,
    pub size: u32,
    pub code_page: u32,
    /// Address of the payload, when the RVA maps into the image
    pub data_address: Option<u64>,
    reader: Reader<'a>,
    max_bytes: usize,
}

impl ResourceEntry<'_> {
    /// `/`-joined names, e.g. `24/1/1033`.
    pub fn path(&self) -> String {
        self.names
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Language of the leaf when the tree uses the usual type/name/language shape.
    pub fn language(&self) -> Option<u16> {
        match self.names.get(2) {
            Some(ResourceName::Id(lang)) => Some(*lang),
            _ => None,
        }
    }

    pub fn data(&self) -> Result<Vec<u8>> {
        let address = self
            .data_address
            .ok_or(ImageError::unreadable(u64::from(self.data_rva), u64::from(self.size)))?;
        let len = (self.size as usize).min(self.max_bytes);
        self.reader.bytes(address, len)
    }

    /// Decode the payload according to the resource type.
    pub fn content(&self) -> Result<ResourceContent> {
        let data = self.data()?;
        Ok(match self.resource_type {
            ResourceType::Version => ResourceContent::Version(Box::new(VersionInfo::decode(
                self.reader.registry(),
                &data,
            )?)),
            ref ty if ty.is_text() => ResourceContent::Text(decode_text(&data)),
            _ => ResourceContent::Binary(data),
        })
    }
}

/// Decode a text payload: BOM first, then a UTF-16LE guess, then UTF-8.
pub fn decode_text(data: &[u8]) -> String {
    let (encoding, body) = match Encoding::for_bom(data) {
        Some((encoding, bom_len)) => (encoding, &data[bom_len..]),
        None if data.len() >= 2 && data.len() % 2 == 0 && data[0] != 0 && data[1] == 0 => {
            (UTF_16LE, data)
        }
        None => (UTF_8, data),
    };
    let (text, _) = encoding.decode_without_bom_handling(body);
    text.trim_end_matches('\0').to_string()
}

struct Frame {
    offset: u32,
    next: u32,
    count: u32,
    names: Vec<ResourceName>,
    resource_type: Option<ResourceType>,
}

/// Depth-first iterator over resource leaves in file order.
///
/// Restartable by asking the image for a new iterator. Stops after the first
/// error, which is yielded.
pub struct ResourceIter<'a> {
    reader: Reader<'a>,
    image: &'a PeImage<'a>,
    root: u64,
    stack: Vec<Frame>,
    visited: usize,
    options: &'a ParseOptions,
    failed: bool,
}

impl<'a> ResourceIter<'a> {
    pub(crate) fn new(image: &'a PeImage<'a>, root: u64) -> Result<Self> {
        let reader = *image.reader();
        let mut iter = Self {
            reader,
            image,
            root,
            stack: Vec::new(),
            visited: 0,
            options: image.options(),
            failed: false,
        };
        iter.push_directory(0, Vec::new(), None)?;
        Ok(iter)
    }

    fn push_directory(
        &mut self,
        offset: u32,
        names: Vec<ResourceName>,
        resource_type: Option<ResourceType>,
    ) -> Result<()> {
        let dir = self
            .reader
            .view(StructKind::ImageResourceDirectory, self.root + u64::from(offset))?;
        let count =
            u32::from(dir.u16("NumberOfNamedEntries")?) + u32::from(dir.u16("NumberOfIdEntries")?);
        trace!(offset, count, depth = names.len(), "Resource directory");
        self.stack.push(Frame {
            offset,
            next: 0,
            count,
            names,
            resource_type,
        });
        Ok(())
    }

    fn read_name(&self, offset: u32) -> Result<String> {
        let address = self.root + u64::from(offset);
        let length = self.reader.u16(address)? as usize;
        let raw = self
            .reader
            .bytes(address + 2, length.min(self.options.max_string_length) * 2)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    fn step(&mut self) -> Result<Option<ResourceEntry<'a>>> {
        let entry_size = self.reader.size_of(StructKind::ImageResourceDirectoryEntry);
        let dir_size = self.reader.size_of(StructKind::ImageResourceDirectory);

        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            if frame.next >= frame.count {
                self.stack.pop();
                continue;
            }
            let index = frame.next;
            frame.next += 1;
            let dir_offset = frame.offset;

            self.visited += 1;
            if self.visited > self.options.max_resource_entries {
                debug!(limit = self.options.max_resource_entries, "Resource entry limit reached");
                self.stack.clear();
                return Ok(None);
            }

            let address = self.root
                + u64::from(dir_offset)
                + dir_size
                + u64::from(index) * entry_size;
            let entry = self.reader.view(StructKind::ImageResourceDirectoryEntry, address)?;

            let name = if entry.u32("NameIsString")? == 1 {
                ResourceName::Name(self.read_name(entry.u32("NameOffset")?)?)
            } else {
                ResourceName::Id(entry.u16("Id")?)
            };

            // Re-borrow after the reads above
            let Some(frame) = self.stack.last() else {
                return Ok(None);
            };
            let resource_type = frame.resource_type.clone().unwrap_or_else(|| match &name {
                ResourceName::Id(id) => ResourceType::from_id(*id),
                ResourceName::Name(n) => ResourceType::Named(n.clone()),
            });
            let mut names = frame.names.clone();
            names.push(name);

            if entry.u32("DataIsDirectory")? == 1 {
                if names.len() >= self.options.max_resource_depth {
                    debug!(depth = names.len(), "Resource depth limit reached");
                    continue;
                }
                self.push_directory(entry.u32("OffsetToDirectory")?, names, Some(resource_type))?;
                continue;
            }

            let data = self.reader.view(
                StructKind::ImageResourceDataEntry,
                self.root + u64::from(entry.u32("OffsetToData")?),
            )?;
            let data_rva = data.u32("OffsetToData")?;
            return Ok(Some(ResourceEntry {
                names,
                resource_type,
                data_rva,
                size: data.u32("Size")?,
                code_page: data.u32("CodePage")?,
                data_address: self.image.rva_to_address(data_rva),
                reader: self.reader,
                max_bytes: self.options.max_resource_bytes,
            }));
        }
    }
}

impl<'a> Iterator for ResourceIter<'a> {
    type Item = Result<ResourceEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(entry) => entry.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
