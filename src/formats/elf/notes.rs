//! Note segment parsing

use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::formats::{address_at, align_up};
use crate::formats::elf::types::*;
use crate::reflect::{Reader, StructKind};

/// Individual note entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub name: String,
    pub note_type: u32,
    pub desc: Vec<u8>,
}

/// Decoded meaning of a note
#[derive(Debug, Clone, PartialEq)]
pub enum NoteKind {
    /// `GNU` build-id, hex encoded
    BuildId(String),
    /// `FDO` packaging metadata JSON
    PackageMetadata(serde_json::Value),
    Other,
}

impl Note {
    pub fn kind(&self) -> NoteKind {
        match (self.name.as_str(), self.note_type) {
            ("GNU", NT_GNU_BUILD_ID) => NoteKind::BuildId(hex::encode(&self.desc)),
            ("FDO", NT_FDO_PACKAGING_METADATA) => {
                let end = self
                    .desc
                    .iter()
                    .position(|&b| b == 0)
                    .unwrap_or(self.desc.len());
                match serde_json::from_slice(&self.desc[..end]) {
                    Ok(value) => NoteKind::PackageMetadata(value),
                    Err(_) => NoteKind::Other,
                }
            }
            _ => NoteKind::Other,
        }
    }
}

/// Read the notes packed in `[address, address + size)`.
///
/// A note whose name or descriptor would run past the region ends the walk.
pub(crate) fn read_notes(
    reader: &Reader<'_>,
    address: u64,
    size: u64,
    align: u64,
    max_notes: usize,
) -> Result<Vec<Note>> {
    let header_size = reader.size_of(StructKind::ElfNoteHeader);
    let mut notes = Vec::new();
    let mut offset = 0u64;

    while offset.saturating_add(header_size) <= size && notes.len() < max_notes {
        let header = reader.view(StructKind::ElfNoteHeader, address_at(address, offset)?)?;
        let namesz = header.u64("n_namesz")?;
        let descsz = header.u64("n_descsz")?;
        let note_type = header.u32("n_type")?;

        let name_at = offset + header_size;
        let desc_at = align_up(name_at.saturating_add(namesz), align);
        if desc_at.saturating_add(descsz) > size {
            trace!(offset, namesz, descsz, "Truncated note");
            break;
        }

        let raw_name = reader.bytes(address_at(address, name_at)?, namesz as usize)?;
        let name_end = raw_name.iter().position(|&b| b == 0).unwrap_or(raw_name.len());
        let name = String::from_utf8_lossy(&raw_name[..name_end]).into_owned();
        let desc = reader.bytes(address_at(address, desc_at)?, descsz as usize)?;
        trace!(%name, note_type, descsz, "Note");

        notes.push(Note {
            name,
            note_type,
            desc,
        });
        offset = align_up(desc_at + descsz, align);
    }

    Ok(notes)
}
