//! PE header parsing

use tracing::debug;

use crate::error::{ImageError, Result};
use crate::formats::address_at;
use crate::formats::pe::types::*;
use crate::reflect::{Reader, StructKind, TypedView};

const FORMAT: &str = "PE";

/// Validated DOS and NT headers.
#[derive(Debug, Clone)]
pub struct PeHeaders {
    pub dos: TypedView,
    pub nt: TypedView,
    pub is_64bit: bool,
    pub directories: [DataDirectory; NUMBER_OF_DIRECTORIES],
    /// Address of the first section header
    pub section_table: u64,
    pub number_of_sections: u16,
}

impl PeHeaders {
    pub fn file_header(&self) -> Result<&TypedView> {
        self.nt.view("FileHeader")
    }

    pub fn optional_header(&self) -> Result<&TypedView> {
        self.nt.view("OptionalHeader")
    }
}

/// Parse DOS header at the image base
pub fn parse_dos_header(reader: &Reader<'_>, base: u64) -> Result<TypedView> {
    let dos = reader.view(StructKind::ImageDosHeader, base)?;
    let magic = dos.u16("e_magic")?;
    if magic != DOS_SIGNATURE {
        return Err(ImageError::malformed(
            FORMAT,
            format!("bad DOS signature {magic:#06x}"),
        ));
    }
    Ok(dos)
}

/// Parse DOS and NT headers.
///
/// The NT headers are read as the 32-bit shape first to learn the optional
/// header magic, then re-read as the 64-bit shape when the magic asks for it.
pub fn parse_headers(reader: &Reader<'_>, base: u64) -> Result<PeHeaders> {
    let dos = parse_dos_header(reader, base)?;
    let nt_address = address_at(base, u64::from(dos.u32("e_lfanew")?))?;

    let nt32 = reader.view(StructKind::ImageNtHeaders32, nt_address)?;
    let signature = nt32.u32("Signature")?;
    if signature != PE_SIGNATURE {
        return Err(ImageError::malformed(
            FORMAT,
            format!("bad NT signature {signature:#010x}"),
        ));
    }

    let magic = nt32.view("OptionalHeader")?.u16("Magic")?;
    let (nt, is_64bit) = match magic {
        PE32_MAGIC => (nt32, false),
        PE32PLUS_MAGIC => (reader.view(StructKind::ImageNtHeaders64, nt_address)?, true),
        other => {
            return Err(ImageError::malformed(
                FORMAT,
                format!("unknown optional header magic {other:#06x}"),
            ))
        }
    };

    let file_header = nt.view("FileHeader")?;
    let optional = nt.view("OptionalHeader")?;
    let number_of_sections = file_header.u16("NumberOfSections")?;
    let size_of_optional = u64::from(file_header.u16("SizeOfOptionalHeader")?);
    let present = (optional.u32("NumberOfRvaAndSizes")? as usize).min(NUMBER_OF_DIRECTORIES);

    let mut directories = [DataDirectory::default(); NUMBER_OF_DIRECTORIES];
    for (slot, view) in directories
        .iter_mut()
        .zip(optional.views("DataDirectory")?)
        .take(present)
    {
        *slot = DataDirectory {
            virtual_address: view.u32("VirtualAddress")?,
            size: view.u32("Size")?,
        };
    }

    let section_table = nt_address
        + reader.size_of(StructKind::ImageFileHeader)
        + 4
        + size_of_optional;

    debug!(
        is_64bit,
        number_of_sections,
        directories = present,
        "PE headers parsed"
    );

    Ok(PeHeaders {
        dos,
        nt,
        is_64bit,
        directories,
        section_table,
        number_of_sections,
    })
}
