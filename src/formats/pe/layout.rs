//! PE structure descriptors.
//!
//! Field names follow the Windows SDK headers so views can be read with the
//! names found in any PE reference.

use crate::reflect::descriptor::{u16f, u32f, u64f, u8f, FieldDescriptor as F};
use crate::reflect::{StructKind as K, StructureDescriptor as S};

pub static IMAGE_DOS_HEADER: S = S::structure(
    "IMAGE_DOS_HEADER",
    &[
        u16f("e_magic"),
        u16f("e_cblp"),
        u16f("e_cp"),
        u16f("e_crlc"),
        u16f("e_cparhdr"),
        u16f("e_minalloc"),
        u16f("e_maxalloc"),
        u16f("e_ss"),
        u16f("e_sp"),
        u16f("e_csum"),
        u16f("e_ip"),
        u16f("e_cs"),
        u16f("e_lfarlc"),
        u16f("e_ovno"),
        u16f("e_res").array(4),
        u16f("e_oemid"),
        u16f("e_oeminfo"),
        u16f("e_res2").array(10),
        u32f("e_lfanew"),
    ],
);

pub static IMAGE_FILE_HEADER: S = S::structure(
    "IMAGE_FILE_HEADER",
    &[
        u16f("Machine"),
        u16f("NumberOfSections"),
        u32f("TimeDateStamp"),
        u32f("PointerToSymbolTable"),
        u32f("NumberOfSymbols"),
        u16f("SizeOfOptionalHeader"),
        u16f("Characteristics"),
    ],
);

pub static IMAGE_DATA_DIRECTORY: S = S::structure(
    "IMAGE_DATA_DIRECTORY",
    &[u32f("VirtualAddress"), u32f("Size")],
);

pub static IMAGE_OPTIONAL_HEADER32: S = S::structure(
    "IMAGE_OPTIONAL_HEADER32",
    &[
        u16f("Magic"),
        u8f("MajorLinkerVersion"),
        u8f("MinorLinkerVersion"),
        u32f("SizeOfCode"),
        u32f("SizeOfInitializedData"),
        u32f("SizeOfUninitializedData"),
        u32f("AddressOfEntryPoint"),
        u32f("BaseOfCode"),
        u32f("BaseOfData"),
        u32f("ImageBase"),
        u32f("SectionAlignment"),
        u32f("FileAlignment"),
        u16f("MajorOperatingSystemVersion"),
        u16f("MinorOperatingSystemVersion"),
        u16f("MajorImageVersion"),
        u16f("MinorImageVersion"),
        u16f("MajorSubsystemVersion"),
        u16f("MinorSubsystemVersion"),
        u32f("Win32VersionValue"),
        u32f("SizeOfImage"),
        u32f("SizeOfHeaders"),
        u32f("CheckSum"),
        u16f("Subsystem"),
        u16f("DllCharacteristics"),
        u32f("SizeOfStackReserve"),
        u32f("SizeOfStackCommit"),
        u32f("SizeOfHeapReserve"),
        u32f("SizeOfHeapCommit"),
        u32f("LoaderFlags"),
        u32f("NumberOfRvaAndSizes"),
        F::nested("DataDirectory", K::ImageDataDirectory).array(16),
    ],
);

pub static IMAGE_OPTIONAL_HEADER64: S = S::structure(
    "IMAGE_OPTIONAL_HEADER64",
    &[
        u16f("Magic"),
        u8f("MajorLinkerVersion"),
        u8f("MinorLinkerVersion"),
        u32f("SizeOfCode"),
        u32f("SizeOfInitializedData"),
        u32f("SizeOfUninitializedData"),
        u32f("AddressOfEntryPoint"),
        u32f("BaseOfCode"),
        u64f("ImageBase"),
        u32f("SectionAlignment"),
        u32f("FileAlignment"),
        u16f("MajorOperatingSystemVersion"),
        u16f("MinorOperatingSystemVersion"),
        u16f("MajorImageVersion"),
        u16f("MinorImageVersion"),
        u16f("MajorSubsystemVersion"),
        u16f("MinorSubsystemVersion"),
        u32f("Win32VersionValue"),
        u32f("SizeOfImage"),
        u32f("SizeOfHeaders"),
        u32f("CheckSum"),
        u16f("Subsystem"),
        u16f("DllCharacteristics"),
        u64f("SizeOfStackReserve"),
        u64f("SizeOfStackCommit"),
        u64f("SizeOfHeapReserve"),
        u64f("SizeOfHeapCommit"),
        u32f("LoaderFlags"),
        u32f("NumberOfRvaAndSizes"),
        F::nested("DataDirectory", K::ImageDataDirectory).array(16),
    ],
);

pub static IMAGE_NT_HEADERS32: S = S::structure(
    "IMAGE_NT_HEADERS32",
    &[
        u32f("Signature"),
        F::nested("FileHeader", K::ImageFileHeader),
        F::nested("OptionalHeader", K::ImageOptionalHeader32),
    ],
);

pub static IMAGE_NT_HEADERS64: S = S::structure(
    "IMAGE_NT_HEADERS64",
    &[
        u32f("Signature"),
        F::nested("FileHeader", K::ImageFileHeader),
        F::nested("OptionalHeader", K::ImageOptionalHeader64),
    ],
);

pub static SECTION_MISC: S = S::union(
    "IMAGE_SECTION_HEADER_MISC",
    &[u32f("PhysicalAddress"), u32f("VirtualSize")],
);

pub static IMAGE_SECTION_HEADER: S = S::structure(
    "IMAGE_SECTION_HEADER",
    &[
        u8f("Name").array(8),
        F::embed(K::SectionMisc),
        u32f("VirtualAddress"),
        u32f("SizeOfRawData"),
        u32f("PointerToRawData"),
        u32f("PointerToRelocations"),
        u32f("PointerToLinenumbers"),
        u16f("NumberOfRelocations"),
        u16f("NumberOfLinenumbers"),
        u32f("Characteristics"),
    ],
);

pub static IMAGE_RESOURCE_DIRECTORY: S = S::structure(
    "IMAGE_RESOURCE_DIRECTORY",
    &[
        u32f("Characteristics"),
        u32f("TimeDateStamp"),
        u16f("MajorVersion"),
        u16f("MinorVersion"),
        u16f("NumberOfNamedEntries"),
        u16f("NumberOfIdEntries"),
    ],
);

pub static RESOURCE_NAME_BITS: S = S::structure(
    "RESOURCE_NAME_BITS",
    &[u32f("NameOffset").bits(31), u32f("NameIsString").bits(1)],
);

pub static RESOURCE_ENTRY_NAME: S = S::union(
    "RESOURCE_ENTRY_NAME",
    &[F::embed(K::ResourceNameBits), u32f("Name"), u16f("Id")],
);

pub static RESOURCE_TARGET_BITS: S = S::structure(
    "RESOURCE_TARGET_BITS",
    &[
        u32f("OffsetToDirectory").bits(31),
        u32f("DataIsDirectory").bits(1),
    ],
);

pub static RESOURCE_ENTRY_TARGET: S = S::union(
    "RESOURCE_ENTRY_TARGET",
    &[u32f("OffsetToData"), F::embed(K::ResourceTargetBits)],
);

pub static IMAGE_RESOURCE_DIRECTORY_ENTRY: S = S::structure(
    "IMAGE_RESOURCE_DIRECTORY_ENTRY",
    &[
        F::embed(K::ResourceEntryName),
        F::embed(K::ResourceEntryTarget),
    ],
);

pub static IMAGE_RESOURCE_DATA_ENTRY: S = S::structure(
    "IMAGE_RESOURCE_DATA_ENTRY",
    &[
        u32f("OffsetToData"),
        u32f("Size"),
        u32f("CodePage"),
        u32f("Reserved"),
    ],
);

pub static IMPORT_DESCRIPTOR_HEAD: S = S::union(
    "IMPORT_DESCRIPTOR_HEAD",
    &[u32f("Characteristics"), u32f("OriginalFirstThunk")],
);

pub static IMAGE_IMPORT_DESCRIPTOR: S = S::structure(
    "IMAGE_IMPORT_DESCRIPTOR",
    &[
        F::embed(K::ImportDescriptorHead),
        u32f("TimeDateStamp"),
        u32f("ForwarderChain"),
        u32f("Name"),
        u32f("FirstThunk"),
    ],
);

pub static DELAYLOAD_ATTRIBUTE_BITS: S = S::structure(
    "DELAYLOAD_ATTRIBUTE_BITS",
    &[u32f("RvaBased").bits(1), u32f("ReservedAttributes").bits(31)],
);

pub static DELAYLOAD_ATTRIBUTES: S = S::union(
    "DELAYLOAD_ATTRIBUTES",
    &[u32f("AllAttributes"), F::embed(K::DelayloadAttributeBits)],
);

pub static IMAGE_DELAYLOAD_DESCRIPTOR: S = S::structure(
    "IMAGE_DELAYLOAD_DESCRIPTOR",
    &[
        F::embed(K::DelayloadAttributes),
        u32f("DllNameRVA"),
        u32f("ModuleHandleRVA"),
        u32f("ImportAddressTableRVA"),
        u32f("ImportNameTableRVA"),
        u32f("BoundImportAddressTableRVA"),
        u32f("UnloadInformationTableRVA"),
        u32f("TimeDateStamp"),
    ],
);

pub static IMAGE_EXPORT_DIRECTORY: S = S::structure(
    "IMAGE_EXPORT_DIRECTORY",
    &[
        u32f("Characteristics"),
        u32f("TimeDateStamp"),
        u16f("MajorVersion"),
        u16f("MinorVersion"),
        u32f("Name"),
        u32f("Base"),
        u32f("NumberOfFunctions"),
        u32f("NumberOfNames"),
        u32f("AddressOfFunctions"),
        u32f("AddressOfNames"),
        u32f("AddressOfNameOrdinals"),
    ],
);

pub static IMAGE_DEBUG_DIRECTORY: S = S::structure(
    "IMAGE_DEBUG_DIRECTORY",
    &[
        u32f("Characteristics"),
        u32f("TimeDateStamp"),
        u16f("MajorVersion"),
        u16f("MinorVersion"),
        u32f("Type"),
        u32f("SizeOfData"),
        u32f("AddressOfRawData"),
        u32f("PointerToRawData"),
    ],
);

pub static GUID: S = S::structure(
    "GUID",
    &[
        u32f("Data1"),
        u16f("Data2"),
        u16f("Data3"),
        u8f("Data4").array(8),
    ],
);

// PdbFileName follows as a NUL-terminated string
pub static CV_INFO_PDB70: S = S::structure(
    "CV_INFO_PDB70",
    &[
        u32f("CvSignature"),
        F::nested("Signature", K::Guid),
        u32f("Age"),
    ],
);

pub static VS_FIXEDFILEINFO: S = S::structure(
    "VS_FIXEDFILEINFO",
    &[
        u32f("dwSignature"),
        u32f("dwStrucVersion"),
        u32f("dwFileVersionMS"),
        u32f("dwFileVersionLS"),
        u32f("dwProductVersionMS"),
        u32f("dwProductVersionLS"),
        u32f("dwFileFlagsMask"),
        u32f("dwFileFlags"),
        u32f("dwFileOS"),
        u32f("dwFileType"),
        u32f("dwFileSubtype"),
        u32f("dwFileDateMS"),
        u32f("dwFileDateLS"),
    ],
);

pub static VERSION_BLOCK_HEADER: S = S::structure(
    "VERSION_BLOCK_HEADER",
    &[u16f("wLength"), u16f("wValueLength"), u16f("wType")],
);
