//! The closed set of structure shapes known to the engine.
//!
//! Each kind maps to exactly one static [`StructureDescriptor`]; the registry
//! memoizes layouts by kind index.

use super::descriptor::StructureDescriptor;
use crate::formats::elf::layout as elf;
use crate::formats::macho::layout as macho;
use crate::formats::pe::layout as pe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    // PE
    ImageDosHeader,
    ImageFileHeader,
    ImageDataDirectory,
    ImageOptionalHeader32,
    ImageOptionalHeader64,
    ImageNtHeaders32,
    ImageNtHeaders64,
    SectionMisc,
    ImageSectionHeader,
    ImageResourceDirectory,
    ResourceNameBits,
    ResourceEntryName,
    ResourceTargetBits,
    ResourceEntryTarget,
    ImageResourceDirectoryEntry,
    ImageResourceDataEntry,
    ImportDescriptorHead,
    ImageImportDescriptor,
    DelayloadAttributeBits,
    DelayloadAttributes,
    ImageDelayloadDescriptor,
    ImageExportDirectory,
    ImageDebugDirectory,
    Guid,
    CvInfoPdb70,
    VsFixedFileInfo,
    VersionBlockHeader,
    // ELF
    ElfIdent,
    Elf32Ehdr,
    Elf64Ehdr,
    Elf32Phdr,
    Elf64Phdr,
    ElfNoteHeader,
    Elf32DynValue,
    Elf32Dyn,
    Elf64DynValue,
    Elf64Dyn,
    RDebug32,
    RDebug64,
    LinkMap32,
    LinkMap64,
    // Mach-O
    MachHeader,
    MachHeader64,
    LoadCommand,
    SegmentCommand,
    SegmentCommand64,
    Section,
    Section64,
    UuidCommand,
    BuildVersionCommand,
    BuildToolVersion,
    Dylib,
    DylibCommand,
    DyldInfoCommand,
    SymtabCommand,
    DysymtabCommand,
    EntryPointCommand,
}

impl StructKind {
    /// Every kind, in discriminant order.
    pub const ALL: &'static [StructKind] = &[
        StructKind::ImageDosHeader,
        StructKind::ImageFileHeader,
        StructKind::ImageDataDirectory,
        StructKind::ImageOptionalHeader32,
        StructKind::ImageOptionalHeader64,
        StructKind::ImageNtHeaders32,
        StructKind::ImageNtHeaders64,
        StructKind::SectionMisc,
        StructKind::ImageSectionHeader,
        StructKind::ImageResourceDirectory,
        StructKind::ResourceNameBits,
        StructKind::ResourceEntryName,
        StructKind::ResourceTargetBits,
        StructKind::ResourceEntryTarget,
        StructKind::ImageResourceDirectoryEntry,
        StructKind::ImageResourceDataEntry,
        StructKind::ImportDescriptorHead,
        StructKind::ImageImportDescriptor,
        StructKind::DelayloadAttributeBits,
        StructKind::DelayloadAttributes,
        StructKind::ImageDelayloadDescriptor,
        StructKind::ImageExportDirectory,
        StructKind::ImageDebugDirectory,
        StructKind::Guid,
        StructKind::CvInfoPdb70,
        StructKind::VsFixedFileInfo,
        StructKind::VersionBlockHeader,
        StructKind::ElfIdent,
        StructKind::Elf32Ehdr,
        StructKind::Elf64Ehdr,
        StructKind::Elf32Phdr,
        StructKind::Elf64Phdr,
        StructKind::ElfNoteHeader,
        StructKind::Elf32DynValue,
        StructKind::Elf32Dyn,
        StructKind::Elf64DynValue,
        StructKind::Elf64Dyn,
        StructKind::RDebug32,
        StructKind::RDebug64,
        StructKind::LinkMap32,
        StructKind::LinkMap64,
        StructKind::MachHeader,
        StructKind::MachHeader64,
        StructKind::LoadCommand,
        StructKind::SegmentCommand,
        StructKind::SegmentCommand64,
        StructKind::Section,
        StructKind::Section64,
        StructKind::UuidCommand,
        StructKind::BuildVersionCommand,
        StructKind::BuildToolVersion,
        StructKind::Dylib,
        StructKind::DylibCommand,
        StructKind::DyldInfoCommand,
        StructKind::SymtabCommand,
        StructKind::DysymtabCommand,
        StructKind::EntryPointCommand,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn descriptor(self) -> &'static StructureDescriptor {
        match self {
            StructKind::ImageDosHeader => &pe::IMAGE_DOS_HEADER,
            StructKind::ImageFileHeader => &pe::IMAGE_FILE_HEADER,
            StructKind::ImageDataDirectory => &pe::IMAGE_DATA_DIRECTORY,
            StructKind::ImageOptionalHeader32 => &pe::IMAGE_OPTIONAL_HEADER32,
            StructKind::ImageOptionalHeader64 => &pe::IMAGE_OPTIONAL_HEADER64,
            StructKind::ImageNtHeaders32 => &pe::IMAGE_NT_HEADERS32,
            StructKind::ImageNtHeaders64 => &pe::IMAGE_NT_HEADERS64,
            StructKind::SectionMisc => &pe::SECTION_MISC,
            StructKind::ImageSectionHeader => &pe::IMAGE_SECTION_HEADER,
            StructKind::ImageResourceDirectory => &pe::IMAGE_RESOURCE_DIRECTORY,
            StructKind::ResourceNameBits => &pe::RESOURCE_NAME_BITS,
            StructKind::ResourceEntryName => &pe::RESOURCE_ENTRY_NAME,
            StructKind::ResourceTargetBits => &pe::RESOURCE_TARGET_BITS,
            StructKind::ResourceEntryTarget => &pe::RESOURCE_ENTRY_TARGET,
            StructKind::ImageResourceDirectoryEntry => &pe::IMAGE_RESOURCE_DIRECTORY_ENTRY,
            StructKind::ImageResourceDataEntry => &pe::IMAGE_RESOURCE_DATA_ENTRY,
            StructKind::ImportDescriptorHead => &pe::IMPORT_DESCRIPTOR_HEAD,
            StructKind::ImageImportDescriptor => &pe::IMAGE_IMPORT_DESCRIPTOR,
            StructKind::DelayloadAttributeBits => &pe::DELAYLOAD_ATTRIBUTE_BITS,
            StructKind::DelayloadAttributes => &pe::DELAYLOAD_ATTRIBUTES,
            StructKind::ImageDelayloadDescriptor => &pe::IMAGE_DELAYLOAD_DESCRIPTOR,
            StructKind::ImageExportDirectory => &pe::IMAGE_EXPORT_DIRECTORY,
            StructKind::ImageDebugDirectory => &pe::IMAGE_DEBUG_DIRECTORY,
            StructKind::Guid => &pe::GUID,
            StructKind::CvInfoPdb70 => &pe::CV_INFO_PDB70,
            StructKind::VsFixedFileInfo => &pe::VS_FIXEDFILEINFO,
            StructKind::VersionBlockHeader => &pe::VERSION_BLOCK_HEADER,
            StructKind::ElfIdent => &elf::ELF_IDENT,
            StructKind::Elf32Ehdr => &elf::ELF32_EHDR,
            StructKind::Elf64Ehdr => &elf::ELF64_EHDR,
            StructKind::Elf32Phdr => &elf::ELF32_PHDR,
            StructKind::Elf64Phdr => &elf::ELF64_PHDR,
            StructKind::ElfNoteHeader => &elf::ELF_NOTE_HEADER,
            StructKind::Elf32DynValue => &elf::ELF32_DYN_VALUE,
            StructKind::Elf32Dyn => &elf::ELF32_DYN,
            StructKind::Elf64DynValue => &elf::ELF64_DYN_VALUE,
            StructKind::Elf64Dyn => &elf::ELF64_DYN,
            StructKind::RDebug32 => &elf::R_DEBUG32,
            StructKind::RDebug64 => &elf::R_DEBUG64,
            StructKind::LinkMap32 => &elf::LINK_MAP32,
            StructKind::LinkMap64 => &elf::LINK_MAP64,
            StructKind::MachHeader => &macho::MACH_HEADER,
            StructKind::MachHeader64 => &macho::MACH_HEADER_64,
            StructKind::LoadCommand => &macho::LOAD_COMMAND,
            StructKind::SegmentCommand => &macho::SEGMENT_COMMAND,
            StructKind::SegmentCommand64 => &macho::SEGMENT_COMMAND_64,
            StructKind::Section => &macho::SECTION,
            StructKind::Section64 => &macho::SECTION_64,
            StructKind::UuidCommand => &macho::UUID_COMMAND,
            StructKind::BuildVersionCommand => &macho::BUILD_VERSION_COMMAND,
            StructKind::BuildToolVersion => &macho::BUILD_TOOL_VERSION,
            StructKind::Dylib => &macho::DYLIB,
            StructKind::DylibCommand => &macho::DYLIB_COMMAND,
            StructKind::DyldInfoCommand => &macho::DYLD_INFO_COMMAND,
            StructKind::SymtabCommand => &macho::SYMTAB_COMMAND,
            StructKind::DysymtabCommand => &macho::DYSYMTAB_COMMAND,
            StructKind::EntryPointCommand => &macho::ENTRY_POINT_COMMAND,
        }
    }
}
