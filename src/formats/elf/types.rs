//! Core ELF types and constants

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// ELF magic number
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

pub const ELFCLASS32: u8 = 1;
pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2LSB: u8 = 1;
pub const ELFDATA2MSB: u8 = 2;

/// Note types
pub const NT_GNU_BUILD_ID: u32 = 3;
pub const NT_FDO_PACKAGING_METADATA: u32 = 0xcafe_1a7e;

/// ELF class (32-bit or 64-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElfClass {
    Elf32 = 1,
    Elf64 = 2,
}

impl ElfClass {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            ELFCLASS32 => Some(ElfClass::Elf32),
            ELFCLASS64 => Some(ElfClass::Elf64),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 64,
        }
    }

    pub fn is_64(&self) -> bool {
        matches!(self, ElfClass::Elf64)
    }
}

/// ELF file type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElfType {
    None,
    Relocatable,
    Executable,
    SharedObject,
    Core,
    Other(u16),
}

impl From<u16> for ElfType {
    fn from(val: u16) -> Self {
        match val {
            0 => ElfType::None,
            1 => ElfType::Relocatable,
            2 => ElfType::Executable,
            3 => ElfType::SharedObject,
            4 => ElfType::Core,
            other => ElfType::Other(other),
        }
    }
}

/// ELF machine architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElfMachine {
    None,
    Sparc,
    X86,
    Mips,
    PowerPC,
    PowerPC64,
    S390,
    ARM,
    X86_64,
    AArch64,
    RiscV,
    Other(u16),
}

impl From<u16> for ElfMachine {
    fn from(val: u16) -> Self {
        match val {
            0 => ElfMachine::None,
            2 => ElfMachine::Sparc,
            3 => ElfMachine::X86,
            8 => ElfMachine::Mips,
            20 => ElfMachine::PowerPC,
            21 => ElfMachine::PowerPC64,
            22 => ElfMachine::S390,
            40 => ElfMachine::ARM,
            62 => ElfMachine::X86_64,
            183 => ElfMachine::AArch64,
            243 => ElfMachine::RiscV,
            other => ElfMachine::Other(other),
        }
    }
}

/// Program header type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentType {
    Null,
    Load,
    Dynamic,
    Interp,
    Note,
    Shlib,
    Phdr,
    Tls,
    GnuEhFrame,
    GnuStack,
    GnuRelro,
    GnuProperty,
    Other(u32),
}

impl From<u32> for SegmentType {
    fn from(val: u32) -> Self {
        match val {
            0 => Self::Null,
            1 => Self::Load,
            2 => Self::Dynamic,
            3 => Self::Interp,
            4 => Self::Note,
            5 => Self::Shlib,
            6 => Self::Phdr,
            7 => Self::Tls,
            0x6474_e550 => Self::GnuEhFrame,
            0x6474_e551 => Self::GnuStack,
            0x6474_e552 => Self::GnuRelro,
            0x6474_e553 => Self::GnuProperty,
            other => Self::Other(other),
        }
    }
}

bitflags! {
    /// Segment permissions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SegmentFlags: u32 {
        const X = 0x1;
        const W = 0x2;
        const R = 0x4;
        const _ = !0;
    }
}

/// Dynamic section tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicTag {
    Null,
    Needed,
    PltRelSz,
    PltGot,
    Hash,
    StrTab,
    SymTab,
    Rela,
    RelaSz,
    RelaEnt,
    StrSz,
    SymEnt,
    Init,
    Fini,
    SoName,
    RPath,
    Symbolic,
    Rel,
    RelSz,
    RelEnt,
    PltRel,
    Debug,
    TextRel,
    JmpRel,
    BindNow,
    InitArray,
    FiniArray,
    InitArraySz,
    FiniArraySz,
    RunPath,
    Flags,
    GnuHash,
    VerSym,
    RelaCount,
    RelCount,
    Flags1,
    VerDef,
    VerDefNum,
    VerNeed,
    VerNeedNum,
    Unknown(i64),
}

impl From<i64> for DynamicTag {
    fn from(val: i64) -> Self {
        match val {
            0 => Self::Null,
            1 => Self::Needed,
            2 => Self::PltRelSz,
            3 => Self::PltGot,
            4 => Self::Hash,
            5 => Self::StrTab,
            6 => Self::SymTab,
            7 => Self::Rela,
            8 => Self::RelaSz,
            9 => Self::RelaEnt,
            10 => Self::StrSz,
            11 => Self::SymEnt,
            12 => Self::Init,
            13 => Self::Fini,
            14 => Self::SoName,
            15 => Self::RPath,
            16 => Self::Symbolic,
            17 => Self::Rel,
            18 => Self::RelSz,
            19 => Self::RelEnt,
            20 => Self::PltRel,
            21 => Self::Debug,
            22 => Self::TextRel,
            23 => Self::JmpRel,
            24 => Self::BindNow,
            25 => Self::InitArray,
            26 => Self::FiniArray,
            27 => Self::InitArraySz,
            28 => Self::FiniArraySz,
            29 => Self::RunPath,
            30 => Self::Flags,
            0x6fff_fef5 => Self::GnuHash,
            0x6fff_fff0 => Self::VerSym,
            0x6fff_fff9 => Self::RelaCount,
            0x6fff_fffa => Self::RelCount,
            0x6fff_fffb => Self::Flags1,
            0x6fff_fffc => Self::VerDef,
            0x6fff_fffd => Self::VerDefNum,
            0x6fff_fffe => Self::VerNeed,
            0x6fff_ffff => Self::VerNeedNum,
            other => Self::Unknown(other),
        }
    }
}

impl DynamicTag {
    /// Tags whose value is a string table offset
    pub fn is_string(self) -> bool {
        matches!(self, Self::Needed | Self::SoName | Self::RPath | Self::RunPath)
    }
}
