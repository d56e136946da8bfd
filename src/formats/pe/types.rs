//! Core PE data types and constants

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// PE constants
pub const DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const PE_SIGNATURE: u32 = 0x0000_4550; // PE\0\0
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;
pub const NUMBER_OF_DIRECTORIES: usize = 16;

pub const IMAGE_ORDINAL_FLAG32: u64 = 0x8000_0000;
pub const IMAGE_ORDINAL_FLAG64: u64 = 0x8000_0000_0000_0000;

pub const IMAGE_DEBUG_TYPE_CODEVIEW: u32 = 2;
pub const CODEVIEW_RSDS: u32 = 0x5344_5352; // "RSDS"
pub const VS_FFI_SIGNATURE: u32 = 0xFEEF_04BD;

/// Index into the optional header's data directory array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectoryId {
    Export = 0,
    Import = 1,
    Resource = 2,
    Exception = 3,
    Security = 4,
    BaseReloc = 5,
    Debug = 6,
    Architecture = 7,
    GlobalPtr = 8,
    Tls = 9,
    LoadConfig = 10,
    BoundImport = 11,
    Iat = 12,
    DelayImport = 13,
    ComDescriptor = 14,
    Reserved = 15,
}

impl DirectoryId {
    pub const ALL: [DirectoryId; NUMBER_OF_DIRECTORIES] = [
        Self::Export,
        Self::Import,
        Self::Resource,
        Self::Exception,
        Self::Security,
        Self::BaseReloc,
        Self::Debug,
        Self::Architecture,
        Self::GlobalPtr,
        Self::Tls,
        Self::LoadConfig,
        Self::BoundImport,
        Self::Iat,
        Self::DelayImport,
        Self::ComDescriptor,
        Self::Reserved,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One data directory slot. A zero virtual address means absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0
    }

    pub fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address && rva - self.virtual_address < self.size
    }
}

/// Machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Machine {
    Unknown,
    I386,   // 0x014c
    X86_64, // 0x8664
    Arm,    // 0x01c0
    Arm64,  // 0xaa64
    ArmNT,  // 0x01c4
    IA64,   // 0x0200
    EBC,    // 0x0ebc
    Other(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x014c => Self::I386,
            0x8664 => Self::X86_64,
            0x01c0 => Self::Arm,
            0xaa64 => Self::Arm64,
            0x01c4 => Self::ArmNT,
            0x0200 => Self::IA64,
            0x0ebc => Self::EBC,
            0 => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

/// Subsystem types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subsystem {
    Unknown,
    Native,                 // 1
    WindowsGui,             // 2
    WindowsCui,             // 3
    Os2Cui,                 // 5
    PosixCui,               // 7
    WindowsCeGui,           // 9
    EfiApplication,         // 10
    EfiBootServiceDriver,   // 11
    EfiRuntimeDriver,       // 12
    EfiRom,                 // 13
    Xbox,                   // 14
    WindowsBootApplication, // 16
    Other(u16),
}

impl From<u16> for Subsystem {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Native,
            2 => Self::WindowsGui,
            3 => Self::WindowsCui,
            5 => Self::Os2Cui,
            7 => Self::PosixCui,
            9 => Self::WindowsCeGui,
            10 => Self::EfiApplication,
            11 => Self::EfiBootServiceDriver,
            12 => Self::EfiRuntimeDriver,
            13 => Self::EfiRom,
            14 => Self::Xbox,
            16 => Self::WindowsBootApplication,
            other => Self::Other(other),
        }
    }
}

bitflags! {
    /// Section characteristics
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u32 {
        const CNT_CODE = 0x0000_0020;
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        const LNK_INFO = 0x0000_0200;
        const LNK_REMOVE = 0x0000_0800;
        const LNK_COMDAT = 0x0000_1000;
        const GPREL = 0x0000_8000;
        const LNK_NRELOC_OVFL = 0x0100_0000;
        const MEM_DISCARDABLE = 0x0200_0000;
        const MEM_NOT_CACHED = 0x0400_0000;
        const MEM_NOT_PAGED = 0x0800_0000;
        const MEM_SHARED = 0x1000_0000;
        const MEM_EXECUTE = 0x2000_0000;
        const MEM_READ = 0x4000_0000;
        const MEM_WRITE = 0x8000_0000;
        // Alignment and other multi-bit encodings
        const _ = !0;
    }
}

/// Debug directory entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugType {
    Coff,
    CodeView,
    Fpo,
    Misc,
    Exception,
    Fixup,
    OmapToSrc,
    OmapFromSrc,
    Borland,
    Clsid,
    VcFeature,
    Pogo,
    Iltcg,
    Mpx,
    Repro,
    ExDllCharacteristics,
    Unknown(u32),
}

impl From<u32> for DebugType {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Coff,
            2 => Self::CodeView,
            3 => Self::Fpo,
            4 => Self::Misc,
            5 => Self::Exception,
            6 => Self::Fixup,
            7 => Self::OmapToSrc,
            8 => Self::OmapFromSrc,
            9 => Self::Borland,
            11 => Self::Clsid,
            12 => Self::VcFeature,
            13 => Self::Pogo,
            14 => Self::Iltcg,
            15 => Self::Mpx,
            16 => Self::Repro,
            20 => Self::ExDllCharacteristics,
            other => Self::Unknown(other),
        }
    }
}

/// Top-level resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Cursor,
    Bitmap,
    Icon,
    Menu,
    Dialog,
    String,
    FontDir,
    Font,
    Accelerator,
    RcData,
    MessageTable,
    GroupCursor,
    GroupIcon,
    Version,
    DlgInclude,
    PlugPlay,
    Vxd,
    AniCursor,
    AniIcon,
    Html,
    Manifest,
    /// A string-named type such as `"XML"`
    Named(String),
    Unknown(u16),
}

impl ResourceType {
    pub const VERSION_ID: u16 = 16;
    pub const MANIFEST_ID: u16 = 24;

    pub fn from_id(id: u16) -> Self {
        match id {
            1 => Self::Cursor,
            2 => Self::Bitmap,
            3 => Self::Icon,
            4 => Self::Menu,
            5 => Self::Dialog,
            6 => Self::String,
            7 => Self::FontDir,
            8 => Self::Font,
            9 => Self::Accelerator,
            10 => Self::RcData,
            11 => Self::MessageTable,
            12 => Self::GroupCursor,
            14 => Self::GroupIcon,
            16 => Self::Version,
            17 => Self::DlgInclude,
            19 => Self::PlugPlay,
            20 => Self::Vxd,
            21 => Self::AniCursor,
            22 => Self::AniIcon,
            23 => Self::Html,
            24 => Self::Manifest,
            other => Self::Unknown(other),
        }
    }

    /// Types whose payload is text rather than a binary structure.
    pub fn is_text(&self) -> bool {
        match self {
            Self::Html | Self::Manifest => true,
            Self::Named(name) => matches!(
                name.to_ascii_uppercase().as_str(),
                "XML" | "HTML" | "TEXT" | "TXT" | "JSON" | "MANIFEST" | "XSD" | "XSL" | "CSS" | "JS"
            ),
            _ => false,
        }
    }
}
