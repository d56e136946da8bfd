//! Mach-O constants and enumerations

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub const MH_MAGIC: u32 = 0xfeed_face;
pub const MH_MAGIC_64: u32 = 0xfeed_facf;

/// Set on commands dyld must understand to load the image
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_DYSYMTAB: u32 = 0xb;
pub const LC_LOAD_DYLIB: u32 = 0xc;
pub const LC_ID_DYLIB: u32 = 0xd;
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_UUID: u32 = 0x1b;
pub const LC_REEXPORT_DYLIB: u32 = 0x1f | LC_REQ_DYLD;
pub const LC_LAZY_LOAD_DYLIB: u32 = 0x20;
pub const LC_DYLD_INFO: u32 = 0x22;
pub const LC_DYLD_INFO_ONLY: u32 = 0x22 | LC_REQ_DYLD;
pub const LC_LOAD_UPWARD_DYLIB: u32 = 0x23 | LC_REQ_DYLD;
pub const LC_MAIN: u32 = 0x28 | LC_REQ_DYLD;
pub const LC_BUILD_VERSION: u32 = 0x32;

/// CPU type from the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuType {
    X86,
    X86_64,
    Arm,
    Arm64,
    Arm64_32,
    PowerPC,
    PowerPC64,
    Other(i32),
}

impl From<i32> for CpuType {
    fn from(val: i32) -> Self {
        const ABI64: i32 = 0x0100_0000;
        const ABI64_32: i32 = 0x0200_0000;
        match val {
            7 => Self::X86,
            v if v == 7 | ABI64 => Self::X86_64,
            12 => Self::Arm,
            v if v == 12 | ABI64 => Self::Arm64,
            v if v == 12 | ABI64_32 => Self::Arm64_32,
            18 => Self::PowerPC,
            v if v == 18 | ABI64 => Self::PowerPC64,
            other => Self::Other(other),
        }
    }
}

/// Header `filetype`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Object,
    Execute,
    Dylib,
    Dylinker,
    Bundle,
    Dsym,
    KextBundle,
    Other(u32),
}

impl From<u32> for FileType {
    fn from(val: u32) -> Self {
        match val {
            0x1 => Self::Object,
            0x2 => Self::Execute,
            0x6 => Self::Dylib,
            0x7 => Self::Dylinker,
            0x8 => Self::Bundle,
            0xa => Self::Dsym,
            0xb => Self::KextBundle,
            other => Self::Other(other),
        }
    }
}

bitflags! {
    /// Header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u32 {
        const NOUNDEFS = 0x1;
        const DYLDLINK = 0x4;
        const TWOLEVEL = 0x80;
        const PIE = 0x20_0000;
        const HAS_TLV_DESCRIPTORS = 0x80_0000;
        const _ = !0;
    }
}

bitflags! {
    /// Segment memory protection
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VmProt: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const EXECUTE = 0x4;
        const _ = !0;
    }
}

/// Target platform of `LC_BUILD_VERSION`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    MacOS,
    IOS,
    TvOS,
    WatchOS,
    BridgeOS,
    MacCatalyst,
    IOSSimulator,
    TvOSSimulator,
    WatchOSSimulator,
    DriverKit,
    VisionOS,
    VisionOSSimulator,
    Unknown(u32),
}

impl From<u32> for Platform {
    fn from(val: u32) -> Self {
        match val {
            1 => Self::MacOS,
            2 => Self::IOS,
            3 => Self::TvOS,
            4 => Self::WatchOS,
            5 => Self::BridgeOS,
            6 => Self::MacCatalyst,
            7 => Self::IOSSimulator,
            8 => Self::TvOSSimulator,
            9 => Self::WatchOSSimulator,
            10 => Self::DriverKit,
            11 => Self::VisionOS,
            12 => Self::VisionOSSimulator,
            other => Self::Unknown(other),
        }
    }
}

/// How a dylib command references its library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DylibKind {
    Load,
    Weak,
    /// The image's own install name
    Id,
    Reexport,
    Lazy,
    Upward,
}

impl DylibKind {
    pub fn from_cmd(cmd: u32) -> Option<Self> {
        match cmd {
            LC_LOAD_DYLIB => Some(Self::Load),
            LC_LOAD_WEAK_DYLIB => Some(Self::Weak),
            LC_ID_DYLIB => Some(Self::Id),
            LC_REEXPORT_DYLIB => Some(Self::Reexport),
            LC_LAZY_LOAD_DYLIB => Some(Self::Lazy),
            LC_LOAD_UPWARD_DYLIB => Some(Self::Upward),
            _ => None,
        }
    }
}

/// Render a packed `xxxx.yy.zz` version.
pub fn format_version(packed: u32) -> String {
    let major = packed >> 16;
    let minor = (packed >> 8) & 0xff;
    let patch = packed & 0xff;
    format!("{major}.{minor}.{patch}")
}
