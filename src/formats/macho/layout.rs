//! Mach-O structure descriptors, named as in `<mach-o/loader.h>`.
//!
//! Every command starts with an embedded `load_command`, so `cmd` and
//! `cmdsize` are readable on any command view.

use crate::reflect::descriptor::{i32f, u32f, u64f, u8f, FieldDescriptor as F};
use crate::reflect::{StructKind as K, StructureDescriptor as S};

pub static MACH_HEADER: S = S::structure(
    "mach_header",
    &[
        u32f("magic"),
        i32f("cputype"),
        i32f("cpusubtype"),
        u32f("filetype"),
        u32f("ncmds"),
        u32f("sizeofcmds"),
        u32f("flags"),
    ],
);

pub static MACH_HEADER_64: S = S::structure(
    "mach_header_64",
    &[
        u32f("magic"),
        i32f("cputype"),
        i32f("cpusubtype"),
        u32f("filetype"),
        u32f("ncmds"),
        u32f("sizeofcmds"),
        u32f("flags"),
        u32f("reserved"),
    ],
);

pub static LOAD_COMMAND: S = S::structure("load_command", &[u32f("cmd"), u32f("cmdsize")]);

pub static SEGMENT_COMMAND: S = S::structure(
    "segment_command",
    &[
        F::embed(K::LoadCommand),
        u8f("segname").array(16),
        u32f("vmaddr"),
        u32f("vmsize"),
        u32f("fileoff"),
        u32f("filesize"),
        i32f("maxprot"),
        i32f("initprot"),
        u32f("nsects"),
        u32f("flags"),
    ],
);

pub static SEGMENT_COMMAND_64: S = S::structure(
    "segment_command_64",
    &[
        F::embed(K::LoadCommand),
        u8f("segname").array(16),
        u64f("vmaddr"),
        u64f("vmsize"),
        u64f("fileoff"),
        u64f("filesize"),
        i32f("maxprot"),
        i32f("initprot"),
        u32f("nsects"),
        u32f("flags"),
    ],
);

pub static SECTION: S = S::structure(
    "section",
    &[
        u8f("sectname").array(16),
        u8f("segname").array(16),
        u32f("addr"),
        u32f("size"),
        u32f("offset"),
        u32f("align"),
        u32f("reloff"),
        u32f("nreloc"),
        u32f("flags"),
        u32f("reserved1"),
        u32f("reserved2"),
    ],
);

pub static SECTION_64: S = S::structure(
    "section_64",
    &[
        u8f("sectname").array(16),
        u8f("segname").array(16),
        u64f("addr"),
        u64f("size"),
        u32f("offset"),
        u32f("align"),
        u32f("reloff"),
        u32f("nreloc"),
        u32f("flags"),
        u32f("reserved1"),
        u32f("reserved2"),
        u32f("reserved3"),
    ],
);

pub static UUID_COMMAND: S = S::structure(
    "uuid_command",
    &[F::embed(K::LoadCommand), u8f("uuid").array(16)],
);

pub static BUILD_VERSION_COMMAND: S = S::structure(
    "build_version_command",
    &[
        F::embed(K::LoadCommand),
        u32f("platform"),
        u32f("minos"),
        u32f("sdk"),
        u32f("ntools"),
    ],
);

pub static BUILD_TOOL_VERSION: S =
    S::structure("build_tool_version", &[u32f("tool"), u32f("version")]);

pub static DYLIB: S = S::structure(
    "dylib",
    &[
        u32f("name"),
        u32f("timestamp"),
        u32f("current_version"),
        u32f("compatibility_version"),
    ],
);

pub static DYLIB_COMMAND: S = S::structure(
    "dylib_command",
    &[F::embed(K::LoadCommand), F::nested("dylib", K::Dylib)],
);

pub static DYLD_INFO_COMMAND: S = S::structure(
    "dyld_info_command",
    &[
        F::embed(K::LoadCommand),
        u32f("rebase_off"),
        u32f("rebase_size"),
        u32f("bind_off"),
        u32f("bind_size"),
        u32f("weak_bind_off"),
        u32f("weak_bind_size"),
        u32f("lazy_bind_off"),
        u32f("lazy_bind_size"),
        u32f("export_off"),
        u32f("export_size"),
    ],
);

pub static SYMTAB_COMMAND: S = S::structure(
    "symtab_command",
    &[
        F::embed(K::LoadCommand),
        u32f("symoff"),
        u32f("nsyms"),
        u32f("stroff"),
        u32f("strsize"),
    ],
);

pub static DYSYMTAB_COMMAND: S = S::structure(
    "dysymtab_command",
    &[
        F::embed(K::LoadCommand),
        u32f("ilocalsym"),
        u32f("nlocalsym"),
        u32f("iextdefsym"),
        u32f("nextdefsym"),
        u32f("iundefsym"),
        u32f("nundefsym"),
        u32f("tocoff"),
        u32f("ntoc"),
        u32f("modtaboff"),
        u32f("nmodtab"),
        u32f("extrefsymoff"),
        u32f("nextrefsyms"),
        u32f("indirectsymoff"),
        u32f("nindirectsyms"),
        u32f("extreloff"),
        u32f("nextrel"),
        u32f("locreloff"),
        u32f("nlocrel"),
    ],
);

pub static ENTRY_POINT_COMMAND: S = S::structure(
    "entry_point_command",
    &[
        F::embed(K::LoadCommand),
        u64f("entryoff"),
        u64f("stacksize"),
    ],
);
