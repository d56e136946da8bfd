//! ELF structure descriptors, named as in `<elf.h>` and `<link.h>`.

use crate::reflect::descriptor::{i32f, i64f, u16f, u32f, u64f, u8f, FieldDescriptor as F};
use crate::reflect::{StructKind as K, StructureDescriptor as S};

pub static ELF_IDENT: S = S::structure(
    "Elf_Ident",
    &[
        u8f("ei_magic").array(4),
        u8f("ei_class"),
        u8f("ei_data"),
        u8f("ei_version"),
        u8f("ei_osabi"),
        u8f("ei_abiversion"),
        u8f("ei_pad").array(7),
    ],
);

pub static ELF32_EHDR: S = S::structure(
    "Elf32_Ehdr",
    &[
        F::nested("e_ident", K::ElfIdent),
        u16f("e_type"),
        u16f("e_machine"),
        u32f("e_version"),
        u32f("e_entry"),
        u32f("e_phoff"),
        u32f("e_shoff"),
        u32f("e_flags"),
        u16f("e_ehsize"),
        u16f("e_phentsize"),
        u16f("e_phnum"),
        u16f("e_shentsize"),
        u16f("e_shnum"),
        u16f("e_shstrndx"),
    ],
);

pub static ELF64_EHDR: S = S::structure(
    "Elf64_Ehdr",
    &[
        F::nested("e_ident", K::ElfIdent),
        u16f("e_type"),
        u16f("e_machine"),
        u32f("e_version"),
        u64f("e_entry"),
        u64f("e_phoff"),
        u64f("e_shoff"),
        u32f("e_flags"),
        u16f("e_ehsize"),
        u16f("e_phentsize"),
        u16f("e_phnum"),
        u16f("e_shentsize"),
        u16f("e_shnum"),
        u16f("e_shstrndx"),
    ],
);

pub static ELF32_PHDR: S = S::structure(
    "Elf32_Phdr",
    &[
        u32f("p_type"),
        u32f("p_offset"),
        u32f("p_vaddr"),
        u32f("p_paddr"),
        u32f("p_filesz"),
        u32f("p_memsz"),
        u32f("p_flags"),
        u32f("p_align"),
    ],
);

pub static ELF64_PHDR: S = S::structure(
    "Elf64_Phdr",
    &[
        u32f("p_type"),
        u32f("p_flags"),
        u64f("p_offset"),
        u64f("p_vaddr"),
        u64f("p_paddr"),
        u64f("p_filesz"),
        u64f("p_memsz"),
        u64f("p_align"),
    ],
);

pub static ELF_NOTE_HEADER: S = S::structure(
    "Elf_Nhdr",
    &[u32f("n_namesz"), u32f("n_descsz"), u32f("n_type")],
);

pub static ELF32_DYN_VALUE: S = S::union("Elf32_Dyn_d_un", &[u32f("d_val"), u32f("d_ptr")]);

pub static ELF32_DYN: S = S::structure(
    "Elf32_Dyn",
    &[i32f("d_tag"), F::embed(K::Elf32DynValue)],
);

pub static ELF64_DYN_VALUE: S = S::union("Elf64_Dyn_d_un", &[u64f("d_val"), u64f("d_ptr")]);

pub static ELF64_DYN: S = S::structure(
    "Elf64_Dyn",
    &[i64f("d_tag"), F::embed(K::Elf64DynValue)],
);

pub static R_DEBUG32: S = S::structure(
    "r_debug32",
    &[
        i32f("r_version"),
        u32f("r_map"),
        u32f("r_brk"),
        i32f("r_state"),
        u32f("r_ldbase"),
    ],
);

pub static R_DEBUG64: S = S::structure(
    "r_debug64",
    &[
        i32f("r_version"),
        u32f("_pad0"),
        u64f("r_map"),
        u64f("r_brk"),
        i32f("r_state"),
        u32f("_pad1"),
        u64f("r_ldbase"),
    ],
);

pub static LINK_MAP32: S = S::structure(
    "link_map32",
    &[
        u32f("l_addr"),
        u32f("l_name"),
        u32f("l_ld"),
        u32f("l_next"),
        u32f("l_prev"),
    ],
);

pub static LINK_MAP64: S = S::structure(
    "link_map64",
    &[
        u64f("l_addr"),
        u64f("l_name"),
        u64f("l_ld"),
        u64f("l_next"),
        u64f("l_prev"),
    ],
);
