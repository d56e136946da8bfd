//! Common test utilities and helpers.
//!
//! Builders that lay out small synthetic PE, ELF and Mach-O images in memory,
//! so the integration tests need no sample binaries.

#![allow(dead_code)]

pub mod test_utils;

/// Write `bytes` at `offset`, growing the buffer as needed.
pub fn put(buf: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
    if buf.len() < offset + bytes.len() {
        buf.resize(offset + bytes.len(), 0);
    }
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

pub fn put_u16(buf: &mut Vec<u8>, offset: usize, value: u16) {
    put(buf, offset, &value.to_le_bytes());
}

pub fn put_u32(buf: &mut Vec<u8>, offset: usize, value: u32) {
    put(buf, offset, &value.to_le_bytes());
}

pub fn put_u64(buf: &mut Vec<u8>, offset: usize, value: u64) {
    put(buf, offset, &value.to_le_bytes());
}

fn align(value: usize, to: usize) -> usize {
    value.div_ceil(to) * to
}

/// Bytes of one PE section, addressed by RVA while they are written.
#[derive(Debug, Clone)]
pub struct SectionWriter {
    pub rva: u32,
    pub data: Vec<u8>,
}

impl SectionWriter {
    pub fn new(rva: u32) -> Self {
        Self {
            rva,
            data: Vec::new(),
        }
    }

    /// RVA of the next byte written
    pub fn here(&self) -> u32 {
        self.rva + self.data.len() as u32
    }

    /// Append `bytes` at a 4-byte boundary and return their RVA.
    pub fn push(&mut self, bytes: &[u8]) -> u32 {
        self.data.resize(align(self.data.len(), 4), 0);
        let at = self.here();
        self.data.extend_from_slice(bytes);
        at
    }

    pub fn cstr(&mut self, s: &str) -> u32 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.push(&bytes)
    }

    /// `IMAGE_IMPORT_BY_NAME`
    pub fn hint_name(&mut self, hint: u16, name: &str) -> u32 {
        let mut bytes = hint.to_le_bytes().to_vec();
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0);
        self.push(&bytes)
    }

    pub fn words(&mut self, values: &[u64], is_64: bool) -> u32 {
        let mut bytes = Vec::new();
        for v in values {
            if is_64 {
                bytes.extend_from_slice(&v.to_le_bytes());
            } else {
                bytes.extend_from_slice(&(*v as u32).to_le_bytes());
            }
        }
        self.push(&bytes)
    }

    pub fn u32s(&mut self, values: &[u32]) -> u32 {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(&bytes)
    }

    pub fn u16s(&mut self, values: &[u16]) -> u32 {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(&bytes)
    }
}

pub const PE_HEADERS_SIZE: u32 = 0x200;
pub const IMAGE_SCN_CNT_CODE: u32 = 0x20;
pub const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
pub const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
pub const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;
pub const IMAGE_SCN_CNT_INITIALIZED_DATA: u32 = 0x40;

/// PE image whose sections sit at file offset == RVA, so the same bytes are
/// valid in both the mapped and the file layout.
#[derive(Debug, Clone)]
pub struct PeBuilder {
    pub is_64: bool,
    pub image_base: u64,
    pub entry: u32,
    pub optional_magic: Option<u16>,
    sections: Vec<(String, SectionWriter, u32)>,
    directories: [(u32, u32); 16],
}

impl PeBuilder {
    pub fn new(is_64: bool) -> Self {
        Self {
            is_64,
            image_base: if is_64 { 0x1_4000_0000 } else { 0x40_0000 },
            entry: 0,
            optional_magic: None,
            sections: Vec::new(),
            directories: [(0, 0); 16],
        }
    }

    pub fn entry(mut self, rva: u32) -> Self {
        self.entry = rva;
        self
    }

    pub fn section(mut self, name: &str, writer: SectionWriter, characteristics: u32) -> Self {
        self.sections.push((name.to_string(), writer, characteristics));
        self
    }

    pub fn directory(mut self, index: usize, rva: u32, size: u32) -> Self {
        self.directories[index] = (rva, size);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PE_HEADERS_SIZE as usize];
        put(&mut buf, 0, b"MZ");
        put_u32(&mut buf, 0x3c, 0x40);

        let nt = 0x40;
        put(&mut buf, nt, b"PE\0\0");
        let fh = nt + 4;
        let optional_size: u16 = if self.is_64 { 240 } else { 224 };
        put_u16(&mut buf, fh, if self.is_64 { 0x8664 } else { 0x14c });
        put_u16(&mut buf, fh + 2, self.sections.len() as u16);
        put_u32(&mut buf, fh + 4, 0x5f00_0000);
        put_u16(&mut buf, fh + 16, optional_size);
        put_u16(&mut buf, fh + 18, 0x22);

        let end_of_image = self
            .sections
            .iter()
            .map(|(_, w, _)| align(w.rva as usize + w.data.len().max(1), 0x200))
            .max()
            .unwrap_or(PE_HEADERS_SIZE as usize);

        let oh = fh + 20;
        let magic = self
            .optional_magic
            .unwrap_or(if self.is_64 { 0x20b } else { 0x10b });
        put_u16(&mut buf, oh, magic);
        put_u32(&mut buf, oh + 16, self.entry);
        let (after_base, data_dirs) = if self.is_64 {
            put_u64(&mut buf, oh + 24, self.image_base);
            (oh + 32, oh + 112)
        } else {
            put_u32(&mut buf, oh + 28, self.image_base as u32);
            (oh + 32, oh + 96)
        };
        put_u32(&mut buf, after_base, 0x200);
        put_u32(&mut buf, after_base + 4, 0x200);
        put_u32(&mut buf, after_base + 24, end_of_image as u32);
        put_u32(&mut buf, after_base + 28, PE_HEADERS_SIZE);
        put_u16(&mut buf, after_base + 36, 3);
        put_u32(&mut buf, data_dirs - 4, 16);
        for (i, (rva, size)) in self.directories.iter().enumerate() {
            put_u32(&mut buf, data_dirs + i * 8, *rva);
            put_u32(&mut buf, data_dirs + i * 8 + 4, *size);
        }

        let mut sh = oh + optional_size as usize;
        for (name, writer, characteristics) in &self.sections {
            let mut raw_name = [0u8; 8];
            raw_name[..name.len()].copy_from_slice(name.as_bytes());
            put(&mut buf, sh, &raw_name);
            put_u32(&mut buf, sh + 8, writer.data.len() as u32);
            put_u32(&mut buf, sh + 12, writer.rva);
            put_u32(&mut buf, sh + 16, align(writer.data.len(), 0x200) as u32);
            put_u32(&mut buf, sh + 20, writer.rva);
            put_u32(&mut buf, sh + 36, *characteristics);
            put(&mut buf, writer.rva as usize, &writer.data);
            sh += 40;
        }
        buf.resize(end_of_image, 0);
        buf
    }
}

/// Key of a resource directory entry.
#[derive(Debug, Clone, Copy)]
pub enum ResourceKey {
    Id(u16),
    Name(&'static str),
}

/// A resource directory or data leaf for [`resource_tree`].
#[derive(Debug, Clone)]
pub enum ResourceNode {
    Directory(Vec<(ResourceKey, ResourceNode)>),
    Leaf(Vec<u8>),
}

impl ResourceNode {
    pub fn dir(entries: Vec<(ResourceKey, ResourceNode)>) -> Self {
        Self::Directory(entries)
    }

    pub fn leaf(payload: &[u8]) -> Self {
        Self::Leaf(payload.to_vec())
    }
}

/// Write `root` as a resource tree at the writer's current position, with
/// entries in the order given. Returns the directory RVA and size.
pub fn resource_tree(
    writer: &mut SectionWriter,
    root: &[(ResourceKey, ResourceNode)],
) -> (u32, u32) {
    let root_rva = writer.push(&[]);
    let mut tree = Vec::new();
    write_resource_dir(&mut tree, root_rva, root);
    writer.push(&tree);
    (root_rva, tree.len() as u32)
}

fn write_resource_dir(
    tree: &mut Vec<u8>,
    root_rva: u32,
    entries: &[(ResourceKey, ResourceNode)],
) -> u32 {
    tree.resize(align(tree.len(), 4), 0);
    let dir_at = tree.len();
    let named = entries
        .iter()
        .filter(|(key, _)| matches!(key, ResourceKey::Name(_)))
        .count();
    tree.resize(dir_at + 16 + entries.len() * 8, 0);
    put_u16(tree, dir_at + 12, named as u16);
    put_u16(tree, dir_at + 14, (entries.len() - named) as u16);

    for (i, (key, node)) in entries.iter().enumerate() {
        let name_field = match key {
            ResourceKey::Id(id) => u32::from(*id),
            ResourceKey::Name(name) => {
                let at = tree.len();
                let units: Vec<u16> = name.encode_utf16().collect();
                tree.extend_from_slice(&(units.len() as u16).to_le_bytes());
                tree.extend(units.iter().flat_map(|u| u.to_le_bytes()));
                0x8000_0000 | at as u32
            }
        };
        let target = match node {
            ResourceNode::Directory(children) => {
                0x8000_0000 | write_resource_dir(tree, root_rva, children)
            }
            ResourceNode::Leaf(payload) => {
                tree.resize(align(tree.len(), 4), 0);
                let at = tree.len();
                tree.extend_from_slice(&(root_rva + at as u32 + 16).to_le_bytes());
                tree.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                tree.extend_from_slice(&[0; 8]);
                tree.extend_from_slice(payload);
                at as u32
            }
        };
        let entry_at = dir_at + 16 + i * 8;
        put_u32(tree, entry_at, name_field);
        put_u32(tree, entry_at + 4, target);
    }
    dir_at as u32
}

/// Resource tree with a single leaf at `type/name/language`. The leaf
/// payload lands 88 bytes past the returned directory RVA.
pub fn single_resource(
    writer: &mut SectionWriter,
    type_id: u16,
    name_id: u16,
    language: u16,
    payload: &[u8],
) -> (u32, u32) {
    use ResourceKey::Id;
    let leaf = ResourceNode::dir(vec![(Id(language), ResourceNode::leaf(payload))]);
    let name = ResourceNode::dir(vec![(Id(name_id), leaf)]);
    resource_tree(writer, &[(Id(type_id), name)])
}

/// `IMAGE_DELAYLOAD_DESCRIPTOR`. Version 1 descriptors (`rva_based` false)
/// hold VAs, so `image_base` is added to each address field.
pub fn delay_descriptor(
    rva_based: bool,
    image_base: u32,
    dll: u32,
    iat: u32,
    int: u32,
    timestamp: u32,
) -> Vec<u8> {
    let field = |rva: u32| if rva_based { rva } else { image_base + rva };
    [u32::from(rva_based), field(dll), 0, field(iat), field(int), 0, 0, timestamp]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

/// `RSDS` CodeView payload
pub fn rsds(guid: [u8; 16], age: u32, pdb: &str) -> Vec<u8> {
    let mut cv = b"RSDS".to_vec();
    cv.extend_from_slice(&guid);
    cv.extend_from_slice(&age.to_le_bytes());
    cv.extend_from_slice(pdb.as_bytes());
    cv.push(0);
    cv
}

/// One `IMAGE_DEBUG_DIRECTORY` pointing at `rva` (file offset == RVA).
pub fn debug_directory(debug_type: u32, rva: u32, size: u32) -> Vec<u8> {
    let mut d = vec![0u8; 28];
    d[12..16].copy_from_slice(&debug_type.to_le_bytes());
    d[16..20].copy_from_slice(&size.to_le_bytes());
    d[20..24].copy_from_slice(&rva.to_le_bytes());
    d[24..28].copy_from_slice(&rva.to_le_bytes());
    d
}

/// ELF program header fields
#[derive(Debug, Clone, Copy)]
pub struct ElfSegment {
    pub p_type: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;
pub const PT_INTERP: u32 = 3;
pub const PT_NOTE: u32 = 4;

impl ElfSegment {
    pub fn new(p_type: u32, offset: u64, vaddr: u64, filesz: u64, memsz: u64) -> Self {
        Self {
            p_type,
            flags: 4,
            offset,
            vaddr,
            filesz,
            memsz,
            align: if p_type == PT_LOAD { 0x1000 } else { 4 },
        }
    }
}

/// Little-endian ELF image with program headers right after the header.
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    pub is_64: bool,
    pub e_type: u16,
    pub machine: u16,
    pub entry: u64,
    segments: Vec<ElfSegment>,
    data: Vec<(usize, Vec<u8>)>,
}

impl ElfBuilder {
    pub fn new(is_64: bool) -> Self {
        Self {
            is_64,
            e_type: 3,
            machine: if is_64 { 62 } else { 3 },
            entry: 0,
            segments: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn header_size(&self) -> usize {
        if self.is_64 {
            64
        } else {
            52
        }
    }

    pub fn phdr_size(&self) -> usize {
        if self.is_64 {
            56
        } else {
            32
        }
    }

    /// First file offset past the program header table for `count` segments
    pub fn first_free_offset(&self, count: usize) -> usize {
        align(self.header_size() + count * self.phdr_size(), 8)
    }

    pub fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    pub fn segment(mut self, segment: ElfSegment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn data(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.data.push((offset, bytes.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.header_size()];
        put(&mut buf, 0, b"\x7fELF");
        buf[4] = if self.is_64 { 2 } else { 1 };
        buf[5] = 1;
        buf[6] = 1;
        put_u16(&mut buf, 16, self.e_type);
        put_u16(&mut buf, 18, self.machine);
        put_u32(&mut buf, 20, 1);
        let phoff = self.header_size();
        if self.is_64 {
            put_u64(&mut buf, 24, self.entry);
            put_u64(&mut buf, 32, phoff as u64);
            put_u16(&mut buf, 52, 64);
            put_u16(&mut buf, 54, 56);
            put_u16(&mut buf, 56, self.segments.len() as u16);
        } else {
            put_u32(&mut buf, 24, self.entry as u32);
            put_u32(&mut buf, 28, phoff as u32);
            put_u16(&mut buf, 40, 52);
            put_u16(&mut buf, 42, 32);
            put_u16(&mut buf, 44, self.segments.len() as u16);
        }

        for (i, s) in self.segments.iter().enumerate() {
            let at = phoff + i * self.phdr_size();
            if self.is_64 {
                put_u32(&mut buf, at, s.p_type);
                put_u32(&mut buf, at + 4, s.flags);
                put_u64(&mut buf, at + 8, s.offset);
                put_u64(&mut buf, at + 16, s.vaddr);
                put_u64(&mut buf, at + 24, s.vaddr);
                put_u64(&mut buf, at + 32, s.filesz);
                put_u64(&mut buf, at + 40, s.memsz);
                put_u64(&mut buf, at + 48, s.align);
            } else {
                put_u32(&mut buf, at, s.p_type);
                put_u32(&mut buf, at + 4, s.offset as u32);
                put_u32(&mut buf, at + 8, s.vaddr as u32);
                put_u32(&mut buf, at + 12, s.vaddr as u32);
                put_u32(&mut buf, at + 16, s.filesz as u32);
                put_u32(&mut buf, at + 20, s.memsz as u32);
                put_u32(&mut buf, at + 24, s.flags);
                put_u32(&mut buf, at + 28, s.align as u32);
            }
        }

        for (offset, bytes) in &self.data {
            put(&mut buf, *offset, bytes);
        }
        let file_end = self
            .segments
            .iter()
            .map(|s| (s.offset + s.filesz) as usize)
            .max()
            .unwrap_or(0);
        if buf.len() < file_end {
            buf.resize(file_end, 0);
        }
        buf
    }
}

/// One ELF note with 4-byte padding
pub fn elf_note(name: &str, note_type: u32, desc: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(name.len() as u32 + 1).to_le_bytes());
    buf.extend_from_slice(&(desc.len() as u32).to_le_bytes());
    buf.extend_from_slice(&note_type.to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.push(0);
    buf.resize(align(buf.len(), 4), 0);
    buf.extend_from_slice(desc);
    buf.resize(align(buf.len(), 4), 0);
    buf
}

/// 64-bit dynamic entries
pub fn elf64_dynamic(entries: &[(i64, u64)]) -> Vec<u8> {
    entries
        .iter()
        .flat_map(|(tag, value)| {
            let mut e = tag.to_le_bytes().to_vec();
            e.extend_from_slice(&value.to_le_bytes());
            e
        })
        .collect()
}

/// Little-endian Mach-O image built from raw load commands.
#[derive(Debug, Clone)]
pub struct MachOBuilder {
    pub is_64: bool,
    pub cputype: u32,
    pub filetype: u32,
    commands: Vec<Vec<u8>>,
}

impl MachOBuilder {
    pub fn new(is_64: bool) -> Self {
        Self {
            is_64,
            cputype: if is_64 { 0x0100_000c } else { 7 },
            filetype: 2,
            commands: Vec::new(),
        }
    }

    pub fn header_size(&self) -> usize {
        if self.is_64 {
            32
        } else {
            28
        }
    }

    /// Append a command; `body` excludes `cmd`/`cmdsize` and is padded to 8.
    pub fn command(mut self, cmd: u32, body: &[u8]) -> Self {
        let mut raw = Vec::new();
        let size = align(body.len() + 8, 8);
        raw.extend_from_slice(&cmd.to_le_bytes());
        raw.extend_from_slice(&(size as u32).to_le_bytes());
        raw.extend_from_slice(body);
        raw.resize(size, 0);
        self.commands.push(raw);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let sizeofcmds: usize = self.commands.iter().map(Vec::len).sum();
        let mut buf = Vec::new();
        let magic: u32 = if self.is_64 { 0xfeed_facf } else { 0xfeed_face };
        for v in [
            magic,
            self.cputype,
            3,
            self.filetype,
            self.commands.len() as u32,
            sizeofcmds as u32,
            0x0020_0085,
        ] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        if self.is_64 {
            buf.extend_from_slice(&[0; 4]);
        }
        for command in &self.commands {
            buf.extend_from_slice(command);
        }
        buf
    }
}

fn fixed16(name: &str) -> [u8; 16] {
    let mut raw = [0u8; 16];
    raw[..name.len()].copy_from_slice(name.as_bytes());
    raw
}

/// Section fields for [`segment64_body`]
#[derive(Debug, Clone, Copy)]
pub struct MachSection<'a> {
    pub sectname: &'a str,
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
}

/// `LC_SEGMENT_64` body (everything after `cmd`/`cmdsize`)
pub fn segment64_body(
    segname: &str,
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    sections: &[MachSection<'_>],
) -> Vec<u8> {
    let mut body = fixed16(segname).to_vec();
    for v in [vmaddr, vmsize, fileoff, filesize] {
        body.extend_from_slice(&v.to_le_bytes());
    }
    for v in [7u32, 5, sections.len() as u32, 0] {
        body.extend_from_slice(&v.to_le_bytes());
    }
    for s in sections {
        body.extend_from_slice(&fixed16(s.sectname));
        body.extend_from_slice(&fixed16(segname));
        body.extend_from_slice(&s.addr.to_le_bytes());
        body.extend_from_slice(&s.size.to_le_bytes());
        for v in [s.offset, s.align, 0, 0, 0x8000_0400, 0, 0, 0] {
            body.extend_from_slice(&v.to_le_bytes());
        }
    }
    body
}

/// Dylib command body with the name stored inline
pub fn dylib_body(name: &str, current: u32, compatibility: u32) -> Vec<u8> {
    let mut body = Vec::new();
    for v in [24u32, 2, current, compatibility] {
        body.extend_from_slice(&v.to_le_bytes());
    }
    body.extend_from_slice(name.as_bytes());
    body.push(0);
    body
}

pub fn utf16z(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}

/// One version-resource block; text values are counted in characters.
pub fn version_block(key: &str, value: &[u8], text: bool, children: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = vec![0u8; 6];
    buf.extend(utf16z(key));
    buf.resize(align(buf.len(), 4), 0);
    buf.extend_from_slice(value);
    for child in children {
        buf.resize(align(buf.len(), 4), 0);
        buf.extend_from_slice(child);
    }
    let value_length = if text { value.len() / 2 } else { value.len() };
    let total_len = buf.len() as u16;
    buf[0..2].copy_from_slice(&total_len.to_le_bytes());
    buf[2..4].copy_from_slice(&(value_length as u16).to_le_bytes());
    buf[4..6].copy_from_slice(&u16::from(text).to_le_bytes());
    buf
}

/// `VS_VERSION_INFO` with file version `1.2.3.4` and one string.
pub fn version_resource(key: &str, value: &str) -> Vec<u8> {
    let mut fixed = Vec::new();
    for word in [0xfeef_04bd_u32, 0x0001_0000, 0x0001_0002, 0x0003_0004, 0x0001_0002, 0x0003_0004] {
        fixed.extend_from_slice(&word.to_le_bytes());
    }
    fixed.extend_from_slice(&[0u8; 28]);
    let string = version_block(key, &utf16z(value), true, &[]);
    let table = version_block("040904b0", &[], true, &[string]);
    let sfi = version_block("StringFileInfo", &[], true, &[table]);
    version_block("VS_VERSION_INFO", &fixed, false, &[sfi])
}
