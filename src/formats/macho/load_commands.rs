//! Load command walking and decoding

use serde::Serialize;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::ParseOptions;
use crate::error::Result;
use crate::formats::macho::types::*;
use crate::reflect::{Reader, StructKind, TypedView};

/// A section inside a segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub sectname: String,
    pub segname: String,
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    /// Power of two
    pub align: u32,
    pub flags: u32,
}

impl Section {
    fn from_view(view: &TypedView) -> Result<Self> {
        Ok(Self {
            sectname: fixed_name(&view.bytes("sectname")?),
            segname: fixed_name(&view.bytes("segname")?),
            addr: view.u64("addr")?,
            size: view.u64("size")?,
            offset: view.u32("offset")?,
            align: view.u32("align")?,
            flags: view.u32("flags")?,
        })
    }
}

/// `LC_SEGMENT` / `LC_SEGMENT_64`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentCommand {
    pub segname: String,
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    #[serde(serialize_with = "serialize_prot")]
    pub maxprot: VmProt,
    #[serde(serialize_with = "serialize_prot")]
    pub initprot: VmProt,
    pub flags: u32,
    sections: Vec<Section>,
}

fn serialize_prot<S: serde::Serializer>(prot: &VmProt, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u32(prot.bits())
}

impl SegmentCommand {
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.sectname == name)
    }
}

/// One tool entry of `LC_BUILD_VERSION`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTool {
    pub tool: u32,
    pub version: String,
}

/// `LC_BUILD_VERSION`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildVersion {
    pub platform: Platform,
    pub minos: String,
    pub sdk: String,
    tools: Vec<BuildTool>,
}

impl BuildVersion {
    pub fn tools(&self) -> &[BuildTool] {
        &self.tools
    }
}

/// A dylib reference or the image's own install name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DylibCommand {
    pub kind: DylibKind,
    pub name: String,
    pub timestamp: u32,
    pub current_version: String,
    pub compatibility_version: String,
}

/// `LC_DYLD_INFO` / `LC_DYLD_INFO_ONLY` opcode stream locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DyldInfo {
    pub rebase: (u32, u32),
    pub bind: (u32, u32),
    pub weak_bind: (u32, u32),
    pub lazy_bind: (u32, u32),
    pub export: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Symtab {
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
}

/// The symbol index ranges of `LC_DYSYMTAB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dysymtab {
    pub ilocalsym: u32,
    pub nlocalsym: u32,
    pub iextdefsym: u32,
    pub nextdefsym: u32,
    pub iundefsym: u32,
    pub nundefsym: u32,
    pub indirectsymoff: u32,
    pub nindirectsyms: u32,
}

/// A decoded load command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoadCommand {
    Segment(SegmentCommand),
    Uuid(Uuid),
    BuildVersion(BuildVersion),
    Dylib(DylibCommand),
    DyldInfo(DyldInfo),
    Symtab(Symtab),
    Dysymtab(Dysymtab),
    Main { entry_offset: u64, stack_size: u64 },
    Other { cmd: u32, cmdsize: u32 },
}

/// NUL-padded fixed-width name
fn fixed_name(raw: &[u8]) -> String {
    let end = memchr::memchr(0, raw).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Walks the commands following the Mach-O header.
///
/// The walk ends after `ncmds` commands, at the end of `sizeofcmds`, at the
/// configured limit, or at the first command whose size is too small or
/// would overrun the command area. A read failure is yielded once and ends
/// the walk.
pub struct LoadCommandIter<'a> {
    reader: Reader<'a>,
    is_64: bool,
    next: u64,
    end: u64,
    remaining: u32,
    visited: usize,
    options: &'a ParseOptions,
    failed: bool,
}

impl<'a> LoadCommandIter<'a> {
    pub(crate) fn new(
        reader: Reader<'a>,
        is_64: bool,
        start: u64,
        ncmds: u32,
        sizeofcmds: u32,
        options: &'a ParseOptions,
    ) -> Self {
        Self {
            reader,
            is_64,
            next: start,
            end: start.saturating_add(u64::from(sizeofcmds)),
            remaining: ncmds,
            visited: 0,
            options,
            failed: false,
        }
    }

    fn step(&mut self) -> Result<Option<LoadCommand>> {
        let header_size = self.reader.size_of(StructKind::LoadCommand);
        if self.remaining == 0 || self.next.saturating_add(header_size) > self.end {
            return Ok(None);
        }
        if self.visited >= self.options.max_load_commands {
            debug!(limit = self.options.max_load_commands, "Load command limit reached");
            return Ok(None);
        }

        let address = self.next;
        let header = self.reader.view(StructKind::LoadCommand, address)?;
        let cmd = header.u32("cmd")?;
        let cmdsize = header.u32("cmdsize")?;
        if u64::from(cmdsize) < header_size || address.saturating_add(u64::from(cmdsize)) > self.end {
            debug!(cmd, cmdsize, address, "Load command overruns command area");
            self.remaining = 0;
            return Ok(None);
        }
        self.remaining -= 1;
        self.visited += 1;
        self.next += u64::from(cmdsize);
        trace!(cmd, cmdsize, address, "Load command");

        self.decode(address, cmd, cmdsize).map(Some)
    }

    fn decode(&self, address: u64, cmd: u32, cmdsize: u32) -> Result<LoadCommand> {
        // A command too short for its structure is kept as raw
        let fits = |kind: StructKind| self.reader.size_of(kind) <= u64::from(cmdsize);

        let command = match cmd {
            LC_SEGMENT if fits(StructKind::SegmentCommand) => {
                LoadCommand::Segment(self.segment(address, cmdsize, false)?)
            }
            LC_SEGMENT_64 if fits(StructKind::SegmentCommand64) => {
                LoadCommand::Segment(self.segment(address, cmdsize, true)?)
            }
            LC_UUID if fits(StructKind::UuidCommand) => {
                let view = self.reader.view(StructKind::UuidCommand, address)?;
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(&view.bytes("uuid")?);
                LoadCommand::Uuid(Uuid::from_bytes(bytes))
            }
            LC_BUILD_VERSION if fits(StructKind::BuildVersionCommand) => {
                LoadCommand::BuildVersion(self.build_version(address, cmdsize)?)
            }
            LC_DYLD_INFO | LC_DYLD_INFO_ONLY if fits(StructKind::DyldInfoCommand) => {
                let v = self.reader.view(StructKind::DyldInfoCommand, address)?;
                LoadCommand::DyldInfo(DyldInfo {
                    rebase: (v.u32("rebase_off")?, v.u32("rebase_size")?),
                    bind: (v.u32("bind_off")?, v.u32("bind_size")?),
                    weak_bind: (v.u32("weak_bind_off")?, v.u32("weak_bind_size")?),
                    lazy_bind: (v.u32("lazy_bind_off")?, v.u32("lazy_bind_size")?),
                    export: (v.u32("export_off")?, v.u32("export_size")?),
                })
            }
            LC_SYMTAB if fits(StructKind::SymtabCommand) => {
                let v = self.reader.view(StructKind::SymtabCommand, address)?;
                LoadCommand::Symtab(Symtab {
                    symoff: v.u32("symoff")?,
                    nsyms: v.u32("nsyms")?,
                    stroff: v.u32("stroff")?,
                    strsize: v.u32("strsize")?,
                })
            }
            LC_DYSYMTAB if fits(StructKind::DysymtabCommand) => {
                let v = self.reader.view(StructKind::DysymtabCommand, address)?;
                LoadCommand::Dysymtab(Dysymtab {
                    ilocalsym: v.u32("ilocalsym")?,
                    nlocalsym: v.u32("nlocalsym")?,
                    iextdefsym: v.u32("iextdefsym")?,
                    nextdefsym: v.u32("nextdefsym")?,
                    iundefsym: v.u32("iundefsym")?,
                    nundefsym: v.u32("nundefsym")?,
                    indirectsymoff: v.u32("indirectsymoff")?,
                    nindirectsyms: v.u32("nindirectsyms")?,
                })
            }
            LC_MAIN if fits(StructKind::EntryPointCommand) => {
                let v = self.reader.view(StructKind::EntryPointCommand, address)?;
                LoadCommand::Main {
                    entry_offset: v.u64("entryoff")?,
                    stack_size: v.u64("stacksize")?,
                }
            }
            _ => match DylibKind::from_cmd(cmd) {
                Some(kind) if fits(StructKind::DylibCommand) => {
                    LoadCommand::Dylib(self.dylib(address, cmdsize, kind)?)
                }
                _ => LoadCommand::Other { cmd, cmdsize },
            },
        };
        Ok(command)
    }

    fn segment(&self, address: u64, cmdsize: u32, is_64: bool) -> Result<SegmentCommand> {
        let (seg_kind, sect_kind) = if is_64 {
            (StructKind::SegmentCommand64, StructKind::Section64)
        } else {
            (StructKind::SegmentCommand, StructKind::Section)
        };
        let view = self.reader.view(seg_kind, address)?;
        let sect_size = self.reader.size_of(sect_kind);
        let room = (u64::from(cmdsize) - view.size()) / sect_size;
        let nsects = u64::from(view.u32("nsects")?);
        let count = nsects.min(room).min(self.options.max_sections as u64);
        if count < nsects {
            debug!(nsects, count, "Segment sections truncated");
        }

        let sections = (0..count)
            .map(|i| {
                let sect = self.reader.view(sect_kind, view.end() + i * sect_size)?;
                Section::from_view(&sect)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SegmentCommand {
            segname: fixed_name(&view.bytes("segname")?),
            vmaddr: view.u64("vmaddr")?,
            vmsize: view.u64("vmsize")?,
            fileoff: view.u64("fileoff")?,
            filesize: view.u64("filesize")?,
            maxprot: VmProt::from_bits_retain(view.u32("maxprot")?),
            initprot: VmProt::from_bits_retain(view.u32("initprot")?),
            flags: view.u32("flags")?,
            sections,
        })
    }

    fn build_version(&self, address: u64, cmdsize: u32) -> Result<BuildVersion> {
        let view = self.reader.view(StructKind::BuildVersionCommand, address)?;
        let tool_size = self.reader.size_of(StructKind::BuildToolVersion);
        let room = (u64::from(cmdsize) - view.size()) / tool_size;
        let count = u64::from(view.u32("ntools")?).min(room);

        let tools = (0..count)
            .map(|i| {
                let tool = self
                    .reader
                    .view(StructKind::BuildToolVersion, view.end() + i * tool_size)?;
                Ok(BuildTool {
                    tool: tool.u32("tool")?,
                    version: format_version(tool.u32("version")?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BuildVersion {
            platform: Platform::from(view.u32("platform")?),
            minos: format_version(view.u32("minos")?),
            sdk: format_version(view.u32("sdk")?),
            tools,
        })
    }

    fn dylib(&self, address: u64, cmdsize: u32, kind: DylibKind) -> Result<DylibCommand> {
        let view = self.reader.view(StructKind::DylibCommand, address)?;
        let dylib = view.view("dylib")?;
        let name_offset = dylib.u32("name")?;
        let name = if name_offset < cmdsize {
            let max = ((cmdsize - name_offset) as usize).min(self.options.max_string_length);
            self.reader.string(address + u64::from(name_offset), max)?
        } else {
            String::new()
        };
        Ok(DylibCommand {
            kind,
            name,
            timestamp: dylib.u32("timestamp")?,
            current_version: format_version(dylib.u32("current_version")?),
            compatibility_version: format_version(dylib.u32("compatibility_version")?),
        })
    }
}

impl Iterator for LoadCommandIter<'_> {
    type Item = Result<LoadCommand>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(command) => command.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl std::fmt::Debug for LoadCommandIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadCommandIter")
            .field("is_64", &self.is_64)
            .field("next", &format_args!("{:#x}", self.next))
            .field("remaining", &self.remaining)
            .finish()
    }
}
