//! Import and delay-import table parsing

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::formats::pe::types::*;
use crate::formats::pe::PeImage;
use crate::reflect::{StructKind, TypedView};
use crate::resolver::ModuleRef;

/// What an import lookup slot refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ImportTarget {
    Ordinal(u16),
    Name { hint: u16, name: String },
    /// The lookup slot already holds a function pointer
    Address(u64),
}

/// Import entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedFunction {
    pub target: ImportTarget,
    /// Address of the IAT slot
    pub thunk_address: u64,
    /// Resolved function pointer held by the IAT slot, when bound
    pub bound_address: Option<u64>,
}

impl ImportedFunction {
    pub fn name(&self) -> Option<&str> {
        match &self.target {
            ImportTarget::Name { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> Option<u16> {
        match self.target {
            ImportTarget::Ordinal(ordinal) => Some(ordinal),
            _ => None,
        }
    }
}

/// One imported module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportModule {
    pub name: String,
    pub delay_loaded: bool,
    pub time_date_stamp: u32,
    /// Whether the IAT differs from the original thunk table
    pub is_bound: bool,
    /// The module as located by the session's resolver
    pub module: Option<ModuleRef>,
    pub functions: Vec<ImportedFunction>,
}

impl PeImage<'_> {
    fn thunk_size(&self) -> u64 {
        if self.is_64bit() {
            8
        } else {
            4
        }
    }

    fn ordinal_flag(&self) -> u64 {
        if self.is_64bit() {
            IMAGE_ORDINAL_FLAG64
        } else {
            IMAGE_ORDINAL_FLAG32
        }
    }

    /// True when `value` points into this module, either at its actual
    /// base or at its preferred image base.
    fn points_into_module(&self, value: u64) -> bool {
        let preferred = self.image_base();
        self.image().contains(value)
            || (value >= preferred && value - preferred < u64::from(self.size_of_image()))
    }

    fn decode_lookup(&self, value: u64) -> Result<ImportTarget> {
        let flag = self.ordinal_flag();
        if value & flag != 0 {
            return Ok(ImportTarget::Ordinal(value as u16));
        }
        let low = value & (flag - 1);
        if low < u64::from(self.size_of_image()) {
            let address = self.require_address(low as u32)?;
            let reader = self.reader();
            return Ok(ImportTarget::Name {
                hint: reader.u16(address)?,
                name: reader.string(address + 2, self.options().max_string_length)?,
            });
        }
        Ok(ImportTarget::Address(value))
    }

    fn resolve_module(&self, name: &str, bound: Option<u64>) -> Option<ModuleRef> {
        self.resolver()?.resolve(Some(name), bound)
    }

    fn read_import_descriptor(&self, view: &TypedView) -> Result<Option<ImportModule>> {
        let name_rva = view.u32("Name")?;
        let oft = view.u32("OriginalFirstThunk")?;
        let first_thunk = view.u32("FirstThunk")?;
        if name_rva == 0 && first_thunk == 0 && oft == 0 {
            return Ok(None);
        }

        let reader = self.reader();
        let name = reader.string(
            self.require_address(name_rva)?,
            self.options().max_string_length,
        )?;
        let width = self.thunk_size();
        let is_64 = self.is_64bit();
        let iat = self.require_address(first_thunk)?;
        let lookup = if oft != 0 {
            self.require_address(oft)?
        } else {
            iat
        };

        // Heuristic: a bound IAT no longer matches the original thunks
        let is_bound = oft != 0 && {
            match (reader.word(iat, is_64), reader.word(lookup, is_64)) {
                (Ok(bound), Ok(original)) => bound != original,
                (Err(err), _) | (_, Err(err)) => {
                    warn!(module = %name, error = %err, "bound thunk table unavailable");
                    false
                }
            }
        };

        let mut functions = Vec::new();
        for i in 0..self.options().max_imports as u64 {
            let value = reader.word(lookup + i * width, is_64)?;
            if value == 0 {
                break;
            }
            let thunk_address = iat + i * width;
            let slot = if lookup == iat {
                Some(value)
            } else {
                reader.word(thunk_address, is_64).ok()
            };
            let bound_address = slot.filter(|&v| {
                v != 0
                    && (is_bound
                        || (v & self.ordinal_flag() == 0
                            && v >= u64::from(self.size_of_image())
                            && !self.points_into_module(v)))
            });
            let target = self.decode_lookup(value)?;
            trace!(module = %name, ?target, thunk_address, "Import");
            functions.push(ImportedFunction {
                target,
                thunk_address,
                bound_address,
            });
        }

        let first_bound = functions.iter().find_map(|f| f.bound_address);
        Ok(Some(ImportModule {
            module: self.resolve_module(&name, first_bound),
            name,
            delay_loaded: false,
            time_date_stamp: view.u32("TimeDateStamp")?,
            is_bound,
            functions,
        }))
    }

    /// Walk the import descriptor chain. `None` when the directory is absent.
    pub fn try_imports(&self) -> Result<Option<Vec<ImportModule>>> {
        let Some(dir) = self.data_directory(DirectoryId::Import) else {
            return Ok(None);
        };
        let start = self.require_address(dir.virtual_address)?;
        let stride = self.reader().size_of(StructKind::ImageImportDescriptor);

        let mut modules = Vec::new();
        for i in 0..self.options().max_imports as u64 {
            let view = self
                .reader()
                .view(StructKind::ImageImportDescriptor, start + i * stride)?;
            match self.read_import_descriptor(&view)? {
                Some(module) => modules.push(module),
                None => break,
            }
        }
        debug!(modules = modules.len(), "Import table parsed");
        Ok(Some(modules))
    }

    fn read_delay_descriptor(&self, view: &TypedView) -> Result<Option<ImportModule>> {
        let name_field = view.u32("DllNameRVA")?;
        if name_field == 0 {
            return Ok(None);
        }
        // Version 1 descriptors hold VAs rather than RVAs
        let rva_based = view.u32("RvaBased")? == 1;
        let preferred = self.image_base();
        let to_rva = |field: u64| -> u32 {
            if rva_based {
                field as u32
            } else {
                field.wrapping_sub(preferred) as u32
            }
        };

        let reader = self.reader();
        let name = reader.string(
            self.require_address(to_rva(u64::from(name_field)))?,
            self.options().max_string_length,
        )?;
        let width = self.thunk_size();
        let is_64 = self.is_64bit();
        let int = self.require_address(to_rva(u64::from(view.u32("ImportNameTableRVA")?)))?;
        let iat = self.require_address(to_rva(u64::from(view.u32("ImportAddressTableRVA")?)))?;

        let mut functions = Vec::new();
        for i in 0..self.options().max_imports as u64 {
            let value = reader.word(int + i * width, is_64)?;
            if value == 0 {
                break;
            }
            let thunk_address = iat + i * width;
            let target = if value & self.ordinal_flag() != 0 {
                ImportTarget::Ordinal(value as u16)
            } else {
                self.decode_lookup(u64::from(to_rva(value)))?
            };
            let bound_address = reader
                .word(thunk_address, is_64)
                .ok()
                .filter(|&v| v != 0 && !self.points_into_module(v) && v >= u64::from(self.size_of_image()));
            functions.push(ImportedFunction {
                target,
                thunk_address,
                bound_address,
            });
        }

        let first_bound = functions.iter().find_map(|f| f.bound_address);
        Ok(Some(ImportModule {
            module: self.resolve_module(&name, first_bound),
            name,
            delay_loaded: true,
            time_date_stamp: view.u32("TimeDateStamp")?,
            is_bound: false,
            functions,
        }))
    }

    /// Walk the delay-load descriptor chain. `None` when the directory is absent.
    pub fn try_delay_imports(&self) -> Result<Option<Vec<ImportModule>>> {
        let Some(dir) = self.data_directory(DirectoryId::DelayImport) else {
            return Ok(None);
        };
        let start = self.require_address(dir.virtual_address)?;
        let stride = self.reader().size_of(StructKind::ImageDelayloadDescriptor);

        let mut modules = Vec::new();
        for i in 0..self.options().max_imports as u64 {
            let view = self
                .reader()
                .view(StructKind::ImageDelayloadDescriptor, start + i * stride)?;
            match self.read_delay_descriptor(&view)? {
                Some(module) => modules.push(module),
                None => break,
            }
        }
        debug!(modules = modules.len(), "Delay import table parsed");
        Ok(Some(modules))
    }
}
