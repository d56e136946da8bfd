//! Optional sibling-module lookup.
//!
//! A debugging session usually knows which other modules are loaded. When a
//! resolver is supplied, import walking attaches the matching module to each
//! imported library; without one imports carry the module name only.

use serde::Serialize;

/// A module known to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRef {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

impl ModuleRef {
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address - self.base < self.size
    }
}

/// Locates a module by name and/or by an address inside it.
pub trait ModuleResolver {
    fn resolve(&self, name: Option<&str>, address: Option<u64>) -> Option<ModuleRef>;
}

/// Resolver backed by a fixed module list, matching names case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticModules {
    modules: Vec<ModuleRef>,
}

impl StaticModules {
    pub fn new(modules: Vec<ModuleRef>) -> Self {
        Self { modules }
    }
}

impl ModuleResolver for StaticModules {
    fn resolve(&self, name: Option<&str>, address: Option<u64>) -> Option<ModuleRef> {
        if let Some(address) = address {
            if let Some(found) = self.modules.iter().find(|m| m.contains(address)) {
                return Some(found.clone());
            }
        }
        let name = name?;
        self.modules
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .cloned()
    }
}
