//! Configuration for image parsing.
//!
//! Every enumeration the parsers perform is bounded by one of these limits so
//! that a corrupted or hostile image cannot drive an unbounded walk.

use serde::{Deserialize, Serialize};

use crate::error::{ImageError, Result};

/// Walking limits shared by all format parsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Maximum resource directory nesting (default: 32).
    pub max_resource_depth: usize,
    /// Maximum resource entries visited in one walk (default: 4096).
    pub max_resource_entries: usize,
    /// Maximum resource payload read by `content()` (default: 16777216 = 16MB).
    pub max_resource_bytes: usize,
    /// Maximum imported functions per module (default: 10000).
    pub max_imports: usize,
    /// Maximum exported functions (default: 65536).
    pub max_exports: usize,
    /// Maximum Mach-O load commands (default: 4096).
    pub max_load_commands: usize,
    /// Maximum PE sections, ELF program headers or sections per Mach-O
    /// segment (default: 256).
    pub max_sections: usize,
    /// Maximum notes read across all PT_NOTE segments combined (default:
    /// 1024).
    pub max_notes: usize,
    /// Maximum dynamic entries per PT_DYNAMIC segment (default: 8192).
    pub max_dynamic_entries: usize,
    /// Maximum link-map entries followed (default: 1024).
    pub max_link_map_entries: usize,
    /// Maximum characters read for any string (default: 4096).
    pub max_string_length: usize,
    /// Maximum debug directory entries (default: 32).
    pub max_debug_entries: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_resource_depth: 32,
            max_resource_entries: 4096,
            max_resource_bytes: 16 * 1024 * 1024, // 16MB
            max_imports: 10000,
            max_exports: 65536,
            max_load_commands: 4096,
            max_sections: 256,
            max_notes: 1024,
            max_dynamic_entries: 8192,
            max_link_map_entries: 1024,
            max_string_length: 4096,
            max_debug_entries: 32,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from JSON; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ImageError::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ImageError::Config(e.to_string()))
    }
}
