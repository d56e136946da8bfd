//! Format detection from the magic prefix at an image's base.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::MemoryAccess;

/// Container format of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageClassification {
    Pe,
    Elf,
    MachO,
    Unrecognized,
}

impl ImageClassification {
    pub fn is_recognized(self) -> bool {
        self != Self::Unrecognized
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pe => "PE",
            Self::Elf => "ELF",
            Self::MachO => "Mach-O",
            Self::Unrecognized => "Unrecognized",
        }
    }
}

impl fmt::Display for ImageClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a 4-byte magic prefix.
///
/// Checked in order: `MZ` (PE), `\x7fELF`, then either Mach-O magic
/// (`cf fa ed fe` or `ce fa ed fe`).
pub fn classify_magic(magic: [u8; 4]) -> ImageClassification {
    match magic {
        [0x4D, 0x5A, _, _] => ImageClassification::Pe,
        [0x7F, b'E', b'L', b'F'] => ImageClassification::Elf,
        [0xCF | 0xCE, 0xFA, 0xED, 0xFE] => ImageClassification::MachO,
        _ => ImageClassification::Unrecognized,
    }
}

/// Read the magic at `base` and classify it. An unreadable prefix cannot
/// belong to any format and classifies as `Unrecognized`.
pub fn classify(memory: &dyn MemoryAccess, base: u64) -> ImageClassification {
    let mut magic = [0u8; 4];
    match memory.read_into(base, &mut magic) {
        Ok(()) => classify_magic(magic),
        Err(err) => {
            debug!(base, error = %err, "Magic prefix unreadable");
            ImageClassification::Unrecognized
        }
    }
}
