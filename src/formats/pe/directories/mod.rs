//! Data directory parsers

pub mod debug;
pub mod export;
pub mod import;
pub mod resource;

pub use debug::{CodeViewInfo, DebugEntry};
pub use export::{ExportEntry, ExportTable};
pub use import::{ImportModule, ImportTarget, ImportedFunction};
pub use resource::{ResourceContent, ResourceEntry, ResourceIter, ResourceName};
