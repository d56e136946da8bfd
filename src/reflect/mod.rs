//! Structure reflection engine.
//!
//! Binary formats are described as data: each [`StructKind`] has a static
//! [`StructureDescriptor`] listing its fields, nested structures, anonymous
//! unions and bit-fields. The [`Registry`] computes byte layouts once per
//! kind and decodes [`TypedView`]s from any [`MemoryAccess`](crate::memory::MemoryAccess).

pub mod descriptor;
pub mod kinds;
pub mod reader;
pub mod registry;
pub mod view;

pub use descriptor::{FieldDescriptor, FieldKind, Primitive, StructureDescriptor};
pub use kinds::StructKind;
pub use reader::Reader;
pub use registry::{compute_layout, FieldLayout, Layout, Registry};
pub use view::{TypedView, Value};
