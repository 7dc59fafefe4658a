//! # Symbols
//!
//! Symbol table, debug-entry model, type graph and source resolution for one
//! ELF binary.
//!
//! Loading happens in a fixed order inside [`BinaryImage::open`]:
//!
//! 1. The symbol table is indexed by name.
//! 2. `.debug_info` is read into an owned, pre-order [`DebugInfo`].
//! 3. The [`TypeGraphBuilder`] walks the entries once and fills the
//!    [`TypeRegistry`] and the variable map.
//!
//! Type references are resolved lazily by name and source lookups run per
//! query against the retained [`DebugInfo`].

use gimli::{Dwarf, EndianArcSlice, RunTimeEndian};

pub mod builder;
pub(crate) mod demangle;
pub mod entry;
pub mod graph;
pub mod image;
pub mod json;
pub mod reader;
pub mod source;
pub mod table;
#[cfg(test)]
pub(crate) mod test_helpers;

pub use builder::{TypeGraph, TypeGraphBuilder, VOID_TYPE_NAME};
pub use entry::{AttrValue, CompileUnit, DebugEntry, DebugInfo, EntryCursor, EntryOffset, EntryTag, LineRow};
pub use graph::{Enumerator, Field, Member, Resolved, TypeCategory, TypeNode, TypeRef, TypeRegistry, Variable, RESOLUTION_ORDER};
pub use image::BinaryImage;
pub use json::JsonWriter;
pub use source::resolve_source;
pub use table::SymbolTable;

pub type OwnedReader = EndianArcSlice<RunTimeEndian>;
pub type OwnedDwarf = Dwarf<OwnedReader>;
