//! Common module for library exports

pub use crate::error::{ScopeError, ScopeResult};
pub use crate::symbols::{BinaryImage, Field, Member, Resolved, TypeCategory, TypeNode, TypeRef, Variable};
pub use crate::types::{AbiInfo, Address, Endianness, SourceInfo, Symbol, SymbolKind, SymbolName};
