//! # Types
//!
//! Plain value types shared by the symbol table, the debug model and the CLI.

pub mod address;
pub mod binary;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use binary::{AbiInfo, Endianness};
pub use symbols::{SourceInfo, Symbol, SymbolKind, SymbolLanguage, SymbolName};
