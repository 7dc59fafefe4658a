//! Symbol demangling utilities.
//!
//! Function names recovered from the debug information are usually plain C
//! identifiers, but Rust and C++ objects linked into the same firmware image
//! report mangled linkage names. This module classifies and demangles them.
//!
//! ## Language Detection
//!
//! - Rust symbols: start with `_R` or `_ZN`, or contain `::`
//! - C++ symbols: start with `_Z` (Itanium mangling)
//! - C symbols: everything else

use rustc_demangle::try_demangle;

use crate::error::ScopeError;
use crate::types::{SymbolLanguage, SymbolName};

/// Create a `SymbolName` from a raw, possibly mangled, symbol string.
///
/// Demangling is attempted with `rustc_demangle`; when it fails the demangled
/// form is left empty and [`SymbolName::display_name`] falls back to the raw
/// string.
pub(crate) fn make_symbol_name(raw: String) -> SymbolName
{
    let demangled = try_demangle(&raw).ok().map(|d| format!("{d:#}"));
    let language = if raw.starts_with("_R") || raw.starts_with("_ZN") || raw.contains("::") {
        SymbolLanguage::Rust
    } else if raw.starts_with("_Z") {
        SymbolLanguage::Cpp
    } else {
        SymbolLanguage::C
    };

    SymbolName::new(raw, demangled, language)
}

/// Map a gimli DWARF error to a `ScopeError` with context.
pub(crate) fn map_dwarf_error(context: &str, err: gimli::Error) -> ScopeError
{
    ScopeError::UnreadableBinary(format!("{context}: {err}"))
}
