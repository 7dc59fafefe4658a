//! Symbol and source location types.

use std::fmt;

use serde::Serialize;

use super::Address;

/// Classification of a symbol table entry.
///
/// Only the two kinds the model queries by are distinguished; everything else
/// (functions, sections, TLS, ...) is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SymbolKind
{
    /// Data object (`STT_OBJECT`)
    Object,
    /// Source file name (`STT_FILE`)
    File,
    /// Any other symbol type
    Other,
}

impl From<object::SymbolKind> for SymbolKind
{
    fn from(kind: object::SymbolKind) -> Self
    {
        match kind {
            object::SymbolKind::Data => SymbolKind::Object,
            object::SymbolKind::File => SymbolKind::File,
            _ => SymbolKind::Other,
        }
    }
}

impl fmt::Display for SymbolKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolKind::Object => "OBJECT",
            SymbolKind::File => "FILE",
            SymbolKind::Other => "OTHER",
        };
        write!(f, "{label}")
    }
}

/// One entry of the binary's symbol tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol
{
    /// Symbol name
    pub name: String,
    /// Symbol value (`st_value`)
    pub address: Address,
    /// Symbol size in bytes (`st_size`)
    pub size: u64,
    /// Symbol classification
    pub kind: SymbolKind,
}

/// Programming language associated with a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    /// Rust symbol (detected via mangling or namespace patterns).
    Rust,
    /// C++ symbol (Itanium mangling without Rust extensions).
    Cpp,
    /// C symbol or unmangled global.
    C,
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::C => "c",
        };
        write!(f, "{label}")
    }
}

/// A function name with demangling metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolName
{
    raw: String,
    demangled: Option<String>,
    language: SymbolLanguage,
}

impl SymbolName
{
    /// Construct from a raw linkage name.
    pub fn new(raw: String, demangled: Option<String>, language: SymbolLanguage) -> Self
    {
        Self {
            raw,
            demangled,
            language,
        }
    }

    /// Raw (possibly mangled) name emitted in the object file.
    pub fn raw(&self) -> &str
    {
        &self.raw
    }

    /// Demangled human-friendly name if available.
    pub fn demangled(&self) -> Option<&str>
    {
        self.demangled.as_deref()
    }

    /// Preferred presentation (demangled fallback to raw).
    pub fn display_name(&self) -> &str
    {
        self.demangled.as_deref().unwrap_or(&self.raw)
    }

    /// Language classification for the symbol.
    pub fn language(&self) -> SymbolLanguage
    {
        self.language
    }
}

impl fmt::Display for SymbolName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.display_name())
    }
}

/// Result of mapping an instruction address back to the source.
///
/// `line` is 0-based and `-1` when no line-table row covers the address;
/// `file_path` and `function_name` are `None` when not found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo
{
    /// Primary source path of the compilation unit whose line table matched
    pub file_path: Option<String>,
    /// 0-based source line, `-1` when unknown
    pub line: i64,
    /// Name of the enclosing subprogram
    pub function_name: Option<String>,
}

impl SourceInfo
{
    /// The "nothing found" result.
    pub const UNKNOWN: Self = SourceInfo {
        file_path: None,
        line: -1,
        function_name: None,
    };

    /// Whether a line-table row covered the address.
    pub fn has_line(&self) -> bool
    {
        self.line >= 0
    }

    /// Enclosing function name with demangling and language detection.
    pub fn function_symbol(&self) -> Option<SymbolName>
    {
        self.function_name
            .as_ref()
            .map(|name| crate::symbols::demangle::make_symbol_name(name.clone()))
    }
}
