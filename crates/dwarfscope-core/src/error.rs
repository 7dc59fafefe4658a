//! # Error Types
//!
//! Error handling for loading a binary and building its debug model.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::symbols::entry::EntryOffset;

/// Main error type for dwarfscope operations
///
/// Errors fall in three groups that are handled differently:
///
/// 1. **Query errors**: `SymbolNotFound`, `VariableNotFound`. Returned to the
///    caller that asked for a name the model does not contain.
/// 2. **Per-entry errors**: `UnsupportedDebugTag`, `MalformedFieldOffset`,
///    `DanglingTypeReference`. Raised while walking the debug-entry tree; the
///    build pass logs them, keeps them in
///    [`BinaryImage::diagnostics`](crate::symbols::BinaryImage::diagnostics) and
///    moves on to the next entry.
/// 3. **Whole-file errors**: `UnreadableBinary`, `Io`. Abort loading.
///
/// Unresolved type references are not errors at all: the resolver hands back
/// the bare name instead.
#[derive(Error, Debug)]
pub enum ScopeError
{
    /// No symbol with this name exists in any symbol table of the binary
    #[error("symbol {0} not found")]
    SymbolNotFound(String),

    /// No variable with this name was materialized from the debug entries
    ///
    /// Variables only exist when both a `DW_TAG_variable` entry and an
    /// exported symbol of the same name are present.
    #[error("variable {0} not found")]
    VariableNotFound(String),

    /// A debug entry carries a tag with no handler
    ///
    /// Toolchains occasionally emit vendor-specific or rarely used tags. The
    /// offending entry is skipped and the walk continues.
    #[error("unsupported debug tag {tag} at offset {offset} (parent: {parent})")]
    UnsupportedDebugTag
    {
        /// Tag name, e.g. `DW_TAG_namespace`
        tag: String,
        /// Offset of the offending entry
        offset: EntryOffset,
        /// Description of the enclosing entry
        parent: String,
    },

    /// A structure member encodes its byte offset in an unsupported form
    ///
    /// Only block-encoded location expressions and single-byte constants are
    /// understood. The field is omitted rather than defaulted to zero.
    #[error("malformed field offset at {offset}: unsupported form {form}")]
    MalformedFieldOffset
    {
        /// Offset of the member entry
        offset: EntryOffset,
        /// Description of the rejected encoding
        form: String,
    },

    /// A type attribute points at an offset that holds no entry
    #[error("entry at {offset} references missing entry {target}")]
    DanglingTypeReference
    {
        /// Offset of the referencing entry
        offset: EntryOffset,
        /// The offset that could not be found
        target: EntryOffset,
    },

    /// The container or its debug sections could not be decoded
    #[error("unreadable binary: {0}")]
    UnreadableBinary(String),

    /// I/O error while opening or mapping the file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScopeError
{
    /// Whether this error belongs to a single debug entry rather than the file
    ///
    /// Per-entry errors are collected during the build pass instead of being
    /// propagated.
    #[must_use]
    pub fn is_per_entry(&self) -> bool
    {
        matches!(
            self,
            ScopeError::UnsupportedDebugTag { .. }
                | ScopeError::MalformedFieldOffset { .. }
                | ScopeError::DanglingTypeReference { .. }
        )
    }
}

/// Convenience type alias for `Result<T, ScopeError>`
///
/// ```rust
/// use dwarfscope_core::error::ScopeResult;
/// fn foo() -> ScopeResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type ScopeResult<T> = std::result::Result<T, ScopeError>;
