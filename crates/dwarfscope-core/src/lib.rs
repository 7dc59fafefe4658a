//! # dwarfscope-core
//!
//! Queryable model of the symbols, C type layouts and source locations
//! described by the debug information of an ELF binary.
//!
//! The whole file is loaded once by [`BinaryImage::open`]; afterwards the
//! model is read-only:
//!
//! - **Symbols**: exact-name lookup plus the `FILE` and `OBJECT` listings
//! - **Variables**: global variables that have both a debug entry and a symbol,
//!   with their address and type
//! - **Types**: base types, typedefs, structures (with bit-fields), unions,
//!   enumerations, arrays, pointers, const qualifiers and subroutine types,
//!   linked by name
//! - **Source locations**: file, line and enclosing function of an address
//! - **Loadable image**: the `PT_LOAD` segments concatenated in address order
//!
//! ## Example
//!
//! ```rust,no_run
//! use dwarfscope_core::BinaryImage;
//!
//! let image = BinaryImage::open("firmware.elf")?;
//! for variable in image.variables() {
//!     println!("{} @ {}", variable.name, variable.address);
//! }
//! let location = image.get_source_info(0x0800_0100);
//! println!("{:?}:{} in {:?}", location.file_path, location.line, location.function_name);
//! # Ok::<(), dwarfscope_core::ScopeError>(())
//! ```

pub mod error;
pub mod prelude;
pub mod symbols;
pub mod types;

// Re-export commonly used types
pub use error::{ScopeError, ScopeResult};
pub use symbols::{BinaryImage, Resolved, TypeNode, TypeRef, Variable};
pub use types::{Address, SourceInfo, Symbol, SymbolKind};
