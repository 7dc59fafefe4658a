//! Memory address type.

use std::fmt;

use serde::Serialize;

/// Strongly typed target address
///
/// This wrapper around `u64` keeps addresses taken from the symbol table, the
/// ELF header and the line program from being mixed up with sizes or offsets.
///
/// Addresses print as `0x` followed by at least eight upper-case hex digits,
/// which is the usual presentation for 32-bit embedded targets.
///
/// ## Example
///
/// ```rust
/// use dwarfscope_core::types::Address;
///
/// let addr = Address::from(0x0840_0000);
/// assert_eq!(addr.to_string(), "0x08400000");
/// assert_eq!(Address::new(12).to_string(), "0x0000000C");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// This is equivalent to `Address::from(value)` but can be used in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08X}", self.0)
    }
}
