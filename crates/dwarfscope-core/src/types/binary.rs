//! Container-level metadata of a loaded binary.

use std::fmt;

use serde::Serialize;

/// Byte order of the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness
{
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

impl From<gimli::RunTimeEndian> for Endianness
{
    fn from(endian: gimli::RunTimeEndian) -> Self
    {
        match endian {
            gimli::RunTimeEndian::Little => Endianness::Little,
            gimli::RunTimeEndian::Big => Endianness::Big,
        }
    }
}

impl fmt::Display for Endianness
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        };
        write!(f, "{label}")
    }
}

/// ABI identification from the ELF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbiInfo
{
    /// `e_machine`
    pub machine: u16,
    /// `e_version`
    pub version: u32,
}

impl AbiInfo
{
    /// Symbolic name of `e_machine` for the common architectures.
    pub fn machine_name(&self) -> &'static str
    {
        use object::elf;

        match self.machine {
            elf::EM_NONE => "EM_NONE",
            elf::EM_386 => "EM_386",
            elf::EM_68K => "EM_68K",
            elf::EM_MIPS => "EM_MIPS",
            elf::EM_PPC => "EM_PPC",
            elf::EM_PPC64 => "EM_PPC64",
            elf::EM_ARM => "EM_ARM",
            elf::EM_SH => "EM_SH",
            elf::EM_SPARC => "EM_SPARC",
            elf::EM_TRICORE => "EM_TRICORE",
            elf::EM_X86_64 => "EM_X86_64",
            elf::EM_AVR => "EM_AVR",
            elf::EM_MSP430 => "EM_MSP430",
            elf::EM_AARCH64 => "EM_AARCH64",
            elf::EM_RISCV => "EM_RISCV",
            _ => "EM_UNKNOWN",
        }
    }

    /// Symbolic name of `e_version`.
    pub fn version_name(&self) -> &'static str
    {
        match self.version {
            0 => "EV_NONE",
            1 => "EV_CURRENT",
            _ => "EV_UNKNOWN",
        }
    }
}

impl fmt::Display for AbiInfo
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} ({})", self.machine_name(), self.version_name())
    }
}
