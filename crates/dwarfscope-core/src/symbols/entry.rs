//! # Debug Entry Model
//!
//! Flat, owned representation of the DWARF entry tree.
//!
//! The reader turns every compilation unit into a pre-order list of
//! [`DebugEntry`] records. Each record keeps its section-global offset, its
//! tag, its depth, its parent and the raw attribute values that the builder
//! and the source resolver look at. Keeping the model independent of gimli's
//! borrowed readers lets the type graph be built (and tested) from plain data.

use std::collections::HashMap;
use std::fmt;

use gimli::{constants, DwAt, DwTag};
use smallvec::SmallVec;

/// Section-global offset of an entry in `.debug_info`
///
/// Offsets are unique within one binary, which makes them usable both as a
/// lookup key and as the suffix of synthesized `anonymous_<offset>` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryOffset(pub u64);

impl EntryOffset
{
    /// Synthesized name for an entry without `DW_AT_name`.
    pub fn anonymous_name(self) -> String
    {
        format!("anonymous_{}", self.0)
    }
}

impl fmt::Display for EntryOffset
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Tag of a debug entry
///
/// The modeled tags are spelled out so the builder's dispatch is an exhaustive
/// `match`; everything else lands in `Other` and is reported as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryTag
{
    CompileUnit,
    BaseType,
    Typedef,
    StructureType,
    UnionType,
    Member,
    EnumerationType,
    Enumerator,
    ArrayType,
    SubrangeType,
    PointerType,
    ConstType,
    VolatileType,
    SubroutineType,
    FormalParameter,
    Subprogram,
    LexicalBlock,
    Variable,
    Other(DwTag),
}

impl EntryTag
{
    /// The DWARF constant for this tag.
    pub fn dw_tag(self) -> DwTag
    {
        match self {
            EntryTag::CompileUnit => constants::DW_TAG_compile_unit,
            EntryTag::BaseType => constants::DW_TAG_base_type,
            EntryTag::Typedef => constants::DW_TAG_typedef,
            EntryTag::StructureType => constants::DW_TAG_structure_type,
            EntryTag::UnionType => constants::DW_TAG_union_type,
            EntryTag::Member => constants::DW_TAG_member,
            EntryTag::EnumerationType => constants::DW_TAG_enumeration_type,
            EntryTag::Enumerator => constants::DW_TAG_enumerator,
            EntryTag::ArrayType => constants::DW_TAG_array_type,
            EntryTag::SubrangeType => constants::DW_TAG_subrange_type,
            EntryTag::PointerType => constants::DW_TAG_pointer_type,
            EntryTag::ConstType => constants::DW_TAG_const_type,
            EntryTag::VolatileType => constants::DW_TAG_volatile_type,
            EntryTag::SubroutineType => constants::DW_TAG_subroutine_type,
            EntryTag::FormalParameter => constants::DW_TAG_formal_parameter,
            EntryTag::Subprogram => constants::DW_TAG_subprogram,
            EntryTag::LexicalBlock => constants::DW_TAG_lexical_block,
            EntryTag::Variable => constants::DW_TAG_variable,
            EntryTag::Other(tag) => tag,
        }
    }

    /// Tags whose entries are structurally anonymous when used as a type
    /// reference target, even if they carry a name.
    pub fn is_type_wrapper(self) -> bool
    {
        matches!(self, EntryTag::ArrayType | EntryTag::PointerType | EntryTag::ConstType)
    }
}

impl From<DwTag> for EntryTag
{
    fn from(tag: DwTag) -> Self
    {
        match tag {
            constants::DW_TAG_compile_unit => EntryTag::CompileUnit,
            constants::DW_TAG_base_type => EntryTag::BaseType,
            constants::DW_TAG_typedef => EntryTag::Typedef,
            constants::DW_TAG_structure_type => EntryTag::StructureType,
            constants::DW_TAG_union_type => EntryTag::UnionType,
            constants::DW_TAG_member => EntryTag::Member,
            constants::DW_TAG_enumeration_type => EntryTag::EnumerationType,
            constants::DW_TAG_enumerator => EntryTag::Enumerator,
            constants::DW_TAG_array_type => EntryTag::ArrayType,
            constants::DW_TAG_subrange_type => EntryTag::SubrangeType,
            constants::DW_TAG_pointer_type => EntryTag::PointerType,
            constants::DW_TAG_const_type => EntryTag::ConstType,
            constants::DW_TAG_volatile_type => EntryTag::VolatileType,
            constants::DW_TAG_subroutine_type => EntryTag::SubroutineType,
            constants::DW_TAG_formal_parameter => EntryTag::FormalParameter,
            constants::DW_TAG_subprogram => EntryTag::Subprogram,
            constants::DW_TAG_lexical_block => EntryTag::LexicalBlock,
            constants::DW_TAG_variable => EntryTag::Variable,
            other => EntryTag::Other(other),
        }
    }
}

impl fmt::Display for EntryTag
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.dw_tag().static_string() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "DW_TAG_unknown_{:#x}", self.dw_tag().0),
        }
    }
}

/// Attribute value, keeping the form distinctions the model relies on
///
/// - `Data1` is separate from other unsigned constants because a member's
///   byte offset accepts the single-byte form only.
/// - `Block` covers `DW_FORM_block*` and `DW_FORM_exprloc`.
/// - `Address` is the address form class; `Data1`/`Unsigned`/`Signed` are the
///   constant class (this decides how `DW_AT_high_pc` is read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue
{
    Address(u64),
    Data1(u8),
    Unsigned(u64),
    Signed(i64),
    Block(Vec<u8>),
    String(String),
    Reference(EntryOffset),
    Flag(bool),
    Other,
}

impl AttrValue
{
    /// Value as an unsigned constant, for any constant form.
    pub fn as_u64(&self) -> Option<u64>
    {
        match *self {
            AttrValue::Data1(value) => Some(u64::from(value)),
            AttrValue::Unsigned(value) => Some(value),
            AttrValue::Signed(value) => u64::try_from(value).ok(),
            _ => None,
        }
    }

    /// Value as a signed constant, for any constant form.
    pub fn as_i64(&self) -> Option<i64>
    {
        match *self {
            AttrValue::Data1(value) => Some(i64::from(value)),
            AttrValue::Unsigned(value) => i64::try_from(value).ok(),
            AttrValue::Signed(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str>
    {
        match self {
            AttrValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Short description of the encoding, used in error messages.
    pub fn form_name(&self) -> &'static str
    {
        match self {
            AttrValue::Address(_) => "address",
            AttrValue::Data1(_) => "data1",
            AttrValue::Unsigned(_) => "unsigned constant",
            AttrValue::Signed(_) => "signed constant",
            AttrValue::Block(_) => "block",
            AttrValue::String(_) => "string",
            AttrValue::Reference(_) => "reference",
            AttrValue::Flag(_) => "flag",
            AttrValue::Other => "other",
        }
    }
}

/// One node of the debug-information tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugEntry
{
    pub offset: EntryOffset,
    pub tag: EntryTag,
    /// Depth below the unit root (the root itself is 0)
    pub depth: usize,
    pub parent: Option<EntryOffset>,
    pub attributes: SmallVec<[(DwAt, AttrValue); 8]>,
}

impl DebugEntry
{
    pub fn new(offset: EntryOffset, tag: EntryTag) -> Self
    {
        Self {
            offset,
            tag,
            depth: 0,
            parent: None,
            attributes: SmallVec::new(),
        }
    }

    /// Place this entry below `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: &DebugEntry) -> Self
    {
        self.parent = Some(parent.offset);
        self.depth = parent.depth + 1;
        self
    }

    #[must_use]
    pub fn with_attr(mut self, name: DwAt, value: AttrValue) -> Self
    {
        self.attributes.push((name, value));
        self
    }

    pub fn attr(&self, name: DwAt) -> Option<&AttrValue>
    {
        self.attributes
            .iter()
            .find_map(|(attr, value)| (*attr == name).then_some(value))
    }

    pub fn has_attr(&self, name: DwAt) -> bool
    {
        self.attr(name).is_some()
    }

    /// Decoded `DW_AT_name`, if any.
    pub fn name(&self) -> Option<&str>
    {
        self.attr(constants::DW_AT_name).and_then(AttrValue::as_str)
    }

    /// `DW_AT_name`, or the synthesized `anonymous_<offset>`.
    pub fn name_or_anonymous(&self) -> String
    {
        self.name()
            .map_or_else(|| self.offset.anonymous_name(), str::to_owned)
    }

    /// Target offset of `DW_AT_type`, if the attribute is a reference.
    pub fn type_reference(&self) -> Option<EntryOffset>
    {
        match self.attr(constants::DW_AT_type) {
            Some(AttrValue::Reference(target)) => Some(*target),
            _ => None,
        }
    }

    pub fn udata(&self, name: DwAt) -> Option<u64>
    {
        self.attr(name).and_then(AttrValue::as_u64)
    }
}

/// One row of a compiled line-number program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRow
{
    pub address: u64,
    /// 1-based line; 0 when the row is not attributable to a source line
    pub line: u64,
    pub end_sequence: bool,
}

/// One compilation unit: its entries in pre-order and its line rows.
#[derive(Debug, Clone, Default)]
pub struct CompileUnit
{
    /// Primary source path (`DW_AT_comp_dir` joined with `DW_AT_name`)
    pub path: Option<String>,
    pub entries: Vec<DebugEntry>,
    /// `None` when the unit has no line-number program
    pub lines: Option<Vec<LineRow>>,
}

/// All compilation units of a binary, with an offset index across them.
#[derive(Debug, Default)]
pub struct DebugInfo
{
    units: Vec<CompileUnit>,
    index: HashMap<EntryOffset, (usize, usize)>,
}

impl DebugInfo
{
    pub fn new(units: Vec<CompileUnit>) -> Self
    {
        let mut index = HashMap::new();
        for (unit_index, unit) in units.iter().enumerate() {
            for (entry_index, entry) in unit.entries.iter().enumerate() {
                index.insert(entry.offset, (unit_index, entry_index));
            }
        }
        Self { units, index }
    }

    pub fn units(&self) -> &[CompileUnit]
    {
        &self.units
    }

    pub fn entry(&self, offset: EntryOffset) -> Option<&DebugEntry>
    {
        let (unit, entry) = *self.index.get(&offset)?;
        self.units.get(unit)?.entries.get(entry)
    }

    pub fn entry_count(&self) -> usize
    {
        self.index.len()
    }

    /// Human-readable description of an entry's parent, for diagnostics.
    pub fn describe_parent(&self, entry: &DebugEntry) -> String
    {
        match entry.parent.and_then(|parent| self.entry(parent)) {
            Some(parent) => format!("{} @ {}", parent.tag, parent.offset),
            None => "none".to_string(),
        }
    }
}

/// Positionable pre-order iterator over one unit's entries
///
/// Handlers that own children advance the same cursor the main walk uses, so
/// consumed children are never dispatched again.
#[derive(Debug, Clone)]
pub struct EntryCursor<'a>
{
    entries: &'a [DebugEntry],
    position: usize,
}

impl<'a> EntryCursor<'a>
{
    pub fn new(entries: &'a [DebugEntry]) -> Self
    {
        Self { entries, position: 0 }
    }

    pub fn peek(&self) -> Option<&'a DebugEntry>
    {
        self.entries.get(self.position)
    }

    /// Consume the next entry if it is a direct child of `parent` with `tag`.
    pub fn next_child_of(&mut self, parent: &DebugEntry, tag: EntryTag) -> Option<&'a DebugEntry>
    {
        let next = self.peek()?;
        if next.parent == Some(parent.offset) && next.tag == tag {
            self.position += 1;
            Some(next)
        } else {
            None
        }
    }

    /// Consume every entry nested below `entry`; returns how many were skipped.
    pub fn skip_descendants_of(&mut self, entry: &DebugEntry) -> usize
    {
        let start = self.position;
        while self.peek().is_some_and(|next| next.depth > entry.depth) {
            self.position += 1;
        }
        self.position - start
    }
}

impl<'a> Iterator for EntryCursor<'a>
{
    type Item = &'a DebugEntry;

    fn next(&mut self) -> Option<Self::Item>
    {
        let entry = self.entries.get(self.position)?;
        self.position += 1;
        Some(entry)
    }
}
