//! In-memory debug entry fixtures for unit tests.

use gimli::{constants, DwAt};

use super::entry::{AttrValue, CompileUnit, DebugEntry, DebugInfo, EntryOffset, EntryTag, LineRow};

pub(crate) const ROOT: EntryOffset = EntryOffset(11);

/// Builds one compilation unit entry by entry, in pre-order.
pub(crate) struct UnitFixture
{
    unit: CompileUnit,
}

impl UnitFixture
{
    pub(crate) fn new() -> Self
    {
        let root = DebugEntry::new(ROOT, EntryTag::CompileUnit);
        Self {
            unit: CompileUnit {
                path: Some("/work/src/main.c".to_string()),
                entries: vec![root],
                lines: None,
            },
        }
    }

    /// Append an entry below `parent`, which must already be present.
    pub(crate) fn add(&mut self, parent: EntryOffset, offset: u64, tag: EntryTag, attrs: &[(DwAt, AttrValue)]) -> EntryOffset
    {
        let parent = self
            .unit
            .entries
            .iter()
            .find(|entry| entry.offset == parent)
            .cloned()
            .unwrap_or_else(|| panic!("fixture parent {parent} missing"));
        let mut entry = DebugEntry::new(EntryOffset(offset), tag).with_parent(&parent);
        for (name, value) in attrs {
            entry = entry.with_attr(*name, value.clone());
        }
        self.unit.entries.push(entry);
        EntryOffset(offset)
    }

    pub(crate) fn lines(mut self, rows: &[(u64, u64, bool)]) -> Self
    {
        self.unit.lines = Some(
            rows.iter()
                .map(|&(address, line, end_sequence)| LineRow {
                    address,
                    line,
                    end_sequence,
                })
                .collect(),
        );
        self
    }

    pub(crate) fn path(mut self, path: &str) -> Self
    {
        self.unit.path = Some(path.to_string());
        self
    }

    pub(crate) fn finish(self) -> CompileUnit
    {
        self.unit
    }

    pub(crate) fn into_info(self) -> DebugInfo
    {
        DebugInfo::new(vec![self.unit])
    }
}

pub(crate) fn name(value: &str) -> (DwAt, AttrValue)
{
    (constants::DW_AT_name, AttrValue::String(value.to_string()))
}

pub(crate) fn type_of(target: EntryOffset) -> (DwAt, AttrValue)
{
    (constants::DW_AT_type, AttrValue::Reference(target))
}

pub(crate) fn byte_size(size: u64) -> (DwAt, AttrValue)
{
    (constants::DW_AT_byte_size, AttrValue::Unsigned(size))
}

pub(crate) fn udata(attr: DwAt, value: u64) -> (DwAt, AttrValue)
{
    (attr, AttrValue::Unsigned(value))
}

/// `DW_AT_data_member_location` as a `DW_OP_plus_uconst` expression.
pub(crate) fn location_expr(offset: u8) -> (DwAt, AttrValue)
{
    (
        constants::DW_AT_data_member_location,
        AttrValue::Block(vec![constants::DW_OP_plus_uconst.0, offset]),
    )
}

pub(crate) fn location_data1(offset: u8) -> (DwAt, AttrValue)
{
    (constants::DW_AT_data_member_location, AttrValue::Data1(offset))
}
