//! Conversion of gimli's unit and entry readers into the owned entry model.
//!
//! Attribute values are taken in their raw form so the distinctions the model
//! relies on survive: a one-byte constant stays `Data1`, a location
//! expression stays a block, and `DW_AT_high_pc` keeps its form class.

use std::path::Path;

use gimli::{constants, Attribute, AttributeValue, Reader, Unit, UnitOffset};
use tracing::{debug, warn};

use super::demangle::map_dwarf_error;
use super::entry::{AttrValue, CompileUnit, DebugEntry, DebugInfo, EntryOffset, EntryTag, LineRow};
use super::{OwnedDwarf, OwnedReader};
use crate::error::ScopeResult;

/// Read every compilation unit of `.debug_info`.
pub fn read_debug_info(dwarf: &OwnedDwarf) -> ScopeResult<DebugInfo>
{
    let mut units = Vec::new();
    let mut headers = dwarf.units();
    while let Some(header) = headers
        .next()
        .map_err(|err| map_dwarf_error("reading .debug_info unit header", err))?
    {
        let unit = dwarf
            .unit(header)
            .map_err(|err| map_dwarf_error("parsing compilation unit", err))?;
        units.push(read_unit(dwarf, &unit)?);
    }
    Ok(DebugInfo::new(units))
}

fn read_unit(dwarf: &OwnedDwarf, unit: &Unit<OwnedReader>) -> ScopeResult<CompileUnit>
{
    let mut entries = Vec::new();
    let mut ancestors: Vec<EntryOffset> = Vec::new();
    let mut depth: isize = 0;

    let mut cursor = unit.entries();
    while let Some((delta, entry)) = cursor.next_dfs().map_err(|err| map_dwarf_error("traversing DIE tree", err))? {
        depth += delta;
        let level = usize::try_from(depth).unwrap_or(0);
        ancestors.truncate(level);

        let offset = global_offset(unit, entry.offset());
        let mut record = DebugEntry::new(offset, EntryTag::from(entry.tag()));
        record.depth = level;
        record.parent = ancestors.last().copied();

        let mut attrs = entry.attrs();
        while let Some(attr) = attrs.next().map_err(|err| map_dwarf_error("reading attributes", err))? {
            let value = attr_value(dwarf, unit, &attr)?;
            record.attributes.push((attr.name(), value));
        }

        ancestors.push(offset);
        entries.push(record);
    }

    let path = entries.first().and_then(unit_path);
    let lines = read_lines(unit, path.as_deref());
    debug!(
        "Read unit {} with {} entries and {} line rows",
        path.as_deref().unwrap_or("<unnamed>"),
        entries.len(),
        lines.as_ref().map_or(0, Vec::len)
    );

    Ok(CompileUnit { path, entries, lines })
}

/// `DW_AT_comp_dir` joined with `DW_AT_name` of the unit root.
fn unit_path(root: &DebugEntry) -> Option<String>
{
    let name = root.name()?;
    let joined = match root.attr(constants::DW_AT_comp_dir).and_then(AttrValue::as_str) {
        Some(dir) => Path::new(dir).join(name),
        None => Path::new(name).to_path_buf(),
    };
    Some(joined.to_string_lossy().into_owned())
}

/// Rows of the unit's line program; a program that fails to decode is
/// treated like a missing one.
fn read_lines(unit: &Unit<OwnedReader>, path: Option<&str>) -> Option<Vec<LineRow>>
{
    let program = unit.line_program.clone()?;
    let mut rows = program.rows();
    let mut lines = Vec::new();
    loop {
        match rows.next_row() {
            Ok(Some((_, row))) => lines.push(LineRow {
                address: row.address(),
                line: row.line().map_or(0, |line| line.get()),
                end_sequence: row.end_sequence(),
            }),
            Ok(None) => return Some(lines),
            Err(err) => {
                warn!("Ignoring line program of {}: {err}", path.unwrap_or("<unnamed>"));
                return None;
            }
        }
    }
}

fn global_offset(unit: &Unit<OwnedReader>, offset: UnitOffset) -> EntryOffset
{
    let global = offset
        .to_debug_info_offset(&unit.header)
        .map_or(offset.0, |global| global.0);
    EntryOffset(global as u64)
}

fn attr_value(dwarf: &OwnedDwarf, unit: &Unit<OwnedReader>, attr: &Attribute<OwnedReader>) -> ScopeResult<AttrValue>
{
    let value = match attr.raw_value() {
        AttributeValue::Addr(address) => AttrValue::Address(address),
        AttributeValue::DebugAddrIndex(index) => AttrValue::Address(
            dwarf
                .address(unit, index)
                .map_err(|err| map_dwarf_error("resolving .debug_addr index", err))?,
        ),
        AttributeValue::Data1(value) => AttrValue::Data1(value),
        AttributeValue::Data2(value) => AttrValue::Unsigned(u64::from(value)),
        AttributeValue::Data4(value) => AttrValue::Unsigned(u64::from(value)),
        AttributeValue::Data8(value) | AttributeValue::Udata(value) => AttrValue::Unsigned(value),
        AttributeValue::Sdata(value) => AttrValue::Signed(value),
        AttributeValue::Block(bytes) | AttributeValue::Exprloc(gimli::Expression(bytes)) => AttrValue::Block(
            bytes
                .to_slice()
                .map_err(|err| map_dwarf_error("reading block attribute", err))?
                .into_owned(),
        ),
        AttributeValue::Flag(flag) => AttrValue::Flag(flag),
        AttributeValue::UnitRef(offset) => AttrValue::Reference(global_offset(unit, offset)),
        AttributeValue::DebugInfoRef(offset) => AttrValue::Reference(EntryOffset(offset.0 as u64)),
        value @ (AttributeValue::String(_)
        | AttributeValue::DebugStrRef(_)
        | AttributeValue::DebugStrRefSup(_)
        | AttributeValue::DebugStrOffsetsIndex(_)
        | AttributeValue::DebugLineStrRef(_)) => AttrValue::String(attr_to_string(dwarf, unit, value)?),
        _ => AttrValue::Other,
    };
    Ok(value)
}

fn attr_to_string(dwarf: &OwnedDwarf, unit: &Unit<OwnedReader>, value: AttributeValue<OwnedReader>) -> ScopeResult<String>
{
    let reader = dwarf
        .attr_string(unit, value)
        .map_err(|err| map_dwarf_error("resolving DWARF string", err))?;
    let owned = match reader.to_string() {
        Ok(cow) => cow.into_owned(),
        Err(_) => reader
            .to_string_lossy()
            .map_err(|err| map_dwarf_error("decoding DWARF string", err))?
            .into_owned(),
    };
    Ok(owned)
}
