//! # Source Location Resolver
//!
//! Maps an instruction address to the source file, line and enclosing
//! function, using the compiled line tables and the subprogram ranges.
//!
//! ## Search
//!
//! Units are scanned in order; units without a line table are skipped.
//!
//! - **Line**: consecutive rows `prev`, `row` of one sequence match when
//!   `prev.address <= address < row.address`, giving `prev.line` and the
//!   unit's primary source path. An end-of-sequence row starts a new run.
//!   The scan of a unit is skipped once some earlier unit supplied the line;
//!   within one unit the last matching pair wins.
//! - **Function**: the first subprogram whose `[low_pc, high_pc)` holds the
//!   address. A constant-class `high_pc` is a length from `low_pc`, an
//!   address-class one is the end address itself.
//!
//! The scan ends at the unit that supplies the function.
//!
//! ## Line numbering
//!
//! Line tables count from 1; [`SourceInfo::line`] counts from 0 and uses -1
//! for "no row covers the address".

use gimli::constants;
use tracing::trace;

use super::entry::{AttrValue, CompileUnit, DebugEntry, DebugInfo, EntryTag, LineRow};
use crate::types::SourceInfo;

/// Resolve `address` against every unit of `info`.
pub fn resolve_source(info: &DebugInfo, address: u64) -> SourceInfo
{
    let mut found = SourceInfo::UNKNOWN;
    let mut line: Option<u64> = None;

    for unit in info.units() {
        let Some(rows) = unit.lines.as_deref() else {
            continue;
        };

        if line.is_none() {
            if let Some(hit) = line_in_sequence(rows, address) {
                trace!("Address {address:#x} maps to line {hit} of {:?}", unit.path);
                line = Some(hit);
                found.file_path.clone_from(&unit.path);
            }
        }

        if let Some(name) = function_in_unit(unit, address) {
            found.function_name = Some(name.to_string());
            break;
        }
    }

    found.line = line.map_or(-1, |line| i64::try_from(line).map_or(-1, |line| line - 1));
    found
}

fn line_in_sequence(rows: &[LineRow], address: u64) -> Option<u64>
{
    let mut hit = None;
    let mut prev: Option<&LineRow> = None;
    for row in rows {
        if let Some(prev) = prev {
            if prev.address <= address && address < row.address {
                hit = Some(prev.line);
            }
        }
        prev = if row.end_sequence { None } else { Some(row) };
    }
    hit
}

fn function_in_unit(unit: &CompileUnit, address: u64) -> Option<&str>
{
    unit.entries
        .iter()
        .filter(|entry| entry.tag == EntryTag::Subprogram)
        .find_map(|entry| {
            let (low, high) = pc_range(entry)?;
            if (low..high).contains(&address) {
                entry.name()
            } else {
                None
            }
        })
}

/// `[low_pc, high_pc)` of a subprogram, if both bounds are usable.
pub(crate) fn pc_range(entry: &DebugEntry) -> Option<(u64, u64)>
{
    let AttrValue::Address(low) = *entry.attr(constants::DW_AT_low_pc)? else {
        return None;
    };
    let high = match entry.attr(constants::DW_AT_high_pc)? {
        AttrValue::Address(high) => *high,
        constant @ (AttrValue::Data1(_) | AttrValue::Unsigned(_) | AttrValue::Signed(_)) => {
            low.checked_add(constant.as_u64()?)?
        }
        _ => return None,
    };
    Some((low, high))
}
