//! End-to-end tests that load small ELF files written on the fly
//!
//! Each file is a 32-bit ARM relocatable object carrying one compilation unit
//! of DWARF 4 and a handful of absolute data symbols. The unit's line program,
//! when present, maps `main` as:
//!
//! | address      | line |
//! |--------------|------|
//! | `0x08000100` | 10   |
//! | `0x08000110` | 12   |
//! | `0x08000140` | end of sequence |

use std::io::Write;

use dwarfscope_core::prelude::*;
use dwarfscope_core::symbols::EntryTag;
use gimli::constants::*;
use gimli::write::{
    Address as DwarfAddress, AttributeValue, DwarfUnit, EndianVec, LineProgram, LineString, Sections, Unit, UnitEntryId,
};
use gimli::{DwAt, DwTag, Encoding, Format, LineEncoding, RunTimeEndian};
use object::write::{Object, Symbol as ObjectSymbol, SymbolSection};
use object::{Architecture, BinaryFormat, SectionKind, SymbolFlags, SymbolScope};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::NamedTempFile;

const ORIGIN_ADDRESS: u64 = 0x0840_0000;
const TABLE_ADDRESS: u64 = 0x0840_0008;
const STATUS_ADDRESS: u64 = 0x0840_0018;
const MAIN_LOW_PC: u64 = 0x0800_0100;
const MAIN_LENGTH: u64 = 0x40;

fn add(unit: &mut Unit, parent: UnitEntryId, tag: DwTag, attrs: Vec<(DwAt, AttributeValue)>) -> UnitEntryId
{
    let id = unit.add(parent, tag);
    let entry = unit.get_mut(id);
    for (name, value) in attrs {
        entry.set(name, value);
    }
    id
}

fn string(value: &str) -> AttributeValue
{
    AttributeValue::String(value.as_bytes().to_vec())
}

/// `.debug_*` sections describing:
///
/// ```c
/// struct point { int x; int y; };
/// typedef struct point point_t;
/// point_t g_origin;
/// int g_table[4];
/// struct broken { int ok; int bad; } g_status;   /* `bad` has an sdata offset */
/// int g_unused;                                  /* no symbol */
/// int main(void) { ... }                         /* 0x08000100..0x08000140 */
/// ```
fn debug_sections(endian: RunTimeEndian, with_lines: bool) -> Vec<(&'static str, Vec<u8>)>
{
    let encoding = Encoding {
        format: Format::Dwarf32,
        version: 4,
        address_size: 4,
    };
    let mut dwarf = DwarfUnit::new(encoding);
    if with_lines {
        dwarf.unit.line_program = main_line_program(encoding);
    }
    let unit = &mut dwarf.unit;
    let root = unit.root();
    unit.get_mut(root).set(DW_AT_name, string("main.c"));
    unit.get_mut(root).set(DW_AT_comp_dir, string("/work/src"));

    let int = add(unit, root, DW_TAG_base_type, vec![
        (DW_AT_name, string("int")),
        (DW_AT_byte_size, AttributeValue::Data1(4)),
    ]);

    let point = add(unit, root, DW_TAG_structure_type, vec![
        (DW_AT_name, string("point")),
        (DW_AT_byte_size, AttributeValue::Data1(8)),
    ]);
    add(unit, point, DW_TAG_member, vec![
        (DW_AT_name, string("x")),
        (DW_AT_type, AttributeValue::UnitRef(int)),
        (DW_AT_data_member_location, AttributeValue::Block(vec![0x23, 0])),
    ]);
    add(unit, point, DW_TAG_member, vec![
        (DW_AT_name, string("y")),
        (DW_AT_type, AttributeValue::UnitRef(int)),
        (DW_AT_data_member_location, AttributeValue::Data1(4)),
    ]);

    let point_t = add(unit, root, DW_TAG_typedef, vec![
        (DW_AT_name, string("point_t")),
        (DW_AT_type, AttributeValue::UnitRef(point)),
    ]);
    add(unit, root, DW_TAG_variable, vec![
        (DW_AT_name, string("g_origin")),
        (DW_AT_type, AttributeValue::UnitRef(point_t)),
    ]);

    let table = add(unit, root, DW_TAG_array_type, vec![(DW_AT_type, AttributeValue::UnitRef(int))]);
    add(unit, table, DW_TAG_subrange_type, vec![(DW_AT_upper_bound, AttributeValue::Data1(3))]);
    add(unit, root, DW_TAG_variable, vec![
        (DW_AT_name, string("g_table")),
        (DW_AT_type, AttributeValue::UnitRef(table)),
    ]);

    let broken = add(unit, root, DW_TAG_structure_type, vec![
        (DW_AT_name, string("broken")),
        (DW_AT_byte_size, AttributeValue::Data1(8)),
    ]);
    add(unit, broken, DW_TAG_member, vec![
        (DW_AT_name, string("ok")),
        (DW_AT_type, AttributeValue::UnitRef(int)),
        (DW_AT_data_member_location, AttributeValue::Data1(0)),
    ]);
    add(unit, broken, DW_TAG_member, vec![
        (DW_AT_name, string("bad")),
        (DW_AT_type, AttributeValue::UnitRef(int)),
        (DW_AT_data_member_location, AttributeValue::Sdata(-4)),
    ]);
    add(unit, root, DW_TAG_variable, vec![
        (DW_AT_name, string("g_status")),
        (DW_AT_type, AttributeValue::UnitRef(broken)),
    ]);

    add(unit, root, DW_TAG_variable, vec![
        (DW_AT_name, string("g_unused")),
        (DW_AT_type, AttributeValue::UnitRef(int)),
    ]);

    add(unit, root, DW_TAG_subprogram, vec![
        (DW_AT_name, string("main")),
        (DW_AT_type, AttributeValue::UnitRef(int)),
        (DW_AT_low_pc, AttributeValue::Address(DwarfAddress::Constant(MAIN_LOW_PC))),
        (DW_AT_high_pc, AttributeValue::Udata(MAIN_LENGTH)),
    ]);

    let mut sections = Sections::new(EndianVec::new(endian));
    dwarf.write(&mut sections).unwrap();

    let mut out = Vec::new();
    sections
        .for_each(|id, data| {
            if !data.slice().is_empty() {
                out.push((id.name(), data.slice().to_vec()));
            }
            Ok::<(), gimli::Error>(())
        })
        .unwrap();
    out
}

fn main_line_program(encoding: Encoding) -> LineProgram
{
    let mut program = LineProgram::new(
        encoding,
        LineEncoding::default(),
        LineString::String(b"/work/src".to_vec()),
        None,
        LineString::String(b"main.c".to_vec()),
        None,
    );
    let directory = program.default_directory();
    let file = program.add_file(LineString::String(b"main.c".to_vec()), directory, None);

    program.begin_sequence(Some(DwarfAddress::Constant(MAIN_LOW_PC)));
    for (offset, line) in [(0x00, 10), (0x10, 12)] {
        let row = program.row();
        row.file = file;
        row.address_offset = offset;
        row.line = line;
        program.generate_row();
    }
    program.end_sequence(MAIN_LENGTH);
    program
}

fn build_elf(endian: RunTimeEndian, with_lines: bool) -> Vec<u8>
{
    let object_endian = match endian {
        RunTimeEndian::Little => object::Endianness::Little,
        RunTimeEndian::Big => object::Endianness::Big,
    };
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::Arm, object_endian);
    obj.add_file_symbol(b"main.c".to_vec());

    for (name, value, size) in [
        ("g_origin", ORIGIN_ADDRESS, 8),
        ("g_table", TABLE_ADDRESS, 16),
        ("g_status", STATUS_ADDRESS, 8),
    ] {
        obj.add_symbol(ObjectSymbol {
            name: name.as_bytes().to_vec(),
            value,
            size,
            kind: object::SymbolKind::Data,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Absolute,
            flags: SymbolFlags::None,
        });
    }

    for (name, data) in debug_sections(endian, with_lines) {
        let section = obj.add_section(Vec::new(), name.as_bytes().to_vec(), SectionKind::Debug);
        obj.append_section_data(section, &data, 1);
    }

    obj.write().unwrap()
}

fn open_image(endian: RunTimeEndian) -> (NamedTempFile, BinaryImage)
{
    open_image_with(endian, true)
}

fn open_image_with(endian: RunTimeEndian, with_lines: bool) -> (NamedTempFile, BinaryImage)
{
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&build_elf(endian, with_lines)).unwrap();
    file.flush().unwrap();
    let image = BinaryImage::open(file.path()).unwrap();
    (file, image)
}

#[test]
fn test_header_information()
{
    let (_file, image) = open_image(RunTimeEndian::Little);
    assert_eq!(image.endianness(), Endianness::Little);
    assert_eq!(image.abi_info().machine_name(), "EM_ARM");
    assert_eq!(image.abi_info().version_name(), "EV_CURRENT");
    assert_eq!(image.debug_info().units().len(), 1);
    assert_eq!(image.debug_info().units()[0].path.as_deref(), Some("/work/src/main.c"));
}

#[test]
fn test_symbol_queries()
{
    let (_file, image) = open_image(RunTimeEndian::Little);

    let origin = image.get_symbol("g_origin").unwrap();
    assert_eq!(origin.address, Address::new(ORIGIN_ADDRESS));
    assert_eq!(origin.size, 8);
    assert_eq!(origin.kind, SymbolKind::Object);

    assert!(matches!(image.get_symbol("missing"), Err(ScopeError::SymbolNotFound(name)) if name == "missing"));

    assert_eq!(image.files().collect::<Vec<_>>(), vec!["main.c"]);
    let mut objects: Vec<&str> = image.objects().collect();
    objects.sort_unstable();
    assert_eq!(objects, vec!["g_origin", "g_status", "g_table"]);
}

#[test]
fn test_variables_require_a_symbol()
{
    let (_file, image) = open_image(RunTimeEndian::Little);

    let names: Vec<&str> = image.variables().map(|variable| variable.name.as_str()).collect();
    assert_eq!(names, vec!["g_origin", "g_status", "g_table"]);
    assert!(matches!(image.get_variable("g_unused"), Err(ScopeError::VariableNotFound(_))));

    let origin = image.get_variable("g_origin").unwrap();
    assert_eq!(origin.address, Address::new(ORIGIN_ADDRESS));
    assert_eq!(origin.ty, TypeRef::from("point_t"));
}

#[test]
fn test_variable_json_expands_typedef_and_structure()
{
    let (_file, image) = open_image(RunTimeEndian::Little);
    let origin = image.get_variable("g_origin").unwrap();

    let int = json!({ "_type": "BaseType", "name": "int", "size": 4 });
    assert_eq!(
        image.variable_json(origin),
        json!({
            "_type": "Variable",
            "name": "g_origin",
            "address": ORIGIN_ADDRESS,
            "type": {
                "_type": "TypedefType",
                "name": "point_t",
                "type": {
                    "_type": "Structure",
                    "name": "point",
                    "size": 8,
                    "fields": [
                        { "_type": "Field", "name": "x", "offset": 0, "bit_offset": null, "bit_size": null, "type": int },
                        { "_type": "Field", "name": "y", "offset": 4, "bit_offset": null, "bit_size": null, "type": int },
                    ],
                },
            },
        })
    );
}

#[test]
fn test_array_variable_uses_anonymous_type_name()
{
    let (_file, image) = open_image(RunTimeEndian::Little);
    let table = image.get_variable("g_table").unwrap();
    assert!(table.ty.name().starts_with("anonymous_"));

    let Resolved::Node(TypeNode::Array { element, dimensions, .. }) = image.resolve_type(table.ty.name()) else {
        panic!("g_table should resolve to an array");
    };
    assert_eq!(element, &TypeRef::from("int"));
    assert_eq!(dimensions.as_slice(), &[3]);

    let value = image.variable_json(table);
    assert_eq!(value["type"]["_type"], json!("Array"));
    assert_eq!(value["type"]["dimension"], json!([3]));
}

#[test]
fn test_malformed_member_is_dropped_and_reported()
{
    let (_file, image) = open_image(RunTimeEndian::Little);

    let Some(TypeNode::Structure { fields, .. }) = image.resolve_type("broken").node() else {
        panic!("broken should resolve to a structure");
    };
    let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, vec!["ok"]);

    let diagnostics = image.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(diagnostics[0], ScopeError::MalformedFieldOffset { .. }));
    assert!(diagnostics[0].is_per_entry());
}

#[test]
fn test_type_json_for_names()
{
    let (_file, image) = open_image(RunTimeEndian::Little);
    assert_eq!(image.type_json("int"), json!({ "_type": "BaseType", "name": "int", "size": 4 }));
    assert_eq!(image.type_json("point_t")["type"]["name"], json!("point"));
    assert_eq!(image.type_json("no_such_type"), json!("no_such_type"));
}

#[test]
fn test_line_program_rows_are_decoded()
{
    for endian in [RunTimeEndian::Little, RunTimeEndian::Big] {
        let (_file, image) = open_image(endian);
        let rows: Vec<(u64, u64, bool)> = image.debug_info().units()[0]
            .lines
            .as_deref()
            .unwrap()
            .iter()
            .map(|row| (row.address, row.line, row.end_sequence))
            .collect();
        assert_eq!(rows, vec![
            (MAIN_LOW_PC, 10, false),
            (MAIN_LOW_PC + 0x10, 12, false),
            (MAIN_LOW_PC + MAIN_LENGTH, 12, true),
        ]);
    }
}

#[test]
fn test_source_info_inside_main()
{
    for endian in [RunTimeEndian::Little, RunTimeEndian::Big] {
        let (_file, image) = open_image(endian);

        let first_row = image.get_source_info(MAIN_LOW_PC + 0x04);
        assert_eq!(first_row, SourceInfo {
            file_path: Some("/work/src/main.c".to_string()),
            line: 9,
            function_name: Some("main".to_string()),
        });

        let second_row = image.get_source_info(MAIN_LOW_PC + 0x14);
        assert_eq!(second_row.line, 11);
        assert_eq!(second_row.function_name.as_deref(), Some("main"));
        assert!(second_row.file_path.unwrap().ends_with("main.c"));
    }
}

#[test]
fn test_source_info_outside_any_sequence()
{
    for endian in [RunTimeEndian::Little, RunTimeEndian::Big] {
        let (_file, image) = open_image(endian);
        assert_eq!(image.get_source_info(MAIN_LOW_PC - 0x10), SourceInfo::UNKNOWN);
        // The end-of-sequence row is an exclusive bound for both lookups.
        assert_eq!(image.get_source_info(MAIN_LOW_PC + MAIN_LENGTH), SourceInfo::UNKNOWN);
    }
}

#[test]
fn test_unit_without_line_program_gives_unknown_source()
{
    let (_file, image) = open_image_with(RunTimeEndian::Little, false);
    assert!(image.debug_info().units()[0].lines.is_none());
    assert!(image
        .debug_info()
        .units()[0]
        .entries
        .iter()
        .any(|entry| entry.tag == EntryTag::Subprogram));
    assert_eq!(image.get_source_info(0x0800_0110), SourceInfo::UNKNOWN);
}

#[test]
fn test_relocatable_object_has_no_loadable_image()
{
    let (_file, image) = open_image(RunTimeEndian::Little);
    assert!(image.binary().is_empty());
    assert_eq!(image.binary_address(), None);
    assert_eq!(image.entry_point(), Address::ZERO);
}

#[test]
fn test_big_endian_image_builds_the_same_model()
{
    let (_little_file, little) = open_image(RunTimeEndian::Little);
    let (_big_file, big) = open_image(RunTimeEndian::Big);
    assert_eq!(big.endianness(), Endianness::Big);

    let little_json: Vec<_> = little.variables().map(|variable| little.variable_json(variable)).collect();
    let big_json: Vec<_> = big.variables().map(|variable| big.variable_json(variable)).collect();
    assert_eq!(little_json, big_json);
}

#[test]
fn test_non_elf_input_is_rejected()
{
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"this is not an object file at all").unwrap();
    file.flush().unwrap();

    let err = BinaryImage::open(file.path()).unwrap_err();
    assert!(matches!(err, ScopeError::UnreadableBinary(_)));
}

#[test]
fn test_missing_file_is_an_io_error()
{
    let dir = tempfile::tempdir().unwrap();
    let err = BinaryImage::open(dir.path().join("absent.elf")).unwrap_err();
    assert!(matches!(err, ScopeError::Io(_)));
}
