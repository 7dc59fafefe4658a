//! Binary image loading and the queryable model built from it.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use memmap2::Mmap;
use object::elf::{FileHeader32, FileHeader64, PT_LOAD};
use object::read::elf::{FileHeader, ProgramHeader};
use object::{Endianness as ObjectEndianness, FileKind, Object, ObjectSection};
use serde_json::Value;
use tracing::{debug, info};

use super::builder::{TypeGraph, TypeGraphBuilder};
use super::entry::DebugInfo;
use super::graph::{Resolved, TypeRegistry, Variable};
use super::json::JsonWriter;
use super::reader::read_debug_info;
use super::source::resolve_source;
use super::table::SymbolTable;
use super::OwnedReader;
use crate::error::{ScopeError, ScopeResult};
use crate::types::{AbiInfo, Address, Endianness, SourceInfo, Symbol};

const DWARF_SECTIONS: &[&str] = &[
    ".debug_abbrev",
    ".debug_addr",
    ".debug_info",
    ".debug_line",
    ".debug_line_str",
    ".debug_ranges",
    ".debug_rnglists",
    ".debug_str",
    ".debug_str_offsets",
    ".debug_loc",
    ".debug_loclists",
];

/// File range and load address of one `PT_LOAD` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoadSegment
{
    physical_address: u64,
    offset: usize,
    size: usize,
}

/// Header fields and loadable segments read straight from the ELF header.
struct ElfLayout
{
    entry_point: u64,
    abi: AbiInfo,
    segments: Vec<LoadSegment>,
}

/// Everything derived from the mapped bytes while the object parser borrows them.
struct ImageContents
{
    layout: ElfLayout,
    endian: RunTimeEndian,
    symbols: SymbolTable,
    debug_info: DebugInfo,
}

/// A loaded ELF binary with its symbol table, type graph and line tables
///
/// The file stays mapped for the lifetime of the value and is unmapped exactly
/// once, when it is dropped. Every registry is complete after [`open`] returns
/// and nothing mutates afterwards, so a shared reference can be queried from
/// several threads.
///
/// [`open`]: BinaryImage::open
pub struct BinaryImage
{
    path: PathBuf,
    map: Mmap,
    endian: RunTimeEndian,
    entry_point: Address,
    abi: AbiInfo,
    segments: Vec<LoadSegment>,
    symbols: SymbolTable,
    debug_info: DebugInfo,
    graph: TypeGraph,
}

impl BinaryImage
{
    /// Map `path`, then build the symbol table and the type graph.
    ///
    /// Container and debug-section failures abort loading. Problems with
    /// individual debug entries do not; they end up in [`diagnostics`].
    ///
    /// [`diagnostics`]: BinaryImage::diagnostics
    pub fn open(path: impl AsRef<Path>) -> ScopeResult<Self>
    {
        let path = path.as_ref();
        info!("Loading {}", path.display());

        let file = File::open(path)?;
        let map = map_file(&file)?;
        let contents = parse_contents(path, &map)?;
        let graph = TypeGraphBuilder::new(&contents.debug_info, &contents.symbols).build();

        info!(
            "Loaded {}: {} symbols, {} variables, {} load segments",
            path.display(),
            contents.symbols.len(),
            graph.variables.len(),
            contents.layout.segments.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            map,
            endian: contents.endian,
            entry_point: Address::new(contents.layout.entry_point),
            abi: contents.layout.abi,
            segments: contents.layout.segments,
            symbols: contents.symbols,
            debug_info: contents.debug_info,
            graph,
        })
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    pub fn endianness(&self) -> Endianness
    {
        Endianness::from(self.endian)
    }

    /// Address of the first instruction (`e_entry`).
    pub fn entry_point(&self) -> Address
    {
        self.entry_point
    }

    pub fn abi_info(&self) -> AbiInfo
    {
        self.abi
    }

    pub fn symbols(&self) -> &SymbolTable
    {
        &self.symbols
    }

    /// Exact-name symbol lookup; fails with [`ScopeError::SymbolNotFound`].
    pub fn get_symbol(&self, name: &str) -> ScopeResult<&Symbol>
    {
        self.symbols.get_symbol(name)
    }

    /// Names of the `FILE` symbols.
    pub fn files(&self) -> impl Iterator<Item = &str>
    {
        self.symbols.files().map(|symbol| symbol.name.as_str())
    }

    /// Names of the `OBJECT` symbols.
    pub fn objects(&self) -> impl Iterator<Item = &str>
    {
        self.symbols.objects().map(|symbol| symbol.name.as_str())
    }

    /// Variables ordered by name.
    pub fn variables(&self) -> impl Iterator<Item = &Variable>
    {
        self.graph.variables.values()
    }

    pub fn get_variable(&self, name: &str) -> ScopeResult<&Variable>
    {
        self.graph
            .variables
            .get(name)
            .ok_or_else(|| ScopeError::VariableNotFound(name.to_string()))
    }

    pub fn types(&self) -> &TypeRegistry
    {
        &self.graph.types
    }

    /// Resolve a type name with the registry's fixed category precedence.
    pub fn resolve_type<'a>(&'a self, name: &'a str) -> Resolved<'a>
    {
        self.graph.types.resolve(name)
    }

    pub fn get_source_info(&self, address: u64) -> SourceInfo
    {
        resolve_source(&self.debug_info, address)
    }

    /// Nested JSON description of a variable and its full type.
    pub fn variable_json(&self, variable: &Variable) -> Value
    {
        JsonWriter::new(&self.graph.types).variable(variable)
    }

    /// Nested JSON description of the type `name` resolves to, or the bare
    /// name when it resolves to nothing.
    pub fn type_json(&self, name: &str) -> Value
    {
        match self.graph.types.resolve(name) {
            Resolved::Node(node) => JsonWriter::new(&self.graph.types).node(node),
            Resolved::Unresolved(name) => Value::String(name.to_string()),
        }
    }

    /// Contents of all loadable segments, lowest physical address first.
    pub fn binary(&self) -> Vec<u8>
    {
        let mut segments = self.segments.clone();
        segments.sort_by_key(|segment| segment.physical_address);
        let mut data = Vec::with_capacity(segments.iter().map(|segment| segment.size).sum());
        for segment in segments {
            data.extend_from_slice(&self.map[segment.offset..segment.offset + segment.size]);
        }
        data
    }

    /// Lowest physical address among the loadable segments.
    pub fn binary_address(&self) -> Option<Address>
    {
        self.segments
            .iter()
            .map(|segment| segment.physical_address)
            .min()
            .map(Address::new)
    }

    /// Per-entry problems met while building the type graph.
    pub fn diagnostics(&self) -> &[ScopeError]
    {
        &self.graph.diagnostics
    }

    pub fn debug_info(&self) -> &DebugInfo
    {
        &self.debug_info
    }
}

impl std::fmt::Debug for BinaryImage
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("BinaryImage")
            .field("path", &self.path)
            .field("endian", &self.endian)
            .field("entry_point", &self.entry_point)
            .field("symbols", &self.symbols.len())
            .field("variables", &self.graph.variables.len())
            .finish_non_exhaustive()
    }
}

#[allow(unsafe_code)]
fn map_file(file: &File) -> ScopeResult<Mmap>
{
    // SAFETY: the mapping is read-only and owned by the image; the file is
    // expected not to be truncated while it is loaded.
    let map = unsafe { Mmap::map(file)? };
    Ok(map)
}

fn parse_contents(path: &Path, data: &[u8]) -> ScopeResult<ImageContents>
{
    let layout = match FileKind::parse(data).map_err(|err| object_error(path, &err))? {
        FileKind::Elf32 => elf_layout::<FileHeader32<ObjectEndianness>>(data)?,
        FileKind::Elf64 => elf_layout::<FileHeader64<ObjectEndianness>>(data)?,
        other => {
            return Err(ScopeError::UnreadableBinary(format!(
                "{} is not an ELF file ({other:?})",
                path.display()
            )))
        }
    };

    let file = object::File::parse(data).map_err(|err| object_error(path, &err))?;
    let endian = if file.is_little_endian() {
        RunTimeEndian::Little
    } else {
        RunTimeEndian::Big
    };

    let symbols = SymbolTable::from_object(&file);
    debug!("Indexed {} symbols", symbols.len());

    let mut sections = HashMap::new();
    for name in DWARF_SECTIONS {
        if let Some(bytes) = load_section_bytes(&file, name)? {
            sections.insert(*name, bytes);
        }
    }
    let dwarf = Dwarf::load(|id| Ok::<_, gimli::Error>(section_reader(&sections, id, endian)))
        .map_err(|err| ScopeError::UnreadableBinary(format!("failed to load DWARF: {err}")))?;
    let debug_info = read_debug_info(&dwarf)?;

    Ok(ImageContents {
        layout,
        endian,
        symbols,
        debug_info,
    })
}

fn elf_layout<Elf: FileHeader<Endian = ObjectEndianness>>(data: &[u8]) -> ScopeResult<ElfLayout>
{
    let header = Elf::parse(data).map_err(|err| ScopeError::UnreadableBinary(format!("bad ELF header: {err}")))?;
    let endian = header
        .endian()
        .map_err(|err| ScopeError::UnreadableBinary(format!("bad ELF header: {err}")))?;
    let program_headers = header
        .program_headers(endian, data)
        .map_err(|err| ScopeError::UnreadableBinary(format!("bad program headers: {err}")))?;

    let mut segments = Vec::new();
    for segment in program_headers {
        if segment.p_type(endian) != PT_LOAD {
            continue;
        }
        let bytes = segment
            .data(endian, data)
            .map_err(|_| ScopeError::UnreadableBinary("loadable segment lies outside the file".to_string()))?;
        let (offset, _) = segment.file_range(endian);
        let physical_address: u64 = segment.p_paddr(endian).into();
        debug!("Found loadable segment at {:#010x} ({} bytes)", physical_address, bytes.len());
        segments.push(LoadSegment {
            physical_address,
            offset: usize::try_from(offset)
                .map_err(|_| ScopeError::UnreadableBinary("segment offset out of range".to_string()))?,
            size: bytes.len(),
        });
    }

    Ok(ElfLayout {
        entry_point: header.e_entry(endian).into(),
        abi: AbiInfo {
            machine: header.e_machine(endian),
            version: header.e_version(endian),
        },
        segments,
    })
}

fn object_error(path: &Path, err: &object::Error) -> ScopeError
{
    ScopeError::UnreadableBinary(format!("failed to parse {}: {err}", path.display()))
}

fn load_section_bytes(file: &object::File<'_>, name: &str) -> ScopeResult<Option<Arc<[u8]>>>
{
    let Some(section) = file.section_by_name(name) else {
        return Ok(None);
    };
    let data = section
        .uncompressed_data()
        .map_err(|err| ScopeError::UnreadableBinary(format!("failed to read {name}: {err}")))?;
    Ok(Some(match data {
        Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes),
        Cow::Owned(vec) => vec.into(),
    }))
}

fn section_reader(sections: &HashMap<&'static str, Arc<[u8]>>, id: SectionId, endian: RunTimeEndian) -> OwnedReader
{
    let data = sections
        .get(id.name())
        .cloned()
        .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
    EndianArcSlice::new(data, endian)
}
