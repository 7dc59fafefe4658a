//! # Type Graph Builder
//!
//! One pass over the debug entries of every compilation unit, producing the
//! [`TypeRegistry`] and the symbol-backed variables.
//!
//! ## Dispatch
//!
//! Every entry is routed by its tag to exactly one handler. Scopes, formal
//! parameters, compile-unit roots, volatile qualifiers and subprograms are
//! recognized and produce nothing. Any other tag without a handler is an
//! [`ScopeError::UnsupportedDebugTag`].
//!
//! ## Child runs
//!
//! Structures, unions, enumerations and arrays own the run of direct children
//! that immediately follows them (members, enumerators, subranges). Handlers
//! consume that run from the shared cursor, so those children are never
//! dispatched on their own. Subroutine types consume all their descendants.
//!
//! ## Failures
//!
//! Per-entry failures are logged, collected as diagnostics, and the walk goes
//! on with the next entry. A failing structure member only drops that member.

use std::collections::BTreeMap;

use gimli::constants;
use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use super::entry::{AttrValue, DebugEntry, DebugInfo, EntryCursor, EntryOffset, EntryTag};
use super::graph::{Enumerator, Field, Member, TypeNode, TypeRef, TypeRegistry, Variable};
use super::table::SymbolTable;
use crate::error::{ScopeError, ScopeResult};

/// Longest `DW_AT_type` chain followed when looking for a named target.
const MAX_TYPE_REF_DEPTH: usize = 32;

/// Type name used when an entry has no `DW_AT_type` at all.
pub const VOID_TYPE_NAME: &str = "void";

/// Everything the build pass produces.
#[derive(Debug, Default)]
pub struct TypeGraph
{
    pub types: TypeRegistry,
    /// Variables keyed (and therefore ordered) by name
    pub variables: BTreeMap<String, Variable>,
    /// Per-entry errors met during the walk
    pub diagnostics: Vec<ScopeError>,
}

pub struct TypeGraphBuilder<'a>
{
    info: &'a DebugInfo,
    symbols: &'a SymbolTable,
    graph: TypeGraph,
}

impl<'a> TypeGraphBuilder<'a>
{
    pub fn new(info: &'a DebugInfo, symbols: &'a SymbolTable) -> Self
    {
        Self {
            info,
            symbols,
            graph: TypeGraph::default(),
        }
    }

    /// Walk every unit and return the finished graph.
    pub fn build(mut self) -> TypeGraph
    {
        let info = self.info;
        for unit in info.units() {
            debug!(
                "Walking compilation unit {} ({} entries)",
                unit.path.as_deref().unwrap_or("<unnamed>"),
                unit.entries.len()
            );
            let mut cursor = EntryCursor::new(&unit.entries);
            while let Some(entry) = cursor.next() {
                trace!(offset = entry.offset.0, tag = %entry.tag, "visiting entry");
                if let Err(err) = self.visit(entry, &mut cursor) {
                    self.record(err);
                }
            }
        }

        info!(
            "Built type graph: {} types, {} variables, {} diagnostics",
            self.graph.types.len(),
            self.graph.variables.len(),
            self.graph.diagnostics.len()
        );
        self.graph
    }

    fn record(&mut self, err: ScopeError)
    {
        warn!("{err}");
        self.graph.diagnostics.push(err);
    }

    fn visit(&mut self, entry: &'a DebugEntry, cursor: &mut EntryCursor<'a>) -> ScopeResult<()>
    {
        match entry.tag {
            EntryTag::CompileUnit
            | EntryTag::VolatileType
            | EntryTag::Subprogram
            | EntryTag::FormalParameter
            | EntryTag::LexicalBlock => Ok(()),
            EntryTag::BaseType => {
                self.graph.types.insert(TypeNode::Base {
                    name: entry.name_or_anonymous(),
                    size: byte_size(entry),
                });
                Ok(())
            }
            EntryTag::Typedef => {
                let target = self.type_name(entry)?;
                self.graph.types.insert(TypeNode::Typedef {
                    name: entry.name_or_anonymous(),
                    target,
                });
                Ok(())
            }
            EntryTag::PointerType => {
                let target = self.type_name(entry)?;
                self.graph.types.insert(TypeNode::Pointer {
                    name: entry.name_or_anonymous(),
                    target,
                });
                Ok(())
            }
            EntryTag::ConstType => {
                let target = self.type_name(entry)?;
                self.graph.types.insert(TypeNode::Constant {
                    name: entry.name_or_anonymous(),
                    target,
                });
                Ok(())
            }
            EntryTag::StructureType => {
                self.structure(entry, cursor);
                Ok(())
            }
            EntryTag::UnionType => {
                self.union(entry, cursor);
                Ok(())
            }
            EntryTag::EnumerationType => {
                self.enumeration(entry, cursor);
                Ok(())
            }
            EntryTag::ArrayType => self.array(entry, cursor),
            EntryTag::SubroutineType => {
                let skipped = cursor.skip_descendants_of(entry);
                trace!("Skipped {skipped} parameter entries of subroutine type at {}", entry.offset);
                self.graph.types.insert(TypeNode::SubRoutine {
                    name: entry.name_or_anonymous(),
                });
                Ok(())
            }
            EntryTag::Variable => self.variable(entry),
            EntryTag::Member | EntryTag::Enumerator | EntryTag::SubrangeType | EntryTag::Other(_) => {
                Err(ScopeError::UnsupportedDebugTag {
                    tag: entry.tag.to_string(),
                    offset: entry.offset,
                    parent: self.info.describe_parent(entry),
                })
            }
        }
    }

    fn structure(&mut self, entry: &'a DebugEntry, cursor: &mut EntryCursor<'a>)
    {
        let mut fields = Vec::new();
        while let Some(member) = cursor.next_child_of(entry, EntryTag::Member) {
            match self.field(member) {
                Ok(field) => fields.push(field),
                Err(err) => self.record(err),
            }
        }
        self.graph.types.insert(TypeNode::Structure {
            name: entry.name_or_anonymous(),
            size: byte_size(entry),
            fields,
        });
    }

    fn field(&self, member: &DebugEntry) -> ScopeResult<Field>
    {
        Ok(Field {
            name: member.name_or_anonymous(),
            ty: self.type_name(member)?,
            offset: field_offset(member)?,
            bit_offset: member.udata(constants::DW_AT_bit_offset),
            bit_size: member.udata(constants::DW_AT_bit_size),
        })
    }

    fn union(&mut self, entry: &'a DebugEntry, cursor: &mut EntryCursor<'a>)
    {
        let mut members = Vec::new();
        while let Some(member) = cursor.next_child_of(entry, EntryTag::Member) {
            match self.type_name(member) {
                Ok(ty) => members.push(Member {
                    name: member.name_or_anonymous(),
                    ty,
                }),
                Err(err) => self.record(err),
            }
        }
        self.graph.types.insert(TypeNode::Union {
            name: entry.name_or_anonymous(),
            size: byte_size(entry),
            members,
        });
    }

    fn enumeration(&mut self, entry: &'a DebugEntry, cursor: &mut EntryCursor<'a>)
    {
        let mut enumerators = Vec::new();
        while let Some(enumerator) = cursor.next_child_of(entry, EntryTag::Enumerator) {
            let value = enumerator.attr(constants::DW_AT_const_value).and_then(constant_value);
            if value.is_none() {
                trace!("Enumerator at {} has no constant value, using 0", enumerator.offset);
            }
            enumerators.push(Enumerator {
                name: enumerator.name_or_anonymous(),
                value: value.unwrap_or(0),
            });
        }
        self.graph.types.insert(TypeNode::Enumeration {
            name: entry.name_or_anonymous(),
            size: byte_size(entry),
            enumerators,
        });
    }

    fn array(&mut self, entry: &'a DebugEntry, cursor: &mut EntryCursor<'a>) -> ScopeResult<()>
    {
        // The subrange run is consumed even if the element type is unusable.
        let mut dimensions = SmallVec::new();
        while let Some(subrange) = cursor.next_child_of(entry, EntryTag::SubrangeType) {
            if let Some(bound) = subrange.attr(constants::DW_AT_upper_bound).and_then(constant_value) {
                dimensions.push(bound);
            }
        }
        let element = self.type_name(entry)?;
        self.graph.types.insert(TypeNode::Array {
            name: entry.name_or_anonymous(),
            element,
            dimensions,
        });
        Ok(())
    }

    fn variable(&mut self, entry: &DebugEntry) -> ScopeResult<()>
    {
        let name = entry.name_or_anonymous();
        let Some(symbol) = self.symbols.lookup(&name) else {
            trace!("Variable {name} has no symbol, dropping it");
            return Ok(());
        };
        let ty = self.type_name(entry)?;
        let variable = Variable {
            name: name.clone(),
            address: symbol.address,
            ty,
        };
        self.graph.variables.insert(name, variable);
        Ok(())
    }

    /// Name used to refer to the type of `entry`.
    ///
    /// Array, pointer and const targets are referred to by their anonymous
    /// name. Other targets are followed along their own `DW_AT_type` until a
    /// named entry turns up; if the chain ends first, the last entry's
    /// anonymous name is used.
    fn type_name(&self, entry: &DebugEntry) -> ScopeResult<TypeRef>
    {
        let Some(first) = entry.type_reference() else {
            return Ok(TypeRef::new(VOID_TYPE_NAME));
        };
        let mut target = self.follow(entry, first)?;
        if target.tag.is_type_wrapper() {
            return Ok(TypeRef::new(target.offset.anonymous_name()));
        }

        for _ in 0..MAX_TYPE_REF_DEPTH {
            if let Some(name) = target.name() {
                return Ok(TypeRef::new(name));
            }
            match target.type_reference() {
                Some(next) => target = self.follow(target, next)?,
                None => break,
            }
        }
        Ok(TypeRef::new(target.name_or_anonymous()))
    }

    fn follow(&self, from: &DebugEntry, target: EntryOffset) -> ScopeResult<&'a DebugEntry>
    {
        self.info.entry(target).ok_or(ScopeError::DanglingTypeReference {
            offset: from.offset,
            target,
        })
    }
}

/// `DW_AT_byte_size`, 0 for opaque or forward-declared types.
fn byte_size(entry: &DebugEntry) -> u64
{
    entry.udata(constants::DW_AT_byte_size).unwrap_or(0)
}

/// Byte offset of a structure member.
///
/// A location expression stores the offset in its second byte (the operand of
/// `DW_OP_plus_uconst`); a one-byte constant stores it directly. A member
/// without the attribute sits at offset 0.
fn field_offset(member: &DebugEntry) -> ScopeResult<u64>
{
    let malformed = |form: &str| ScopeError::MalformedFieldOffset {
        offset: member.offset,
        form: form.to_string(),
    };
    match member.attr(constants::DW_AT_data_member_location) {
        None => Ok(0),
        Some(AttrValue::Block(bytes)) => bytes
            .get(1)
            .map(|&offset| u64::from(offset))
            .ok_or_else(|| malformed("block shorter than two bytes")),
        Some(AttrValue::Data1(offset)) => Ok(u64::from(*offset)),
        Some(other) => Err(malformed(other.form_name())),
    }
}

/// Constant attribute read as a signed value; wide unsigned data is
/// reinterpreted as two's complement.
fn constant_value(value: &AttrValue) -> Option<i64>
{
    match *value {
        AttrValue::Data1(value) => Some(i64::from(value)),
        AttrValue::Unsigned(value) => Some(value as i64),
        AttrValue::Signed(value) => Some(value),
        _ => None,
    }
}
