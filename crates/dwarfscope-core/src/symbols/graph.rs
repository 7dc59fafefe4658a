//! # Type Graph
//!
//! Typed nodes reconstructed from the debug entries and the registry that owns
//! them.
//!
//! ## Deferred references
//!
//! Nodes never point at each other directly. A reference is a [`TypeRef`], the
//! name of another node, resolved through [`TypeRegistry::resolve`] when it is
//! needed. Forward references and mutually recursive types therefore need no
//! second pass and no placeholder nodes.
//!
//! ## Resolution order
//!
//! Names are unique within a category but not across categories, so the
//! lookup walks the categories in [`RESOLUTION_ORDER`] and the first hit wins.
//! A name that is in no category resolves to itself ([`Resolved::Unresolved`]).

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

use crate::types::Address;

/// Name-keyed reference to another type node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TypeRef(pub String);

impl TypeRef
{
    pub fn new(name: impl Into<String>) -> Self
    {
        Self(name.into())
    }

    pub fn name(&self) -> &str
    {
        &self.0
    }
}

impl fmt::Display for TypeRef
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeRef
{
    fn from(name: &str) -> Self
    {
        Self(name.to_string())
    }
}

/// One registry store; every node lives in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCategory
{
    Typedef,
    Base,
    Enumeration,
    Structure,
    Union,
    Pointer,
    Array,
    SubRoutine,
    Constant,
}

/// Precedence used when a name exists in more than one store.
pub const RESOLUTION_ORDER: [TypeCategory; 9] = [
    TypeCategory::Typedef,
    TypeCategory::Base,
    TypeCategory::Enumeration,
    TypeCategory::Structure,
    TypeCategory::Union,
    TypeCategory::Pointer,
    TypeCategory::Array,
    TypeCategory::SubRoutine,
    TypeCategory::Constant,
];

/// Structure field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field
{
    pub name: String,
    pub ty: TypeRef,
    /// Byte offset inside the structure
    pub offset: u64,
    pub bit_offset: Option<u64>,
    pub bit_size: Option<u64>,
}

/// Union member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member
{
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerator
{
    pub name: String,
    pub value: i64,
}

/// A reconstructed type.
///
/// Pointer and const wrappers carry no size; pointer width is a property of
/// the target architecture rather than of the type graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeNode
{
    Base
    {
        name: String,
        size: u64,
    },
    Typedef
    {
        name: String,
        target: TypeRef,
    },
    Structure
    {
        name: String,
        size: u64,
        fields: Vec<Field>,
    },
    Union
    {
        name: String,
        size: u64,
        members: Vec<Member>,
    },
    Enumeration
    {
        name: String,
        size: u64,
        enumerators: Vec<Enumerator>,
    },
    Array
    {
        name: String,
        element: TypeRef,
        /// Declared upper bounds, one per subrange that has one
        dimensions: SmallVec<[i64; 4]>,
    },
    Pointer
    {
        name: String,
        target: TypeRef,
    },
    Constant
    {
        name: String,
        target: TypeRef,
    },
    SubRoutine
    {
        name: String,
    },
}

impl TypeNode
{
    pub fn name(&self) -> &str
    {
        match self {
            TypeNode::Base { name, .. }
            | TypeNode::Typedef { name, .. }
            | TypeNode::Structure { name, .. }
            | TypeNode::Union { name, .. }
            | TypeNode::Enumeration { name, .. }
            | TypeNode::Array { name, .. }
            | TypeNode::Pointer { name, .. }
            | TypeNode::Constant { name, .. }
            | TypeNode::SubRoutine { name } => name,
        }
    }

    pub fn category(&self) -> TypeCategory
    {
        match self {
            TypeNode::Base { .. } => TypeCategory::Base,
            TypeNode::Typedef { .. } => TypeCategory::Typedef,
            TypeNode::Structure { .. } => TypeCategory::Structure,
            TypeNode::Union { .. } => TypeCategory::Union,
            TypeNode::Enumeration { .. } => TypeCategory::Enumeration,
            TypeNode::Array { .. } => TypeCategory::Array,
            TypeNode::Pointer { .. } => TypeCategory::Pointer,
            TypeNode::Constant { .. } => TypeCategory::Constant,
            TypeNode::SubRoutine { .. } => TypeCategory::SubRoutine,
        }
    }

    /// Variant label used as the `_type` tag when serializing.
    pub fn kind(&self) -> &'static str
    {
        match self {
            TypeNode::Base { .. } => "BaseType",
            TypeNode::Typedef { .. } => "TypedefType",
            TypeNode::Structure { .. } => "Structure",
            TypeNode::Union { .. } => "Union",
            TypeNode::Enumeration { .. } => "Enumeration",
            TypeNode::Array { .. } => "Array",
            TypeNode::Pointer { .. } => "Pointer",
            TypeNode::Constant { .. } => "Constant",
            TypeNode::SubRoutine { .. } => "SubRoutine",
        }
    }

    /// Byte size, for the variants that record one.
    pub fn size(&self) -> Option<u64>
    {
        match self {
            TypeNode::Base { size, .. }
            | TypeNode::Structure { size, .. }
            | TypeNode::Union { size, .. }
            | TypeNode::Enumeration { size, .. } => Some(*size),
            _ => None,
        }
    }
}

/// A global variable backed by a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable
{
    pub name: String,
    /// Taken from the symbol table, not from the debug entry
    pub address: Address,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// Outcome of resolving a [`TypeRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<'a>
{
    Node(&'a TypeNode),
    /// No store holds the name; callers treat the bare name as the result
    Unresolved(&'a str),
}

impl<'a> Resolved<'a>
{
    pub fn node(self) -> Option<&'a TypeNode>
    {
        match self {
            Resolved::Node(node) => Some(node),
            Resolved::Unresolved(_) => None,
        }
    }

    pub fn name(self) -> &'a str
    {
        match self {
            Resolved::Node(node) => node.name(),
            Resolved::Unresolved(name) => name,
        }
    }
}

/// Per-category stores of type nodes, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry
{
    typedefs: HashMap<String, TypeNode>,
    base: HashMap<String, TypeNode>,
    enumerations: HashMap<String, TypeNode>,
    structures: HashMap<String, TypeNode>,
    unions: HashMap<String, TypeNode>,
    pointers: HashMap<String, TypeNode>,
    arrays: HashMap<String, TypeNode>,
    subroutines: HashMap<String, TypeNode>,
    constants: HashMap<String, TypeNode>,
}

impl TypeRegistry
{
    pub fn new() -> Self
    {
        Self::default()
    }

    fn store(&self, category: TypeCategory) -> &HashMap<String, TypeNode>
    {
        match category {
            TypeCategory::Typedef => &self.typedefs,
            TypeCategory::Base => &self.base,
            TypeCategory::Enumeration => &self.enumerations,
            TypeCategory::Structure => &self.structures,
            TypeCategory::Union => &self.unions,
            TypeCategory::Pointer => &self.pointers,
            TypeCategory::Array => &self.arrays,
            TypeCategory::SubRoutine => &self.subroutines,
            TypeCategory::Constant => &self.constants,
        }
    }

    fn store_mut(&mut self, category: TypeCategory) -> &mut HashMap<String, TypeNode>
    {
        match category {
            TypeCategory::Typedef => &mut self.typedefs,
            TypeCategory::Base => &mut self.base,
            TypeCategory::Enumeration => &mut self.enumerations,
            TypeCategory::Structure => &mut self.structures,
            TypeCategory::Union => &mut self.unions,
            TypeCategory::Pointer => &mut self.pointers,
            TypeCategory::Array => &mut self.arrays,
            TypeCategory::SubRoutine => &mut self.subroutines,
            TypeCategory::Constant => &mut self.constants,
        }
    }

    /// Register a node in its category; a node of the same name and category
    /// is replaced.
    pub fn insert(&mut self, node: TypeNode)
    {
        let category = node.category();
        self.store_mut(category).insert(node.name().to_string(), node);
    }

    /// Look a name up in one category only.
    pub fn get(&self, category: TypeCategory, name: &str) -> Option<&TypeNode>
    {
        self.store(category).get(name)
    }

    /// Resolve a name across all categories in [`RESOLUTION_ORDER`].
    pub fn resolve<'a>(&'a self, name: &'a str) -> Resolved<'a>
    {
        RESOLUTION_ORDER
            .iter()
            .find_map(|&category| self.get(category, name))
            .map_or(Resolved::Unresolved(name), Resolved::Node)
    }

    pub fn resolve_ref<'a>(&'a self, reference: &'a TypeRef) -> Resolved<'a>
    {
        self.resolve(reference.name())
    }

    /// Nodes of one category, in no particular order.
    pub fn nodes(&self, category: TypeCategory) -> impl Iterator<Item = &TypeNode>
    {
        self.store(category).values()
    }

    pub fn len(&self) -> usize
    {
        RESOLUTION_ORDER.iter().map(|&category| self.store(category).len()).sum()
    }

    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}
