//! Name-indexed view over the binary's symbol tables.

use std::collections::HashMap;

use object::{Object, ObjectSymbol};
use tracing::trace;

use crate::error::{ScopeError, ScopeResult};
use crate::types::{Address, Symbol, SymbolKind};

/// Symbols of `.symtab` and `.dynsym`, looked up by exact name
///
/// When two entries share a name the later one wins, but it takes over the
/// earlier entry's slot so enumeration order stays the order names were
/// first seen.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable
{
    symbols: Vec<Symbol>,
    by_name: HashMap<String, usize>,
}

impl SymbolTable
{
    /// Index every named symbol of `file`, static table first.
    pub fn from_object<'data>(file: &impl Object<'data>) -> Self
    {
        let mut table = Self::default();
        for symbol in file.symbols().chain(file.dynamic_symbols()) {
            let Ok(name) = symbol.name() else {
                continue;
            };
            table.insert(Symbol {
                name: name.to_string(),
                address: Address::new(symbol.address()),
                size: symbol.size(),
                kind: SymbolKind::from(symbol.kind()),
            });
        }
        table
    }

    /// Add a symbol; nameless symbols are ignored.
    pub fn insert(&mut self, symbol: Symbol)
    {
        if symbol.name.is_empty() {
            return;
        }
        if let Some(&slot) = self.by_name.get(&symbol.name) {
            trace!(name = %symbol.name, "symbol redefined, keeping the later entry");
            self.symbols[slot] = symbol;
        } else {
            self.by_name.insert(symbol.name.clone(), self.symbols.len());
            self.symbols.push(symbol);
        }
    }

    /// Exact-name lookup.
    pub fn get_symbol(&self, name: &str) -> ScopeResult<&Symbol>
    {
        self.lookup(name)
            .ok_or_else(|| ScopeError::SymbolNotFound(name.to_string()))
    }

    /// Exact-name lookup without an error value.
    pub fn lookup(&self, name: &str) -> Option<&Symbol>
    {
        self.by_name.get(name).map(|&slot| &self.symbols[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol>
    {
        self.symbols.iter()
    }

    /// Symbols of kind `FILE`.
    pub fn files(&self) -> impl Iterator<Item = &Symbol>
    {
        self.of_kind(SymbolKind::File)
    }

    /// Symbols of kind `OBJECT`.
    pub fn objects(&self) -> impl Iterator<Item = &Symbol>
    {
        self.of_kind(SymbolKind::Object)
    }

    fn of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &Symbol>
    {
        self.symbols.iter().filter(move |symbol| symbol.kind == kind)
    }

    pub fn len(&self) -> usize
    {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.symbols.is_empty()
    }
}

impl FromIterator<Symbol> for SymbolTable
{
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self
    {
        let mut table = Self::default();
        for symbol in iter {
            table.insert(symbol);
        }
        table
    }
}
