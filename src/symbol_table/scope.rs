use super::{ScopeId, Symbol};

/// One lexical scope. Symbols are kept in declaration order, which the code
/// generator relies on: a function's parameters are its first entries.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    symbols: Vec<Symbol>,
    enclosing: Option<ScopeId>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: ScopeId) -> Self {
        Self {
            symbols: Vec::new(),
            enclosing: Some(parent),
        }
    }

    pub fn enclosing(&self) -> Option<ScopeId> {
        self.enclosing
    }

    /// Position of the first symbol called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.symbols.iter().position(|symbol| symbol.name == name)
    }

    pub fn insert(&mut self, symbol: Symbol) -> usize {
        self.symbols.push(symbol);
        self.symbols.len() - 1
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub(super) fn get(&self, slot: usize) -> &Symbol {
        &self.symbols[slot]
    }

    pub(super) fn get_mut(&mut self, slot: usize) -> &mut Symbol {
        &mut self.symbols[slot]
    }

    pub(super) fn clear(&mut self) {
        self.symbols.clear();
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
