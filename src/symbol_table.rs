mod scope;

pub use scope::Scope;

use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Stable handle to a symbol: the scope that owns it and its slot there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId {
    scope: ScopeId,
    slot: usize,
}

impl SymbolId {
    pub fn scope(self) -> ScopeId {
        self.scope
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    /// Frame offset relative to `%ebp`; zero means the symbol is global.
    pub offset: i64,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            offset: 0,
        }
    }
}

/// Every scope of a translation unit lives in this arena and is addressed by
/// `ScopeId`. Only the chain from `current` up to the outermost scope is ever
/// searched, so it behaves as a stack of frames.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: Option<ScopeId>,
    outermost: Option<ScopeId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new scope. The first scope ever opened becomes the outermost.
    pub fn open(&mut self) -> ScopeId {
        let scope = match self.current {
            Some(parent) => Scope::with_parent(parent),
            None => Scope::new(),
        };
        let id = ScopeId(self.scopes.len());
        self.scopes.push(scope);
        self.current = Some(id);
        if self.outermost.is_none() {
            self.outermost = Some(id);
        }
        id
    }

    /// Pop the current scope. Its symbols stay reachable through the
    /// returned id.
    pub fn close(&mut self) -> Option<ScopeId> {
        let closed = self.current?;
        self.current = self.scopes[closed.0].enclosing();
        Some(closed)
    }

    /// Drop every symbol of a scope that is no longer needed.
    pub fn discard(&mut self, id: ScopeId) {
        self.scopes[id.0].clear();
    }

    pub fn current(&self) -> Option<ScopeId> {
        self.current
    }

    pub fn outermost(&self) -> Option<ScopeId> {
        self.outermost
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn find(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes[scope.0]
            .find(name)
            .map(|slot| SymbolId { scope, slot })
    }

    /// Nearest declaration of `name` on the active scope chain.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut next = self.current;
        while let Some(scope) = next {
            if let Some(found) = self.find(scope, name) {
                return Some(found);
            }
            next = self.scopes[scope.0].enclosing();
        }
        None
    }

    pub fn insert(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolId {
        let slot = self.scopes[scope.0].insert(symbol);
        SymbolId { scope, slot }
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        self.scopes[id.scope.0].get(id.slot)
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        self.scopes[id.scope.0].get_mut(id.slot)
    }

    /// Ids of a scope's symbols in declaration order.
    pub fn ids(&self, scope: ScopeId) -> impl Iterator<Item = SymbolId> {
        (0..self.scopes[scope.0].len()).map(move |slot| SymbolId { scope, slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Specifier;

    #[test]
    fn test_first_scope_is_outermost() {
        let mut table = SymbolTable::new();
        let global = table.open();
        let inner = table.open();
        assert_eq!(table.outermost(), Some(global));
        assert_eq!(table.current(), Some(inner));
        assert_eq!(table.scope(inner).enclosing(), Some(global));
        assert_eq!(table.close(), Some(inner));
        assert_eq!(table.current(), Some(global));
    }

    #[test]
    fn test_scope_lookup() {
        let mut table = SymbolTable::new();
        let global = table.open();
        table.insert(global, Symbol::new("x", Type::int()));

        let inner = table.open();
        table.insert(inner, Symbol::new("y", Type::double()));

        assert!(table.lookup("x").is_some());
        assert!(table.lookup("y").is_some());
        assert!(table.lookup("z").is_none());
        assert!(table.find(inner, "x").is_none());
    }

    #[test]
    fn test_shadowing() {
        let mut table = SymbolTable::new();
        let global = table.open();
        let outer = table.insert(global, Symbol::new("x", Type::int()));

        let inner_scope = table.open();
        let inner = table.insert(inner_scope, Symbol::new("x", Type::scalar(Specifier::Char, 1)));

        assert_ne!(outer, inner);
        assert_eq!(table.lookup("x"), Some(inner));
        assert_eq!(table.symbol(inner).ty, Type::scalar(Specifier::Char, 1));

        table.close();
        assert_eq!(table.lookup("x"), Some(outer));
        assert_eq!(table.symbol(outer).ty, Type::int());
    }

    #[test]
    fn test_find_returns_first_match() {
        let mut table = SymbolTable::new();
        let global = table.open();
        let first = table.insert(global, Symbol::new("a", Type::int()));
        table.insert(global, Symbol::new("a", Type::double()));
        assert_eq!(table.find(global, "a"), Some(first));
    }

    #[test]
    fn test_discard_drops_symbols() {
        let mut table = SymbolTable::new();
        table.open();
        let params = table.open();
        table.insert(params, Symbol::new("a", Type::int()));
        table.close();
        table.discard(params);
        assert!(table.scope(params).is_empty());
        assert_eq!(table.ids(params).count(), 0);
    }
}
