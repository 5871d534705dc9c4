use crate::symbol_table::{ScopeId, SymbolTable};
use crate::types::{Type, SIZEOF_INT};
use log::debug;

pub const SIZEOF_REG: u32 = 4;
/// First parameter offset: saved `%ebp` plus the return address.
pub const PARAMETER_BASE: i64 = 2 * SIZEOF_REG as i64;
pub const STACK_ALIGNMENT: u64 = 16;

/// Stack frame bookkeeping for one function. Locals and temporaries grow
/// downward from `%ebp`; outgoing arguments are written at the bottom of the
/// frame, so the frame reserves the largest argument block of any call.
#[derive(Debug, Default)]
pub struct Frame {
    offset: i64,
    max_args: u32,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns increasing offsets to the first `count` symbols of `scope`.
    /// Each parameter occupies at least one argument word.
    pub fn bind_parameters(&mut self, symbols: &mut SymbolTable, scope: ScopeId, count: usize) {
        let mut offset = PARAMETER_BASE;
        for id in symbols.ids(scope).take(count).collect::<Vec<_>>() {
            let symbol = symbols.symbol_mut(id);
            symbol.offset = offset;
            debug!("parameter {} at {}(%ebp)", symbol.name, offset);
            offset += i64::from(symbol.ty.size().max(SIZEOF_REG));
        }
    }

    /// Assigns decreasing offsets to the symbols of `scope` after the first
    /// `skip`.
    pub fn bind_locals(&mut self, symbols: &mut SymbolTable, scope: ScopeId, skip: usize) {
        for id in symbols.ids(scope).skip(skip).collect::<Vec<_>>() {
            let size = storage_size(&symbols.symbol(id).ty);
            let offset = self.allocate(size);
            let symbol = symbols.symbol_mut(id);
            symbol.offset = offset;
            debug!("local {} at {}(%ebp)", symbol.name, offset);
        }
    }

    pub fn allocate(&mut self, size: u32) -> i64 {
        self.offset -= i64::from(size);
        self.offset
    }

    pub fn reserve_arguments(&mut self, bytes: u32) {
        self.max_args = self.max_args.max(bytes);
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Locals plus the argument block, padded so that `%esp` is 16-byte
    /// aligned once `%ebp` has been pushed.
    pub fn size(&self) -> u64 {
        let mut size = self.offset.unsigned_abs() + u64::from(self.max_args);
        while size % STACK_ALIGNMENT != 8 {
            size += 1;
        }
        size
    }
}

/// Bytes reserved for a variable. Undeclared identifiers still get a word.
pub fn storage_size(ty: &Type) -> u32 {
    match ty {
        Type::Error => SIZEOF_INT,
        _ => ty.size(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_table::Symbol;
    use crate::types::{Specifier, MAX_OBJECT_SIZE};

    fn function_scope() -> (SymbolTable, ScopeId) {
        let mut table = SymbolTable::new();
        table.open();
        let scope = table.open();
        table.insert(scope, Symbol::new("a", Type::int()));
        table.insert(scope, Symbol::new("b", Type::int()));
        table.insert(scope, Symbol::new("x", Type::double()));
        (table, scope)
    }

    #[test]
    fn test_parameters_and_locals() {
        let (mut table, scope) = function_scope();
        let mut frame = Frame::new();
        frame.bind_parameters(&mut table, scope, 2);
        frame.bind_locals(&mut table, scope, 2);

        let offsets: Vec<i64> = table
            .ids(scope)
            .map(|id| table.symbol(id).offset)
            .collect();
        assert_eq!(offsets, vec![8, 12, -8]);
        assert_eq!(frame.size(), 8);
        assert_eq!(frame.size() % STACK_ALIGNMENT, 8);
    }

    #[test]
    fn test_char_parameter_takes_a_word() {
        let mut table = SymbolTable::new();
        let scope = table.open();
        table.insert(scope, Symbol::new("c", Type::char()));
        table.insert(scope, Symbol::new("n", Type::int()));

        Frame::new().bind_parameters(&mut table, scope, 2);
        let n = table.find(scope, "n").unwrap();
        assert_eq!(table.symbol(n).offset, 12);
    }

    #[test]
    fn test_size_includes_arguments_and_padding() {
        let mut frame = Frame::new();
        assert_eq!(frame.allocate(4), -4);
        assert_eq!(frame.allocate(8), -12);
        frame.reserve_arguments(12);
        frame.reserve_arguments(4);
        assert_eq!(frame.size(), 24);
        frame.allocate(1);
        assert_eq!(frame.size(), 40);

        let mut table = SymbolTable::new();
        let scope = table.open();
        table.insert(scope, Symbol::new("buf", Type::array(Specifier::Char, 0, 10)));
        let mut frame = Frame::new();
        frame.bind_locals(&mut table, scope, 0);
        assert_eq!(frame.offset(), -10);
        assert_eq!(frame.size(), 24);
    }

    #[test]
    fn test_large_objects_do_not_wrap() {
        let mut table = SymbolTable::new();
        let scope = table.open();
        for name in ["a", "b"] {
            let ty = Type::sized_array(Specifier::Char, 0, MAX_OBJECT_SIZE).unwrap();
            table.insert(scope, Symbol::new(name, ty));
        }

        let mut frame = Frame::new();
        frame.bind_locals(&mut table, scope, 0);
        assert_eq!(frame.offset(), -4_294_967_294);
        assert_eq!(frame.size(), 4_294_967_304);
    }
}
