use crate::types::{Type, SIZEOF_DOUBLE, SIZEOF_INT};
use std::fmt;

/// A local assembler label, `.L<n>`. Numbers are unique per translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ".L{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    pub fn next(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }
}

/// Where a value lives once its expression has been lowered.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Immediate(i64),
    /// Relative to `%ebp`.
    Frame(i64),
    Global(String),
    Label(Label),
    Indirect(&'static str),
    /// Outgoing argument slot, relative to `%esp`.
    Outgoing(u32),
}

impl Operand {
    pub fn is_immediate(&self) -> bool {
        matches!(self, Operand::Immediate(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Immediate(value) => write!(f, "${}", value),
            Operand::Frame(offset) => write!(f, "{}(%ebp)", offset),
            Operand::Global(name) => write!(f, "{}", name),
            Operand::Label(label) => write!(f, "{}", label),
            Operand::Indirect(register) => write!(f, "({})", register),
            Operand::Outgoing(offset) => write!(f, "{}(%esp)", offset),
        }
    }
}

/// How a value of some type is moved around: through a byte register, a
/// 32-bit register, or the x87 stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Long,
    Double,
}

impl Width {
    /// Error-typed values, pointers and arrays all travel as 32-bit words.
    pub fn of(ty: &Type) -> Self {
        if ty.is_real() {
            Width::Double
        } else if *ty == Type::char() {
            Width::Byte
        } else {
            Width::Long
        }
    }

    pub fn size(self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Long => SIZEOF_INT,
            Width::Double => SIZEOF_DOUBLE,
        }
    }
}
