use serde::Serialize;
use std::fmt;

pub const SIZEOF_CHAR: u32 = 1;
pub const SIZEOF_INT: u32 = 4;
pub const SIZEOF_DOUBLE: u32 = 8;
pub const SIZEOF_POINTER: u32 = 4;
/// Largest object the i386 target can address with a signed displacement.
pub const MAX_OBJECT_SIZE: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Specifier {
    Char,
    Int,
    Double,
}

impl Specifier {
    pub fn size(self) -> u32 {
        match self {
            Specifier::Char => SIZEOF_CHAR,
            Specifier::Int => SIZEOF_INT,
            Specifier::Double => SIZEOF_DOUBLE,
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Specifier::Char => write!(f, "char"),
            Specifier::Int => write!(f, "int"),
            Specifier::Double => write!(f, "double"),
        }
    }
}

/// Parameter list of a function type. Owned by exactly one `Type::Function`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    pub types: Vec<Type>,
    pub variadic: bool,
}

impl Parameters {
    pub fn new(types: Vec<Type>, variadic: bool) -> Self {
        Self { types, variadic }
    }
}

/// A declared or computed type.
///
/// Structural equality is exactly the derived one: the declarator kind must
/// match, then specifier and indirection, then the array length or the
/// parameter list. All `Error` values compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Error,
    Scalar {
        specifier: Specifier,
        indirection: u32,
    },
    Array {
        specifier: Specifier,
        indirection: u32,
        length: u32,
    },
    Function {
        specifier: Specifier,
        indirection: u32,
        parameters: Parameters,
    },
}

impl Type {
    pub fn scalar(specifier: Specifier, indirection: u32) -> Self {
        Type::Scalar {
            specifier,
            indirection,
        }
    }

    pub fn array(specifier: Specifier, indirection: u32, length: u32) -> Self {
        Type::Array {
            specifier,
            indirection,
            length,
        }
    }

    /// Like [`Type::array`], but `None` when the array would be larger than
    /// [`MAX_OBJECT_SIZE`].
    pub fn sized_array(specifier: Specifier, indirection: u32, length: u32) -> Option<Self> {
        length
            .checked_mul(element_size(specifier, indirection))
            .filter(|&size| size <= MAX_OBJECT_SIZE)
            .map(|_| Type::array(specifier, indirection, length))
    }

    pub fn function(specifier: Specifier, indirection: u32, parameters: Parameters) -> Self {
        Type::Function {
            specifier,
            indirection,
            parameters,
        }
    }

    pub fn char() -> Self {
        Self::scalar(Specifier::Char, 0)
    }

    pub fn int() -> Self {
        Self::scalar(Specifier::Int, 0)
    }

    pub fn double() -> Self {
        Self::scalar(Specifier::Double, 0)
    }

    pub fn specifier(&self) -> Option<Specifier> {
        match self {
            Type::Error => None,
            Type::Scalar { specifier, .. }
            | Type::Array { specifier, .. }
            | Type::Function { specifier, .. } => Some(*specifier),
        }
    }

    pub fn indirection(&self) -> u32 {
        match self {
            Type::Error => 0,
            Type::Scalar { indirection, .. }
            | Type::Array { indirection, .. }
            | Type::Function { indirection, .. } => *indirection,
        }
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        match self {
            Type::Function { parameters, .. } => Some(parameters),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    /// char, int or double with no indirection.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Scalar { indirection: 0, .. })
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::Scalar {
                specifier: Specifier::Int,
                indirection: 0
            }
        )
    }

    pub fn is_real(&self) -> bool {
        matches!(
            self,
            Type::Scalar {
                specifier: Specifier::Double,
                indirection: 0
            }
        )
    }

    pub fn is_pointer(&self) -> bool {
        match self {
            Type::Scalar { indirection, .. } | Type::Array { indirection, .. } => *indirection > 0,
            Type::Error | Type::Function { .. } => false,
        }
    }

    /// Legal as the operand of a test, `!`, `&&` or `||`.
    pub fn is_predicate(&self) -> bool {
        self.is_numeric() || self.is_pointer()
    }

    pub fn is_compatible_with(&self, other: &Type) -> bool {
        self.promote() == other.promote()
    }

    /// Array decays to a pointer to its element, char widens to int.
    pub fn promote(&self) -> Type {
        match self {
            Type::Array {
                specifier,
                indirection,
                ..
            } => Type::scalar(*specifier, indirection + 1),
            Type::Scalar {
                specifier: Specifier::Char,
                indirection: 0,
            } => Type::int(),
            _ => self.clone(),
        }
    }

    /// The type a pointer points to. Only meaningful for pointers.
    pub fn deref(&self) -> Type {
        match self.specifier() {
            Some(specifier) if self.indirection() > 0 => {
                Type::scalar(specifier, self.indirection() - 1)
            }
            _ => Type::Error,
        }
    }

    /// The type of `&e` where `e` has this type.
    pub fn address_of(&self) -> Type {
        match self.specifier() {
            Some(specifier) => Type::scalar(specifier, self.indirection() + 1),
            None => Type::Error,
        }
    }

    /// Storage size in bytes on the i386 target.
    pub fn size(&self) -> u32 {
        match self {
            Type::Error | Type::Function { .. } => 0,
            Type::Scalar {
                specifier,
                indirection,
            } => element_size(*specifier, *indirection),
            Type::Array {
                specifier,
                indirection,
                length,
            } => length.saturating_mul(element_size(*specifier, *indirection)),
        }
    }
}

fn element_size(specifier: Specifier, indirection: u32) -> u32 {
    if indirection > 0 {
        SIZEOF_POINTER
    } else {
        specifier.size()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stars = |n: u32| "*".repeat(n as usize);
        match self {
            Type::Error => write!(f, "<error>"),
            Type::Scalar {
                specifier,
                indirection: 0,
            } => write!(f, "{}", specifier),
            Type::Scalar {
                specifier,
                indirection,
            } => write!(f, "{} {}", specifier, stars(*indirection)),
            Type::Array {
                specifier,
                indirection,
                length,
            } => write!(f, "{} {}[{}]", specifier, stars(*indirection), length),
            Type::Function {
                specifier,
                indirection,
                parameters,
            } => {
                write!(f, "{} {}(", specifier, stars(*indirection))?;
                if parameters.types.is_empty() && !parameters.variadic {
                    write!(f, "void")?;
                }
                for (i, param) in parameters.types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                if parameters.variadic {
                    write!(f, ", ...")?;
                }
                write!(f, ")")
            }
        }
    }
}
