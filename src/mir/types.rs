use std::fmt;

/// A MIR type. Types are compared structurally, see the [`PartialEq`]
/// implementation.
#[derive(Clone, Debug)]
pub enum Type {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Pointer(Box<Type>),
    Function(FunctionType),
    Struct(StructType),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionType {
    pub return_type: Box<Type>,
    pub params: Vec<Type>,
}

#[derive(Clone, Debug)]
pub struct StructType {
    /// `None` for anonymous (literal) structs.
    pub name: Option<String>,
    pub fields: Vec<Type>,
}

impl Type {
    pub fn pointer(base: Type) -> Type {
        Type::Pointer(Box::new(base))
    }

    pub fn function(return_type: Type, params: Vec<Type>) -> Type {
        Type::Function(FunctionType {
            return_type: Box::new(return_type),
            params,
        })
    }

    pub fn named_struct(name: impl Into<String>, fields: Vec<Type>) -> Type {
        Type::Struct(StructType {
            name: Some(name.into()),
            fields,
        })
    }

    pub fn anonymous_struct(fields: Vec<Type>) -> Type {
        Type::Struct(StructType { name: None, fields })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float32 | Type::Float64)
    }

    /// The type a pointer points to, or `None` if this isn't a pointer.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(base) => Some(base),
            _ => None,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Pointer(a), Type::Pointer(b)) => a == b,
            (Type::Function(a), Type::Function(b)) => a == b,
            (Type::Struct(a), Type::Struct(b)) => a == b,
            // The remaining variants carry no data.
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for Type {}

impl PartialEq for StructType {
    /// Named structs are equal if their names are; anonymous ones if their
    /// fields are. A named struct never equals an anonymous one.
    fn eq(&self, other: &Self) -> bool {
        match (&self.name, &other.name) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.fields == other.fields,
            _ => false,
        }
    }
}

impl Eq for StructType {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Bool => f.write_str("bool"),
            Type::Int8 => f.write_str("i8"),
            Type::Int16 => f.write_str("i16"),
            Type::Int32 => f.write_str("i32"),
            Type::Int64 => f.write_str("i64"),
            Type::Float32 => f.write_str("f32"),
            Type::Float64 => f.write_str("f64"),
            Type::Pointer(base) => write!(f, "{base}*"),
            Type::Function(FunctionType {
                return_type,
                params,
            }) => {
                f.write_str("fn(")?;
                write_list(f, params)?;
                write!(f, ") -> {return_type}")
            }
            Type::Struct(StructType {
                name: Some(name), ..
            }) => write!(f, "%{name}"),
            Type::Struct(StructType { name: None, fields }) => {
                f.write_str("{ ")?;
                write_list(f, fields)?;
                f.write_str(" }")
            }
        }
    }
}

pub(super) fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_compare_by_kind() {
        assert_eq!(Type::Int32, Type::Int32);
        assert_ne!(Type::Int32, Type::Int64);
        assert_ne!(Type::Void, Type::Bool);
    }

    #[test]
    fn test_recursive_equality() {
        let a = Type::function(
            Type::pointer(Type::Int8),
            vec![Type::Int32, Type::anonymous_struct(vec![Type::Float64])],
        );
        let b = Type::function(
            Type::pointer(Type::Int8),
            vec![Type::Int32, Type::anonymous_struct(vec![Type::Float64])],
        );
        assert_eq!(a, b);

        let c = Type::function(Type::pointer(Type::Int8), vec![Type::Int32]);
        assert_ne!(a, c);
        assert_ne!(Type::pointer(Type::Int32), Type::pointer(Type::pointer(Type::Int32)));
    }

    #[test]
    fn test_struct_equality() {
        // Named structs compare by name only.
        assert_eq!(
            Type::named_struct("Point", vec![Type::Int32]),
            Type::named_struct("Point", vec![Type::Float32]),
        );
        assert_ne!(
            Type::named_struct("Point", vec![Type::Int32]),
            Type::named_struct("Size", vec![Type::Int32]),
        );
        assert_eq!(
            Type::anonymous_struct(vec![Type::Int32, Type::Bool]),
            Type::anonymous_struct(vec![Type::Int32, Type::Bool]),
        );
        assert_ne!(
            Type::anonymous_struct(vec![Type::Int32]),
            Type::anonymous_struct(vec![Type::Bool]),
        );
        assert_ne!(
            Type::named_struct("Point", vec![Type::Int32]),
            Type::anonymous_struct(vec![Type::Int32]),
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::pointer(Type::pointer(Type::Int8)).to_string(), "i8**");
        assert_eq!(
            Type::function(Type::Void, vec![Type::Int32, Type::Bool]).to_string(),
            "fn(i32, bool) -> void"
        );
        assert_eq!(Type::named_struct("Point", vec![]).to_string(), "%Point");
        assert_eq!(
            Type::anonymous_struct(vec![Type::Int64, Type::Float32]).to_string(),
            "{ i64, f32 }"
        );
    }
}
