use std::collections::HashMap;
use std::fmt;

/// The `.lc` type lattice. Nullability is a per-variant flag; `Null` is the
/// unit inhabitant of every nullable type. Numbers are 64-bit signed
/// integers end to end (decimal literals truncate at lowering).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Num { nullable: bool },
    Text { nullable: bool },
    Char { nullable: bool },
    Bool { nullable: bool },
    Void,
    Null,
    Array {
        element: Box<Type>,
        /// `Some(n)` for a fixed-size array, `None` for a dynamic one.
        length: Option<u32>,
        nullable: bool,
    },
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    Struct { name: String, nullable: bool },
}

impl Type {
    pub const NUM: Self = Self::Num { nullable: false };
    pub const TEXT: Self = Self::Text { nullable: false };
    pub const CHAR: Self = Self::Char { nullable: false };
    pub const BOOL: Self = Self::Bool { nullable: false };

    pub const fn is_nullable(&self) -> bool {
        match self {
            Self::Num { nullable }
            | Self::Text { nullable }
            | Self::Char { nullable }
            | Self::Bool { nullable }
            | Self::Array { nullable, .. }
            | Self::Struct { nullable, .. } => *nullable,
            Self::Null => true,
            // functions and void are never nullable
            Self::Void | Self::Function { .. } => false,
        }
    }

    /// The nullable form of this type. Functions and void have none and are
    /// returned unchanged; the caller rejects `?` on them syntactically.
    #[must_use]
    pub fn nullable(self) -> Self {
        match self {
            Self::Num { .. } => Self::Num { nullable: true },
            Self::Text { .. } => Self::Text { nullable: true },
            Self::Char { .. } => Self::Char { nullable: true },
            Self::Bool { .. } => Self::Bool { nullable: true },
            Self::Array {
                element, length, ..
            } => Self::Array {
                element,
                length,
                nullable: true,
            },
            Self::Struct { name, .. } => Self::Struct {
                name,
                nullable: true,
            },
            other @ (Self::Void | Self::Null | Self::Function { .. }) => other,
        }
    }

    #[must_use]
    pub fn without_nullability(&self) -> Self {
        match self.clone() {
            Self::Num { .. } => Self::NUM,
            Self::Text { .. } => Self::TEXT,
            Self::Char { .. } => Self::CHAR,
            Self::Bool { .. } => Self::BOOL,
            Self::Array {
                element, length, ..
            } => Self::Array {
                element,
                length,
                nullable: false,
            },
            Self::Struct { name, .. } => Self::Struct {
                name,
                nullable: false,
            },
            other => other,
        }
    }

    /// Assignment compatibility: equal types, a non-nullable value into its
    /// own nullable form, or the null literal into any nullable target.
    pub fn assignable_from(&self, value: &Type) -> bool {
        if self == value {
            return true;
        }
        if !self.is_nullable() {
            return false;
        }
        if let Type::Null = value {
            return true;
        }
        self.without_nullability() == value.without_nullability() && !value.is_nullable()
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Num { .. })
    }
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool { .. })
    }
    /// Operand kinds `+>>` accepts and `print` knows how to render.
    pub const fn is_printable(&self) -> bool {
        matches!(
            self,
            Self::Num { .. } | Self::Text { .. } | Self::Char { .. } | Self::Bool { .. }
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let suffix = if self.is_nullable() && !matches!(self, Self::Null) {
            "?"
        } else {
            ""
        };
        match self {
            Self::Num { .. } => write!(f, "num{}", suffix),
            Self::Text { .. } => write!(f, "text{}", suffix),
            Self::Char { .. } => write!(f, "char{}", suffix),
            Self::Bool { .. } => write!(f, "bool{}", suffix),
            Self::Void => f.write_str("void"),
            Self::Null => f.write_str("null"),
            Self::Array {
                element, length, ..
            } => {
                write!(f, "{}[", element)?;
                if let Some(n) = length {
                    write!(f, "{}", n)?;
                }
                write!(f, "]{}", suffix)
            }
            Self::Function { params, ret } => {
                write!(f, "fnc[")?;
                for (i, p) in params.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, "]:{}", ret)
            }
            Self::Struct { name, .. } => write!(f, "{}{}", name, suffix),
        }
    }
}

/// One struct field: name and type, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

/// Struct name -> ordered field list. Populated in semantic pass 1, owned by
/// one compiler invocation and threaded by reference into the backend.
#[derive(Debug, Default)]
pub struct StructRegistry {
    structs: HashMap<String, Vec<Field>>,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the name was already registered.
    pub fn register(&mut self, name: &str, fields: Vec<Field>) -> bool {
        if self.structs.contains_key(name) {
            return false;
        }
        self.structs.insert(name.to_string(), fields);
        true
    }

    pub fn fields(&self, name: &str) -> Option<&[Field]> {
        self.structs.get(name).map(Vec::as_slice)
    }

    pub fn field(&self, struct_name: &str, field_name: &str) -> Option<&Field> {
        self.fields(struct_name)?
            .iter()
            .find(|f| f.name == field_name)
    }

    /// 0-based position of a field inside its struct; the backend turns this
    /// into a slot offset.
    pub fn field_index(&self, struct_name: &str, field_name: &str) -> Option<usize> {
        self.fields(struct_name)?
            .iter()
            .position(|f| f.name == field_name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullability_assignment() {
        let num = Type::NUM;
        let num_opt = Type::NUM.nullable();
        assert!(num_opt.assignable_from(&num));
        assert!(num_opt.assignable_from(&Type::Null));
        assert!(!num.assignable_from(&Type::Null));
        assert!(!num.assignable_from(&num_opt));
        assert!(num.assignable_from(&num));
    }

    #[test]
    fn arrays_compare_structurally() {
        let a = Type::Array {
            element: Box::new(Type::NUM),
            length: Some(3),
            nullable: false,
        };
        let b = Type::Array {
            element: Box::new(Type::NUM),
            length: Some(3),
            nullable: false,
        };
        let c = Type::Array {
            element: Box::new(Type::NUM),
            length: Some(4),
            nullable: false,
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn structs_compare_nominally() {
        let p = Type::Struct {
            name: "Point".into(),
            nullable: false,
        };
        let q = Type::Struct {
            name: "Pixel".into(),
            nullable: false,
        };
        assert_ne!(p, q);
        assert!(p.clone().nullable().assignable_from(&p));
    }

    #[test]
    fn null_to_nullable_text_only() {
        let t = Type::TEXT;
        assert!(!t.assignable_from(&Type::Null));
        assert!(t.clone().nullable().assignable_from(&Type::Null));
        // nullable does not flow back into non-nullable
        assert!(!t.assignable_from(&Type::TEXT.nullable()));
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut reg = StructRegistry::new();
        assert!(reg.register(
            "Point",
            vec![
                Field {
                    name: "x".into(),
                    ty: Type::NUM,
                },
                Field {
                    name: "y".into(),
                    ty: Type::NUM,
                },
            ],
        ));
        assert!(!reg.register("Point", Vec::new()));
        assert_eq!(reg.field_index("Point", "y"), Some(1));
        assert!(reg.field("Point", "z").is_none());
    }
}
