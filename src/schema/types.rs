/// A parsed field/primitive type expression, e.g. `float`, `Vector2f[4]`, `Pose2f[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named(String),
    FixedArray { element: Box<TypeExpr>, len: usize },
    DynamicArray { element: Box<TypeExpr> },
}

impl TypeExpr {
    /// Parses a type expression as it appears (post-demangle) in a TypeInfo
    /// chunk's field table, e.g. `"float[3]"` or `"Angle[]"`.
    pub fn parse(s: &str) -> TypeExpr {
        if let Some(rest) = s.strip_suffix("[]") {
            return TypeExpr::DynamicArray { element: Box::new(TypeExpr::parse(rest)) };
        }
        if s.ends_with(']') {
            if let Some(open) = s.rfind('[') {
                let inner = &s[open + 1..s.len() - 1];
                if let Ok(len) = inner.parse::<usize>() {
                    return TypeExpr::FixedArray {
                        element: Box::new(TypeExpr::parse(&s[..open])),
                        len,
                    };
                }
            }
        }
        TypeExpr::Named(s.to_string())
    }

    pub fn base_name(&self) -> &str {
        match self {
            TypeExpr::Named(n) => n,
            TypeExpr::FixedArray { element, .. } => element.base_name(),
            TypeExpr::DynamicArray { element } => element.base_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named() {
        assert_eq!(TypeExpr::parse("float"), TypeExpr::Named("float".into()));
    }

    #[test]
    fn parses_fixed_array() {
        assert_eq!(
            TypeExpr::parse("float[3]"),
            TypeExpr::FixedArray { element: Box::new(TypeExpr::Named("float".into())), len: 3 }
        );
    }

    #[test]
    fn parses_dynamic_array() {
        assert_eq!(
            TypeExpr::parse("Pose2f[]"),
            TypeExpr::DynamicArray { element: Box::new(TypeExpr::Named("Pose2f".into())) }
        );
    }

    #[test]
    fn parses_nested_dynamic_of_fixed() {
        assert_eq!(
            TypeExpr::parse("float[3][]"),
            TypeExpr::DynamicArray {
                element: Box::new(TypeExpr::FixedArray {
                    element: Box::new(TypeExpr::Named("float".into())),
                    len: 3
                })
            }
        );
    }
}
