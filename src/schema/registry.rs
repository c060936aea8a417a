use std::collections::HashMap;

use super::types::TypeExpr;
use crate::error::{LogError, Result};

/// Canonicalizes a C++-mangled type name into the form used as a registry key.
///
/// Rules, applied in this exact order:
/// 1. strip anonymous-namespace tags `::__1`
/// 2. rewrite an `unsigned long` digit suffix `Nul` -> `N`
/// 3. collapse `", "` -> `","`
/// 4. ` >` -> `>`
/// 5. ` [` -> `[`
/// 6. strip the function-pointer marker ` *(*)`
pub fn demangle(name: &str) -> String {
    let mut s = name.replace("::__1", "");
    s = replace_ul_suffix(&s);
    s = s.replace(", ", ",");
    s = s.replace(" >", ">");
    s = s.replace(" [", "[");
    s = s.replace(" *(*)", "");
    s
}

fn replace_ul_suffix(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if s[j..].starts_with("ul") {
                let after = j + 2;
                let word_boundary = after >= bytes.len() || !bytes[after].is_ascii_alphanumeric();
                if word_boundary {
                    out.push_str(&s[start..j]);
                    i = after;
                    continue;
                }
            }
            out.push_str(&s[start..j]);
            i = j;
            continue;
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub name: String,
    pub fields: Vec<(String, TypeExpr)>,
}

#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    pub name: String,
    pub values: Vec<String>,
}

/// The schema embedded in a log's TypeInfo chunk.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    primitives: Vec<String>,
    records: HashMap<String, RecordDescriptor>,
    enums: HashMap<String, EnumDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    pub fn register_primitive(&mut self, name: impl Into<String>) {
        self.primitives.push(name.into());
    }

    pub fn register_record(&mut self, name: impl Into<String>, fields: Vec<(String, TypeExpr)>) {
        let name = name.into();
        self.records.insert(name.clone(), RecordDescriptor { name, fields });
    }

    pub fn register_enum(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        self.enums.insert(name.clone(), EnumDescriptor { name, values });
    }

    pub fn is_primitive(&self, name: &str) -> bool {
        self.primitives.iter().any(|p| p == name)
    }

    pub fn is_record(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub fn record_of(&self, name: &str) -> Result<&RecordDescriptor> {
        self.records.get(name).ok_or_else(|| LogError::UnknownType(name.to_string()))
    }

    pub fn enum_of(&self, name: &str) -> Result<&EnumDescriptor> {
        self.enums.get(name).ok_or_else(|| LogError::UnknownType(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demangle_strips_anonymous_namespace() {
        assert_eq!(demangle("std::__1::vector"), "std::vector");
    }

    #[test]
    fn demangle_collapses_commas_and_brackets() {
        assert_eq!(demangle("std::vector<int, std::allocator<int> >"), "std::vector<int,std::allocator<int>>");
        assert_eq!(demangle("float [4]"), "float[4]");
    }

    #[test]
    fn demangle_strips_unsigned_long_suffix() {
        assert_eq!(demangle("char32ul"), "char32");
        assert_eq!(demangle("char32ula"), "char32ula");
    }

    #[test]
    fn demangle_strips_function_pointer_marker() {
        assert_eq!(demangle("void *(*)"), "void");
    }

    #[test]
    fn registry_round_trip() {
        let mut reg = TypeRegistry::new();
        reg.register_primitive("float");
        reg.register_enum("Color", vec!["red".into(), "green".into()]);
        reg.register_record("Point", vec![("x".into(), TypeExpr::Named("float".into()))]);
        assert!(reg.is_primitive("float"));
        assert!(reg.is_enum("Color"));
        assert_eq!(reg.enum_of("Color").unwrap().values[1], "green");
        assert_eq!(reg.record_of("Point").unwrap().fields.len(), 1);
        assert!(reg.record_of("Missing").is_err());
    }
}
