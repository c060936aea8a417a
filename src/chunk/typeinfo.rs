use tracing::instrument;

use crate::chunk::TYPES_ALREADY_UNIFIED_BIT;
use crate::error::{LogError, Result};
use crate::schema::{demangle, TypeExpr, TypeRegistry};
use crate::stream::StreamReader;

/// Parses the TypeInfo chunk body and populates `registry` with every
/// primitive, record, and enum it declares.
///
/// Demangling (see [`crate::schema::demangle`]) is applied to primitive
/// names, record names, and field *type* expressions, but never to field
/// names or enum value names.
#[instrument(name = "chunk.eval_typeinfo", skip(reader, registry))]
pub fn eval(reader: &mut StreamReader<'_>, registry: &mut TypeRegistry) -> Result<()> {
    let raw_count = reader.read_u32()?;
    let needs_unification = raw_count & TYPES_ALREADY_UNIFIED_BIT == 0;
    let primitive_count = raw_count & !TYPES_ALREADY_UNIFIED_BIT;

    let canon = |s: String| -> String { if needs_unification { demangle(&s) } else { s } };

    for _ in 0..primitive_count {
        let name = reader.read_string()?;
        registry.register_primitive(canon(name));
    }

    let class_count = reader.read_u32()?;
    for _ in 0..class_count {
        let name = canon(reader.read_string()?);
        let field_count = reader.read_u32()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let field_name = reader.read_string()?;
            let field_type = canon(reader.read_string()?);
            fields.push((field_name, TypeExpr::parse(&field_type)));
        }
        if fields.len() != field_count as usize {
            return Err(LogError::CountMismatch {
                what: "record field count",
                declared: field_count,
                actual: fields.len() as u32,
            });
        }
        registry.register_record(name, fields);
    }

    let enum_count = reader.read_u32()?;
    for _ in 0..enum_count {
        let name = canon(reader.read_string()?);
        let value_count = reader.read_u32()?;
        let mut values = Vec::with_capacity(value_count as usize);
        for _ in 0..value_count {
            values.push(reader.read_string()?);
        }
        if values.len() != value_count as usize {
            return Err(LogError::CountMismatch {
                what: "enum value count",
                declared: value_count,
                actual: values.len() as u32,
            });
        }
        registry.register_enum(name, values);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_str(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        buf.extend_from_slice(s.as_bytes());
    }

    #[test]
    fn parses_primitives_records_enums() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(2u32 | TYPES_ALREADY_UNIFIED_BIT).to_le_bytes());
        push_str(&mut buf, "float");
        push_str(&mut buf, "unsigned int");

        buf.extend_from_slice(&1u32.to_le_bytes());
        push_str(&mut buf, "Point");
        buf.extend_from_slice(&2u32.to_le_bytes());
        push_str(&mut buf, "x");
        push_str(&mut buf, "float");
        push_str(&mut buf, "y");
        push_str(&mut buf, "float");

        buf.extend_from_slice(&1u32.to_le_bytes());
        push_str(&mut buf, "MessageID");
        buf.extend_from_slice(&3u32.to_le_bytes());
        push_str(&mut buf, "undefined");
        push_str(&mut buf, "idFrameBegin");
        push_str(&mut buf, "idFrameFinished");

        let mut reader = StreamReader::new(&buf);
        let mut registry = TypeRegistry::new();
        eval(&mut reader, &mut registry).unwrap();

        assert!(registry.is_primitive("float"));
        assert!(registry.is_record("Point"));
        assert_eq!(registry.record_of("Point").unwrap().fields.len(), 2);
        assert!(registry.is_enum("MessageID"));
        assert_eq!(registry.enum_of("MessageID").unwrap().values[1], "idFrameBegin");
    }

    #[test]
    fn demangles_when_unification_bit_clear() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        push_str(&mut buf, "std::__1::vector<int, std::allocator<int> >");
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        let mut reader = StreamReader::new(&buf);
        let mut registry = TypeRegistry::new();
        eval(&mut reader, &mut registry).unwrap();
        assert!(registry.is_primitive("std::vector<int,std::allocator<int>>"));
    }
}
