use indexmap::IndexMap;

use crate::error::{LogError, Result};
use crate::schema::{TypeExpr, TypeRegistry};
use crate::stream::StreamReader;
use crate::value::Value;

/// The six hand-written record shapes that replace whatever the embedded
/// schema might otherwise say about them. Their wire layout is fixed by the
/// framework, not by the log's TypeInfo chunk.
const BUILTIN_OVERRIDES: [&str; 6] =
    ["CameraImage", "JPEGImage", "Annotation", "Stopwatch", "FrameBegin", "FrameFinished"];

pub fn is_builtin(type_name: &str) -> bool {
    BUILTIN_OVERRIDES.contains(&type_name)
}

/// Decodes one value of `type_name` from `reader`, optionally checking that
/// decoding consumed exactly up to `end`.
pub fn decode(
    registry: &TypeRegistry,
    type_name: &str,
    reader: &mut StreamReader<'_>,
    end: Option<usize>,
) -> Result<Value> {
    let value = decode_named(registry, type_name, reader)?;
    if let Some(end) = end {
        if reader.tell() != end {
            return Err(LogError::PayloadSizeMismatch { expected_end: end, actual_end: reader.tell() });
        }
    }
    Ok(value)
}

fn decode_named(registry: &TypeRegistry, type_name: &str, reader: &mut StreamReader<'_>) -> Result<Value> {
    if is_builtin(type_name) {
        return decode_builtin(type_name, reader);
    }
    decode_expr(registry, &TypeExpr::parse(type_name), reader)
}

fn decode_expr(registry: &TypeRegistry, expr: &TypeExpr, reader: &mut StreamReader<'_>) -> Result<Value> {
    match expr {
        TypeExpr::FixedArray { element, len } => {
            let mut items = Vec::with_capacity(*len);
            for _ in 0..*len {
                items.push(decode_expr(registry, element, reader)?);
            }
            Ok(Value::Array(items))
        }
        TypeExpr::DynamicArray { element } => {
            let count = reader.read_u32()? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_expr(registry, element, reader)?);
            }
            Ok(Value::Array(items))
        }
        TypeExpr::Named(name) => decode_scalar(registry, name, reader),
    }
}

fn decode_scalar(registry: &TypeRegistry, name: &str, reader: &mut StreamReader<'_>) -> Result<Value> {
    if is_builtin(name) {
        return decode_builtin(name, reader);
    }
    if let Some(v) = decode_primitive(name, reader)? {
        return Ok(v);
    }
    if registry.is_enum(name) {
        let desc = registry.enum_of(name)?;
        let idx = reader.read_u8()?;
        let value_name = desc
            .values
            .get(idx as usize)
            .ok_or_else(|| LogError::BadEnum { type_name: name.to_string(), value: idx })?
            .clone();
        return Ok(Value::Enum { type_name: name.to_string(), index: idx, name: value_name });
    }
    if registry.is_record(name) {
        let desc = registry.record_of(name)?.clone();
        let mut map = IndexMap::with_capacity(desc.fields.len());
        for (field_name, field_type) in &desc.fields {
            let value = decode_expr(registry, field_type, reader)?;
            map.insert(field_name.clone(), value);
        }
        return Ok(Value::Record(map));
    }
    Err(LogError::UnknownType(name.to_string()))
}

fn decode_primitive(name: &str, reader: &mut StreamReader<'_>) -> Result<Option<Value>> {
    let value = match name {
        "bool" => Value::Bool(reader.read_bool()?),
        "char" | "signed char" | "char8_t" => Value::I8(reader.read_i8()?),
        "unsigned char" => Value::U8(reader.read_u8()?),
        "short" => Value::I16(reader.read_i16()?),
        "unsigned short" => Value::U16(reader.read_u16()?),
        "int" => Value::I32(reader.read_i32()?),
        "unsigned int" => Value::U32(reader.read_u32()?),
        "long" | "long long" => Value::I64(reader.read_i64()?),
        "unsigned long" | "unsigned long long" => Value::U64(reader.read_u64()?),
        "float" => Value::F32(reader.read_f32()?),
        "double" => Value::F64(reader.read_f64()?),
        "string" | "std::string" => Value::Str(reader.read_string()?),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn decode_builtin(name: &str, reader: &mut StreamReader<'_>) -> Result<Value> {
    match name {
        "CameraImage" => decode_camera_image(reader),
        "JPEGImage" => decode_jpeg_image(reader),
        "Annotation" => decode_annotation(reader),
        "Stopwatch" => decode_stopwatch(reader),
        "FrameBegin" | "FrameFinished" => decode_frame_sentinel(reader),
        other => Err(LogError::UnknownType(other.to_string())),
    }
}

/// `width:u32, height:u32, timestamp:u32` with the interlace bit-trick: a set
/// high bit on `timestamp` doubles `height` and is cleared before storing.
fn decode_camera_image(reader: &mut StreamReader<'_>) -> Result<Value> {
    let width = reader.read_u32()?;
    let mut height = reader.read_u32()?;
    let mut timestamp = reader.read_u32()?;
    const INTERLACE_BIT: u32 = 1 << 31;
    if timestamp & INTERLACE_BIT != 0 {
        height *= 2;
        timestamp &= !INTERLACE_BIT;
    }
    let pixel_bytes = (width as usize) * (height as usize) * 2;
    let image = reader.read_bytes(pixel_bytes)?.to_vec();
    let mut map = IndexMap::new();
    map.insert("width".to_string(), Value::U32(width));
    map.insert("height".to_string(), Value::U32(height));
    map.insert("timestamp".to_string(), Value::U32(timestamp));
    map.insert("image".to_string(), Value::Bytes(image));
    Ok(Value::Record(map))
}

fn decode_jpeg_image(reader: &mut StreamReader<'_>) -> Result<Value> {
    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    let timestamp = reader.read_u32()?;
    let len = reader.read_u32()? as usize;
    let blob = reader.read_bytes(len)?.to_vec();
    let mut map = IndexMap::new();
    map.insert("width".to_string(), Value::U32(width));
    map.insert("height".to_string(), Value::U32(height));
    map.insert("timestamp".to_string(), Value::U32(timestamp));
    map.insert("jpeg_data".to_string(), Value::Bytes(blob));
    Ok(Value::Record(map))
}

fn decode_annotation(reader: &mut StreamReader<'_>) -> Result<Value> {
    let name = reader.read_string()?;
    let annotation = reader.read_string()?;
    let mut map = IndexMap::new();
    map.insert("name".to_string(), Value::Str(name));
    map.insert("annotation".to_string(), Value::Str(annotation));
    Ok(Value::Record(map))
}

fn decode_stopwatch(reader: &mut StreamReader<'_>) -> Result<Value> {
    let count = reader.read_u32()?;
    let mut samples = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = reader.read_string()?;
        let duration_us = reader.read_u32()?;
        samples.push(Value::Record(IndexMap::from_iter([
            ("name".to_string(), Value::Str(name)),
            ("duration_us".to_string(), Value::U32(duration_us)),
        ])));
    }
    let mut map = IndexMap::new();
    map.insert("samples".to_string(), Value::Array(samples));
    Ok(Value::Record(map))
}

/// `frame_number:u32` followed by the remaining bytes decoded as the thread
/// name; bounded entirely by the message's own declared length, so the caller
/// must supply a reader that does not extend past the message payload.
fn decode_frame_sentinel(reader: &mut StreamReader<'_>) -> Result<Value> {
    let frame_number = reader.read_u32()?;
    let remaining = reader.len() - reader.tell();
    let name_bytes = reader.read_bytes(remaining)?;
    let mut map = IndexMap::new();
    map.insert("frame_number".to_string(), Value::U32(frame_number));
    map.insert("thread_name".to_string(), Value::Str(String::from_utf8_lossy(name_bytes).into_owned()));
    Ok(Value::Record(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_record() {
        let mut registry = TypeRegistry::new();
        registry.register_primitive("float");
        registry.register_record("Point", vec![
            ("x".into(), TypeExpr::Named("float".into())),
            ("y".into(), TypeExpr::Named("float".into())),
        ]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&2.5f32.to_le_bytes());
        let mut reader = StreamReader::new(&bytes);
        let v = decode(&registry, "Point", &mut reader, Some(bytes.len())).unwrap();
        assert_eq!(v.field("x").unwrap().clone(), Value::F32(1.5));
        assert_eq!(v.field("y").unwrap().clone(), Value::F32(2.5));
    }

    #[test]
    fn decodes_camera_image_interlace_bit() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&(1000u32 | (1 << 31)).to_le_bytes());
        bytes.extend(std::iter::repeat(0u8).take(4 * 4 * 2));
        let registry = TypeRegistry::new();
        let mut reader = StreamReader::new(&bytes);
        let v = decode(&registry, "CameraImage", &mut reader, Some(bytes.len())).unwrap();
        assert_eq!(v.field("height").unwrap().clone(), Value::U32(4));
        assert_eq!(v.field("timestamp").unwrap().clone(), Value::U32(1000));
    }

    #[test]
    fn payload_size_mismatch_detected() {
        let registry = TypeRegistry::new();
        let bytes = [0u8; 8];
        let mut reader = StreamReader::new(&bytes);
        let err = decode(&registry, "unsigned int", &mut reader, Some(8)).unwrap_err();
        assert!(matches!(err, LogError::PayloadSizeMismatch { .. }));
    }

    #[test]
    fn unknown_type_errors() {
        let registry = TypeRegistry::new();
        let bytes = [0u8; 4];
        let mut reader = StreamReader::new(&bytes);
        let err = decode(&registry, "Nonexistent", &mut reader, None).unwrap_err();
        assert!(matches!(err, LogError::UnknownType(_)));
    }
}
