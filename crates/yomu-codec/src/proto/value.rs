use base64::{Engine as _, engine::general_purpose};
use serde_json::{Map, Number, Value};

use super::{
    DecodeError,
    schema::{EnumDef, FieldDef, FieldKind, Label, ScalarKind},
    wire::{Reader, WireType, WireValue},
};

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn mismatch(field: &FieldDef, value: &WireValue) -> DecodeError {
    DecodeError::WireTypeMismatch {
        field: field.name.clone(),
        wire_type: value.wire_type().id(),
    }
}

pub(crate) fn scalar(
    field: &FieldDef,
    kind: ScalarKind,
    value: WireValue,
) -> Result<Value, DecodeError> {
    let value = match (kind, value) {
        (ScalarKind::Int32, WireValue::Varint(v)) => Value::from(v as i32),
        (ScalarKind::Int64, WireValue::Varint(v)) => Value::from(v as i64),
        (ScalarKind::UInt32, WireValue::Varint(v)) => Value::from(v as u32),
        (ScalarKind::UInt64, WireValue::Varint(v)) => Value::from(v),
        (ScalarKind::SInt32, WireValue::Varint(v)) => {
            let v = v as u32;
            Value::from((v >> 1) as i32 ^ -((v & 1) as i32))
        }
        (ScalarKind::SInt64, WireValue::Varint(v)) => {
            Value::from((v >> 1) as i64 ^ -((v & 1) as i64))
        }
        (ScalarKind::Bool, WireValue::Varint(v)) => Value::Bool(v != 0),
        (ScalarKind::Fixed32, WireValue::Fixed32(v)) => Value::from(v),
        (ScalarKind::SFixed32, WireValue::Fixed32(v)) => Value::from(v as i32),
        (ScalarKind::Float, WireValue::Fixed32(v)) => float(f64::from(f32::from_bits(v))),
        (ScalarKind::Fixed64, WireValue::Fixed64(v)) => Value::from(v),
        (ScalarKind::SFixed64, WireValue::Fixed64(v)) => Value::from(v as i64),
        (ScalarKind::Double, WireValue::Fixed64(v)) => float(f64::from_bits(v)),
        (ScalarKind::String, WireValue::Bytes(bytes)) => match std::str::from_utf8(bytes) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => return Err(DecodeError::InvalidUtf8(field.name.clone())),
        },
        (ScalarKind::Bytes, WireValue::Bytes(bytes)) => {
            Value::String(general_purpose::STANDARD.encode(bytes))
        }
        (_, value) => return Err(mismatch(field, &value)),
    };

    Ok(value)
}

pub(crate) fn enumeration(
    field: &FieldDef,
    def: Option<&EnumDef>,
    value: WireValue,
) -> Result<Value, DecodeError> {
    let WireValue::Varint(v) = value else {
        return Err(mismatch(field, &value));
    };

    let number = v as i32;
    Ok(def
        .and_then(|def| def.name_of(number))
        .map(|name| Value::String(name.to_string()))
        .unwrap_or_else(|| Value::from(number)))
}

/// Splits a packed repeated payload into individual wire values.
pub(crate) fn unpack<'a>(
    wire_type: WireType,
    bytes: &'a [u8],
) -> Result<Vec<WireValue<'a>>, DecodeError> {
    let mut reader = Reader::new(bytes);
    let mut values = vec![];
    while !reader.is_empty() {
        let value = match wire_type {
            WireType::Varint => WireValue::Varint(reader.read_varint()?),
            WireType::Fixed32 => WireValue::Fixed32(reader.read_fixed32()?),
            WireType::Fixed64 => WireValue::Fixed64(reader.read_fixed64()?),
            WireType::LengthDelimited => WireValue::Bytes(reader.read_bytes()?),
        };
        values.push(value);
    }

    Ok(values)
}

/// Whether a length-delimited value for `field` is a packed run of scalars.
pub(crate) fn is_packed(field: &FieldDef, value: &WireValue) -> bool {
    field.label == Label::Repeated
        && field.kind.is_packable()
        && matches!(value, WireValue::Bytes(_))
}

/// Stores a decoded value, appending for repeated fields and clearing the
/// other members of a oneof group.
pub(crate) fn store(record: &mut Map<String, Value>, fields: &[FieldDef], field: &FieldDef, value: Value) {
    if field.label == Label::Repeated {
        match record
            .entry(field.name.clone())
            .or_insert_with(|| Value::Array(vec![]))
        {
            Value::Array(items) => items.push(value),
            other => *other = Value::Array(vec![value]),
        }
        return;
    }

    if let Some(group) = &field.oneof {
        for sibling in fields
            .iter()
            .filter(|f| f.oneof.as_ref() == Some(group) && f.number != field.number)
        {
            record.remove(&sibling.name);
        }
    }

    record.insert(field.name.clone(), value);
}

fn type_default(kind: &FieldKind, enum_default: Option<Value>) -> Value {
    match kind {
        FieldKind::Scalar(
            ScalarKind::Int32
            | ScalarKind::Int64
            | ScalarKind::UInt32
            | ScalarKind::UInt64
            | ScalarKind::SInt32
            | ScalarKind::SInt64
            | ScalarKind::Fixed32
            | ScalarKind::Fixed64
            | ScalarKind::SFixed32
            | ScalarKind::SFixed64,
        ) => Value::from(0),
        FieldKind::Scalar(ScalarKind::Float | ScalarKind::Double) => float(0.0),
        FieldKind::Scalar(ScalarKind::Bool) => Value::Bool(false),
        FieldKind::Scalar(ScalarKind::String | ScalarKind::Bytes) => Value::String(String::new()),
        FieldKind::Enum(_) => enum_default.unwrap_or_else(|| Value::from(0)),
        FieldKind::Message(_) => Value::Null,
    }
}

/// Fills in every field the payload did not carry. `enum_default` resolves
/// the default of an enum field by index into `fields`.
pub(crate) fn fill_absent<F>(
    record: &mut Map<String, Value>,
    fields: &[FieldDef],
    enum_default: F,
) -> Result<(), DecodeError>
where
    F: Fn(usize) -> Option<Value>,
{
    for (index, field) in fields.iter().enumerate() {
        if record.contains_key(&field.name) || field.oneof.is_some() {
            continue;
        }

        let value = match field.label {
            Label::Repeated => Value::Array(vec![]),
            Label::Required => return Err(DecodeError::MissingRequired(field.name.clone())),
            Label::Optional => field.default.clone().unwrap_or(Value::Null),
            Label::Singular => match &field.default {
                Some(default) => default.clone(),
                None => type_default(&field.kind, enum_default(index)),
            },
        };
        record.insert(field.name.clone(), value);
    }

    Ok(())
}
