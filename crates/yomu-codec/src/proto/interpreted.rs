use serde_json::{Map, Value};

use super::{
    DecodeError, Decoder, MAX_DEPTH,
    schema::{EnumDef, FieldDef, FieldKind, MessageDef, Schema},
    value,
    wire::{Reader, WireValue},
};

/// Decoder that walks the schema by name for every message and field it
/// meets. Slower than [`super::NativeDecoder`] but needs no preparation, and
/// a dangling type reference only fails when a payload reaches it.
pub struct InterpretedDecoder {
    schema: Schema,
}

impl InterpretedDecoder {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    fn find_message(&self, name: &str) -> Result<&MessageDef, DecodeError> {
        self.schema
            .find_message(name)
            .ok_or_else(|| DecodeError::UnknownType(name.to_string()))
    }

    fn find_enum(&self, name: &str) -> Result<&EnumDef, DecodeError> {
        self.schema
            .find_enum(name)
            .ok_or_else(|| DecodeError::UnknownType(name.to_string()))
    }

    fn convert(&self, field: &FieldDef, wire: WireValue, depth: usize) -> Result<Value, DecodeError> {
        match &field.kind {
            FieldKind::Scalar(kind) => value::scalar(field, *kind, wire),
            FieldKind::Enum(name) => value::enumeration(field, Some(self.find_enum(name)?), wire),
            FieldKind::Message(name) => match wire {
                WireValue::Bytes(bytes) => self.decode_message(name, bytes, depth + 1),
                other => Err(DecodeError::WireTypeMismatch {
                    field: field.name.clone(),
                    wire_type: other.wire_type().id(),
                }),
            },
        }
    }

    fn decode_message(&self, name: &str, buf: &[u8], depth: usize) -> Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::RecursionLimit);
        }

        let message = self.find_message(name)?;
        let mut record = Map::new();
        let mut reader = Reader::new(buf);

        while !reader.is_empty() {
            let (number, wire) = reader.read_field()?;
            let Some(field) = message.fields.iter().find(|f| f.number == number) else {
                continue;
            };

            if value::is_packed(field, &wire) {
                if let WireValue::Bytes(bytes) = wire {
                    for item in value::unpack(field.kind.wire_type(), bytes)? {
                        let converted = self.convert(field, item, depth)?;
                        value::store(&mut record, &message.fields, field, converted);
                    }
                }
                continue;
            }

            let converted = self.convert(field, wire, depth)?;
            value::store(&mut record, &message.fields, field, converted);
        }

        value::fill_absent(&mut record, &message.fields, |i| match &message.fields[i].kind {
            FieldKind::Enum(name) => self.schema.find_enum(name).map(EnumDef::default_value),
            _ => None,
        })?;

        Ok(Value::Object(record))
    }
}

impl Decoder for InterpretedDecoder {
    fn decode(&self, message: &str, buf: &[u8]) -> Result<Value, DecodeError> {
        self.decode_message(message, buf, 0)
    }
}
