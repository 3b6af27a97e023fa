use fnv::FnvHashMap;
use serde_json::{Map, Value};

use super::{
    DecodeError, Decoder, MAX_DEPTH,
    schema::{EnumDef, FieldDef, FieldKind, ScalarKind, Schema},
    value,
    wire::{Reader, WireValue},
};

#[derive(Debug, Clone, Copy)]
enum Target {
    Scalar(ScalarKind),
    Enum(usize),
    Message(usize),
}

struct CompiledMessage {
    fields: Vec<FieldDef>,
    targets: Vec<Target>,
    by_number: FnvHashMap<u32, usize>,
}

/// Decoder working from index tables built once from the schema. Every type
/// reference is resolved up front, so a dangling one fails construction.
pub struct NativeDecoder {
    messages: Vec<CompiledMessage>,
    enums: Vec<EnumDef>,
    by_name: FnvHashMap<String, usize>,
}

impl NativeDecoder {
    pub fn new(schema: &Schema) -> Result<Self, DecodeError> {
        let by_name: FnvHashMap<String, usize> = schema
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();
        let enum_index: FnvHashMap<&str, usize> = schema
            .enums
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.as_str(), i))
            .collect();

        let mut messages = Vec::with_capacity(schema.messages.len());
        for message in &schema.messages {
            let mut targets = Vec::with_capacity(message.fields.len());
            let mut by_number = FnvHashMap::default();

            for (index, field) in message.fields.iter().enumerate() {
                let target = match &field.kind {
                    FieldKind::Scalar(kind) => Target::Scalar(*kind),
                    FieldKind::Enum(name) => Target::Enum(
                        *enum_index
                            .get(name.as_str())
                            .ok_or_else(|| DecodeError::UnknownType(name.clone()))?,
                    ),
                    FieldKind::Message(name) => Target::Message(
                        *by_name
                            .get(name)
                            .ok_or_else(|| DecodeError::UnknownType(name.clone()))?,
                    ),
                };
                targets.push(target);
                by_number.insert(field.number, index);
            }

            messages.push(CompiledMessage {
                fields: message.fields.clone(),
                targets,
                by_number,
            });
        }

        Ok(Self {
            messages,
            enums: schema.enums.clone(),
            by_name,
        })
    }

    fn convert(
        &self,
        field: &FieldDef,
        target: Target,
        wire: WireValue,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        match target {
            Target::Scalar(kind) => value::scalar(field, kind, wire),
            Target::Enum(index) => value::enumeration(field, self.enums.get(index), wire),
            Target::Message(index) => match wire {
                WireValue::Bytes(bytes) => self.decode_message(index, bytes, depth + 1),
                other => Err(DecodeError::WireTypeMismatch {
                    field: field.name.clone(),
                    wire_type: other.wire_type().id(),
                }),
            },
        }
    }

    fn decode_message(&self, index: usize, buf: &[u8], depth: usize) -> Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::RecursionLimit);
        }

        let message = &self.messages[index];
        let mut record = Map::new();
        let mut reader = Reader::new(buf);

        while !reader.is_empty() {
            let (number, wire) = reader.read_field()?;
            let Some(&field_index) = message.by_number.get(&number) else {
                continue;
            };
            let field = &message.fields[field_index];
            let target = message.targets[field_index];

            if value::is_packed(field, &wire) {
                if let WireValue::Bytes(bytes) = wire {
                    for item in value::unpack(field.kind.wire_type(), bytes)? {
                        let converted = self.convert(field, target, item, depth)?;
                        value::store(&mut record, &message.fields, field, converted);
                    }
                }
                continue;
            }

            let converted = self.convert(field, target, wire, depth)?;
            value::store(&mut record, &message.fields, field, converted);
        }

        value::fill_absent(&mut record, &message.fields, |i| match message.targets[i] {
            Target::Enum(e) => self.enums.get(e).map(EnumDef::default_value),
            _ => None,
        })?;

        Ok(Value::Object(record))
    }
}

impl Decoder for NativeDecoder {
    fn decode(&self, message: &str, buf: &[u8]) -> Result<Value, DecodeError> {
        let index = *self
            .by_name
            .get(message)
            .ok_or_else(|| DecodeError::UnknownType(message.to_string()))?;

        self.decode_message(index, buf, 0)
    }
}
