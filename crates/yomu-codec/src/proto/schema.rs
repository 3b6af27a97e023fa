use serde_json::Value;

use super::wire::WireType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Bool,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Float,
    Double,
    String,
    Bytes,
}

impl ScalarKind {
    pub fn wire_type(self) -> WireType {
        match self {
            Self::Int32
            | Self::Int64
            | Self::UInt32
            | Self::UInt64
            | Self::SInt32
            | Self::SInt64
            | Self::Bool => WireType::Varint,
            Self::Fixed64 | Self::SFixed64 | Self::Double => WireType::Fixed64,
            Self::Fixed32 | Self::SFixed32 | Self::Float => WireType::Fixed32,
            Self::String | Self::Bytes => WireType::LengthDelimited,
        }
    }

    pub fn is_packable(self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Enum(String),
    Message(String),
}

impl FieldKind {
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Scalar(kind) => kind.wire_type(),
            Self::Enum(_) => WireType::Varint,
            Self::Message(_) => WireType::LengthDelimited,
        }
    }

    pub fn is_packable(&self) -> bool {
        match self {
            Self::Scalar(kind) => kind.is_packable(),
            Self::Enum(_) => true,
            Self::Message(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Absent means the type default (or the declared default).
    Singular,
    /// Absent means null unless a default is declared.
    Optional,
    /// Absent is a decode error.
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub number: u32,
    pub name: String,
    pub kind: FieldKind,
    pub label: Label,
    pub default: Option<Value>,
    pub oneof: Option<String>,
}

impl FieldDef {
    pub fn new(number: u32, name: &str, kind: FieldKind) -> Self {
        Self {
            number,
            name: name.to_string(),
            kind,
            label: Label::Singular,
            default: None,
            oneof: None,
        }
    }

    pub fn scalar(number: u32, name: &str, kind: ScalarKind) -> Self {
        Self::new(number, name, FieldKind::Scalar(kind))
    }

    pub fn enumeration(number: u32, name: &str, type_name: &str) -> Self {
        Self::new(number, name, FieldKind::Enum(type_name.to_string()))
    }

    pub fn message(number: u32, name: &str, type_name: &str) -> Self {
        Self::new(number, name, FieldKind::Message(type_name.to_string()))
    }

    pub fn optional(mut self) -> Self {
        self.label = Label::Optional;
        self
    }

    pub fn required(mut self) -> Self {
        self.label = Label::Required;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.label = Label::Repeated;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn oneof(mut self, group: &str) -> Self {
        self.oneof = Some(group.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: vec![],
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<(String, i32)>,
}

impl EnumDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: vec![],
        }
    }

    pub fn value(mut self, name: &str, number: i32) -> Self {
        self.values.push((name.to_string(), number));
        self
    }

    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(name, _)| name.as_str())
    }

    /// The value an absent enum field takes: number zero if declared, else the
    /// first declared value.
    pub fn default_value(&self) -> Value {
        match self.name_of(0).or_else(|| self.values.first().map(|(n, _)| n.as_str())) {
            Some(name) => Value::String(name.to_string()),
            None => Value::from(0),
        }
    }
}

/// Message and enum definitions a payload is decoded against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enumeration(mut self, enumeration: EnumDef) -> Self {
        self.enums.push(enumeration);
        self
    }

    pub fn find_message(&self, name: &str) -> Option<&MessageDef> {
        self.messages.iter().find(|m| m.name == name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }
}
