use super::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    pub fn from_tag(tag: u64) -> Result<Self, DecodeError> {
        match tag & 0x7 {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(DecodeError::InvalidWireType(other as u8)),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::Fixed32 => 5,
        }
    }
}

/// A raw value read off the wire, before any schema is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl WireValue<'_> {
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Varint(_) => WireType::Varint,
            Self::Fixed64(_) => WireType::Fixed64,
            Self::Bytes(_) => WireType::LengthDelimited,
            Self::Fixed32(_) => WireType::Fixed32,
        }
    }
}

pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let mut value = 0_u64;
        for shift in (0..64).step_by(7) {
            let byte = *self.buf.get(self.pos).ok_or(DecodeError::Truncated)?;
            self.pos += 1;

            if shift == 63 && byte > 1 {
                return Err(DecodeError::VarintOverflow);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        Err(DecodeError::VarintOverflow)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_fixed32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        let mut raw = [0_u8; 4];
        raw.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(raw))
    }

    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.take(8)?;
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::Truncated)?;
        self.take(len)
    }

    /// Reads the next tag and its value. Field number zero is rejected.
    pub fn read_field(&mut self) -> Result<(u32, WireValue<'a>), DecodeError> {
        let tag = self.read_varint()?;
        let wire_type = WireType::from_tag(tag)?;
        let number = u32::try_from(tag >> 3).map_err(|_| DecodeError::InvalidTag)?;
        if number == 0 {
            return Err(DecodeError::InvalidTag);
        }

        let value = match wire_type {
            WireType::Varint => WireValue::Varint(self.read_varint()?),
            WireType::Fixed64 => WireValue::Fixed64(self.read_fixed64()?),
            WireType::LengthDelimited => WireValue::Bytes(self.read_bytes()?),
            WireType::Fixed32 => WireValue::Fixed32(self.read_fixed32()?),
        };

        Ok((number, value))
    }
}

/// Builds wire-format buffers, mostly for fixtures and round trips.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn put_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    fn put_tag(&mut self, field: u32, wire_type: WireType) {
        self.put_varint((u64::from(field) << 3) | u64::from(wire_type.id()));
    }

    pub fn varint(mut self, field: u32, value: u64) -> Self {
        self.put_tag(field, WireType::Varint);
        self.put_varint(value);
        self
    }

    pub fn int64(self, field: u32, value: i64) -> Self {
        self.varint(field, value as u64)
    }

    pub fn sint64(self, field: u32, value: i64) -> Self {
        self.varint(field, ((value << 1) ^ (value >> 63)) as u64)
    }

    pub fn bool(self, field: u32, value: bool) -> Self {
        self.varint(field, u64::from(value))
    }

    pub fn fixed32(mut self, field: u32, value: u32) -> Self {
        self.put_tag(field, WireType::Fixed32);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn fixed64(mut self, field: u32, value: u64) -> Self {
        self.put_tag(field, WireType::Fixed64);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(mut self, field: u32, value: &[u8]) -> Self {
        self.put_tag(field, WireType::LengthDelimited);
        self.put_varint(value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn string(self, field: u32, value: &str) -> Self {
        self.bytes(field, value.as_bytes())
    }

    pub fn message(self, field: u32, message: Encoder) -> Self {
        self.bytes(field, &message.buf)
    }

    pub fn packed(self, field: u32, values: &[u64]) -> Self {
        let mut packed = Encoder::new();
        for value in values {
            packed.put_varint(*value);
        }
        self.bytes(field, &packed.buf)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
