use std::fmt;
use std::ops::Range;

use serde::{Serialize, Serializer};

use crate::reader::ByteReader;
use crate::slice::{Slice, to_hex};
use crate::token::Token;

/// Decoded field value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Variant {
    /// Marker attribute with no value (e.g. a present option).
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Slice),
}

impl Variant {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(value) => Some(*value),
            Self::Int(value) => u64::try_from(*value).ok(),
            Self::Bool(value) => Some(u64::from(*value)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(slice) => Some(slice.as_bytes()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

macro_rules! variant_from {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

variant_from!(UInt: u8, u16, u32, u64);
variant_from!(Int: i8, i16, i32, i64);
variant_from!(Float: f32, f64);
variant_from!(Bool: bool);
variant_from!(Str: String, &str);
variant_from!(Bytes: Slice);

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
            Self::Bytes(slice) => f.write_str(&to_hex(slice.as_bytes())),
        }
    }
}

impl Serialize for Variant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Nil => serializer.serialize_none(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::UInt(value) => serializer.serialize_u64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Str(value) => serializer.serialize_str(value),
            Self::Bytes(slice) => serializer.serialize_str(&to_hex(slice.as_bytes())),
        }
    }
}

/// One decoded field of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub id: Token,
    pub value: Variant,
    /// Absolute frame byte range; `None` for synthetic values.
    pub range: Option<Range<usize>>,
    pub summary: Option<String>,
    pub error: bool,
    /// Presentation hint such as `@flags` or `@nested`.
    pub typ: Option<Token>,
}

impl Attribute {
    /// Synthetic attribute with no byte range.
    pub fn new(id: Token, value: impl Into<Variant>) -> Self {
        Self {
            id,
            value: value.into(),
            range: None,
            summary: None,
            error: false,
            typ: None,
        }
    }

    /// Attribute for the value just read: range and error come from `reader`.
    pub fn from_reader(id: Token, value: impl Into<Variant>, reader: &ByteReader) -> Self {
        Self::new(id, value).with_range(reader.last_range()).with_error(reader.last_error())
    }

    pub fn with_range(mut self, range: Range<usize>) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_error(mut self, error: bool) -> Self {
        self.error = error;
        self
    }

    pub fn with_typ(mut self, typ: Token) -> Self {
        self.typ = Some(typ);
        self
    }
}
