//! This crate provides functionality for serializing and deserializing data
//! based on the Adobe AMF0 encoding specification located at
//! <https://wwwimages2.adobe.com/content/dam/acom/en/devnet/pdf/amf0-file-format-specification.pdf>,
//! plus enough of the AMF3 object format to decode `avmplus`-switched
//! payloads embedded in AMF0 streams.
//!
//! Property order inside objects is preserved: RTMP peers are sensitive to
//! the ordering of command object fields, so an object decoded and
//! re-encoded keeps its properties in the original sequence.
//!
//! # Examples
//! ```
//! use minnow_amf::{Amf0Object, Amf0Value, deserialize, serialize};
//!
//! let mut command = Amf0Object::new();
//! command.add_property("app", Amf0Value::Utf8String("live".into()));
//! command.add_property("tcUrl", Amf0Value::Utf8String("rtmp://localhost/live".into()));
//!
//! let input = vec![
//!     Amf0Value::Utf8String("connect".into()),
//!     Amf0Value::Number(1.0),
//!     Amf0Value::Object(command),
//! ];
//!
//! let bytes = serialize(&input).unwrap();
//! let decoded = deserialize(&bytes).unwrap();
//!
//! assert_eq!(input, decoded);
//! ```

mod amf3;
mod deserialization;
mod errors;
mod serialization;

pub use amf3::Amf3ClassDef;
pub use deserialization::{decode_object_body, decode_value, deserialize};
pub use errors::{Amf0DeserializationError, Amf0SerializationError};
pub use serialization::{
    serialize, serialize_named_boolean, serialize_named_number, serialize_named_string,
};

use std::borrow::Cow;
use std::fmt;

/// A length-delimited byte string, the universal string carrier for AMF data.
///
/// AMF strings are nominally UTF-8 but nothing on the wire enforces that, so
/// the raw bytes are kept as received.  Equality is length plus byte-wise
/// content; bytes past the declared length never exist in this
/// representation because constructors copy exactly the declared range.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AmfStr(Vec<u8>);

impl AmfStr {
    pub fn new(bytes: &[u8]) -> AmfStr {
        AmfStr(bytes.to_vec())
    }

    pub fn empty() -> AmfStr {
        AmfStr(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_string_lossy(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<&str> for AmfStr {
    fn from(value: &str) -> Self {
        AmfStr(value.as_bytes().to_vec())
    }
}

impl From<String> for AmfStr {
    fn from(value: String) -> Self {
        AmfStr(value.into_bytes())
    }
}

impl From<Vec<u8>> for AmfStr {
    fn from(value: Vec<u8>) -> Self {
        AmfStr(value)
    }
}

impl From<&[u8]> for AmfStr {
    fn from(value: &[u8]) -> Self {
        AmfStr(value.to_vec())
    }
}

impl PartialEq<&str> for AmfStr {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<AmfStr> for &str {
    fn eq(&self, other: &AmfStr) -> bool {
        self.as_bytes() == other.0
    }
}

impl fmt::Debug for AmfStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AmfStr({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for AmfStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

/// An Enum representing the different supported types of Amf0 values
#[derive(PartialEq, Debug, Clone)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    Utf8String(AmfStr),
    Object(Amf0Object),
    EcmaArray(Amf0Object),
    StrictArray(Vec<Amf0Value>),
    /// Milliseconds since the Unix epoch plus a signed UTC offset.
    Date { unix_ms: f64, utc_offset: i16 },
    XmlDocument(AmfStr),
    Null,
    Undefined,
}

impl Amf0Value {
    pub fn get_number(self) -> Option<f64> {
        match self {
            Amf0Value::Number(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_boolean(self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_string(self) -> Option<AmfStr> {
        match self {
            Amf0Value::Utf8String(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_object(self) -> Option<Amf0Object> {
        match self {
            Amf0Value::Object(object) => Some(object),
            Amf0Value::EcmaArray(object) => Some(object),
            _ => None,
        }
    }
}

/// One named slot inside an [`Amf0Object`].
#[derive(PartialEq, Debug, Clone)]
pub struct Amf0Property {
    pub name: AmfStr,
    pub value: Amf0Value,
}

/// An ordered collection of named properties.
///
/// Unlike a map, insertion order is significant: encoding walks the
/// properties in the order they were added and decoding appends them in wire
/// order, so `decode(encode(x)) == x` holds including ordering.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Amf0Object {
    properties: Vec<Amf0Property>,
}

impl Amf0Object {
    pub fn new() -> Amf0Object {
        Amf0Object {
            properties: Vec::new(),
        }
    }

    pub fn add_property<N: Into<AmfStr>>(&mut self, name: N, value: Amf0Value) {
        self.properties.push(Amf0Property {
            name: name.into(),
            value,
        });
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn property_at(&self, index: usize) -> Option<&Amf0Property> {
        self.properties.get(index)
    }

    pub fn property_named(&self, name: &str) -> Option<&Amf0Property> {
        self.properties
            .iter()
            .find(|property| property.name.as_bytes() == name.as_bytes())
    }

    pub fn properties(&self) -> &[Amf0Property] {
        &self.properties
    }

    pub fn into_properties(self) -> Vec<Amf0Property> {
        self.properties
    }
}

impl FromIterator<Amf0Property> for Amf0Object {
    fn from_iter<T: IntoIterator<Item = Amf0Property>>(iter: T) -> Self {
        Amf0Object {
            properties: iter.into_iter().collect(),
        }
    }
}

pub(crate) mod markers {
    pub const NUMBER_MARKER: u8 = 0;
    pub const BOOLEAN_MARKER: u8 = 1;
    pub const STRING_MARKER: u8 = 2;
    pub const OBJECT_MARKER: u8 = 3;
    pub const MOVIE_CLIP_MARKER: u8 = 4;
    pub const NULL_MARKER: u8 = 5;
    pub const UNDEFINED_MARKER: u8 = 6;
    pub const REFERENCE_MARKER: u8 = 7;
    pub const ECMA_ARRAY_MARKER: u8 = 8;
    pub const OBJECT_END_MARKER: u8 = 9;
    pub const STRICT_ARRAY_MARKER: u8 = 10;
    pub const DATE_MARKER: u8 = 11;
    pub const LONG_STRING_MARKER: u8 = 12;
    pub const UNSUPPORTED_MARKER: u8 = 13;
    pub const RECORDSET_MARKER: u8 = 14;
    pub const XML_DOCUMENT_MARKER: u8 = 15;
    pub const TYPED_OBJECT_MARKER: u8 = 16;
    pub const AVMPLUS_OBJECT_MARKER: u8 = 17;
    pub const UTF_8_EMPTY_MARKER: u16 = 0;

    /// Full three byte object terminator: empty property name + end marker.
    pub const OBJECT_END_SEQUENCE: [u8; 3] = [0, 0, OBJECT_END_MARKER];
}
