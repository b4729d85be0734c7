//! Module contains functionality for serializing values into bytes based
//! on the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)

use crate::errors::Amf0SerializationError;
use crate::markers;
use crate::{Amf0Object, Amf0Value, AmfStr};
use byteorder::{BigEndian, WriteBytesExt};

const U16_MAX_LENGTH: usize = u16::MAX as usize;

/// Serializes values into an amf0 encoded vector of bytes
pub fn serialize(values: &[Amf0Value]) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut bytes = vec![];
    for value in values {
        serialize_value(value, &mut bytes)?;
    }

    Ok(bytes)
}

/// Appends a 16 bit length prefixed name followed by an encoded string
/// value, the building block of a hand-assembled object body.
pub fn serialize_named_string(
    name: &AmfStr,
    value: &AmfStr,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    write_property_name(name, bytes)?;
    serialize_string(value, bytes)
}

/// Appends a 16 bit length prefixed name followed by an encoded number.
pub fn serialize_named_number(
    name: &AmfStr,
    value: f64,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    write_property_name(name, bytes)?;
    serialize_number(value, bytes)
}

/// Appends a 16 bit length prefixed name followed by an encoded boolean.
pub fn serialize_named_boolean(
    name: &AmfStr,
    value: bool,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    write_property_name(name, bytes)?;
    serialize_bool(value, bytes);
    Ok(())
}

fn serialize_value(value: &Amf0Value, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    match *value {
        Amf0Value::Boolean(val) => Ok(serialize_bool(val, bytes)),
        Amf0Value::Null => Ok(serialize_null(bytes)),
        Amf0Value::Undefined => Ok(serialize_undefined(bytes)),
        Amf0Value::Number(val) => serialize_number(val, bytes),
        Amf0Value::Utf8String(ref val) => serialize_string(val, bytes),
        Amf0Value::Object(ref val) => serialize_object(val, bytes),
        Amf0Value::EcmaArray(ref val) => serialize_ecma_array(val, bytes),
        Amf0Value::StrictArray(ref val) => serialize_strict_array(val, bytes),
        Amf0Value::Date {
            unix_ms,
            utc_offset,
        } => serialize_date(unix_ms, utc_offset, bytes),
        Amf0Value::XmlDocument(ref val) => serialize_xml_document(val, bytes),
    }
}

fn serialize_number(value: f64, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::NUMBER_MARKER);
    bytes.write_f64::<BigEndian>(value)?;
    Ok(())
}

fn serialize_bool(value: bool, bytes: &mut Vec<u8>) {
    bytes.push(markers::BOOLEAN_MARKER);
    bytes.push(value as u8);
}

fn serialize_string(value: &AmfStr, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    if value.len() > U16_MAX_LENGTH {
        bytes.push(markers::LONG_STRING_MARKER);
        bytes.write_u32::<BigEndian>(value.len() as u32)?;
    } else {
        bytes.push(markers::STRING_MARKER);
        bytes.write_u16::<BigEndian>(value.len() as u16)?;
    }

    bytes.extend(value.as_bytes());
    Ok(())
}

fn serialize_xml_document(
    value: &AmfStr,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::XML_DOCUMENT_MARKER);
    bytes.write_u32::<BigEndian>(value.len() as u32)?;
    bytes.extend(value.as_bytes());
    Ok(())
}

fn serialize_date(
    unix_ms: f64,
    utc_offset: i16,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::DATE_MARKER);
    bytes.write_f64::<BigEndian>(unix_ms)?;
    bytes.write_i16::<BigEndian>(utc_offset)?;
    Ok(())
}

fn serialize_null(bytes: &mut Vec<u8>) {
    bytes.push(markers::NULL_MARKER);
}

fn serialize_undefined(bytes: &mut Vec<u8>) {
    bytes.push(markers::UNDEFINED_MARKER);
}

fn serialize_object(object: &Amf0Object, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::OBJECT_MARKER);
    serialize_object_body(object, bytes)
}

fn serialize_ecma_array(
    object: &Amf0Object,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::ECMA_ARRAY_MARKER);
    bytes.write_u32::<BigEndian>(object.property_count() as u32)?;
    serialize_object_body(object, bytes)
}

// The strict array form carries no terminator, only the element count.
fn serialize_strict_array(
    array: &[Amf0Value],
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::STRICT_ARRAY_MARKER);
    bytes.write_u32::<BigEndian>(array.len() as u32)?;

    for value in array {
        serialize_value(value, bytes)?;
    }

    Ok(())
}

fn serialize_object_body(
    object: &Amf0Object,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    for property in object.properties() {
        write_property_name(&property.name, bytes)?;
        serialize_value(&property.value, bytes)?;
    }

    bytes.write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)?;
    bytes.push(markers::OBJECT_END_MARKER);
    Ok(())
}

fn write_property_name(name: &AmfStr, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    if name.len() > U16_MAX_LENGTH {
        return Err(Amf0SerializationError::PropertyNameTooLong);
    }

    bytes.write_u16::<BigEndian>(name.len() as u16)?;
    bytes.extend(name.as_bytes());
    Ok(())
}
