//! This module contains functionality to deserialize values from bytes
//! that were encoded via the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)
//!
//! All decoding works over plain byte slices and reports exactly how many
//! bytes each call consumed, so callers slicing values out of a larger
//! message body know where the next value begins.

use crate::amf3;
use crate::errors::Amf0DeserializationError;
use crate::markers;
use crate::{Amf0Object, Amf0Property, Amf0Value, AmfStr};
use byteorder::{BigEndian, ByteOrder};

/// Decodes a sequence of AMF0 values until the buffer is exhausted.
pub fn deserialize(buffer: &[u8]) -> Result<Vec<Amf0Value>, Amf0DeserializationError> {
    let mut results = vec![];
    let mut remaining = buffer;

    while !remaining.is_empty() {
        let (value, consumed) = decode_value(remaining)?;
        results.push(value);
        remaining = &remaining[consumed..];
    }

    Ok(results)
}

/// Decodes a single AMF0 value, returning it along with the number of bytes
/// it occupied (type marker included).
pub fn decode_value(buffer: &[u8]) -> Result<(Amf0Value, usize), Amf0DeserializationError> {
    require(buffer, 1)?;
    let marker = buffer[0];
    let rest = &buffer[1..];

    match marker {
        markers::NUMBER_MARKER => {
            require(rest, 8)?;
            Ok((Amf0Value::Number(BigEndian::read_f64(rest)), 9))
        }

        markers::BOOLEAN_MARKER => {
            require(rest, 1)?;
            Ok((Amf0Value::Boolean(rest[0] != 0), 2))
        }

        markers::STRING_MARKER => {
            let (value, consumed) = decode_short_string(rest)?;
            Ok((Amf0Value::Utf8String(value), 1 + consumed))
        }

        markers::OBJECT_MARKER => {
            let (object, consumed) = decode_object_body(rest, true)?;
            Ok((Amf0Value::Object(object), 1 + consumed))
        }

        // Null, undefined and unsupported all normalize to null
        markers::NULL_MARKER | markers::UNDEFINED_MARKER | markers::UNSUPPORTED_MARKER => {
            Ok((Amf0Value::Null, 1))
        }

        markers::ECMA_ARRAY_MARKER => {
            // The associative count is informational only; real encoders
            // terminate the array with 00 00 09 like a plain object, so the
            // body is decoded to the terminator rather than count entries.
            require(rest, 4)?;
            let (object, consumed) = decode_object_body(&rest[4..], true)?;
            Ok((Amf0Value::EcmaArray(object), 1 + 4 + consumed))
        }

        markers::STRICT_ARRAY_MARKER => {
            require(rest, 4)?;
            let count = BigEndian::read_u32(rest);
            let (values, consumed) = decode_array(&rest[4..], count)?;
            Ok((Amf0Value::StrictArray(values), 1 + 4 + consumed))
        }

        markers::DATE_MARKER => {
            require(rest, 10)?;
            let unix_ms = BigEndian::read_f64(rest);
            let utc_offset = BigEndian::read_i16(&rest[8..]);
            Ok((
                Amf0Value::Date {
                    unix_ms,
                    utc_offset,
                },
                11,
            ))
        }

        markers::LONG_STRING_MARKER => {
            let (value, consumed) = decode_long_string(rest)?;
            Ok((Amf0Value::Utf8String(value), 1 + consumed))
        }

        markers::XML_DOCUMENT_MARKER => {
            let (value, consumed) = decode_long_string(rest)?;
            Ok((Amf0Value::XmlDocument(value), 1 + consumed))
        }

        markers::AVMPLUS_OBJECT_MARKER => {
            let (object, consumed) = amf3::decode_root(rest)?;
            Ok((Amf0Value::Object(object), 1 + consumed))
        }

        markers::OBJECT_END_MARKER => Err(Amf0DeserializationError::UnexpectedObjectEnd),

        markers::REFERENCE_MARKER
        | markers::MOVIE_CLIP_MARKER
        | markers::RECORDSET_MARKER
        | markers::TYPED_OBJECT_MARKER => {
            Err(Amf0DeserializationError::UnsupportedMarker { marker })
        }

        _ => Err(Amf0DeserializationError::UnknownMarker { marker }),
    }
}

/// Decodes the body of an object (the part after the type marker): named
/// properties up to and including the `00 00 09` terminator.
///
/// When a property fails to decode the loop switches into recovery mode and
/// skips one byte at a time looking for the terminator, so a partially
/// garbled body still yields its leading properties.  The skip is bounded by
/// the remaining buffer length; running out of bytes without finding the
/// terminator is an error.
pub fn decode_object_body(
    buffer: &[u8],
    decode_names: bool,
) -> Result<(Amf0Object, usize), Amf0DeserializationError> {
    let mut object = Amf0Object::new();
    let mut remaining = buffer;
    let mut consumed = 0;
    let mut recovering = false;

    loop {
        if remaining.len() >= 3 && remaining[..3] == markers::OBJECT_END_SEQUENCE {
            return Ok((object, consumed + 3));
        }

        if remaining.is_empty() {
            return Err(Amf0DeserializationError::MissingObjectTerminator);
        }

        if recovering {
            remaining = &remaining[1..];
            consumed += 1;
            continue;
        }

        match decode_property(remaining, decode_names) {
            Ok((property, property_size)) => {
                remaining = &remaining[property_size..];
                consumed += property_size;
                object.add_property(property.name, property.value);
            }
            Err(_) => {
                recovering = true;
            }
        }
    }
}

fn decode_property(
    buffer: &[u8],
    decode_name: bool,
) -> Result<(Amf0Property, usize), Amf0DeserializationError> {
    if !decode_name {
        let (value, consumed) = decode_value(buffer)?;
        return Ok((
            Amf0Property {
                name: AmfStr::empty(),
                value,
            },
            consumed,
        ));
    }

    // At least a name length, one name byte and one data byte
    require(buffer, 4)?;
    let (name, name_size) = decode_short_string(buffer)?;
    let (value, value_size) = decode_value(&buffer[name_size..])?;

    Ok((Amf0Property { name, value }, name_size + value_size))
}

fn decode_array(
    buffer: &[u8],
    count: u32,
) -> Result<(Vec<Amf0Value>, usize), Amf0DeserializationError> {
    let mut values = Vec::new();
    let mut remaining = buffer;
    let mut consumed = 0;

    for _ in 0..count {
        let (value, value_size) = decode_value(remaining)?;
        values.push(value);
        remaining = &remaining[value_size..];
        consumed += value_size;
    }

    Ok((values, consumed))
}

fn decode_short_string(buffer: &[u8]) -> Result<(AmfStr, usize), Amf0DeserializationError> {
    require(buffer, 2)?;
    let length = BigEndian::read_u16(buffer) as usize;
    require(buffer, 2 + length)?;

    Ok((AmfStr::new(&buffer[2..2 + length]), 2 + length))
}

fn decode_long_string(buffer: &[u8]) -> Result<(AmfStr, usize), Amf0DeserializationError> {
    require(buffer, 4)?;
    let length = BigEndian::read_u32(buffer) as usize;
    require(buffer, 4 + length)?;

    Ok((AmfStr::new(&buffer[4..4 + length]), 4 + length))
}

fn require(buffer: &[u8], count: usize) -> Result<(), Amf0DeserializationError> {
    if buffer.len() < count {
        return Err(Amf0DeserializationError::UnexpectedEof);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers;
    use crate::serialization::serialize;
    use byteorder::{BigEndian, WriteBytesExt};

    #[test]
    fn can_deserialize_number() {
        let number: f64 = 332.0;

        let mut vector = vec![];
        vector.write_u8(markers::NUMBER_MARKER).unwrap();
        vector.write_f64::<BigEndian>(number).unwrap();

        let result = deserialize(&vector).unwrap();

        let expected = vec![Amf0Value::Number(number)];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_true_boolean() {
        let vector = vec![markers::BOOLEAN_MARKER, 1];
        let result = deserialize(&vector).unwrap();

        assert_eq!(result, vec![Amf0Value::Boolean(true)]);
    }

    #[test]
    fn can_deserialize_false_boolean() {
        let vector = vec![markers::BOOLEAN_MARKER, 0];
        let result = deserialize(&vector).unwrap();

        assert_eq!(result, vec![Amf0Value::Boolean(false)]);
    }

    #[test]
    fn can_deserialize_string() {
        let value = "test";

        let mut vector = vec![];
        vector.write_u8(markers::STRING_MARKER).unwrap();
        vector.write_u16::<BigEndian>(value.len() as u16).unwrap();
        vector.extend(value.as_bytes());

        let result = deserialize(&vector).unwrap();

        assert_eq!(result, vec![Amf0Value::Utf8String(value.into())]);
    }

    #[test]
    fn app_string_scenario() {
        // 02 00 03 61 70 70 <-> "app"
        let encoded = [0x02, 0x00, 0x03, 0x61, 0x70, 0x70];
        let (value, consumed) = decode_value(&encoded).unwrap();

        assert_eq!(consumed, 6);
        let string = value.get_string().unwrap();
        assert_eq!(string.len(), 3);
        assert_eq!(string.as_bytes(), b"app");
    }

    #[test]
    fn can_deserialize_null() {
        let result = deserialize(&[markers::NULL_MARKER]).unwrap();
        assert_eq!(result, vec![Amf0Value::Null]);
    }

    #[test]
    fn undefined_and_unsupported_normalize_to_null() {
        let result = deserialize(&[markers::UNDEFINED_MARKER, markers::UNSUPPORTED_MARKER]).unwrap();
        assert_eq!(result, vec![Amf0Value::Null, Amf0Value::Null]);
    }

    #[test]
    fn can_deserialize_object() {
        const NUMBER: f64 = 332.0;

        let mut vector = vec![];
        vector.push(markers::OBJECT_MARKER);
        vector.write_u16::<BigEndian>(4).unwrap();
        vector.extend("test".as_bytes());
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(NUMBER).unwrap();
        vector
            .write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)
            .unwrap();
        vector.push(markers::OBJECT_END_MARKER);

        let result = deserialize(&vector).unwrap();

        let mut object = Amf0Object::new();
        object.add_property("test", Amf0Value::Number(NUMBER));

        assert_eq!(result, vec![Amf0Value::Object(object)]);
    }

    #[test]
    fn object_body_consumes_exactly_through_first_terminator() {
        let mut vector = vec![];
        vector.write_u16::<BigEndian>(1).unwrap();
        vector.extend(b"x");
        vector.push(markers::BOOLEAN_MARKER);
        vector.push(1);
        vector.extend(markers::OBJECT_END_SEQUENCE);
        let body_length = vector.len();

        // Trailing bytes after the terminator belong to the next value
        vector.extend(b"leftover");

        let (object, consumed) = decode_object_body(&vector, true).unwrap();

        assert_eq!(consumed, body_length);
        assert_eq!(object.property_count(), 1);
    }

    #[test]
    fn object_body_recovers_from_undecodable_property() {
        let mut vector = vec![];
        vector.write_u16::<BigEndian>(1).unwrap();
        vector.extend(b"a");
        vector.push(markers::BOOLEAN_MARKER);
        vector.push(0);

        // Reference properties are unsupported, so this one fails to decode
        vector.write_u16::<BigEndian>(1).unwrap();
        vector.extend(b"b");
        vector.push(markers::REFERENCE_MARKER);
        vector.write_u16::<BigEndian>(17).unwrap();

        vector.extend(markers::OBJECT_END_SEQUENCE);

        let (object, consumed) = decode_object_body(&vector, true).unwrap();

        assert_eq!(consumed, vector.len());
        assert_eq!(object.property_count(), 1);
        assert_eq!(object.property_at(0).unwrap().name, "a");
    }

    #[test]
    fn error_when_object_body_has_no_terminator() {
        let mut vector = vec![];
        vector.write_u16::<BigEndian>(1).unwrap();
        vector.extend(b"a");
        vector.push(markers::BOOLEAN_MARKER);
        vector.push(0);

        let result = decode_object_body(&vector, true);

        assert!(matches!(
            result,
            Err(Amf0DeserializationError::MissingObjectTerminator)
        ));
    }

    #[test]
    fn can_deserialize_ecma_array_ignoring_associative_count() {
        let mut vector = vec![];
        vector.push(markers::ECMA_ARRAY_MARKER);
        // Deliberately wrong count; the terminator is authoritative
        vector.write_u32::<BigEndian>(999).unwrap();
        vector.write_u16::<BigEndian>(5).unwrap();
        vector.extend("test1".as_bytes());
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(1.0).unwrap();
        vector.write_u16::<BigEndian>(5).unwrap();
        vector.extend("test2".as_bytes());
        vector.write_u8(markers::STRING_MARKER).unwrap();
        vector.write_u16::<BigEndian>(6).unwrap();
        vector.extend("second".as_bytes());
        vector
            .write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)
            .unwrap();
        vector.push(markers::OBJECT_END_MARKER);

        let result = deserialize(&vector).unwrap();

        let mut object = Amf0Object::new();
        object.add_property("test1", Amf0Value::Number(1.0));
        object.add_property("test2", Amf0Value::Utf8String("second".into()));

        assert_eq!(result, vec![Amf0Value::EcmaArray(object)]);
    }

    #[test]
    fn can_deserialize_strict_array() {
        let mut vector = vec![];
        vector.push(markers::STRICT_ARRAY_MARKER);
        vector.write_u32::<BigEndian>(2).unwrap();
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(1.0).unwrap();
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(2.0).unwrap();

        let result = deserialize(&vector).unwrap();

        let expected = vec![Amf0Value::StrictArray(vec![
            Amf0Value::Number(1.0),
            Amf0Value::Number(2.0),
        ])];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_date() {
        let mut vector = vec![];
        vector.push(markers::DATE_MARKER);
        vector.write_f64::<BigEndian>(1234.5).unwrap();
        vector.write_i16::<BigEndian>(-300).unwrap();

        let result = deserialize(&vector).unwrap();

        assert_eq!(
            result,
            vec![Amf0Value::Date {
                unix_ms: 1234.5,
                utc_offset: -300
            }]
        );
    }

    #[test]
    fn long_string_normalizes_to_string() {
        let value = "not actually long";

        let mut vector = vec![];
        vector.push(markers::LONG_STRING_MARKER);
        vector.write_u32::<BigEndian>(value.len() as u32).unwrap();
        vector.extend(value.as_bytes());

        let result = deserialize(&vector).unwrap();

        assert_eq!(result, vec![Amf0Value::Utf8String(value.into())]);
    }

    #[test]
    fn xml_document_keeps_its_own_type() {
        let value = "<a/>";

        let mut vector = vec![];
        vector.push(markers::XML_DOCUMENT_MARKER);
        vector.write_u32::<BigEndian>(value.len() as u32).unwrap();
        vector.extend(value.as_bytes());

        let result = deserialize(&vector).unwrap();

        assert_eq!(result, vec![Amf0Value::XmlDocument(value.into())]);
    }

    #[test]
    fn error_when_unknown_marker_encountered() {
        let result = deserialize(&[0xff]);

        assert!(matches!(
            result,
            Err(Amf0DeserializationError::UnknownMarker { marker: 0xff })
        ));
    }

    #[test]
    fn error_when_unsupported_marker_encountered() {
        for marker in [
            markers::REFERENCE_MARKER,
            markers::MOVIE_CLIP_MARKER,
            markers::RECORDSET_MARKER,
            markers::TYPED_OBJECT_MARKER,
        ] {
            let result = deserialize(&[marker]);
            assert!(
                matches!(
                    result,
                    Err(Amf0DeserializationError::UnsupportedMarker { marker: m }) if m == marker
                ),
                "marker {} was not rejected",
                marker
            );
        }
    }

    #[test]
    fn error_when_number_payload_truncated() {
        let result = deserialize(&[markers::NUMBER_MARKER, 1, 2, 3]);

        assert!(matches!(
            result,
            Err(Amf0DeserializationError::UnexpectedEof)
        ));
    }

    #[test]
    fn round_trip_preserves_values_and_order() {
        let mut inner = Amf0Object::new();
        inner.add_property("depth", Amf0Value::Number(2.0));

        let mut object = Amf0Object::new();
        object.add_property("zebra", Amf0Value::Utf8String("stripes".into()));
        object.add_property("apple", Amf0Value::Boolean(false));
        object.add_property("nested", Amf0Value::Object(inner));

        let input = vec![
            Amf0Value::Number(32.0),
            Amf0Value::Object(object),
            Amf0Value::Boolean(true),
            Amf0Value::StrictArray(vec![Amf0Value::Null, Amf0Value::Number(7.5)]),
        ];

        let bytes = serialize(&input).unwrap();
        let result = deserialize(&bytes).unwrap();

        assert_eq!(result, input);
    }
}
