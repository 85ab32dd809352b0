//! Projection of serializable values onto flat request parameters.
//!
//! # Design
//! Request types derive `serde::Serialize`, so the serde attributes double
//! as the field descriptor table: `rename` gives the external name, `skip`
//! omits a field and `skip_serializing_if = "vkapi_core::is_empty"` omits it
//! when it holds its zero value. Field names, declared or renamed, are sent
//! lowercased. The same type can then be used to decode the API's JSON
//! responses.
//!
//! The top-level shape is decided once: a struct is encoded field by field,
//! a map entry by entry, and anything else yields no parameters. Values are
//! resolved through `Option`, smart pointers and newtype wrappers, then
//! stringified:
//!
//! - `None` / `null` is never sent, with or without `is_empty`;
//! - bools become `1` / `0`, other zero values the empty string;
//! - byte strings are sent as raw text;
//! - other sequences are comma-joined element by element;
//! - nested structs, maps and data-carrying enum variants are dropped.
//!
//! Encoding never fails. Anything that cannot be flattened, including a
//! `Serialize` impl that returns an error, is left out of the result.

use std::fmt;

use serde::ser::{self, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::params::Params;

/// Build request parameters from a struct or map.
///
/// Other shapes yield an empty `Params`. A struct whose fields all hold
/// their zero values is treated as absent and also yields an empty set.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Params {
    match value.serialize(ParamsEncoder) {
        Ok(params) => params,
        Err(err) => {
            debug!(error = %err, "value failed to serialize, encoding no parameters");
            Params::new()
        }
    }
}

/// Whether `value` is nil or its type's zero value.
///
/// Optional layers are looked through first, so `Some("")` is empty. Shapes
/// the encoder cannot flatten are never empty. Intended for
/// `#[serde(skip_serializing_if = "vkapi_core::is_empty")]`.
pub fn is_empty<T: Serialize + ?Sized>(value: &T) -> bool {
    match value.serialize(ValueEncoder) {
        Ok(Encoded::Nil) => true,
        Ok(Encoded::Scalar(text) | Encoded::Seq(text)) => text.zero,
        Ok(Encoded::Unsupported) | Err(_) => false,
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct EncodeError(String);

impl ser::Error for EncodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        EncodeError(msg.to_string())
    }
}

/// A value resolved through its optional layers.
enum Encoded {
    Nil,
    Unsupported,
    Scalar(Text),
    Seq(Text),
}

struct Text {
    value: String,
    /// The resolved value equals its type's zero value.
    zero: bool,
    /// The value was reached through a non-nil `Option`.
    indirect: bool,
}

impl Encoded {
    fn scalar(value: String, zero: bool) -> Self {
        Encoded::Scalar(Text {
            value,
            zero,
            indirect: false,
        })
    }

    /// Zero renders as the empty string.
    fn number<N: Copy + Default + PartialEq + ToString>(v: N) -> Self {
        if v == N::default() {
            Encoded::scalar(String::new(), true)
        } else {
            Encoded::scalar(v.to_string(), false)
        }
    }

    fn indirect(self) -> Self {
        match self {
            Encoded::Scalar(text) => Encoded::Scalar(Text { indirect: true, ..text }),
            Encoded::Seq(text) => Encoded::Seq(Text { indirect: true, ..text }),
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level: struct, map or nothing
// ---------------------------------------------------------------------------

struct ParamsEncoder;

impl ser::Serializer for ParamsEncoder {
    type Ok = Params;
    type Error = EncodeError;

    type SerializeSeq = Ignore<Params>;
    type SerializeTuple = Ignore<Params>;
    type SerializeTupleStruct = Ignore<Params>;
    type SerializeTupleVariant = Ignore<Params>;
    type SerializeMap = MappingEncoder;
    type SerializeStruct = RecordEncoder;
    type SerializeStructVariant = Ignore<Params>;

    fn serialize_bool(self, _: bool) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_i8(self, _: i8) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_i16(self, _: i16) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_i32(self, _: i32) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_i64(self, _: i64) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_i128(self, _: i128) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_u8(self, _: u8) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_u16(self, _: u16) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_u32(self, _: u32) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_u64(self, _: u64) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_u128(self, _: u128) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_f32(self, _: f32) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_f64(self, _: f64) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_char(self, _: char) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_str(self, _: &str) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_none(self) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Params, EncodeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Params, EncodeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Params, EncodeError> {
        Ok(Params::new())
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Ignore<Params>, EncodeError> {
        Ok(Ignore::new(Params::new()))
    }

    fn serialize_tuple(self, _: usize) -> Result<Ignore<Params>, EncodeError> {
        Ok(Ignore::new(Params::new()))
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Ignore<Params>, EncodeError> {
        Ok(Ignore::new(Params::new()))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Ignore<Params>, EncodeError> {
        Ok(Ignore::new(Params::new()))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<MappingEncoder, EncodeError> {
        Ok(MappingEncoder {
            params: Params::new(),
            key: None,
        })
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<RecordEncoder, EncodeError> {
        Ok(RecordEncoder {
            params: Params::new(),
            nonzero: false,
        })
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Ignore<Params>, EncodeError> {
        Ok(Ignore::new(Params::new()))
    }
}

/// Encodes struct fields under their lowercased names.
struct RecordEncoder {
    params: Params,
    nonzero: bool,
}

impl ser::SerializeStruct for RecordEncoder {
    type Ok = Params;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        match value.serialize(ValueEncoder) {
            Ok(Encoded::Scalar(text) | Encoded::Seq(text)) => {
                self.nonzero |= !text.zero || text.indirect;
                self.params.set(key.to_lowercase(), text.value);
            }
            Ok(Encoded::Nil) => trace!(field = key, "skipping nil field"),
            Ok(Encoded::Unsupported) => {
                self.nonzero = true;
                trace!(field = key, "skipping field with unsupported shape");
            }
            Err(err) => debug!(field = key, error = %err, "skipping field that failed to serialize"),
        }
        Ok(())
    }

    fn end(self) -> Result<Params, EncodeError> {
        if self.nonzero {
            Ok(self.params)
        } else {
            Ok(Params::new())
        }
    }
}

/// Encodes map entries; keys must resolve to scalars.
struct MappingEncoder {
    params: Params,
    key: Option<String>,
}

impl ser::SerializeMap for MappingEncoder {
    type Ok = Params;
    type Error = EncodeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodeError> {
        self.key = match key.serialize(ValueEncoder) {
            Ok(Encoded::Scalar(text)) => Some(text.value),
            Ok(_) => {
                trace!("skipping entry with nil, sequence or unsupported key");
                None
            }
            Err(err) => {
                debug!(error = %err, "skipping entry whose key failed to serialize");
                None
            }
        };
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        let Some(key) = self.key.take() else {
            return Ok(());
        };
        match value.serialize(ValueEncoder) {
            Ok(Encoded::Scalar(text) | Encoded::Seq(text)) => self.params.set(key, text.value),
            Ok(Encoded::Nil | Encoded::Unsupported) => {
                trace!(key = %key, "skipping entry with nil or unsupported value");
            }
            Err(err) => debug!(key = %key, error = %err, "skipping entry that failed to serialize"),
        }
        Ok(())
    }

    fn end(self) -> Result<Params, EncodeError> {
        Ok(self.params)
    }
}

// ---------------------------------------------------------------------------
// Single values
// ---------------------------------------------------------------------------

struct ValueEncoder;

impl ser::Serializer for ValueEncoder {
    type Ok = Encoded;
    type Error = EncodeError;

    type SerializeSeq = SeqEncoder;
    type SerializeTuple = SeqEncoder;
    type SerializeTupleStruct = Ignore<Encoded>;
    type SerializeTupleVariant = Ignore<Encoded>;
    type SerializeMap = Ignore<Encoded>;
    type SerializeStruct = Ignore<Encoded>;
    type SerializeStructVariant = Ignore<Encoded>;

    fn serialize_bool(self, v: bool) -> Result<Encoded, EncodeError> {
        let value = if v { "1" } else { "0" };
        Ok(Encoded::scalar(value.to_string(), !v))
    }

    fn serialize_i8(self, v: i8) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_char(self, v: char) -> Result<Encoded, EncodeError> {
        Ok(Encoded::number(v))
    }

    fn serialize_str(self, v: &str) -> Result<Encoded, EncodeError> {
        Ok(Encoded::scalar(v.to_owned(), v.is_empty()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Encoded, EncodeError> {
        Ok(Encoded::Seq(Text {
            value: String::from_utf8_lossy(v).into_owned(),
            zero: v.is_empty(),
            indirect: false,
        }))
    }

    fn serialize_none(self) -> Result<Encoded, EncodeError> {
        Ok(Encoded::Nil)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Encoded, EncodeError> {
        Ok(value.serialize(self)?.indirect())
    }

    fn serialize_unit(self) -> Result<Encoded, EncodeError> {
        Ok(Encoded::Nil)
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Encoded, EncodeError> {
        Ok(Encoded::Unsupported)
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Encoded, EncodeError> {
        Ok(Encoded::scalar(variant.to_owned(), false))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Encoded, EncodeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Encoded, EncodeError> {
        Ok(Encoded::Unsupported)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqEncoder, EncodeError> {
        Ok(SeqEncoder::with_capacity(len.unwrap_or_default()))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqEncoder, EncodeError> {
        Ok(SeqEncoder::with_capacity(len))
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Ignore<Encoded>, EncodeError> {
        Ok(Ignore::new(Encoded::Unsupported))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Ignore<Encoded>, EncodeError> {
        Ok(Ignore::new(Encoded::Unsupported))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Ignore<Encoded>, EncodeError> {
        Ok(Ignore::new(Encoded::Unsupported))
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Ignore<Encoded>, EncodeError> {
        Ok(Ignore::new(Encoded::Unsupported))
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Ignore<Encoded>, EncodeError> {
        Ok(Ignore::new(Encoded::Unsupported))
    }
}

/// Comma-joins sequence elements.
struct SeqEncoder {
    items: Vec<String>,
    unsupported: bool,
}

impl SeqEncoder {
    fn with_capacity(len: usize) -> Self {
        Self {
            items: Vec::with_capacity(len),
            unsupported: false,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        match value.serialize(ValueEncoder)? {
            Encoded::Nil => self.items.push(String::new()),
            Encoded::Unsupported => self.unsupported = true,
            Encoded::Scalar(text) | Encoded::Seq(text) => self.items.push(text.value),
        }
        Ok(())
    }

    fn finish(self) -> Encoded {
        if self.unsupported {
            return Encoded::Unsupported;
        }
        Encoded::Seq(Text {
            zero: self.items.is_empty(),
            value: self.items.join(","),
            indirect: false,
        })
    }
}

impl ser::SerializeSeq for SeqEncoder {
    type Ok = Encoded;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Encoded, EncodeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqEncoder {
    type Ok = Encoded;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Encoded, EncodeError> {
        Ok(self.finish())
    }
}

// ---------------------------------------------------------------------------
// Shapes with no flat representation
// ---------------------------------------------------------------------------

/// Swallows a compound value without looking at its contents and yields a
/// fixed result.
struct Ignore<O> {
    output: O,
}

impl<O> Ignore<O> {
    fn new(output: O) -> Self {
        Self { output }
    }
}

impl<O> ser::SerializeSeq for Ignore<O> {
    type Ok = O;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, _: &T) -> Result<(), EncodeError> {
        Ok(())
    }

    fn end(self) -> Result<O, EncodeError> {
        Ok(self.output)
    }
}

impl<O> ser::SerializeTuple for Ignore<O> {
    type Ok = O;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, _: &T) -> Result<(), EncodeError> {
        Ok(())
    }

    fn end(self) -> Result<O, EncodeError> {
        Ok(self.output)
    }
}

impl<O> ser::SerializeTupleStruct for Ignore<O> {
    type Ok = O;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &T) -> Result<(), EncodeError> {
        Ok(())
    }

    fn end(self) -> Result<O, EncodeError> {
        Ok(self.output)
    }
}

impl<O> ser::SerializeTupleVariant for Ignore<O> {
    type Ok = O;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &T) -> Result<(), EncodeError> {
        Ok(())
    }

    fn end(self) -> Result<O, EncodeError> {
        Ok(self.output)
    }
}

impl<O> ser::SerializeMap for Ignore<O> {
    type Ok = O;
    type Error = EncodeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, _: &T) -> Result<(), EncodeError> {
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, _: &T) -> Result<(), EncodeError> {
        Ok(())
    }

    fn end(self) -> Result<O, EncodeError> {
        Ok(self.output)
    }
}

impl<O> ser::SerializeStruct for Ignore<O> {
    type Ok = O;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _: &'static str,
        _: &T,
    ) -> Result<(), EncodeError> {
        Ok(())
    }

    fn end(self) -> Result<O, EncodeError> {
        Ok(self.output)
    }
}

impl<O> ser::SerializeStructVariant for Ignore<O> {
    type Ok = O;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _: &'static str,
        _: &T,
    ) -> Result<(), EncodeError> {
        Ok(())
    }

    fn end(self) -> Result<O, EncodeError> {
        Ok(self.output)
    }
}
