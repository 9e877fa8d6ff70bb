//! Minimal protobuf codec for `tf.train.SequenceExample`.
//!
//! Only the messages needed by the record format are supported:
//!
//! ```text
//! SequenceExample { Features context = 1; FeatureLists feature_lists = 2; }
//! Features        { map<string, Feature> feature = 1; }
//! FeatureLists    { map<string, FeatureList> feature_list = 1; }
//! FeatureList     { repeated Feature feature = 1; }
//! Feature         { oneof { BytesList = 1; FloatList = 2; Int64List = 3; } }
//! ```
//!
//! Maps are encoded in key order, so the same example always serializes to
//! the same bytes. Repeated scalars are written packed; the decoder accepts
//! packed and unpacked forms.

use crate::error::{ConvertError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

// ============================================================================
// Messages
// ============================================================================

/// One feature value list.
///
/// A feature whose value list is unset decodes as an empty `Int64List`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BytesList(Vec<Vec<u8>>),
    FloatList(Vec<f32>),
    Int64List(Vec<i64>),
}

impl Default for Feature {
    fn default() -> Self {
        Feature::Int64List(Vec::new())
    }
}

impl Feature {
    pub fn as_int64_list(&self) -> Option<&[i64]> {
        match self {
            Feature::Int64List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_list(&self) -> Option<&[f32]> {
        match self {
            Feature::FloatList(v) => Some(v),
            _ => None,
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        let mut list = Vec::new();
        let field = match self {
            Feature::BytesList(values) => {
                for value in values {
                    write_len_field(&mut list, 1, value);
                }
                1
            }
            Feature::FloatList(values) => {
                if !values.is_empty() {
                    write_tag(&mut list, 1, WIRE_LEN);
                    write_varint(&mut list, (values.len() * 4) as u64);
                    for v in values {
                        list.extend_from_slice(&v.to_le_bytes());
                    }
                }
                2
            }
            Feature::Int64List(values) => {
                if !values.is_empty() {
                    let mut packed = Vec::with_capacity(values.len());
                    for &v in values {
                        write_varint(&mut packed, v as u64);
                    }
                    write_len_field(&mut list, 1, &packed);
                }
                3
            }
        };
        write_len_field(buf, field, &list);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut feature = Feature::default();
        let mut reader = WireReader::new(bytes);
        while let Some((field, wire)) = reader.read_tag()? {
            match (field, wire) {
                (1, WIRE_LEN) => {
                    let mut values = Vec::new();
                    let mut inner = WireReader::new(reader.read_len_delimited()?);
                    while let Some((f, w)) = inner.read_tag()? {
                        match (f, w) {
                            (1, WIRE_LEN) => values.push(inner.read_len_delimited()?.to_vec()),
                            _ => inner.skip(w)?,
                        }
                    }
                    feature = Feature::BytesList(values);
                }
                (2, WIRE_LEN) => {
                    let mut values = Vec::new();
                    let mut inner = WireReader::new(reader.read_len_delimited()?);
                    while let Some((f, w)) = inner.read_tag()? {
                        match (f, w) {
                            (1, WIRE_LEN) => {
                                let packed = inner.read_len_delimited()?;
                                if packed.len() % 4 != 0 {
                                    return Err(corrupt("packed float list length not a multiple of 4"));
                                }
                                values.extend(packed.chunks_exact(4).map(|c| {
                                    f32::from_le_bytes([c[0], c[1], c[2], c[3]])
                                }));
                            }
                            (1, WIRE_FIXED32) => values.push(f32::from_le_bytes(inner.read_fixed32()?)),
                            _ => inner.skip(w)?,
                        }
                    }
                    feature = Feature::FloatList(values);
                }
                (3, WIRE_LEN) => {
                    let mut values = Vec::new();
                    let mut inner = WireReader::new(reader.read_len_delimited()?);
                    while let Some((f, w)) = inner.read_tag()? {
                        match (f, w) {
                            (1, WIRE_LEN) => {
                                let mut packed = WireReader::new(inner.read_len_delimited()?);
                                while !packed.is_at_end() {
                                    values.push(packed.read_varint()? as i64);
                                }
                            }
                            (1, WIRE_VARINT) => values.push(inner.read_varint()? as i64),
                            _ => inner.skip(w)?,
                        }
                    }
                    feature = Feature::Int64List(values);
                }
                _ => reader.skip(wire)?,
            }
        }
        Ok(feature)
    }
}

/// `tf.train.SequenceExample`: context features plus named feature lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SequenceExample {
    pub context: BTreeMap<String, Feature>,
    pub feature_lists: BTreeMap<String, Vec<Feature>>,
}

impl SequenceExample {
    /// Serialize to protobuf wire format.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut context = Vec::new();
        for (key, feature) in &self.context {
            let mut value = Vec::new();
            feature.encode(&mut value);
            write_map_entry(&mut context, key, &value);
        }

        let mut lists = Vec::new();
        for (key, features) in &self.feature_lists {
            // FeatureList { repeated Feature feature = 1; }
            let mut list = Vec::new();
            for feature in features {
                let mut frame = Vec::new();
                feature.encode(&mut frame);
                write_len_field(&mut list, 1, &frame);
            }
            write_map_entry(&mut lists, key, &list);
        }

        let mut buf = Vec::with_capacity(context.len() + lists.len() + 16);
        write_len_field(&mut buf, 1, &context);
        write_len_field(&mut buf, 2, &lists);
        buf
    }

    /// Parse from protobuf wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut example = SequenceExample::default();
        let mut reader = WireReader::new(bytes);
        while let Some((field, wire)) = reader.read_tag()? {
            match (field, wire) {
                (1, WIRE_LEN) => {
                    for (key, value) in decode_map(reader.read_len_delimited()?)? {
                        example.context.insert(key, Feature::decode(value)?);
                    }
                }
                (2, WIRE_LEN) => {
                    for (key, value) in decode_map(reader.read_len_delimited()?)? {
                        let mut features = Vec::new();
                        let mut inner = WireReader::new(value);
                        while let Some((f, w)) = inner.read_tag()? {
                            match (f, w) {
                                (1, WIRE_LEN) => {
                                    features.push(Feature::decode(inner.read_len_delimited()?)?)
                                }
                                _ => inner.skip(w)?,
                            }
                        }
                        example.feature_lists.insert(key, features);
                    }
                }
                _ => reader.skip(wire)?,
            }
        }
        Ok(example)
    }
}

// ============================================================================
// Wire helpers
// ============================================================================

fn corrupt(message: &str) -> ConvertError {
    ConvertError::CorruptRecord(message.to_string())
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn write_tag(buf: &mut Vec<u8>, field: u32, wire: u8) {
    write_varint(buf, (u64::from(field) << 3) | u64::from(wire));
}

fn write_len_field(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    write_tag(buf, field, WIRE_LEN);
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Map entries are `{ key = 1; value = 2; }` messages in repeated field 1.
fn write_map_entry(buf: &mut Vec<u8>, key: &str, value: &[u8]) {
    let mut entry = Vec::with_capacity(key.len() + value.len() + 8);
    write_len_field(&mut entry, 1, key.as_bytes());
    write_len_field(&mut entry, 2, value);
    write_len_field(buf, 1, &entry);
}

fn decode_map(bytes: &[u8]) -> Result<Vec<(String, &[u8])>> {
    let mut entries = Vec::new();
    let mut reader = WireReader::new(bytes);
    while let Some((field, wire)) = reader.read_tag()? {
        if (field, wire) != (1, WIRE_LEN) {
            reader.skip(wire)?;
            continue;
        }
        let mut entry = WireReader::new(reader.read_len_delimited()?);
        let mut key = String::new();
        let mut value: &[u8] = &[];
        while let Some((f, w)) = entry.read_tag()? {
            match (f, w) {
                (1, WIRE_LEN) => {
                    key = String::from_utf8(entry.read_len_delimited()?.to_vec())
                        .map_err(|_| corrupt("map key is not valid UTF-8"))?;
                }
                (2, WIRE_LEN) => value = entry.read_len_delimited()?,
                _ => entry.skip(w)?,
            }
        }
        entries.push((key, value));
    }
    Ok(entries)
}

struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| corrupt("truncated varint"))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(corrupt("varint longer than 10 bytes"))
    }

    fn read_tag(&mut self) -> Result<Option<(u32, u8)>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let key = self.read_varint()?;
        Ok(Some(((key >> 3) as u32, (key & 0x7) as u8)))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| corrupt("field extends past end of message"))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_len_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    fn read_fixed32(&mut self) -> Result<[u8; 4]> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    fn skip(&mut self, wire: u8) -> Result<()> {
        match wire {
            WIRE_VARINT => self.read_varint().map(|_| ()),
            WIRE_FIXED64 => self.take(8).map(|_| ()),
            WIRE_LEN => self.read_len_delimited().map(|_| ()),
            WIRE_FIXED32 => self.take(4).map(|_| ()),
            other => Err(ConvertError::CorruptRecord(format!(
                "unsupported wire type {other}"
            ))),
        }
    }
}
