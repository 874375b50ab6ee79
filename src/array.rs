//! Decoding of array properties into typed vectors.
//!
//! Binary array payloads carry a `count / encoding / byte-length` header.
//! Encoding 0 is a straight little-endian reinterpret of the payload,
//! encoding 1 runs the payload through zlib inflate with the exact expected
//! output size. Either way the byte count must match `count * elem_size`
//! exactly; a mismatch is a hard [`Error::BufferTooSmall`], never a silent
//! truncation. Text arrays are comma-separated token streams scanned with
//! the parse-as-zero contract.

use crate::data::{atof_prefix, atoi_prefix};
use crate::error::Error;
use crate::tree::{prop, Property};

enum Payload<'a> {
    Raw(&'a [u8]),
    Inflated(Vec<u8>),
}

impl Payload<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Payload::Raw(b) => b,
            Payload::Inflated(v) => v,
        }
    }
}

/// Splits a binary array property into its decoded payload, validating the
/// byte count against the declared element count.
fn binary_payload<'a>(p: &Property<'a>, elem_size: usize) -> Result<Payload<'a>, Error> {
    let v = p.value.bytes;
    if v.len() < 12 {
        return Err(Error::OutOfRange);
    }
    let encoding = u32::from_le_bytes(v[4..8].try_into().unwrap());
    let payload = &v[12..];
    let expected = p.count as usize * elem_size;
    match encoding {
        0 => {
            if payload.len() != expected {
                return Err(Error::BufferTooSmall);
            }
            Ok(Payload::Raw(payload))
        }
        1 => {
            let out = zune_inflate::DeflateDecoder::new(payload)
                .decode_zlib()
                .map_err(|_| Error::Decompress)?;
            if out.len() != expected {
                return Err(Error::BufferTooSmall);
            }
            Ok(Payload::Inflated(out))
        }
        _ => Err(Error::Decompress),
    }
}

macro_rules! from_le_vec {
    ($bytes: expr, $ty: ty) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|c| <$ty>::from_le_bytes(c.try_into().unwrap()))
            .collect()
    };
}

/// Scans `count` comma-separated numeric tokens out of a text span.
/// Exhausted input yields zeros for the remaining slots.
fn parse_text_array<T>(p: &Property<'_>, parse: impl Fn(&[u8]) -> T) -> Vec<T> {
    let mut s = p.value.bytes;
    let mut out = Vec::with_capacity(p.count as usize);
    for _ in 0..p.count {
        out.push(parse(s));
        match s.iter().position(|&c| c == b',') {
            Some(i) => s = &s[i + 1..],
            None => s = &[],
        }
    }
    out
}

pub(crate) fn parse_i32_array(p: &Property<'_>) -> Result<Vec<i32>, Error> {
    if !p.value.is_binary {
        return Ok(parse_text_array(p, |s| atoi_prefix(s) as i32));
    }
    match p.type_code {
        prop::ARRAY_INT => Ok(from_le_vec!(binary_payload(p, 4)?.bytes(), i32)),
        c => Err(Error::UnknownPropertyType(c)),
    }
}

pub(crate) fn parse_i64_array(p: &Property<'_>) -> Result<Vec<i64>, Error> {
    if !p.value.is_binary {
        return Ok(parse_text_array(p, atoi_prefix));
    }
    match p.type_code {
        prop::ARRAY_LONG => Ok(from_le_vec!(binary_payload(p, 8)?.bytes(), i64)),
        c => Err(Error::UnknownPropertyType(c)),
    }
}

pub(crate) fn parse_f32_array(p: &Property<'_>) -> Result<Vec<f32>, Error> {
    if !p.value.is_binary {
        return Ok(parse_text_array(p, |s| atof_prefix(s) as f32));
    }
    match p.type_code {
        prop::ARRAY_FLOAT => Ok(from_le_vec!(binary_payload(p, 4)?.bytes(), f32)),
        c => Err(Error::UnknownPropertyType(c)),
    }
}

/// Doubles, widening a float array when that is what the file stored.
pub(crate) fn parse_f64_array(p: &Property<'_>) -> Result<Vec<f64>, Error> {
    if !p.value.is_binary {
        return Ok(parse_text_array(p, atof_prefix));
    }
    match p.type_code {
        prop::ARRAY_DOUBLE => Ok(from_le_vec!(binary_payload(p, 8)?.bytes(), f64)),
        prop::ARRAY_FLOAT => {
            let tmp: Vec<f32> = from_le_vec!(binary_payload(p, 4)?.bytes(), f32);
            Ok(tmp.into_iter().map(f64::from).collect())
        }
        c => Err(Error::UnknownPropertyType(c)),
    }
}

/// Double data grouped into N-component aggregates; a trailing partial
/// group is dropped, as the original reader did.
pub(crate) fn parse_vec_array<const N: usize>(p: &Property<'_>) -> Result<Vec<[f64; N]>, Error> {
    let flat = parse_f64_array(p)?;
    Ok(flat
        .chunks_exact(N)
        .map(|c| std::array::from_fn(|i| c[i]))
        .collect())
}

#[cfg(test)]
fn array_prop(type_code: u8, count: u32, header_and_payload: &[u8]) -> Property<'_> {
    Property {
        type_code,
        count,
        value: crate::data::DataView::binary(header_and_payload),
    }
}

#[cfg(test)]
fn raw_array_bytes(count: u32, payload: &[u8]) -> Vec<u8> {
    let mut v = count.to_le_bytes().to_vec();
    v.extend_from_slice(&0u32.to_le_bytes());
    v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    v.extend_from_slice(payload);
    v
}

#[test]
fn test_raw_roundtrip() {
    // encoding=0 output must equal the payload bytes exactly
    let payload: Vec<u8> = [1i32, -2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
    let bytes = raw_array_bytes(3, &payload);
    let p = array_prop(prop::ARRAY_INT, 3, &bytes);
    let out = parse_i32_array(&p).unwrap();
    assert_eq!(out, vec![1, -2, 3]);
    let back: Vec<u8> = out.iter().flat_map(|v| v.to_le_bytes()).collect();
    assert_eq!(back, payload);
}

#[test]
fn test_raw_count_mismatch() {
    let payload: Vec<u8> = [1i32, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
    let bytes = raw_array_bytes(3, &payload);
    let p = array_prop(prop::ARRAY_INT, 3, &bytes);
    assert_eq!(parse_i32_array(&p), Err(Error::BufferTooSmall));
}

#[test]
fn test_text_array() {
    let p = Property {
        type_code: prop::ARRAY_DOUBLE,
        count: 4,
        value: crate::data::DataView::text(b"1.0,2.5,-3.0,4"),
    };
    assert_eq!(parse_f64_array(&p).unwrap(), vec![1., 2.5, -3., 4.]);
    let vecs = parse_vec_array::<2>(&p).unwrap();
    assert_eq!(vecs, vec![[1., 2.5], [-3., 4.]]);
}

#[test]
fn test_float_widening() {
    let payload: Vec<u8> = [1.5f32, 2.5].iter().flat_map(|v| v.to_le_bytes()).collect();
    let bytes = raw_array_bytes(2, &payload);
    let p = array_prop(prop::ARRAY_FLOAT, 2, &bytes);
    assert_eq!(parse_f64_array(&p).unwrap(), vec![1.5, 2.5]);
}
