//! little-endian read/write primitives for the cache body. truncation
//! surfaces as a corruption error: a cache that ends early is damaged,
//! not merely short.

use std::io::{Read, Write};

use super::CacheError;
use crate::model::{Osmid, TagList};

/// upper bound for any length-prefixed string inside the cache; checksums
/// and names are far below this, so a longer prefix is a lie
const MAX_STRING_LENGTH: usize = 1 << 16;

pub(crate) fn read_exact<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<(), CacheError> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            CacheError::Corrupted("cache file ends early".to_string())
        }
        _ => CacheError::from(e),
    })
}

pub(crate) fn read_u8<R: Read>(input: &mut R) -> Result<u8, CacheError> {
    let mut bytes = [0u8; 1];
    read_exact(input, &mut bytes)?;
    Ok(bytes[0])
}

pub(crate) fn read_bool<R: Read>(input: &mut R) -> Result<bool, CacheError> {
    Ok(read_u8(input)? != 0)
}

pub(crate) fn read_u32<R: Read>(input: &mut R) -> Result<u32, CacheError> {
    let mut bytes = [0u8; 4];
    read_exact(input, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

pub(crate) fn read_u64<R: Read>(input: &mut R) -> Result<u64, CacheError> {
    let mut bytes = [0u8; 8];
    read_exact(input, &mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

pub(crate) fn read_i64<R: Read>(input: &mut R) -> Result<i64, CacheError> {
    let mut bytes = [0u8; 8];
    read_exact(input, &mut bytes)?;
    Ok(i64::from_le_bytes(bytes))
}

pub(crate) fn read_f32<R: Read>(input: &mut R) -> Result<f32, CacheError> {
    let mut bytes = [0u8; 4];
    read_exact(input, &mut bytes)?;
    Ok(f32::from_le_bytes(bytes))
}

pub(crate) fn read_f64<R: Read>(input: &mut R) -> Result<f64, CacheError> {
    let mut bytes = [0u8; 8];
    read_exact(input, &mut bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

pub(crate) fn read_string<R: Read>(input: &mut R) -> Result<String, CacheError> {
    let length = read_u32(input)? as usize;
    if length > MAX_STRING_LENGTH {
        return Err(CacheError::Corrupted(format!(
            "string length {length} exceeds the cache limit"
        )));
    }
    let mut bytes = vec![0u8; length];
    read_exact(input, &mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|e| CacheError::Corrupted(format!("cache string is not valid UTF-8: {e}")))
}

pub(crate) fn read_id_vec<R: Read>(input: &mut R) -> Result<Vec<Osmid>, CacheError> {
    let count = read_u64(input)? as usize;
    let mut ids = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        ids.push(read_i64(input)?);
    }
    Ok(ids)
}

pub(crate) fn read_tags<R: Read>(input: &mut R) -> Result<TagList, CacheError> {
    let count = read_u32(input)? as usize;
    let mut tags = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        let key = read_string(input)?;
        let value = read_string(input)?;
        tags.push((key, value));
    }
    Ok(tags)
}

pub(crate) fn write_u8<W: Write>(out: &mut W, value: u8) -> Result<(), CacheError> {
    out.write_all(&[value])?;
    Ok(())
}

pub(crate) fn write_bool<W: Write>(out: &mut W, value: bool) -> Result<(), CacheError> {
    write_u8(out, value as u8)
}

pub(crate) fn write_u32<W: Write>(out: &mut W, value: u32) -> Result<(), CacheError> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u64<W: Write>(out: &mut W, value: u64) -> Result<(), CacheError> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_i64<W: Write>(out: &mut W, value: i64) -> Result<(), CacheError> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_f32<W: Write>(out: &mut W, value: f32) -> Result<(), CacheError> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_f64<W: Write>(out: &mut W, value: f64) -> Result<(), CacheError> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_string<W: Write>(out: &mut W, value: &str) -> Result<(), CacheError> {
    write_u32(out, value.len() as u32)?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

pub(crate) fn write_id_vec<W: Write>(out: &mut W, ids: &[Osmid]) -> Result<(), CacheError> {
    write_u64(out, ids.len() as u64)?;
    for id in ids {
        write_i64(out, *id)?;
    }
    Ok(())
}

pub(crate) fn write_tags<W: Write>(out: &mut W, tags: &TagList) -> Result<(), CacheError> {
    write_u32(out, tags.len() as u32)?;
    for (key, value) in tags {
        write_string(out, key)?;
        write_string(out, value)?;
    }
    Ok(())
}
