use std::io::{BufReader, Read};

use crate::model::{Osmid, TagList};
use crate::MapError;

/// typed little-endian reads shared by the memory-mapped parser and the
/// buffered-stream fallback. the two paths run the identical logical parse;
/// only `read_exact_bytes` differs.
pub trait BinaryRead {
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<(), MapError>;

    /// bytes known to remain, when the source can tell. used to reject
    /// length prefixes that exceed the file before allocating for them.
    fn remaining_hint(&self) -> Option<usize> {
        None
    }

    fn read_u8(&mut self) -> Result<u8, MapError> {
        let mut bytes = [0u8; 1];
        self.read_exact_bytes(&mut bytes)?;
        Ok(bytes[0])
    }

    fn read_bool(&mut self) -> Result<bool, MapError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_u32(&mut self) -> Result<u32, MapError> {
        let mut bytes = [0u8; 4];
        self.read_exact_bytes(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_u64(&mut self) -> Result<u64, MapError> {
        let mut bytes = [0u8; 8];
        self.read_exact_bytes(&mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_i64(&mut self) -> Result<i64, MapError> {
        let mut bytes = [0u8; 8];
        self.read_exact_bytes(&mut bytes)?;
        Ok(i64::from_le_bytes(bytes))
    }

    fn read_f32(&mut self) -> Result<f32, MapError> {
        let mut bytes = [0u8; 4];
        self.read_exact_bytes(&mut bytes)?;
        Ok(f32::from_le_bytes(bytes))
    }

    fn read_f64(&mut self) -> Result<f64, MapError> {
        let mut bytes = [0u8; 8];
        self.read_exact_bytes(&mut bytes)?;
        Ok(f64::from_le_bytes(bytes))
    }

    /// u32 length prefix, then that many UTF-8 bytes with no terminator
    fn read_string(&mut self) -> Result<String, MapError> {
        let length = self.read_u32()? as usize;
        self.check_length(length)?;
        let mut bytes = vec![0u8; length];
        self.read_exact_bytes(&mut bytes)?;
        String::from_utf8(bytes)
            .map_err(|e| MapError::InvalidFormat(format!("string is not valid UTF-8: {e}")))
    }

    /// u32 count prefix, then that many i64 OSM ids
    fn read_id_vec_u32(&mut self) -> Result<Vec<Osmid>, MapError> {
        let count = self.read_u32()? as usize;
        self.check_length(count.saturating_mul(8))?;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.read_i64()?);
        }
        Ok(ids)
    }

    /// u64 count prefix variant used by feature node refs
    fn read_id_vec_u64(&mut self) -> Result<Vec<Osmid>, MapError> {
        let count = self.read_u64()? as usize;
        self.check_length(count.saturating_mul(8))?;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.read_i64()?);
        }
        Ok(ids)
    }

    /// u32 count prefix, then count pairs of length-prefixed strings
    fn read_tags(&mut self) -> Result<TagList, MapError> {
        let count = self.read_u32()? as usize;
        self.check_length(count.saturating_mul(8))?;
        let mut tags = Vec::with_capacity(count);
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_string()?;
            tags.push((key, value));
        }
        Ok(tags)
    }

    fn check_length(&self, needed: usize) -> Result<(), MapError> {
        if let Some(remaining) = self.remaining_hint() {
            if needed > remaining {
                return Err(MapError::InvalidFormat(format!(
                    "length prefix of {needed} bytes exceeds the {remaining} bytes remaining"
                )));
            }
        }
        Ok(())
    }
}

/// cursor over a memory-mapped region; every read is bounds-checked
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> SliceReader<'a> {
        SliceReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl BinaryRead for SliceReader<'_> {
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<(), MapError> {
        let end = self.pos.checked_add(buf.len()).ok_or_else(|| {
            MapError::InvalidFormat("read offset overflows the mapped region".to_string())
        })?;
        if end > self.data.len() {
            return Err(MapError::InvalidFormat(format!(
                "unexpected end of mapped region at offset {}",
                self.pos
            )));
        }
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn remaining_hint(&self) -> Option<usize> {
        Some(self.data.len() - self.pos)
    }
}

/// buffered-stream fallback used when a file cannot be mapped
pub struct StreamReader<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> StreamReader<R> {
    pub fn new(source: R) -> StreamReader<R> {
        StreamReader {
            inner: BufReader::new(source),
        }
    }
}

impl<R: Read> BinaryRead for StreamReader<R> {
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<(), MapError> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                MapError::InvalidFormat("unexpected end of file".to_string())
            }
            _ => MapError::from(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&42u32.to_le_bytes());
        bytes.extend_from_slice(&(-7i64).to_le_bytes());
        bytes.extend_from_slice(&1.5f64.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(b"abc");
        bytes
    }

    #[test]
    fn test_slice_reader_typed_sequence() {
        let bytes = sample_bytes();
        let mut reader = SliceReader::new(&bytes);
        assert_eq!(reader.read_u32().expect("u32"), 42);
        assert_eq!(reader.read_i64().expect("i64"), -7);
        assert_eq!(reader.read_f64().expect("f64"), 1.5);
        assert_eq!(reader.read_string().expect("string"), "abc");
        assert_eq!(reader.remaining_hint(), Some(0));
    }

    #[test]
    fn test_stream_reader_matches_slice_reader() {
        let bytes = sample_bytes();
        let mut reader = StreamReader::new(std::io::Cursor::new(bytes));
        assert_eq!(reader.read_u32().expect("u32"), 42);
        assert_eq!(reader.read_i64().expect("i64"), -7);
        assert_eq!(reader.read_f64().expect("f64"), 1.5);
        assert_eq!(reader.read_string().expect("string"), "abc");
    }

    #[test]
    fn test_short_read_is_invalid_format() {
        let bytes = [1u8, 2];
        let mut reader = SliceReader::new(&bytes);
        assert!(matches!(
            reader.read_u32(),
            Err(MapError::InvalidFormat(_))
        ));

        let mut stream = StreamReader::new(std::io::Cursor::new(vec![1u8, 2]));
        assert!(matches!(stream.read_u32(), Err(MapError::InvalidFormat(_))));
    }

    #[test]
    fn test_oversized_length_prefix_is_rejected_before_allocation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let mut reader = SliceReader::new(&bytes);
        assert!(matches!(
            reader.read_string(),
            Err(MapError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        let mut reader = SliceReader::new(&bytes);
        assert!(matches!(
            reader.read_string(),
            Err(MapError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_tag_vector_round_trip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        for (key, value) in [("highway", "primary"), ("name", "Main St")] {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key.as_bytes());
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value.as_bytes());
        }
        let mut reader = SliceReader::new(&bytes);
        let tags = reader.read_tags().expect("tags");
        assert_eq!(
            tags,
            vec![
                ("highway".to_string(), "primary".to_string()),
                ("name".to_string(), "Main St".to_string()),
            ]
        );
    }
}
