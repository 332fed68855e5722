use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::CacheError;

/// rendered width of every checksum string in cache metadata
pub const CHECKSUM_LENGTH: usize = 64;

/// 48-bit window kept from each accumulator when rendering
const ACCUMULATOR_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// checksum a whole file. two interleaved running sums over every byte:
/// `low` accumulates the bytes, `high` accumulates `low`, both wrapping.
/// the function must stay byte-for-byte reproducible because the producer
/// (cache writer) and consumer (validator) compare rendered strings.
pub fn compute_file_checksum(path: &Path) -> Result<String, CacheError> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CacheError::NotFound(path.to_path_buf()),
        _ => CacheError::from(e),
    })?;

    let mut low: u64 = 0;
    let mut high: u64 = 0;
    let mut buffer = [0u8; 4096];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        for &byte in &buffer[..read] {
            low = low.wrapping_add(byte as u64);
            high = high.wrapping_add(low);
        }
    }

    Ok(render_checksum(high, low))
}

/// same sum over an in-memory buffer; used by tests to cross-check the
/// file path implementation
pub fn checksum_of_bytes(bytes: &[u8]) -> String {
    let mut low: u64 = 0;
    let mut high: u64 = 0;
    for &byte in bytes {
        low = low.wrapping_add(byte as u64);
        high = high.wrapping_add(low);
    }
    render_checksum(high, low)
}

/// 16 hex digits of each masked accumulator, high first, right-padded with
/// '0' to the fixed width
fn render_checksum(high: u64, low: u64) -> String {
    let mut rendered = String::with_capacity(CHECKSUM_LENGTH);
    rendered.push_str(&hex::encode((high & ACCUMULATOR_MASK).to_be_bytes()));
    rendered.push_str(&hex::encode((low & ACCUMULATOR_MASK).to_be_bytes()));
    while rendered.len() < CHECKSUM_LENGTH {
        rendered.push('0');
    }
    rendered.truncate(CHECKSUM_LENGTH);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fixed_width_and_charset() {
        let digest = checksum_of_bytes(b"hello, map");
        assert_eq!(digest.len(), CHECKSUM_LENGTH);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        assert_eq!(checksum_of_bytes(b""), "0".repeat(CHECKSUM_LENGTH));
    }

    #[test]
    fn test_known_value_single_byte() {
        // one byte 0x01: low = 1, high = 1
        let digest = checksum_of_bytes(&[1]);
        assert!(digest.starts_with("0000000000000001"));
        assert_eq!(&digest[16..32], "0000000000000001");
        assert_eq!(&digest[32..], &"0".repeat(32));
    }

    #[test]
    fn test_order_sensitivity() {
        // the chained high accumulator makes the sum order-dependent
        assert_ne!(checksum_of_bytes(b"ab"), checksum_of_bytes(b"ba"));
    }

    #[test]
    fn test_single_byte_change_alters_digest() {
        let mut payload = vec![7u8; 5000];
        let before = checksum_of_bytes(&payload);
        payload[3000] ^= 0x20;
        assert_ne!(before, checksum_of_bytes(&payload));
    }

    #[test]
    fn test_appending_a_byte_alters_digest() {
        let payload = vec![42u8; 1024];
        let before = checksum_of_bytes(&payload);
        let mut appended = payload.clone();
        appended.push(0);
        // even a zero byte moves `high` because low is already non-zero
        assert_ne!(before, checksum_of_bytes(&appended));
    }

    #[test]
    fn test_file_and_buffer_paths_agree() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("payload.bin");
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(&payload).expect("write");
        drop(file);

        assert_eq!(
            compute_file_checksum(&path).expect("checksum file"),
            checksum_of_bytes(&payload)
        );
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = compute_file_checksum(Path::new("/no/such/file.bin"))
            .expect_err("missing file");
        assert_eq!(err.kind(), super::super::CacheErrorKind::FileNotFound);
    }
}
