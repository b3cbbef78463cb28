//! Gzip framing for payload plaintext.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Decompress a single gzip member.
pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let _ = GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Compress into a single gzip member.
pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_input_round_trips() {
        let packed = gzip(b"").unwrap();
        assert!(!packed.is_empty());
        assert!(gunzip(&packed).unwrap().is_empty());
    }

    #[test]
    fn gzip_magic_is_present() {
        let packed = gzip(b"payload").unwrap();
        assert_eq!(&packed[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(gunzip(b"definitely not gzip").is_err());
    }

    proptest! {
        #[test]
        fn round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let packed = gzip(&data).unwrap();
            prop_assert_eq!(gunzip(&packed).unwrap(), data);
        }
    }
}
