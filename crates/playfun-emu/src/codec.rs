//! Compressed snapshot codec.
//!
//! # Wire format
//! ```text
//! [uncompressed_len: u32 LE][zlib deflate stream of uncompressed_len bytes]
//! ```
//! The deflated payload is the raw serialized emulator state, optionally
//! differenced against a basis snapshot: on save every byte covered by the
//! basis is replaced by `(byte - basis) mod 256`, on load the basis is added
//! back. States near the basis then deflate to almost nothing.
//!
//! The length header is written only after the deflate stream has been
//! produced; the payload is never resized once the header is in place.
//!
//! # Failure handling
//! A snapshot that cannot round-trip poisons every cached state derived from
//! it, so deflate/inflate failures abort the process instead of propagating.

use flate2::{Compression, write::ZlibDecoder, write::ZlibEncoder};
use std::fmt::Display;
use std::io::Write;
use tracing::error;

fn fatal(context: &str, err: impl Display) -> ! {
    error!("{context}: {err}");
    std::process::abort();
}

/// Compresses a raw state, differencing it against `basis` first.
///
/// An empty basis means no differencing.
pub fn compress_state(raw: &[u8], basis: &[u8]) -> Vec<u8> {
    let mut diffed;
    let payload: &[u8] = if basis.is_empty() {
        raw
    } else {
        diffed = raw.to_vec();
        for (byte, &base) in diffed.iter_mut().zip(basis.iter()) {
            *byte = byte.wrapping_sub(base);
        }
        &diffed
    };

    let uncompressed_len = match u32::try_from(raw.len()) {
        Ok(len) => len,
        Err(_) => fatal("state too large for snapshot header", raw.len()),
    };

    let mut out = vec![0u8; 4];
    let mut encoder = ZlibEncoder::new(out, Compression::default());
    if let Err(e) = encoder.write_all(payload) {
        fatal("state compression failed", e);
    }
    out = match encoder.finish() {
        Ok(out) => out,
        Err(e) => fatal("state compression failed", e),
    };
    out[..4].copy_from_slice(&uncompressed_len.to_le_bytes());
    out
}

/// Inverse of [`compress_state`]; `basis` must match the one used on save.
pub fn decompress_state(data: &[u8], basis: &[u8]) -> Vec<u8> {
    if data.len() < 4 {
        fatal("snapshot truncated", format!("{} bytes", data.len()));
    }
    let uncompressed_len =
        u32::from_le_bytes(data[..4].try_into().expect("header is 4 bytes")) as usize;

    let mut decoder = ZlibDecoder::new(Vec::with_capacity(uncompressed_len));
    if let Err(e) = decoder.write_all(&data[4..]) {
        fatal("state decompression failed", e);
    }
    let mut buf = match decoder.finish() {
        Ok(buf) => buf,
        Err(e) => fatal("state decompression failed", e),
    };
    if buf.len() != uncompressed_len {
        fatal(
            "snapshot length mismatch",
            format!("header {} vs stream {}", uncompressed_len, buf.len()),
        );
    }

    for (byte, &base) in buf.iter_mut().zip(basis.iter()) {
        *byte = byte.wrapping_add(base);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use playfun_support::ArcFour;

    fn random_bytes(rc: &mut ArcFour, len: usize) -> Vec<u8> {
        (0..len).map(|_| rc.byte()).collect()
    }

    #[test]
    fn round_trips_without_a_basis() {
        let state = b"some opaque serialized machine state".to_vec();
        let packed = compress_state(&state, &[]);
        assert_eq!(decompress_state(&packed, &[]), state);
    }

    #[test]
    fn header_encodes_the_uncompressed_length() {
        let state = vec![7u8; 5000];
        let packed = compress_state(&state, &[]);
        let header = u32::from_le_bytes(packed[..4].try_into().unwrap());
        assert_eq!(header as usize, state.len());
    }

    #[test]
    fn round_trip_fuzz_with_random_bases() {
        let mut rc = ArcFour::new("codec-fuzz");
        for _ in 0..1000 {
            let state = random_bytes(&mut rc, 4096);
            let basis = random_bytes(&mut rc, 4096);
            let packed = compress_state(&state, &basis);
            assert_eq!(
                u32::from_le_bytes(packed[..4].try_into().unwrap()) as usize,
                state.len()
            );
            assert_eq!(decompress_state(&packed, &basis), state);
        }
    }

    #[test]
    fn basis_may_be_shorter_or_longer_than_the_state() {
        let mut rc = ArcFour::new("codec-lengths");
        let state = random_bytes(&mut rc, 300);
        for basis_len in [0usize, 1, 299, 300, 301, 1000] {
            let basis = random_bytes(&mut rc, basis_len);
            let packed = compress_state(&state, &basis);
            assert_eq!(decompress_state(&packed, &basis), state);
        }
    }

    #[test]
    fn a_nearby_basis_shrinks_the_snapshot() {
        let mut rc = ArcFour::new("codec-size");
        let basis = random_bytes(&mut rc, 16 * 1024);
        let mut state = basis.clone();
        for i in (0..state.len()).step_by(512) {
            state[i] = state[i].wrapping_add(1);
        }
        let with_basis = compress_state(&state, &basis);
        let without = compress_state(&state, &[]);
        assert!(with_basis.len() < without.len());
        assert_eq!(decompress_state(&with_basis, &basis), state);
    }

    #[test]
    fn empty_state_round_trips() {
        let packed = compress_state(&[], &[]);
        assert!(decompress_state(&packed, &[]).is_empty());
    }
}
