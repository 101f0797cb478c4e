//! Transport decompression for queue payloads.
//!
//! Payloads starting with the gzip magic are gunzipped; anything else is
//! treated as a zlib stream.

use flate2::read::{GzDecoder, ZlibDecoder};
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn decompress(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len() * 4);
    if payload.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(payload).read_to_end(&mut out)?;
    } else {
        ZlibDecoder::new(payload).read_to_end(&mut out)?;
    }
    Ok(out)
}
