//! Rectangle decoders for the RFB framebuffer update encodings.
//!
//! The session layer accumulates a rectangle's complete payload and hands it
//! here along with the target [`FrameBuffer`] and the connection's
//! [`Inflater`]. Four encodings are supported: raw, CopyRect, zlib and ZRLE.
//! The zlib and ZRLE payloads share the single persistent zlib stream, so
//! they must be decoded in arrival order and the stream must be reset
//! between connections.

mod copyrect;
mod inflate;
mod raw;
mod zlib;
mod zrle;

pub use inflate::Inflater;

use anyhow::{bail, Result};
use rfbc_pixels::FrameBuffer;
use rfbc_wire::{
    UpdateRect, WireReader, ENCODING_COPY_RECT, ENCODING_RAW, ENCODING_ZLIB, ENCODING_ZRLE,
};
use tracing::trace;

/// Decode one rectangle's payload into the framebuffer.
///
/// `body` is everything after the 12-byte rectangle header: the pixel data
/// for raw, the source position for CopyRect, and the 4-byte compressed
/// length followed by that many bytes for zlib and ZRLE.
pub fn decode_rect(
    fb: &mut FrameBuffer,
    inflater: &mut Inflater,
    rect: &UpdateRect,
    body: &[u8],
) -> Result<()> {
    trace!(
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        encoding = rect.encoding,
        len = body.len(),
        "decoding rectangle"
    );
    match rect.encoding {
        ENCODING_RAW => raw::decode(fb, rect, body),
        ENCODING_COPY_RECT => copyrect::decode(fb, rect, body),
        ENCODING_ZLIB => zlib::decode(fb, inflater, rect, compressed_payload(body)?),
        ENCODING_ZRLE => zrle::decode(fb, inflater, rect, compressed_payload(body)?),
        other => bail!("no decoder for encoding {}", other),
    }
}

/// Strip the 4-byte length prefix from a zlib/ZRLE body and check it against
/// the accumulated byte count.
fn compressed_payload(body: &[u8]) -> Result<&[u8]> {
    let mut r = WireReader::new(body);
    let len = r.read_u32()? as usize;
    let data = r.read_slice(len)?;
    if r.remaining() != 0 {
        bail!(
            "compressed payload declares {} bytes but {} follow",
            len,
            len + r.remaining()
        );
    }
    Ok(data)
}
