//! Zlib encoding: raw pixels pushed through the connection's persistent
//! deflate stream.

use crate::inflate::Inflater;
use anyhow::{Context, Result};
use rfbc_pixels::FrameBuffer;
use rfbc_wire::UpdateRect;

pub(crate) fn decode(
    fb: &mut FrameBuffer,
    inflater: &mut Inflater,
    rect: &UpdateRect,
    data: &[u8],
) -> Result<()> {
    let mut raw = vec![0u8; rect.raw_payload_len()];
    inflater.inflate_exact(data, &mut raw).context("zlib rectangle")?;
    fb.image_rect(rect.x, rect.y, rect.width, rect.height, &raw)
        .context("zlib rectangle")
}
