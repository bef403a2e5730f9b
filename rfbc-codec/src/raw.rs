//! Raw encoding: uncompressed pixels, top-to-bottom rows.

use anyhow::{Context, Result};
use rfbc_pixels::FrameBuffer;
use rfbc_wire::UpdateRect;

pub(crate) fn decode(fb: &mut FrameBuffer, rect: &UpdateRect, body: &[u8]) -> Result<()> {
    fb.image_rect(rect.x, rect.y, rect.width, rect.height, body)
        .context("raw rectangle")
}
