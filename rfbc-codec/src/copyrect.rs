//! CopyRect encoding: a 4-byte source position, pixels taken from the
//! framebuffer itself.

use anyhow::{Context, Result};
use rfbc_pixels::FrameBuffer;
use rfbc_wire::{UpdateRect, WireReader};

pub(crate) fn decode(fb: &mut FrameBuffer, rect: &UpdateRect, body: &[u8]) -> Result<()> {
    let mut r = WireReader::new(body);
    let src_x = r.read_u16().context("CopyRect source")?;
    let src_y = r.read_u16().context("CopyRect source")?;
    fb.copy_rect(rect.x, rect.y, src_x, src_y, rect.width, rect.height)
        .context("CopyRect rectangle")
}
