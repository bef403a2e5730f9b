//! ZRLE encoding: 64x64 tiles of palette/RLE pixel data inside the
//! connection's persistent zlib stream.
//!
//! Pixels inside a tile are 3-byte "compressed pixels" in wire byte order
//! (blue, green, red for the negotiated little-endian format); the decoder
//! expands each to 4 bytes with a zero fourth channel. Tiles are laid out
//! left-to-right, top-to-bottom, with the rightmost and bottom tiles clipped
//! to the rectangle edge.

use crate::inflate::Inflater;
use anyhow::{bail, Context, Result};
use rfbc_pixels::FrameBuffer;
use rfbc_wire::{UpdateRect, WireReader};

const TILE: u16 = 64;

pub(crate) fn decode(
    fb: &mut FrameBuffer,
    inflater: &mut Inflater,
    rect: &UpdateRect,
    data: &[u8],
) -> Result<()> {
    let mut plain = Vec::new();
    inflater
        .inflate_all(data, &mut plain, rect.raw_payload_len())
        .context("ZRLE rectangle")?;

    let mut r = WireReader::new(&plain);
    let mut tile = Vec::with_capacity(TILE as usize * TILE as usize * 4);
    let mut ty = 0;
    while ty < rect.height {
        let th = TILE.min(rect.height - ty);
        let mut tx = 0;
        while tx < rect.width {
            let tw = TILE.min(rect.width - tx);
            decode_tile(&mut r, fb, &mut tile, rect.x + tx, rect.y + ty, tw, th)
                .with_context(|| format!("ZRLE tile at ({}, {})", rect.x + tx, rect.y + ty))?;
            tx += tw;
        }
        ty += th;
    }
    if r.remaining() != 0 {
        bail!("{} ZRLE bytes left over after the last tile", r.remaining());
    }
    Ok(())
}

fn decode_tile(
    r: &mut WireReader<'_>,
    fb: &mut FrameBuffer,
    out: &mut Vec<u8>,
    x: u16,
    y: u16,
    tw: u16,
    th: u16,
) -> Result<()> {
    out.clear();
    let pixels = tw as usize * th as usize;
    let sub = r.read_u8()?;
    match sub {
        // Raw: one cpixel per tile pixel.
        0 => {
            let src = r.read_slice(pixels * 3)?;
            for c in src.chunks_exact(3) {
                push_pixel(out, c);
            }
        }
        // Solid: one cpixel for the whole tile, filled in place.
        1 => {
            let c = r.read_slice(3)?;
            return fb.fill_rect(x, y, tw, th, [c[0], c[1], c[2], 0]);
        }
        // Packed palette: indices at 1, 2 or 4 bits per pixel, MSB first,
        // each row starting on a byte boundary.
        2..=16 => {
            let colors = sub as usize;
            let palette = r.read_slice(colors * 3)?;
            let bits = match colors {
                2 => 1,
                3..=4 => 2,
                _ => 4,
            };
            let mask = (1u8 << bits) - 1;
            for _ in 0..th {
                let mut byte = 0u8;
                let mut avail = 0u8;
                for _ in 0..tw {
                    if avail == 0 {
                        byte = r.read_u8()?;
                        avail = 8;
                    }
                    avail -= bits;
                    let idx = ((byte >> avail) & mask) as usize;
                    push_palette(out, palette, colors, idx)?;
                }
            }
        }
        // Plain RLE: (cpixel, run length) pairs until the tile is full.
        128 => {
            let mut remaining = pixels;
            while remaining > 0 {
                let c = r.read_slice(3)?;
                let len = read_run_len(r)?;
                if len > remaining {
                    bail!("run of {} pixels overflows tile ({} left)", len, remaining);
                }
                for _ in 0..len {
                    push_pixel(out, c);
                }
                remaining -= len;
            }
        }
        // Palette RLE: palette of `sub - 128` colors, then indexed runs. An
        // index with the high bit set is followed by a run length; without
        // it, a single pixel.
        130..=255 => {
            let colors = (sub - 128) as usize;
            let palette = r.read_slice(colors * 3)?;
            let mut remaining = pixels;
            while remaining > 0 {
                let index = r.read_u8()?;
                let len = if index & 0x80 != 0 { read_run_len(r)? } else { 1 };
                if len > remaining {
                    bail!("run of {} pixels overflows tile ({} left)", len, remaining);
                }
                let idx = (index & 0x7F) as usize;
                for _ in 0..len {
                    push_palette(out, palette, colors, idx)?;
                }
                remaining -= len;
            }
        }
        // 17-127 and 129 are not assigned by the protocol. Refusing them
        // beats guessing and leaving stale pixels in the tile.
        other => bail!("unrecognized ZRLE sub-encoding {}", other),
    }
    fb.image_rect(x, y, tw, th, out)
}

fn push_pixel(out: &mut Vec<u8>, cpixel: &[u8]) {
    out.extend_from_slice(cpixel);
    out.push(0);
}

fn push_palette(out: &mut Vec<u8>, palette: &[u8], colors: usize, idx: usize) -> Result<()> {
    if idx >= colors {
        bail!("palette index {} out of range for {} colors", idx, colors);
    }
    push_pixel(out, &palette[idx * 3..idx * 3 + 3]);
    Ok(())
}

/// A run length is one or more bytes: every 255 adds 255 and continues, the
/// final byte adds its value, and the total is offset by one. So `[4]` is a
/// run of 5 and `[255, 255, 10]` is a run of 521.
fn read_run_len(r: &mut WireReader<'_>) -> std::io::Result<usize> {
    let mut len = 1usize;
    loop {
        let b = r.read_u8()?;
        len += b as usize;
        if b != 255 {
            return Ok(len);
        }
    }
}
