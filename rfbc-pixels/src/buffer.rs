//! The live pixel buffer mutated by the rectangle decoders.

use crate::BYTES_PER_PIXEL;
use anyhow::{bail, Result};

/// A pixel buffer that owns its memory, stored row-major with a stride equal
/// to the width.
///
/// All blit operations bounds-check against the current dimensions and fail
/// rather than clipping: an out-of-range rectangle means the server and
/// client disagree about the framebuffer geometry, which is a protocol
/// error, not something to paper over.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a zero-filled buffer of `width` x `height` pixels.
    pub fn new(width: u16, height: u16) -> Self {
        let data = vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL];
        Self {
            width: width as u32,
            height: height as u32,
            data,
        }
    }

    /// Reallocate to new dimensions. Existing content is discarded; the new
    /// buffer is zero-filled.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width as u32;
        self.height = height as u32;
        self.data.clear();
        self.data
            .resize(width as usize * height as usize * BYTES_PER_PIXEL, 0);
    }

    /// Current dimensions in pixels.
    pub fn dimensions(&self) -> (u16, u16) {
        (self.width as u16, self.height as u16)
    }

    /// The raw pixel bytes, row-major.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Row stride in bytes.
    fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    fn check_rect(&self, x: u16, y: u16, w: u16, h: u16) -> Result<()> {
        if x as u32 + w as u32 > self.width || y as u32 + h as u32 > self.height {
            bail!(
                "rectangle [{},{} {}x{}] exceeds framebuffer {}x{}",
                x,
                y,
                w,
                h,
                self.width,
                self.height
            );
        }
        Ok(())
    }

    /// Copy tightly-packed pixel rows from `src` into the rectangle at
    /// (`x`, `y`). `src` must hold exactly `w * h * 4` bytes.
    pub fn image_rect(&mut self, x: u16, y: u16, w: u16, h: u16, src: &[u8]) -> Result<()> {
        self.check_rect(x, y, w, h)?;
        let row_bytes = w as usize * BYTES_PER_PIXEL;
        if src.len() != row_bytes * h as usize {
            bail!(
                "pixel data is {} bytes, rectangle {}x{} needs {}",
                src.len(),
                w,
                h,
                row_bytes * h as usize
            );
        }
        // Zero-width rectangles do appear on the wire; they paint nothing.
        if row_bytes == 0 {
            return Ok(());
        }
        let stride = self.stride();
        let mut dst = y as usize * stride + x as usize * BYTES_PER_PIXEL;
        for row in src.chunks_exact(row_bytes) {
            self.data[dst..dst + row_bytes].copy_from_slice(row);
            dst += stride;
        }
        Ok(())
    }

    /// Fill the rectangle at (`x`, `y`) with a single pixel value.
    pub fn fill_rect(&mut self, x: u16, y: u16, w: u16, h: u16, pixel: [u8; 4]) -> Result<()> {
        self.check_rect(x, y, w, h)?;
        let stride = self.stride();
        let row_bytes = w as usize * BYTES_PER_PIXEL;
        let mut dst = y as usize * stride + x as usize * BYTES_PER_PIXEL;
        for _ in 0..h {
            for px in self.data[dst..dst + row_bytes].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&pixel);
            }
            dst += stride;
        }
        Ok(())
    }

    /// Copy a `w` x `h` region from (`src_x`, `src_y`) to (`dst_x`,
    /// `dst_y`) within this buffer.
    ///
    /// Overlapping regions are handled like a copy through an intermediate
    /// buffer: rows are walked bottom-up when the destination is below the
    /// source, and each row copy has memmove semantics.
    pub fn copy_rect(
        &mut self,
        dst_x: u16,
        dst_y: u16,
        src_x: u16,
        src_y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        self.check_rect(dst_x, dst_y, w, h)?;
        self.check_rect(src_x, src_y, w, h)?;

        let stride = self.stride();
        let row_bytes = w as usize * BYTES_PER_PIXEL;

        let row_copy = |data: &mut Vec<u8>, row: usize| {
            let src = (src_y as usize + row) * stride + src_x as usize * BYTES_PER_PIXEL;
            let dst = (dst_y as usize + row) * stride + dst_x as usize * BYTES_PER_PIXEL;
            data.copy_within(src..src + row_bytes, dst);
        };

        if dst_y > src_y {
            for row in (0..h as usize).rev() {
                row_copy(&mut self.data, row);
            }
        } else {
            for row in 0..h as usize {
                row_copy(&mut self.data, row);
            }
        }
        Ok(())
    }
}
