//! Persistent zlib decompression for the zlib and ZRLE encodings.

use anyhow::{bail, Context, Result};
use flate2::{Decompress, FlushDecompress, Status};

const GROW_CHUNK: usize = 32 * 1024;

/// A zlib stream that lives for the whole connection.
///
/// RFB servers open one deflate stream per connection and feed every zlib
/// and ZRLE rectangle through it, flushing with Z_SYNC_FLUSH at rectangle
/// boundaries. Decompression state therefore carries across rectangles and
/// across messages, and both encodings must share this one stream. The
/// stream is reset on disconnect so a reconnect starts clean.
#[derive(Debug)]
pub struct Inflater {
    stream: Decompress,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            stream: Decompress::new(true),
        }
    }

    /// Discard all stream state. Must be called between connections.
    pub fn reset(&mut self) {
        self.stream.reset(true);
    }

    /// Decompress `input` into `out`, which must end up exactly full.
    ///
    /// Used for zlib rectangles, where the payload inflates to precisely
    /// `w * h * 4` bytes. Anything else (short output, surplus compressed
    /// data, or the server terminating the stream) is an error.
    pub fn inflate_exact(&mut self, mut input: &[u8], out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while !input.is_empty() {
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();
            let status = self
                .stream
                .decompress(input, &mut out[filled..], FlushDecompress::Sync)
                .context("corrupt zlib data")?;
            if status == Status::StreamEnd {
                bail!("server terminated the zlib stream mid-connection");
            }
            let consumed = (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;
            input = &input[consumed..];
            filled += produced;
            if consumed == 0 && produced == 0 {
                bail!(
                    "compressed payload inflates past the {}-byte rectangle",
                    out.len()
                );
            }
        }
        if filled != out.len() {
            bail!(
                "compressed payload inflated to {} of {} expected bytes",
                filled,
                out.len()
            );
        }
        Ok(())
    }

    /// Decompress all of `input`, appending whatever it produces to `out`.
    ///
    /// Used for ZRLE, where the inflated size is only discovered by walking
    /// the tile stream afterwards. `hint` pre-sizes the output; the buffer
    /// grows if the payload inflates larger.
    pub fn inflate_all(&mut self, mut input: &[u8], out: &mut Vec<u8>, hint: usize) -> Result<()> {
        out.clear();
        out.reserve(hint);
        while !input.is_empty() {
            if out.len() == out.capacity() {
                out.reserve(GROW_CHUNK);
            }
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();
            let status = self
                .stream
                .decompress_vec(input, out, FlushDecompress::Sync)
                .context("corrupt zlib data")?;
            if status == Status::StreamEnd {
                bail!("server terminated the zlib stream mid-connection");
            }
            let consumed = (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;
            input = &input[consumed..];
            if consumed == 0 && produced == 0 && out.len() < out.capacity() {
                bail!("zlib stream stalled with {} bytes unconsumed", input.len());
            }
        }
        Ok(())
    }
}
