//! Double-buffered framebuffer storage for the RFB client.
//!
//! Two pixel buffers exist per connection: the *live* [`FrameBuffer`], owned
//! exclusively by the transport thread and mutated rectangle by rectangle as
//! updates arrive, and the *snapshot* inside [`SharedView`], guarded by a
//! mutex and overwritten only when a complete framebuffer update has been
//! applied. The consumer thread reads only the snapshot, so it always sees a
//! geometrically consistent, fully-applied frame.
//!
//! Pixels are stored as 4 bytes each in the negotiated wire layout (blue,
//! green, red, pad for the little-endian red-shift-16 format this client
//! requires), row-major with no padding between rows.

mod buffer;
mod shared;

pub use buffer::FrameBuffer;
pub use shared::{SharedView, Status};

/// Bytes per pixel in both buffers.
pub const BYTES_PER_PIXEL: usize = 4;
