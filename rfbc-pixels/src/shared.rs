//! The lock-guarded state shared between the transport and consumer threads.

use crate::BYTES_PER_PIXEL;
use parking_lot::Mutex;

/// Connection status as observed by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not connected; the transport loop is connecting or backing off.
    Connecting,
    /// Handshake complete; framebuffer updates are flowing.
    Connected,
    /// Terminal failure (hostname resolution); the transport loop has exited.
    Error,
}

#[derive(Debug)]
struct ViewState {
    status: Status,
    width: u16,
    height: u16,
    updated: bool,
    snapshot: Vec<u8>,
}

/// Cross-thread view of a client: status, dimensions, and the published
/// frame snapshot, all behind one mutex.
///
/// The transport thread takes the lock only for the brief publish/clear
/// steps, never across socket I/O or decompression, so a consumer polling
/// [`SharedView::copy_frame`] is not blocked behind network latency.
#[derive(Debug)]
pub struct SharedView {
    inner: Mutex<ViewState>,
}

impl Default for SharedView {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedView {
    /// Create a view with no frame and status `Connecting`.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ViewState {
                status: Status::Connecting,
                width: 0,
                height: 0,
                updated: false,
                snapshot: Vec::new(),
            }),
        }
    }

    /// Current connection status.
    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    /// Update the connection status.
    pub fn set_status(&self, status: Status) {
        self.inner.lock().status = status;
    }

    /// Current framebuffer dimensions.
    pub fn size(&self) -> (u16, u16) {
        let state = self.inner.lock();
        (state.width, state.height)
    }

    /// Install new dimensions, dropping any published frame. Used on
    /// ServerInit and on a desktop-size change.
    pub fn set_size(&self, width: u16, height: u16) {
        let mut state = self.inner.lock();
        state.width = width;
        state.height = height;
        state.updated = false;
        state.snapshot.clear();
    }

    /// Publish a complete frame: copy the live buffer into the snapshot and
    /// raise the updated flag. `live` must match the current dimensions.
    pub fn publish(&self, live: &[u8]) {
        let mut state = self.inner.lock();
        debug_assert_eq!(
            live.len(),
            state.width as usize * state.height as usize * BYTES_PER_PIXEL
        );
        state.snapshot.clear();
        state.snapshot.extend_from_slice(live);
        state.updated = true;
    }

    /// Drop the published frame on disconnect. Dimensions are kept so the
    /// consumer still sees the last-known geometry while reconnecting.
    pub fn clear_frame(&self) {
        let mut state = self.inner.lock();
        state.updated = false;
        state.snapshot.clear();
        state.snapshot.shrink_to_fit();
    }

    /// Whether a frame has been published since the last clear.
    pub fn has_frame(&self) -> bool {
        self.inner.lock().updated
    }

    /// Copy the published frame into `dst`, vertically flipped (output row 0
    /// is the last framebuffer row). `stride` is the destination row pitch
    /// in bytes.
    ///
    /// Returns `false` without touching `dst` if no frame has been published
    /// since the last clear, if (`width`, `height`) does not match the
    /// current dimensions or is empty, or if `dst` is too small for the
    /// requested geometry. The updated flag is not consumed; repeated calls
    /// keep returning the same frame until a new one is published.
    pub fn copy_frame(&self, dst: &mut [u8], stride: usize, width: u16, height: u16) -> bool {
        let state = self.inner.lock();
        if !state.updated || width != state.width || height != state.height {
            return false;
        }
        if width == 0 || height == 0 {
            return false;
        }
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes || dst.len() < stride * (height as usize - 1) + row_bytes {
            return false;
        }
        for (i, src_row) in state.snapshot.chunks_exact(row_bytes).rev().enumerate() {
            let off = i * stride;
            dst[off..off + row_bytes].copy_from_slice(src_row);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        let view = SharedView::new();
        assert_eq!(view.status(), Status::Connecting);
        view.set_status(Status::Connected);
        assert_eq!(view.status(), Status::Connected);
        view.set_status(Status::Error);
        assert_eq!(view.status(), Status::Error);
    }

    #[test]
    fn copy_frame_requires_publish_and_matching_dimensions() {
        let view = SharedView::new();
        view.set_size(2, 2);

        let mut out = vec![0u8; 2 * 2 * 4];
        // Nothing published yet.
        assert!(!view.copy_frame(&mut out, 8, 2, 2));

        let live: Vec<u8> = (0..16).collect();
        view.publish(&live);
        // Wrong dimensions.
        assert!(!view.copy_frame(&mut out, 8, 2, 1));
        assert!(!view.copy_frame(&mut out, 8, 1, 2));
        // Matching dimensions succeed.
        assert!(view.copy_frame(&mut out, 8, 2, 2));
    }

    #[test]
    fn copy_frame_flips_vertically() {
        let view = SharedView::new();
        view.set_size(2, 3);
        // Rows tagged 0, 1, 2 in the first byte of each pixel.
        let mut live = Vec::new();
        for row in 0..3u8 {
            live.extend_from_slice(&[row; 8]);
        }
        view.publish(&live);

        let mut out = vec![0xFFu8; 3 * 8];
        assert!(view.copy_frame(&mut out, 8, 2, 3));
        assert!(out[0..8].iter().all(|&b| b == 2));
        assert!(out[8..16].iter().all(|&b| b == 1));
        assert!(out[16..24].iter().all(|&b| b == 0));
    }

    #[test]
    fn copy_frame_honors_destination_stride() {
        let view = SharedView::new();
        view.set_size(1, 2);
        view.publish(&[1, 1, 1, 1, 2, 2, 2, 2]);

        // Stride 6 leaves a 2-byte gap after each 4-byte row.
        let mut out = vec![0xEEu8; 6 + 4];
        assert!(view.copy_frame(&mut out, 6, 1, 2));
        assert_eq!(&out[0..4], &[2, 2, 2, 2]);
        assert_eq!(&out[4..6], &[0xEE, 0xEE]);
        assert_eq!(&out[6..10], &[1, 1, 1, 1]);
    }

    #[test]
    fn copy_frame_does_not_clear_updated_flag() {
        let view = SharedView::new();
        view.set_size(1, 1);
        view.publish(&[7, 7, 7, 7]);

        let mut out = vec![0u8; 4];
        assert!(view.copy_frame(&mut out, 4, 1, 1));
        assert!(view.copy_frame(&mut out, 4, 1, 1));
        assert!(view.has_frame());
    }

    #[test]
    fn clear_frame_drops_snapshot_but_keeps_size() {
        let view = SharedView::new();
        view.set_size(1, 1);
        view.publish(&[7, 7, 7, 7]);
        view.clear_frame();

        let mut out = vec![0u8; 4];
        assert!(!view.copy_frame(&mut out, 4, 1, 1));
        assert_eq!(view.size(), (1, 1));
    }

    #[test]
    fn copy_frame_refuses_empty_geometry() {
        // A server may advertise a degenerate framebuffer; there is no frame
        // to hand out.
        let view = SharedView::new();
        view.set_size(0, 1);
        view.publish(&[]);
        assert!(!view.copy_frame(&mut [], 0, 0, 1));

        view.set_size(2, 0);
        view.publish(&[]);
        assert!(!view.copy_frame(&mut [0u8; 16], 8, 2, 0));
    }

    #[test]
    fn copy_frame_rejects_undersized_destination() {
        let view = SharedView::new();
        view.set_size(2, 2);
        view.publish(&vec![0u8; 16]);

        let mut out = vec![0u8; 8];
        assert!(!view.copy_frame(&mut out, 8, 2, 2));
    }
}
