//! A minimal RFB (VNC) viewer client.
//!
//! [`Client::connect`] spawns a transport thread that connects, handshakes
//! (protocol 3.3/3.7/3.8, security type None, 32-bit true color only),
//! applies framebuffer updates and reconnects with a short delay whenever
//! the connection drops. The calling thread polls [`Client::status`] and
//! pulls completed frames with [`Client::copy_frame`]; no callbacks, no
//! async surface.
//!
//! ```no_run
//! use rfbc_client::{Client, Config, Status};
//!
//! fn main() -> Result<(), rfbc_client::ClientError> {
//!     let client = Client::connect(Config::new("localhost", 5900))?;
//!     loop {
//!         if client.status() == Status::Connected {
//!             let (width, height) = client.size();
//!             let mut frame = vec![0u8; width as usize * height as usize * 4];
//!             if client.copy_frame(&mut frame, width as usize * 4, width, height) {
//!                 // hand `frame` to the renderer
//!             }
//!             client.request_refresh(true);
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     }
//! }
//! ```

mod buffer;
mod config;
mod errors;
mod session;
mod transport;

pub use config::Config;
pub use errors::ClientError;
pub use rfbc_pixels::{Status, BYTES_PER_PIXEL};

use rfbc_pixels::SharedView;
use std::sync::Arc;
use transport::{Command, Transport};

/// Handle to a running client connection.
///
/// Dropping the client (or calling [`Client::close`]) stops the transport
/// thread and waits for it to exit.
pub struct Client {
    view: Arc<SharedView>,
    transport: Transport,
}

impl Client {
    /// Validate `config` and start the transport thread.
    ///
    /// Returns immediately; connection progress is observed through
    /// [`Client::status`]. Errors here are configuration or spawn failures,
    /// not network ones.
    pub fn connect(config: Config) -> Result<Self, ClientError> {
        config.validate()?;
        let view = Arc::new(SharedView::new());
        let transport = Transport::spawn(config, view.clone())?;
        Ok(Self { view, transport })
    }

    /// Current connection status. [`Status::Error`] means the hostname did
    /// not resolve and the client has given up.
    pub fn status(&self) -> Status {
        self.view.status()
    }

    /// Framebuffer dimensions from the server, or `(0, 0)` before the first
    /// handshake completes.
    pub fn size(&self) -> (u16, u16) {
        self.view.size()
    }

    /// Copy the most recent complete frame into `dst`, bottom row first.
    /// `stride` is the destination row pitch in bytes.
    ///
    /// Returns `false` and leaves `dst` untouched when no frame is
    /// available or (`width`, `height`) does not match [`Client::size`].
    pub fn copy_frame(&self, dst: &mut [u8], stride: usize, width: u16, height: u16) -> bool {
        self.view.copy_frame(dst, stride, width, height)
    }

    /// Ask the server for the next framebuffer update. Incremental requests
    /// deliver only what changed; non-incremental ones force a full repaint.
    /// The client never requests on its own after the handshake, so call
    /// this periodically. Fire-and-forget; a no-op while disconnected.
    pub fn request_refresh(&self, incremental: bool) {
        self.transport.send(Command::Refresh { incremental });
    }

    /// Send a pointer event (`buttons` is the RFB button mask). Fire-and-
    /// forget; a no-op while disconnected.
    pub fn send_pointer(&self, x: u16, y: u16, buttons: u8) {
        self.transport.send(Command::Pointer { x, y, buttons });
    }

    /// Disconnect and join the transport thread.
    pub fn close(self) {
        // Drop does the work.
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.transport.shutdown();
    }
}
