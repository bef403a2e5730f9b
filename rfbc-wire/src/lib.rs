//! Wire-level codec for the RFB (VNC) client protocol.
//!
//! This crate contains the stateless pieces of the protocol: big-endian
//! primitive readers, parsers for the fixed server-to-client structures
//! (protocol version line, ServerInit, rectangle headers), and builders for
//! the small client-to-server messages. Everything here operates on byte
//! slices that the transport layer has already accumulated; nothing in this
//! crate performs I/O.
//!
//! All multi-byte integers are network byte order (big-endian) per the RFB
//! specification.

pub mod messages;
pub mod reader;

pub use messages::{client, ProtocolVersion, ServerPixelFormat, ServerInit, UpdateRect};
pub use reader::WireReader;

// Standard encodings used by this client.

/// Raw encoding: uncompressed pixel data.
pub const ENCODING_RAW: i32 = 0;

/// CopyRect encoding: copy a rectangle from another framebuffer location.
pub const ENCODING_COPY_RECT: i32 = 1;

/// Zlib encoding: zlib-compressed raw pixels over a persistent stream.
pub const ENCODING_ZLIB: i32 = 6;

/// ZRLE encoding: zlib + run-length encoding in 64x64 tiles.
pub const ENCODING_ZRLE: i32 = 16;

// Pseudo-encodings (negative values indicate special operations).

/// Pseudo-encoding: desktop resolution change notification.
pub const ENCODING_DESKTOP_SIZE: i32 = -223;

/// Pseudo-encoding base for requesting a compression level (0-9).
pub const ENCODING_COMPRESSION_LEVEL_0: i32 = -256;

/// Server-to-client message id for FramebufferUpdate.
pub const MSG_FRAMEBUFFER_UPDATE: u8 = 0;

/// Security type for "no authentication".
pub const SECURITY_TYPE_NONE: u8 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_constants_match_rfb_spec() {
        assert_eq!(ENCODING_RAW, 0);
        assert_eq!(ENCODING_COPY_RECT, 1);
        assert_eq!(ENCODING_ZLIB, 6);
        assert_eq!(ENCODING_ZRLE, 16);
        // 0xFFFFFF21 and 0xFFFFFF00 as signed 32-bit values.
        assert_eq!(ENCODING_DESKTOP_SIZE, 0xFFFF_FF21_u32 as i32);
        assert_eq!(ENCODING_COMPRESSION_LEVEL_0, 0xFFFF_FF00_u32 as i32);
    }
}
