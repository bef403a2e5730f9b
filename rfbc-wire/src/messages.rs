//! Fixed protocol structures and client-to-server message builders.
//!
//! Server-to-client structures are parsed out of accumulated slices with
//! [`WireReader`]; client-to-server messages are small and built eagerly
//! into owned buffers for the transport to flush.

use crate::reader::WireReader;
use crate::{
    ENCODING_COMPRESSION_LEVEL_0, ENCODING_COPY_RECT, ENCODING_DESKTOP_SIZE, ENCODING_RAW,
    ENCODING_ZLIB, ENCODING_ZRLE,
};
use bytes::BufMut;

/// Length of the "RFB xxx.yyy\n" version line.
pub const VERSION_LEN: usize = 12;

/// Length of the SecurityResult word.
pub const SECURITY_RESULT_LEN: usize = 4;

/// Length of the fixed ServerInit prefix (size + pixel format + name length).
pub const SERVER_INIT_PREFIX_LEN: usize = 24;

/// Length of a FramebufferUpdate rectangle header.
pub const RECT_HEADER_LEN: usize = 12;

/// A negotiated RFB protocol version.
///
/// The client accepts any server with major version >= 3 and picks the
/// highest of {3.8, 3.7, 3.3} the server can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// RFB 3.3: fixed security word, no SecurityResult for type None.
    V3_3,
    /// RFB 3.7: security list, but no SecurityResult after choosing None.
    V3_7,
    /// RFB 3.8: security list and explicit SecurityResult.
    V3_8,
}

impl ProtocolVersion {
    /// Parse the server's 12-byte version line and pick the version to use.
    ///
    /// Returns `None` for a malformed line or a version older than 3.3.
    pub fn negotiate(line: &[u8]) -> Option<Self> {
        if line.len() != VERSION_LEN {
            return None;
        }
        if &line[0..4] != b"RFB " || line[7] != b'.' || line[11] != b'\n' {
            return None;
        }
        let major: u32 = std::str::from_utf8(&line[4..7]).ok()?.parse().ok()?;
        let minor: u32 = std::str::from_utf8(&line[8..11]).ok()?.parse().ok()?;

        if major > 3 || (major == 3 && minor >= 8) {
            Some(Self::V3_8)
        } else if major == 3 && minor == 7 {
            Some(Self::V3_7)
        } else if major == 3 && minor >= 3 {
            Some(Self::V3_3)
        } else {
            None
        }
    }

    /// The (major, minor) pair of this version.
    pub fn parts(self) -> (u32, u32) {
        match self {
            Self::V3_3 => (3, 3),
            Self::V3_7 => (3, 7),
            Self::V3_8 => (3, 8),
        }
    }

    /// Format the version line to echo back to the server.
    pub fn to_wire(self) -> [u8; VERSION_LEN] {
        let (major, minor) = self.parts();
        let s = format!("RFB {:03}.{:03}\n", major, minor);
        let mut out = [0u8; VERSION_LEN];
        out.copy_from_slice(s.as_bytes());
        out
    }
}

/// The server's pixel format from ServerInit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: u8,
    pub true_color: u8,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl ServerPixelFormat {
    /// Parse the 16-byte pixel format block (including its 3 padding bytes).
    pub fn read_from(r: &mut WireReader<'_>) -> std::io::Result<Self> {
        let pf = Self {
            bits_per_pixel: r.read_u8()?,
            depth: r.read_u8()?,
            big_endian: r.read_u8()?,
            true_color: r.read_u8()?,
            red_max: r.read_u16()?,
            green_max: r.read_u16()?,
            blue_max: r.read_u16()?,
            red_shift: r.read_u8()?,
            green_shift: r.read_u8()?,
            blue_shift: r.read_u8()?,
        };
        r.skip(3)?;
        Ok(pf)
    }

    /// Whether this is the one layout the decoder supports: 32-bit true
    /// color, 8 bits per channel, red shift 16 / green 8 / blue 0 (a packed
    /// BGRA-compatible little-endian layout).
    pub fn is_supported(&self) -> bool {
        self.bits_per_pixel == 32
            && self.depth == 24
            && self.big_endian == 0
            && self.true_color == 1
            && self.red_max == 255
            && self.green_max == 255
            && self.blue_max == 255
            && self.red_shift == 16
            && self.green_shift == 8
            && self.blue_shift == 0
    }
}

/// The fixed part of the ServerInit message.
#[derive(Debug, Clone)]
pub struct ServerInit {
    pub width: u16,
    pub height: u16,
    pub pixel_format: ServerPixelFormat,
}

impl ServerInit {
    /// Read the name length out of the fixed prefix, so the state machine
    /// can grow its byte requirement before parsing the full message.
    pub fn name_len(prefix: &[u8]) -> std::io::Result<u32> {
        let mut r = WireReader::new(prefix);
        r.skip(20)?;
        r.read_u32()
    }

    /// Parse the fixed 24-byte prefix. The caller handles the name bytes.
    pub fn read_from(r: &mut WireReader<'_>) -> std::io::Result<Self> {
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        let pixel_format = ServerPixelFormat::read_from(r)?;
        r.skip(4)?; // name length, already consumed via name_len()
        Ok(Self {
            width,
            height,
            pixel_format,
        })
    }
}

/// A FramebufferUpdate rectangle header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: i32,
}

impl UpdateRect {
    /// Parse the 12-byte rectangle header.
    pub fn read_from(r: &mut WireReader<'_>) -> std::io::Result<Self> {
        Ok(Self {
            x: r.read_u16()?,
            y: r.read_u16()?,
            width: r.read_u16()?,
            height: r.read_u16()?,
            encoding: r.read_i32()?,
        })
    }

    /// Byte size of this rectangle's raw pixel payload (w * h * 4).
    pub fn raw_payload_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Builders for the client-to-server messages this protocol uses.
pub mod client {
    use super::*;

    /// ClientInit: 1-byte shared-session flag.
    pub fn client_init(shared: bool) -> [u8; 1] {
        [u8::from(shared)]
    }

    /// SetEncodings with this client's fixed preference order (most
    /// preferred first): CopyRect, ZRLE, zlib, raw, then the compression
    /// level 1 and desktop-size pseudo-encodings.
    pub fn set_encodings() -> Vec<u8> {
        let encodings = [
            ENCODING_COPY_RECT,
            ENCODING_ZRLE,
            ENCODING_ZLIB,
            ENCODING_RAW,
            ENCODING_COMPRESSION_LEVEL_0 + 1,
            ENCODING_DESKTOP_SIZE,
        ];
        let mut msg = Vec::with_capacity(4 + 4 * encodings.len());
        msg.put_u8(2); // message id
        msg.put_u8(0); // padding
        msg.put_u16(encodings.len() as u16);
        for enc in encodings {
            msg.put_i32(enc);
        }
        msg
    }

    /// FramebufferUpdateRequest for the full `width` x `height` region.
    pub fn framebuffer_update_request(incremental: bool, width: u16, height: u16) -> [u8; 10] {
        let mut msg = [0u8; 10];
        {
            let mut buf = &mut msg[..];
            buf.put_u8(3); // message id
            buf.put_u8(u8::from(incremental));
            buf.put_u16(0); // x
            buf.put_u16(0); // y
            buf.put_u16(width);
            buf.put_u16(height);
        }
        msg
    }

    /// PointerEvent with a button mask and position.
    pub fn pointer_event(buttons: u8, x: u16, y: u16) -> [u8; 6] {
        let mut msg = [0u8; 6];
        {
            let mut buf = &mut msg[..];
            buf.put_u8(5); // message id
            buf.put_u8(buttons);
            buf.put_u16(x);
            buf.put_u16(y);
        }
        msg
    }
}
