//! The per-connection protocol session.
//!
//! A [`Session`] is a push-driven state machine. Each state declares how
//! many bytes it needs; the transport reads from the socket into
//! [`Session::spare_mut`] and reports progress with [`Session::commit`],
//! which runs state handlers as soon as their requirement is met. Handlers
//! either consume the accumulated message and move to the next state, or
//! raise the requirement in place once a variable-length message reveals its
//! true size. Requirements never shrink, so a read can be resumed at any
//! byte boundary.
//!
//! Bytes to send back to the server are queued in an outbox that the
//! transport drains; the session itself never touches the socket.

use crate::buffer::ReadBuffer;
use crate::errors::ClientError;
use rfbc_codec::Inflater;
use rfbc_pixels::{FrameBuffer, SharedView, Status};
use rfbc_wire::messages::{RECT_HEADER_LEN, SECURITY_RESULT_LEN, SERVER_INIT_PREFIX_LEN, VERSION_LEN};
use rfbc_wire::{
    client, ProtocolVersion, ServerInit, UpdateRect, WireReader, ENCODING_COPY_RECT,
    ENCODING_DESKTOP_SIZE, ENCODING_RAW, ENCODING_ZLIB, ENCODING_ZRLE, MSG_FRAMEBUFFER_UPDATE,
    SECURITY_TYPE_NONE,
};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the server's 12-byte version line.
    Version,
    /// Waiting for the security type list (3.7+) or security word (3.3).
    SecurityList,
    /// Waiting for the 4-byte SecurityResult (3.8 only).
    SecurityResult,
    /// Waiting for ServerInit.
    ServerInit,
    /// Established; waiting for a server message header.
    Connected,
    /// Inside a FramebufferUpdate; waiting for a rectangle header.
    RectHeader,
    /// Waiting for the payload of this rectangle.
    RectBody(UpdateRect),
}

pub(crate) struct Session {
    state: State,
    buf: ReadBuffer,
    outbox: Vec<u8>,
    version: ProtocolVersion,
    rects_left: u16,
    fb: FrameBuffer,
    inflater: Inflater,
    view: Arc<SharedView>,
    shared: bool,
}

impl Session {
    pub fn new(view: Arc<SharedView>, shared: bool) -> Self {
        let mut buf = ReadBuffer::new();
        buf.reset(VERSION_LEN);
        Self {
            state: State::Version,
            buf,
            outbox: Vec::new(),
            version: ProtocolVersion::V3_8,
            rects_left: 0,
            fb: FrameBuffer::new(0, 0),
            inflater: Inflater::new(),
            view,
            shared,
        }
    }

    /// The region the transport should read socket bytes into. Non-empty
    /// whenever the session is waiting for input.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        self.buf.spare_mut()
    }

    /// Record `n` bytes read into the spare region and run every handler
    /// whose byte requirement is now satisfied.
    pub fn commit(&mut self, n: usize) -> Result<(), ClientError> {
        self.buf.commit(n);
        while self.buf.is_complete() {
            self.dispatch()?;
        }
        Ok(())
    }

    /// Take the queued bytes to write to the server.
    pub fn take_outbox(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbox)
    }

    /// Queue an update request. The client never requests on its own after
    /// the handshake; the consumer calls this periodically to keep updates
    /// flowing. Dropped silently if the handshake has not finished.
    pub fn queue_refresh(&mut self, incremental: bool) {
        if self.is_established() {
            let (w, h) = self.fb.dimensions();
            self.outbox
                .extend_from_slice(&client::framebuffer_update_request(incremental, w, h));
        }
    }

    /// Queue a pointer event. Dropped silently if the handshake has not
    /// finished.
    pub fn queue_pointer(&mut self, x: u16, y: u16, buttons: u8) {
        if self.is_established() {
            self.outbox
                .extend_from_slice(&client::pointer_event(buttons, x, y));
        }
    }

    fn is_established(&self) -> bool {
        matches!(
            self.state,
            State::Connected | State::RectHeader | State::RectBody(_)
        )
    }

    fn dispatch(&mut self) -> Result<(), ClientError> {
        match self.state {
            State::Version => self.on_version(),
            State::SecurityList => self.on_security_list(),
            State::SecurityResult => self.on_security_result(),
            State::ServerInit => self.on_server_init(),
            State::Connected => self.on_message_header(),
            State::RectHeader => self.on_rect_header(),
            State::RectBody(rect) => self.on_rect_body(rect),
        }
    }

    fn on_version(&mut self) -> Result<(), ClientError> {
        let line = self.buf.as_slice();
        let version = ProtocolVersion::negotiate(line).ok_or_else(|| {
            ClientError::UnsupportedVersion(String::from_utf8_lossy(line).trim_end().to_owned())
        })?;
        debug!(?version, "negotiated protocol version");
        self.version = version;
        self.outbox.extend_from_slice(&version.to_wire());
        self.state = State::SecurityList;
        // 3.3 sends a fixed 4-byte security word instead of a list.
        self.buf.reset(if version == ProtocolVersion::V3_3 { 4 } else { 1 });
        Ok(())
    }

    fn on_security_list(&mut self) -> Result<(), ClientError> {
        if self.version == ProtocolVersion::V3_3 {
            let word = {
                let mut r = WireReader::new(self.buf.as_slice());
                r.read_u32()?
            };
            if word != u32::from(SECURITY_TYPE_NONE) {
                return Err(ClientError::NoCompatibleSecurity);
            }
            return self.finish_security();
        }

        let slice = self.buf.as_slice();
        let count = slice[0] as usize;
        if count == 0 {
            // The server follows with a reason string, but there is nothing
            // to negotiate either way.
            return Err(ClientError::NoCompatibleSecurity);
        }
        let total = 1 + count;
        if slice.len() < total {
            self.buf.require(total);
            return Ok(());
        }
        if !slice[1..total].contains(&SECURITY_TYPE_NONE) {
            return Err(ClientError::NoCompatibleSecurity);
        }
        self.outbox.push(SECURITY_TYPE_NONE);
        if self.version == ProtocolVersion::V3_8 {
            self.state = State::SecurityResult;
            self.buf.reset(SECURITY_RESULT_LEN);
            Ok(())
        } else {
            // 3.7 skips SecurityResult for the None type.
            self.finish_security()
        }
    }

    fn on_security_result(&mut self) -> Result<(), ClientError> {
        let word = {
            let mut r = WireReader::new(self.buf.as_slice());
            r.read_u32()?
        };
        if word != 0 {
            return Err(ClientError::AuthenticationFailed);
        }
        self.finish_security()
    }

    /// Security handshake done: send ClientInit and wait for ServerInit.
    fn finish_security(&mut self) -> Result<(), ClientError> {
        self.outbox
            .extend_from_slice(&client::client_init(self.shared));
        self.state = State::ServerInit;
        self.buf.reset(SERVER_INIT_PREFIX_LEN);
        Ok(())
    }

    fn on_server_init(&mut self) -> Result<(), ClientError> {
        let slice = self.buf.as_slice();
        let name_len = ServerInit::name_len(&slice[..SERVER_INIT_PREFIX_LEN])? as usize;
        let total = SERVER_INIT_PREFIX_LEN + name_len;
        if slice.len() < total {
            self.buf.require(total);
            return Ok(());
        }

        let mut r = WireReader::new(slice);
        let init = ServerInit::read_from(&mut r)?;
        if !init.pixel_format.is_supported() {
            return Err(ClientError::UnsupportedPixelFormat(format!(
                "{:?}",
                init.pixel_format
            )));
        }
        let name = String::from_utf8_lossy(&slice[SERVER_INIT_PREFIX_LEN..total]).into_owned();
        info!(
            name = %name,
            width = init.width,
            height = init.height,
            "session established"
        );

        self.fb.resize(init.width, init.height);
        self.view.set_size(init.width, init.height);
        self.view.set_status(Status::Connected);
        self.outbox.extend_from_slice(&client::set_encodings());
        self.outbox.extend_from_slice(&client::framebuffer_update_request(
            false,
            init.width,
            init.height,
        ));
        self.state = State::Connected;
        self.buf.reset(1);
        Ok(())
    }

    fn on_message_header(&mut self) -> Result<(), ClientError> {
        let slice = self.buf.as_slice();
        let id = slice[0];
        if id != MSG_FRAMEBUFFER_UPDATE {
            return Err(ClientError::UnknownMessage(id));
        }
        // Message id, padding, 2-byte rectangle count.
        if slice.len() < 4 {
            self.buf.require(4);
            return Ok(());
        }
        let count = u16::from_be_bytes([slice[2], slice[3]]);
        debug!(rects = count, "framebuffer update");
        if count == 0 {
            // Valid but empty; nothing to apply or publish.
            self.buf.reset(1);
            return Ok(());
        }
        self.rects_left = count;
        self.state = State::RectHeader;
        self.buf.reset(RECT_HEADER_LEN);
        Ok(())
    }

    fn on_rect_header(&mut self) -> Result<(), ClientError> {
        let rect = {
            let mut r = WireReader::new(self.buf.as_slice());
            UpdateRect::read_from(&mut r)?
        };
        match rect.encoding {
            ENCODING_DESKTOP_SIZE => {
                info!(width = rect.width, height = rect.height, "desktop resized");
                self.fb.resize(rect.width, rect.height);
                self.view.set_size(rect.width, rect.height);
                // The update in progress is void against the new geometry:
                // skip its remaining rectangles, publish nothing, and ask
                // for a full repaint.
                self.rects_left = 0;
                self.outbox.extend_from_slice(&client::framebuffer_update_request(
                    false,
                    rect.width,
                    rect.height,
                ));
                self.state = State::Connected;
                self.buf.reset(1);
                Ok(())
            }
            ENCODING_RAW => {
                let total = rect.raw_payload_len();
                if total == 0 {
                    return self.rect_done();
                }
                self.state = State::RectBody(rect);
                self.buf.reset(total);
                Ok(())
            }
            ENCODING_COPY_RECT => {
                self.state = State::RectBody(rect);
                self.buf.reset(4);
                Ok(())
            }
            ENCODING_ZLIB | ENCODING_ZRLE => {
                // 4-byte compressed length first; the body handler grows the
                // requirement once it is known.
                self.state = State::RectBody(rect);
                self.buf.reset(4);
                Ok(())
            }
            other => Err(ClientError::Decode(anyhow::anyhow!(
                "server sent unrequested encoding {}",
                other
            ))),
        }
    }

    fn on_rect_body(&mut self, rect: UpdateRect) -> Result<(), ClientError> {
        let total = match rect.encoding {
            ENCODING_RAW => rect.raw_payload_len(),
            ENCODING_COPY_RECT => 4,
            _ => {
                let slice = self.buf.as_slice();
                4 + u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]) as usize
            }
        };
        if self.buf.filled() < total {
            self.buf.require(total);
            return Ok(());
        }
        rfbc_codec::decode_rect(&mut self.fb, &mut self.inflater, &rect, self.buf.as_slice())?;
        self.rect_done()
    }

    fn rect_done(&mut self) -> Result<(), ClientError> {
        self.rects_left = self.rects_left.saturating_sub(1);
        if self.rects_left == 0 {
            self.finish_update()
        } else {
            self.state = State::RectHeader;
            self.buf.reset(RECT_HEADER_LEN);
            Ok(())
        }
    }

    /// All rectangles applied: publish the frame. Asking for the next
    /// update is the consumer's job via [`Session::queue_refresh`].
    fn finish_update(&mut self) -> Result<(), ClientError> {
        self.view.publish(self.fb.bytes());
        self.state = State::Connected;
        self.buf.reset(1);
        Ok(())
    }
}
