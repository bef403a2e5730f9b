//! The transport thread: socket ownership, reconnection, and shutdown.
//!
//! All networking runs on one dedicated thread driving a current-thread
//! tokio runtime, so the public API stays synchronous and [`Transport::shutdown`]
//! can join the thread. The loop resolves the host once, then cycles
//! connect → serve → tear down, waiting [`RECONNECT_DELAY`] between
//! attempts, until shutdown is requested. Only resolution failure is
//! terminal; everything after it is retried.

use crate::config::Config;
use crate::errors::ClientError;
use crate::session::Session;
use rfbc_pixels::{SharedView, Status};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::select;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub(crate) enum Command {
    Refresh { incremental: bool },
    Pointer { x: u16, y: u16, buttons: u8 },
}

pub(crate) struct Transport {
    handle: Option<JoinHandle<()>>,
    stop: watch::Sender<bool>,
    commands: flume::Sender<Command>,
}

impl Transport {
    pub fn spawn(config: Config, view: Arc<SharedView>) -> Result<Self, ClientError> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (cmd_tx, cmd_rx) = flume::bounded(64);

        let handle = std::thread::Builder::new()
            .name("rfbc-transport".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        warn!(error = %e, "failed to build transport runtime");
                        view.set_status(Status::Error);
                        return;
                    }
                };
                rt.block_on(run(config, view, stop_rx, cmd_rx));
            })
            .map_err(ClientError::Spawn)?;

        Ok(Self {
            handle: Some(handle),
            stop: stop_tx,
            commands: cmd_tx,
        })
    }

    /// Hand a command to the transport loop. Dropped if the loop has exited
    /// or its queue is full; commands are fire-and-forget.
    pub fn send(&self, command: Command) {
        let _ = self.commands.try_send(command);
    }

    /// Signal the loop to stop and join the thread. Idempotent.
    pub fn shutdown(&mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

async fn run(
    config: Config,
    view: Arc<SharedView>,
    mut stop: watch::Receiver<bool>,
    commands: flume::Receiver<Command>,
) {
    let addr = select! {
        resolved = resolve(&config) => match resolved {
            Ok(addr) => addr,
            Err(e) => {
                warn!(error = %e, "transport stopped");
                view.set_status(Status::Error);
                return;
            }
        },
        _ = stop.changed() => return,
    };

    loop {
        if *stop.borrow() {
            return;
        }

        let connected = select! {
            result = TcpStream::connect(addr) => result,
            _ = stop.changed() => return,
        };
        match connected {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                info!(%addr, "connected");
                let mut session = Session::new(view.clone(), config.shared);
                match serve(&mut session, &stream, &mut stop, &commands).await {
                    Ok(()) => {
                        view.clear_frame();
                        return;
                    }
                    Err(e) => warn!(error = format!("{:#}", e), "connection lost"),
                }
                // Fresh session state (buffer, zlib stream) comes with the
                // next connection; only the published frame survives here
                // and it must not.
                view.set_status(Status::Connecting);
                view.clear_frame();
            }
            Err(e) => debug!(%addr, error = %e, "connect failed"),
        }

        select! {
            _ = sleep(RECONNECT_DELAY) => {}
            _ = stop.changed() => return,
        }
    }
}

async fn resolve(config: &Config) -> Result<SocketAddr, ClientError> {
    lookup_host((config.host.as_str(), config.port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ClientError::Resolution(format!("{}:{}", config.host, config.port)))
}

/// Drive one connection until shutdown (`Ok`) or failure (`Err`).
async fn serve(
    session: &mut Session,
    stream: &TcpStream,
    stop: &mut watch::Receiver<bool>,
    commands: &flume::Receiver<Command>,
) -> Result<(), ClientError> {
    loop {
        let outbox = session.take_outbox();
        if write_all(stream, &outbox, stop).await? {
            return Ok(());
        }

        select! {
            _ = stop.changed() => return Ok(()),

            command = commands.recv_async() => match command {
                Ok(Command::Refresh { incremental }) => session.queue_refresh(incremental),
                Ok(Command::Pointer { x, y, buttons }) => {
                    session.queue_pointer(x, y, buttons);
                }
                // Sender dropped with the client.
                Err(_) => return Ok(()),
            },

            ready = stream.readable() => {
                ready?;
                match stream.try_read(session.spare_mut()) {
                    Ok(0) => {
                        return Err(ClientError::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "server closed the connection",
                        )));
                    }
                    Ok(n) => session.commit(n)?,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
}

/// Flush `buf` to the socket. Returns `Ok(true)` if shutdown was requested
/// mid-write.
async fn write_all(
    stream: &TcpStream,
    mut buf: &[u8],
    stop: &mut watch::Receiver<bool>,
) -> Result<bool, ClientError> {
    while !buf.is_empty() {
        select! {
            _ = stop.changed() => return Ok(true),
            ready = stream.writable() => {
                ready?;
                match stream.try_write(buf) {
                    Ok(n) => buf = &buf[n..],
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    Ok(false)
}
