use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::render::frame::Frame;

use super::codec::encode_set_pixel_colors;
use super::FrameSink;

/// Frames allowed to wait for the writer before new ones are dropped.
const QUEUE_DEPTH: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to LED controller at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("LED controller session is not open")]
    NotConnected,
    #[error("LED controller connection lost")]
    ConnectionLost,
    #[error("Frame dropped, writer still busy with earlier frames")]
    FrameDropped,
    #[error("Frame of {0} pixels does not fit in one OPC message")]
    FrameTooLarge(usize),
}

impl TransportError {
    /// Whether the session is gone and no later frame can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Connect { .. } | TransportError::NotConnected | TransportError::ConnectionLost
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
    Failed,
}

/// Streaming OPC session over TCP.
///
/// Encoded frames are handed to a writer thread through a bounded queue, so
/// `send_frame` never blocks on the socket and frames stay in send order.
pub struct OpcClient {
    addr: String,
    state: SessionState,
    stream: Option<TcpStream>,
    outbound: Option<SyncSender<Vec<u8>>>,
    writer: Option<JoinHandle<()>>,
    broken: Arc<AtomicBool>,
}

impl OpcClient {
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", host, port);
        let connect_err = |source| TransportError::Connect {
            addr: addr.clone(),
            source,
        };

        log::info!("Connecting to LED controller at {}", addr);
        let mut state = SessionState::Connecting;
        log::debug!("Session state: {:?}", state);

        let mut last_err = None;
        let mut stream = None;
        for candidate in (host, port).to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&candidate, connect_timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = stream.ok_or_else(|| {
            connect_err(last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no addresses")
            }))
        })?;

        stream.set_nodelay(true).map_err(connect_err)?;
        stream
            .set_write_timeout(Some(write_timeout))
            .map_err(connect_err)?;
        let mut sink = stream.try_clone().map_err(connect_err)?;

        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(QUEUE_DEPTH);
        let broken = Arc::new(AtomicBool::new(false));
        let writer_broken = Arc::clone(&broken);
        let writer = std::thread::Builder::new()
            .name("opc-writer".into())
            .spawn(move || {
                for message in rx {
                    if let Err(err) = sink.write_all(&message) {
                        log::error!("Write to LED controller failed: {}", err);
                        writer_broken.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            })
            .map_err(connect_err)?;

        state = SessionState::Open;
        log::info!("Connected to LED controller at {}", addr);

        Ok(Self {
            addr,
            state,
            stream: Some(stream),
            outbound: Some(tx),
            writer: Some(writer),
            broken,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Closes the session. Frames already queued are written first.
    pub fn close(&mut self) {
        if matches!(self.state, SessionState::Closed | SessionState::Failed) {
            return;
        }
        self.teardown();
        self.state = SessionState::Closed;
        log::info!("Closed LED controller session {}", self.addr);
    }

    fn fail(&mut self) {
        self.teardown();
        self.state = SessionState::Failed;
    }

    fn teardown(&mut self) {
        drop(self.outbound.take());
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                log::warn!("OPC writer thread panicked");
            }
        }
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone.
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl FrameSink for OpcClient {
    fn is_open(&self) -> bool {
        self.state == SessionState::Open && !self.broken.load(Ordering::SeqCst)
    }

    fn send_frame(&mut self, channel: u8, frame: &Frame) -> Result<(), TransportError> {
        if self.state != SessionState::Open {
            return Err(TransportError::NotConnected);
        }
        if self.broken.load(Ordering::SeqCst) {
            self.fail();
            return Err(TransportError::ConnectionLost);
        }

        let message = encode_set_pixel_colors(channel, frame)?;
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        match outbound.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::FrameDropped),
            Err(TrySendError::Disconnected(_)) => {
                self.fail();
                Err(TransportError::ConnectionLost)
            }
        }
    }

    fn close(&mut self) {
        OpcClient::close(self);
    }
}

impl Drop for OpcClient {
    fn drop(&mut self) {
        self.close();
    }
}
