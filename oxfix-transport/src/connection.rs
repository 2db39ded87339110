/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Wiring between a byte stream and a running session.
//!
//! [`spawn_connection`] drives one connection: a read loop frames inbound
//! bytes and posts them to the session with their receive timestamps, while
//! outbound bytes from the session drain onto the write half. EOF, I/O
//! errors, and framing errors all end the task after notifying the session
//! of the disconnect.

use crate::frame::FrameCodec;
use bytes::BytesMut;
use oxfix_core::types::Timestamp;
use oxfix_session::SessionHandle;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

/// Read buffer capacity.
const READ_BUF_CAPACITY: usize = 16 * 1024;

/// Attaches a stream to a session and drives it until either side closes.
///
/// Registers an outbound channel with the session via
/// [`SessionHandle::connected`], then concurrently:
/// - frames inbound bytes and posts each complete frame with its receive
///   timestamp;
/// - writes session output to the stream.
///
/// The session is notified with [`SessionHandle::disconnected`] when the
/// task ends.
pub fn spawn_connection<S>(stream: S, handle: SessionHandle) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    spawn_connection_with_codec(stream, handle, FrameCodec::new())
}

/// Like [`spawn_connection`], with an explicit framing codec.
pub fn spawn_connection_with_codec<S>(
    stream: S,
    handle: SessionHandle,
    mut codec: FrameCodec,
) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let (mut read_half, mut write_half) = tokio::io::split(stream);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        if handle.connected(out_tx).await.is_err() {
            return;
        }

        let mut read_buf = BytesMut::with_capacity(READ_BUF_CAPACITY);

        'conn: loop {
            tokio::select! {
                maybe_out = out_rx.recv() => match maybe_out {
                    Some(bytes) => {
                        if let Err(err) = write_half.write_all(&bytes).await {
                            warn!(error = %err, "write failed");
                            break 'conn;
                        }
                    }
                    // Session dropped its outbound side: it disconnected us.
                    None => break 'conn,
                },
                read = read_half.read_buf(&mut read_buf) => match read {
                    Ok(0) => {
                        debug!("peer closed connection");
                        break 'conn;
                    }
                    Ok(_) => loop {
                        match codec.decode(&mut read_buf) {
                            Ok(Some(frame)) => {
                                if handle.incoming(frame, Timestamp::now()).await.is_err() {
                                    break 'conn;
                                }
                            }
                            Ok(None) => break,
                            Err(err) => {
                                warn!(error = %err, "framing error");
                                break 'conn;
                            }
                        }
                    },
                    Err(err) => {
                        warn!(error = %err, "read failed");
                        break 'conn;
                    }
                },
            }
        }

        let _ = handle.disconnected().await;
    })
}

/// Dials out and attaches the resulting TCP stream to a session.
pub struct Initiator;

impl Initiator {
    /// Connects to `addr` and spawns the connection task.
    ///
    /// # Errors
    /// Returns the I/O error if the dial fails.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        handle: SessionHandle,
    ) -> std::io::Result<JoinHandle<()>> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(spawn_connection(stream, handle))
    }
}

/// Listens for inbound connections to attach to a session.
pub struct Acceptor {
    listener: TcpListener,
}

impl Acceptor {
    /// Binds the listener.
    ///
    /// # Errors
    /// Returns the I/O error if the bind fails.
    pub async fn bind(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Returns the bound local address.
    ///
    /// # Errors
    /// Returns the I/O error if the address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one connection and attaches it to the session.
    ///
    /// # Errors
    /// Returns the I/O error if the accept fails.
    pub async fn accept(&self, handle: SessionHandle) -> std::io::Result<JoinHandle<()>> {
        let (stream, peer) = self.listener.accept().await?;
        debug!(%peer, "accepted connection");
        stream.set_nodelay(true)?;
        Ok(spawn_connection(stream, handle))
    }
}
