//! Tokio transport glue.
//!
//! The session core is synchronous and transport-agnostic; this module binds
//! it to a `TcpStream`. The socket is split in two: a read loop feeds raw
//! bytes into [`Session::process`], and a write task drains buffers the
//! session hands to its [`Controller`], reporting each completion back with
//! [`Session::write_completed`] so the next queued frame can flush.

use crate::session::Session;
use crate::traits::{Controller, SessionFrameListener};
use crate::types::SessionConfig;
use bytes::{Bytes, BytesMut};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

enum Command {
    Write(Bytes),
    Close,
}

/// A [`Controller`] that forwards frames to the connection's write task.
struct ChannelController {
    tx: mpsc::UnboundedSender<Command>,
}

impl Controller for ChannelController {
    fn write(&self, buffer: Bytes) {
        if self.tx.send(Command::Write(buffer)).is_err() {
            tracing::debug!("write after transport shutdown");
        }
    }

    fn close(&self, graceful: bool) {
        tracing::debug!(graceful, "closing transport");
        let _ = self.tx.send(Command::Close);
    }
}

/// The inbound half of an attached connection.
pub struct Connection {
    reader: OwnedReadHalf,
    buffer: BytesMut,
    session: Arc<Session>,
}

impl Connection {
    /// Bind a session to `socket`. Spawns the write task; the caller drives
    /// the read side with [`Connection::run`].
    pub fn attach(
        socket: TcpStream,
        config: SessionConfig,
        frame_listener: Option<Arc<dyn SessionFrameListener>>,
    ) -> (Arc<Session>, Connection) {
        let (reader, writer) = socket.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Arc::new(ChannelController { tx });
        let session = Session::new(config, controller, frame_listener);
        tokio::spawn(write_loop(
            BufWriter::new(writer),
            rx,
            Arc::downgrade(&session),
        ));
        let connection = Connection {
            reader,
            buffer: BytesMut::with_capacity(4 * 1024),
            session: session.clone(),
        };
        (session, connection)
    }

    /// Read the socket until EOF, feeding everything into the session.
    ///
    /// The session's parser keeps partial frames across reads, so whatever a
    /// single read returns can be handed over as-is.
    pub async fn run(mut self) -> std::io::Result<()> {
        loop {
            if 0 == self.reader.read_buf(&mut self.buffer).await? {
                tracing::debug!("peer closed the connection");
                return Ok(());
            }
            let chunk = self.buffer.split();
            self.session.process(&chunk);
        }
    }
}

async fn write_loop(
    mut writer: BufWriter<OwnedWriteHalf>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    session: Weak<Session>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Write(buffer) => {
                let result = async {
                    writer.write_all(&buffer).await?;
                    writer.flush().await
                }
                .await;
                if let Err(error) = result {
                    tracing::warn!(error = %error, "transport write failed");
                    return;
                }
                if let Some(session) = session.upgrade() {
                    session.write_completed();
                }
            }
            Command::Close => {
                let _ = writer.shutdown().await;
                return;
            }
        }
    }
}
