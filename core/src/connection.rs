//! Per-connection I/O.
//!
//! Each accepted socket gets a reader (this task) and a writer task. The
//! reader frames lines, feeds them to the session's [`Dispatcher`] and
//! enforces liveness; the writer drains the session's [`SendQueue`]. Every
//! way a connection can end is funnelled into one `Dispatcher::close` call.

use crate::buffer::{SendQueue, SendQueueReceiver, SENDQ_EXCEEDED};
use crate::codec::LineCodec;
use crate::dispatcher::{Dispatcher, Flow};
use crate::server::ServerState;
use crate::{Error, Message, MessageType, Session, SessionId};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::time::{sleep_until, Instant};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Close reason when the listener is shutting down
pub const SERVER_SHUTDOWN: &str = "Server shutting down";

/// How long a closing session's writer may take to flush
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Drive one client connection until it closes
pub async fn handle_connection<S>(
    state: Arc<ServerState>,
    stream: S,
    peer: SocketAddr,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let id = SessionId::new();
    let closer = shutdown.child_token();
    let (queue, receiver) = SendQueue::new(state.config.connection.sendq_bytes, closer.clone());
    let (read_half, write_half) = tokio::io::split(stream);

    state.stats.record_connection();
    state.router.register(id, queue.clone());
    info!("Accepted connection {} from {}", id, peer);

    let mut writer = tokio::spawn(write_loop(
        id,
        BufWriter::new(write_half),
        receiver,
        closer.clone(),
    ));

    let session = Session::new(id, peer.ip().to_string());
    let mut dispatcher = Dispatcher::new(state.clone(), session);
    let reason = read_loop(&state, &mut dispatcher, read_half, &closer, &queue).await;
    dispatcher.close(&reason);

    // The router entry is gone; dropping the last handle lets the writer finish
    drop(queue);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        debug!("Writer for {} did not drain in time", id);
        writer.abort();
    }

    state.stats.record_disconnection();
    info!("Connection {} from {} finished", id, peer);
}

/// Read and dispatch lines until the session must close.
/// Returns the close reason.
async fn read_loop<R>(
    state: &ServerState,
    dispatcher: &mut Dispatcher,
    read_half: R,
    closer: &CancellationToken,
    queue: &SendQueue,
) -> String
where
    R: AsyncRead + Unpin,
{
    let config = &state.config.connection;
    let mut frames = FramedRead::new(read_half, LineCodec::with_max_len(config.max_line_length));
    let registration_deadline = Instant::now() + config.registration_timeout();
    let mut last_read = Instant::now();
    let mut ping_sent = false;

    loop {
        let deadline = if !dispatcher.session().is_registered() {
            registration_deadline
        } else if ping_sent {
            last_read + config.ping_timeout()
        } else {
            last_read + config.ping_interval()
        };

        tokio::select! {
            _ = closer.cancelled() => {
                let Some(reason) = queue.kill_reason() else {
                    return SERVER_SHUTDOWN.to_string();
                };
                if reason == SENDQ_EXCEEDED {
                    warn!(
                        "Session {} ({}) is a slow consumer: {}/{} bytes queued",
                        dispatcher.session().id(),
                        dispatcher.session().target(),
                        queue.queued_bytes(),
                        queue.max_size()
                    );
                }
                return reason;
            }
            _ = sleep_until(deadline) => {
                if !dispatcher.session().is_registered() {
                    return "Registration timeout".to_string();
                }
                if ping_sent {
                    return "Ping timeout".to_string();
                }

                let ping = Message::new(MessageType::Ping, vec![state.config.server.name.clone()]);
                state.router.send_to(dispatcher.session().id(), &ping);
                ping_sent = true;
            }
            frame = frames.next() => {
                let Some(frame) = frame else {
                    return "Connection closed".to_string();
                };
                last_read = Instant::now();
                ping_sent = false;

                let flow = match frame {
                    Err(e) => return format!("Read error: {}", e),
                    Ok(Ok(message)) => match dispatcher.dispatch(message) {
                        Ok(flow) => flow,
                        Err(e) => return e.to_string(),
                    },
                    Ok(Err(Error::MalformedLine(malformation))) => dispatcher.malformed(&malformation),
                    Ok(Err(e)) => return e.to_string(),
                };
                if let Flow::Quit(reason) = flow {
                    return reason;
                }
            }
        }
    }
}

/// Drain the send queue onto the socket
async fn write_loop<W>(
    id: SessionId,
    mut writer: BufWriter<W>,
    mut receiver: SendQueueReceiver,
    closer: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            biased;
            line = receiver.recv() => line,
            _ = closer.cancelled() => break,
        };
        let Some(line) = line else {
            break;
        };

        if let Err(e) = write_batch(&mut writer, &mut receiver, line).await {
            warn!("Error writing to session {}: {}", id, e);
            receiver.kill("Write error");
            return;
        }
    }

    let _ = writer.shutdown().await;
}

/// Write `first` plus whatever else is already queued, then flush once
async fn write_batch<W>(
    writer: &mut BufWriter<W>,
    receiver: &mut SendQueueReceiver,
    first: Arc<str>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(first.as_bytes()).await?;
    while let Some(line) = receiver.try_recv() {
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await
}
