//! WebSocket accept loop and per-connection tasks.
//!
//! Each accepted socket becomes two tasks: a reader loop that forwards
//! inbound text frames to the session manager, and a writer task that
//! drains an unbounded channel of outbound frames into the socket sink.
//! The request path chosen during the HTTP upgrade decides whether the
//! connection is the reader device or a UI client; everything after that
//! is the session manager's call.

use crate::session::{Event, SessionHandle};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Accept connections forever, spawning a task per socket.
///
/// # Errors
/// Returns an error only if `accept` itself fails on the listener.
pub async fn run(
    listener: TcpListener,
    reader_path: String,
    sessions: SessionHandle,
) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        if let Err(err) = stream.set_nodelay(true) {
            warn!(%addr, %err, "failed to set TCP_NODELAY");
        }
        tokio::spawn(handle_connection(
            stream,
            addr,
            reader_path.clone(),
            sessions.clone(),
        ));
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    reader_path: String,
    sessions: SessionHandle,
) {
    // Capture the request path during the upgrade handshake; it is the
    // only routing input. Headers go to the process log for debugging
    // misbehaving clients.
    let mut path = String::new();
    let callback = |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        for (name, value) in req.headers() {
            debug!(%addr, header = %name, value = ?value, "upgrade request header");
        }
        Ok(resp)
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%addr, %err, "WebSocket handshake failed");
            return;
        }
    };

    let conn = Uuid::new_v4();
    let is_reader = path == reader_path;
    debug!(%conn, %addr, path, is_reader, "WebSocket connection established");

    let (mut sink, mut source) = ws.split();

    // Writer task: owned channel to socket sink. Dropping the sender (for
    // a replaced reader this happens inside the session manager) ends the
    // task, which tears the socket down without a close handshake.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(err) = sink.send(Message::Text(frame)).await {
                debug!(%err, "outbound frame send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    if is_reader {
        sessions.send(Event::ReaderConnected { conn, addr, tx });
    } else {
        sessions.send(Event::UiConnected { conn, addr, tx });
    }

    loop {
        match source.next().await {
            Some(Ok(Message::Text(raw))) => {
                let event = if is_reader {
                    Event::ReaderFrame { conn, raw }
                } else {
                    Event::UiFrame { conn, raw }
                };
                sessions.send(event);
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {} // ping/pong/binary frames carry no protocol traffic
            Some(Err(err)) => {
                let event = if is_reader {
                    Event::ReaderError {
                        conn,
                        error: err.to_string(),
                    }
                } else {
                    Event::UiError {
                        conn,
                        error: err.to_string(),
                    }
                };
                sessions.send(event);
                writer.abort();
                return;
            }
        }
    }

    if is_reader {
        sessions.send(Event::ReaderClosed { conn });
    } else {
        sessions.send(Event::UiClosed { conn });
    }
    writer.abort();
    info!(%conn, %addr, "connection closed");
}
