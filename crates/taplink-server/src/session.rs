//! Session manager: the single owner of relay state.
//!
//! All connection tasks funnel their traffic into one event channel. The
//! manager task drains it and mutates the reader state, the log ring, the
//! UI session set, and the pending-command slot without locks; everything
//! it owns is touched from this task only. Connection tasks hold just a
//! sender for outbound text frames, so "terminate the old reader" is
//! dropping its sender and forgetting its id.

use crate::dispatch::{self, PendingCommand};
use crate::log_ring::{LogOrigin, LogRing};
use std::collections::HashMap;
use std::net::SocketAddr;
use taplink_core::{CardUid, Error, ReaderState, ReportOutcome};
use taplink_protocol::{
    CommandResultPayload, KeyMaterial, ReaderBound, ReaderMessage, ServerEvent, UiMessage,
    parse_reader_message, parse_ui_message,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity of a single WebSocket connection.
pub type ConnId = Uuid;

/// Outbound channel of a connection's writer task.
type FrameTx = UnboundedSender<String>;

/// Traffic and lifecycle notifications from connection tasks.
#[derive(Debug)]
pub enum Event {
    ReaderConnected {
        conn: ConnId,
        addr: SocketAddr,
        tx: FrameTx,
    },
    ReaderFrame {
        conn: ConnId,
        raw: String,
    },
    ReaderError {
        conn: ConnId,
        error: String,
    },
    ReaderClosed {
        conn: ConnId,
    },
    UiConnected {
        conn: ConnId,
        addr: SocketAddr,
        tx: FrameTx,
    },
    UiFrame {
        conn: ConnId,
        raw: String,
    },
    UiError {
        conn: ConnId,
        error: String,
    },
    UiClosed {
        conn: ConnId,
    },
}

/// Cloneable handle for submitting events to the manager task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: UnboundedSender<Event>,
}

impl SessionHandle {
    /// Submit an event. A send failure means the manager task is gone and
    /// the process is shutting down; the event is dropped.
    pub fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            debug!("session manager stopped, dropping event");
        }
    }
}

struct ReaderHandle {
    conn: ConnId,
    tx: FrameTx,
}

/// Owns all mutable relay state and processes events sequentially.
pub struct SessionManager {
    rx: UnboundedReceiver<Event>,
    state: ReaderState,
    reader: Option<ReaderHandle>,
    ui_sessions: HashMap<ConnId, FrameTx>,
    log: LogRing,
    keys: KeyMaterial,
    pending: Option<PendingCommand>,
}

impl SessionManager {
    /// Create a manager around the given key material.
    #[must_use]
    pub fn new(keys: KeyMaterial) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut log = LogRing::new();
        log.append(LogOrigin::Server, "Server started, waiting for connections");

        let manager = Self {
            rx,
            state: ReaderState::new(),
            reader: None,
            ui_sessions: HashMap::new(),
            log,
            keys,
            pending: None,
        };
        (manager, SessionHandle { tx })
    }

    /// Drain the event channel until every [`SessionHandle`] is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.handle_event(event);
        }
        debug!("event channel closed, session manager stopping");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::ReaderConnected { conn, addr, tx } => {
                self.on_reader_connected(conn, addr, tx);
            }
            Event::ReaderFrame { conn, raw } => self.on_reader_frame(conn, &raw),
            Event::ReaderError { conn, error } => self.on_reader_error(conn, &error),
            Event::ReaderClosed { conn } => self.on_reader_closed(conn),
            Event::UiConnected { conn, addr, tx } => self.on_ui_connected(conn, addr, tx),
            Event::UiFrame { conn, raw } => self.on_ui_frame(conn, &raw),
            Event::UiError { conn, error } => self.on_ui_error(conn, &error),
            Event::UiClosed { conn } => self.on_ui_closed(conn),
        }
    }

    // Reader lifecycle

    fn on_reader_connected(&mut self, conn: ConnId, addr: SocketAddr, tx: FrameTx) {
        if let Some(old) = self.reader.take() {
            // Invalidate first, then drop the sender; the old writer task
            // tears the socket down without a close handshake. Its late
            // close event no longer matches `self.reader`.
            self.state.detach_reader();
            self.pending = None;
            self.log_broadcast(
                LogOrigin::Server,
                "New reader connection, terminating old one",
            );
            drop(old);
        }

        self.reader = Some(ReaderHandle { conn, tx });
        self.state.attach_reader();
        self.pending = None;
        self.log_broadcast(
            LogOrigin::Server,
            format!("NFC Reader connected via WebSocket from {addr}"),
        );
        self.broadcast_status();
    }

    fn on_reader_frame(&mut self, conn: ConnId, raw: &str) {
        if !self.is_current_reader(conn) {
            debug!(%conn, "dropping frame from replaced reader connection");
            return;
        }

        match parse_reader_message(raw) {
            Ok(ReaderMessage::Status { uid }) => self.on_status_report(uid),
            Ok(ReaderMessage::CommandResult(payload)) => self.on_command_result(payload),
            Ok(ReaderMessage::Log(line)) => {
                self.log_broadcast(LogOrigin::Reader, line);
            }
            Ok(ReaderMessage::Unknown(kind)) => {
                self.log_broadcast(
                    LogOrigin::Server,
                    format!("Received unknown message type from Reader: {kind}"),
                );
            }
            Err(err) => {
                warn!(%err, "dropping unparseable reader frame");
                self.log_broadcast(LogOrigin::Server, "Received invalid JSON from Reader");
            }
        }
    }

    fn on_status_report(&mut self, uid: Option<CardUid>) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        match self.state.apply_report(uid, now_ms) {
            ReportOutcome::CardPresented(uid) => {
                self.log_broadcast(LogOrigin::Server, format!("Card presented: {uid}"));
                self.broadcast_status();
            }
            ReportOutcome::CardRemoved(uid) => {
                self.log_broadcast(LogOrigin::Server, format!("Card removed: {uid}"));
                self.broadcast_status();
            }
            ReportOutcome::Corrected => self.broadcast_status(),
            ReportOutcome::Unchanged => {}
        }
    }

    fn on_command_result(&mut self, payload: CommandResultPayload) {
        let pending = self.pending.take();
        let command = pending
            .map(|p| p.command)
            .unwrap_or_else(|| "command".to_string());

        let verdict = if payload.success { "succeeded" } else { "failed" };
        match &payload.uid {
            Some(uid) => self.log_broadcast(
                LogOrigin::Server,
                format!("Command '{command}' {verdict} for UID: {uid}"),
            ),
            None => {
                self.log_broadcast(LogOrigin::Server, format!("Command '{command}' {verdict}"));
            }
        }
        if let Some(message) = &payload.message {
            self.log_broadcast(LogOrigin::Reader, message.clone());
        }
        if let Some(logs) = payload.logs.clone() {
            for line in logs.into_lines() {
                self.log_broadcast(LogOrigin::Reader, line);
            }
        }

        self.broadcast_event(&ServerEvent::CommandResult {
            uid: payload.uid,
            success: payload.success,
            message: payload.message,
        });
    }

    fn on_reader_error(&mut self, conn: ConnId, error: &str) {
        if !self.is_current_reader(conn) {
            return;
        }
        self.log_broadcast(LogOrigin::Server, format!("Reader connection error: {error}"));
        self.teardown_reader();
    }

    fn on_reader_closed(&mut self, conn: ConnId) {
        if !self.is_current_reader(conn) {
            debug!(%conn, "ignoring close of replaced reader connection");
            return;
        }
        self.teardown_reader();
    }

    fn teardown_reader(&mut self) {
        self.reader = None;
        self.state.detach_reader();
        self.pending = None;
        self.log_broadcast(LogOrigin::Server, "NFC Reader disconnected");
        self.broadcast_status();
    }

    fn is_current_reader(&self, conn: ConnId) -> bool {
        self.reader.as_ref().is_some_and(|r| r.conn == conn)
    }

    // UI lifecycle

    fn on_ui_connected(&mut self, conn: ConnId, addr: SocketAddr, tx: FrameTx) {
        // Initial sync goes out before the session can receive any live
        // broadcast: first the state snapshot, then the log history.
        Self::send_to(&tx, &ServerEvent::StatusUpdate(self.state.clone()));
        Self::send_to(&tx, &ServerEvent::LogHistory(self.log.snapshot()));

        self.ui_sessions.insert(conn, tx);
        self.log_broadcast(
            LogOrigin::Server,
            format!("UI Client connected via WebSocket from {addr}"),
        );
    }

    fn on_ui_frame(&mut self, conn: ConnId, raw: &str) {
        match parse_ui_message(raw) {
            Ok(UiMessage::Command(name)) => self.dispatch_command(conn, &name),
            Ok(UiMessage::Unknown(kind)) => {
                self.log_broadcast(
                    LogOrigin::Server,
                    format!("Received unknown message type from UI: {kind}"),
                );
            }
            Err(err) => {
                warn!(%conn, %err, "dropping unparseable UI frame");
                self.log_broadcast(LogOrigin::Server, "Received invalid JSON from UI");
            }
        }
    }

    fn on_ui_error(&mut self, conn: ConnId, error: &str) {
        warn!(%conn, error, "UI connection error");
        self.on_ui_closed(conn);
    }

    fn on_ui_closed(&mut self, conn: ConnId) {
        if self.ui_sessions.remove(&conn).is_some() {
            self.log_broadcast(LogOrigin::Server, "UI Client disconnected");
        }
    }

    // Command dispatch

    fn dispatch_command(&mut self, issuer: ConnId, name: &str) {
        let payload = match dispatch::validate(
            self.reader.is_some(),
            &self.state,
            self.pending.as_ref(),
            name,
            &self.keys,
        ) {
            Ok(payload) => payload,
            Err(err) => {
                self.reject_command(issuer, &err);
                return;
            }
        };

        let uid = payload.uid.clone();
        let frame = match ReaderBound::Command(payload).to_json() {
            Ok(frame) => frame,
            Err(err) => {
                self.reject_command(issuer, &err);
                return;
            }
        };

        let delivered = self
            .reader
            .as_ref()
            .is_some_and(|reader| reader.tx.send(frame).is_ok());
        if !delivered {
            self.reject_command(
                issuer,
                &Error::SendFailed("reader connection is closing".to_string()),
            );
            return;
        }

        self.pending = Some(PendingCommand {
            command: name.to_string(),
            uid: uid.clone(),
        });
        self.log_broadcast(
            LogOrigin::Server,
            format!("Sent command '{name}' to reader for UID: {uid}"),
        );
        self.broadcast_event(&ServerEvent::CommandSent {
            command: name.to_string(),
        });
    }

    /// Validation and delivery failures go to the issuing session only,
    /// as a log line plus a structured error event. Other UI sessions are
    /// not told about someone else's failed attempt.
    fn reject_command(&mut self, issuer: ConnId, err: &Error) {
        warn!(%issuer, %err, "command rejected");
        let Some(tx) = self.ui_sessions.get(&issuer) else {
            return;
        };
        Self::send_to(tx, &ServerEvent::Log(format!("[Server] Error: {err}")));
        Self::send_to(
            tx,
            &ServerEvent::CommandError {
                message: err.to_string(),
            },
        );
    }

    // Fan-out

    fn log_broadcast(&mut self, origin: LogOrigin, text: impl Into<String>) {
        let line = self.log.append(origin, text);
        self.broadcast_event(&ServerEvent::Log(line));
    }

    fn broadcast_status(&mut self) {
        self.broadcast_event(&ServerEvent::StatusUpdate(self.state.clone()));
    }

    /// Serialize once, deliver to every UI session. Sessions whose channel
    /// is gone are pruned; one dead client never blocks the rest.
    fn broadcast_event(&mut self, event: &ServerEvent) {
        let frame = match event.to_json() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "failed to serialize broadcast event");
                return;
            }
        };

        let mut dead: Vec<ConnId> = Vec::new();
        for (conn, tx) in &self.ui_sessions {
            if tx.send(frame.clone()).is_err() {
                dead.push(*conn);
            }
        }
        for conn in dead {
            warn!(%conn, "UI session channel closed, pruning");
            self.ui_sessions.remove(&conn);
        }
    }

    fn send_to(tx: &FrameTx, event: &ServerEvent) {
        match event.to_json() {
            Ok(frame) => {
                if tx.send(frame).is_err() {
                    debug!("direct send to closed UI session dropped");
                }
            }
            Err(err) => warn!(%err, "failed to serialize direct event"),
        }
    }
}
