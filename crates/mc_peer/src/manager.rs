//! Connection manager.
//!
//! Single-threaded and event-driven. Commands come from the rendering
//! layer (`host`, `connect_to`, `send_text`, `send_file`, `leave`);
//! transport signals come in through the `on_*` handlers; time comes in
//! through `on_tick`. All state lives in this struct.
//!
//! Inbound dispatch rules, in order:
//! - anything user-visible that arrives outside an encrypted wrapper is
//!   flagged with a loud warning first
//! - `encrypted` is unwrapped exactly once and re-dispatched
//! - `keyExchange` feeds the session key material
//! - a remote `system` envelope is blocked, never displayed as a notice
//! - text and media are displayed, then relayed to the rest of the room
//!   with the sender re-attributed to the connection they arrived on

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mc_proto::{self as proto, Envelope, Inbound, KeyExchangeData, MediaAttachment, MediaKind};

use crate::config::PeerConfig;
use crate::connection::{PeerConnection, Role};
use crate::error::PeerError;
use crate::events::{DisplayMessage, MessageKind, Severity, UiEvents};
use crate::session::SessionKeyMaterial;
use crate::transport::{Connection, Transport};

const SYSTEM_SENDER: &str = "system";
const SYSTEM_NAME: &str = "System";

pub struct ConnectionManager<T: Transport, U: UiEvents> {
    config: PeerConfig,
    transport: T,
    ui: U,
    connections: HashMap<String, PeerConnection<T::Conn>>,
    /// Peer ids shown in the user list, with their host flag.
    users: HashMap<String, bool>,
    session: SessionKeyMaterial,
    /// The id this session is gathered around: our own when hosting, the
    /// host's once an outbound dial opens.
    room_id: Option<String>,
}

impl<T: Transport, U: UiEvents> ConnectionManager<T, U> {
    pub fn new(config: PeerConfig, transport: T, ui: U) -> Self {
        Self {
            config,
            transport,
            ui,
            connections: HashMap::new(),
            users: HashMap::new(),
            session: SessionKeyMaterial::new(),
            room_id: None,
        }
    }

    pub fn local_id(&self) -> &str {
        self.transport.local_id()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// Number of live (non-closed) connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn has_session_key(&self) -> bool {
        self.session.has_secret()
    }

    // ── Commands from the rendering layer ─────────────────────────────────────

    /// Become the room host. No connection is opened; joiners dial the
    /// shared id.
    pub fn host(&mut self) {
        let id = self.transport.local_id().to_string();
        info!("hosting chat with id {id}");
        self.room_id = Some(id.clone());
        self.ui.on_notify(
            &format!("Hosting chat! Share this ID: {id}"),
            Duration::from_secs(8),
            Severity::Success,
        );
    }

    /// Dial a remote peer.
    pub fn connect_to(&mut self, remote_id: &str, now: Instant) {
        if remote_id.is_empty() {
            self.ui.on_notify(
                "Please enter a valid Peer ID to connect.",
                Duration::from_secs(3),
                Severity::Warning,
            );
            return;
        }

        info!("connecting to {remote_id}");
        self.ui.on_notify(
            &format!("Connecting to {}...", short(remote_id, 8)),
            Duration::from_secs(3),
            Severity::Info,
        );

        match self.transport.open(remote_id) {
            Ok(conn) => {
                let peer_id = conn.peer_id().to_string();
                self.connections
                    .insert(peer_id, PeerConnection::new(conn, Role::Initiator, now));
            }
            Err(e) => {
                error!("connect to {remote_id} failed: {e}");
                self.connect_failed(&format!("Failed to connect: {e}"));
            }
        }
    }

    /// Send a text message to the room. The rendering layer echoes text
    /// locally itself.
    pub fn send_text(&mut self, content: &str) {
        if !self.session.has_secret() {
            self.ui.on_notify(
                "Shared secret key not established yet. Your messages will not be encrypted. \
                 Please wait for key exchange to complete",
                Duration::from_secs(3),
                Severity::Warning,
            );
            return;
        }
        if self.connections.is_empty() {
            return;
        }
        self.broadcast(&Envelope::text(content), None);
        debug!("sent text message ({} bytes)", content.len());
    }

    /// Convert a file to its inline form, echo it locally, and send it.
    pub fn send_file(&mut self, filename: &str, mime_type: &str, bytes: &[u8]) {
        if self.connections.is_empty() {
            self.ui.on_notify(
                "No connections available",
                Duration::from_secs(3),
                Severity::Warning,
            );
            return;
        }
        if !self.session.has_secret() {
            self.ui.on_notify(
                "Shared secret key not established yet. Your messages will not be encrypted. \
                 Please wait for key exchange to complete",
                Duration::from_secs(3),
                Severity::Warning,
            );
            return;
        }

        self.ui.on_notify(
            &format!("Uploading {filename}..."),
            Duration::from_secs(2),
            Severity::Info,
        );

        let attachment = match MediaAttachment::from_bytes(
            filename,
            mime_type,
            bytes,
            self.config.max_media_bytes,
        ) {
            Ok(a) => a,
            Err(e) => {
                error!("media conversion for {filename} failed: {e}");
                self.ui.on_notify(
                    &format!("Failed to send {filename}: {e}"),
                    Duration::from_secs(5),
                    Severity::Error,
                );
                return;
            }
        };
        let kind = attachment.kind();

        // Local echo, captioned exactly as the other side will see it.
        let my_id = self.transport.local_id().to_string();
        self.ui.on_message(DisplayMessage {
            id: Uuid::new_v4().to_string(),
            content: format!("🔒 {}", media_caption(kind, filename)),
            sender_id: my_id,
            sender_name: "You".to_string(),
            timestamp: proto::now_millis(),
            kind: display_kind(kind),
            media: Some(attachment.clone()),
        });

        self.broadcast(&Envelope::media(kind, attachment), None);
        info!("sent {filename} ({} bytes)", bytes.len());
        self.ui.on_notify(
            &format!("{filename} sent successfully!"),
            Duration::from_secs(2),
            Severity::Success,
        );
    }

    /// Close every connection and reset to the idle state.
    pub fn leave(&mut self) {
        for (_, mut entry) in self.connections.drain() {
            entry.mark_closed();
        }
        self.clear_users();
        self.session.clear();
        self.room_id = None;
        self.ui.on_connection_status(false);
        self.push_system("You left the chat", SYSTEM_SENDER);
        info!("left the chat");
    }

    // ── Transport signals ─────────────────────────────────────────────────────

    /// The transport delivered an inbound connection (not open yet).
    pub fn on_incoming(&mut self, conn: T::Conn, now: Instant) {
        let peer_id = conn.peer_id().to_string();
        debug!("incoming connection from {peer_id}");
        self.connections
            .insert(peer_id, PeerConnection::new(conn, Role::Acceptor, now));
    }

    /// The transport reports a connection open; both sides start a key
    /// exchange at this point.
    pub fn on_open(&mut self, peer_id: &str) {
        let Some(entry) = self.connections.get_mut(peer_id) else {
            warn!("open signal for unknown connection {peer_id}");
            return;
        };
        entry.mark_open();
        let role = entry.role;

        match role {
            Role::Initiator => {
                info!("connected to {peer_id}");
                self.room_id = Some(peer_id.to_string());
                self.ui.on_connection_status(true);
                self.push_system(&format!("Connected to {}!", short(peer_id, 8)), SYSTEM_SENDER);
                self.add_user(peer_id, true);
                let my_id = self.transport.local_id().to_string();
                self.add_user(&my_id, false);
                self.initiate_key_exchange();
            }
            Role::Acceptor => {
                info!("{peer_id} joined");
                // The join notice is attributed to the joining peer.
                self.push_system(&format!("[{}] has joined.", short(peer_id, 6)), peer_id);
                self.add_user(peer_id, false);
                self.ui.on_connection_status(true);
                self.initiate_key_exchange();
            }
        }
    }

    /// Raw bytes from an open connection. `peer_id` is the transport-verified
    /// origin; nothing inside `bytes` can override it.
    pub fn on_data(&mut self, peer_id: &str, bytes: &[u8]) {
        if !self.connections.contains_key(peer_id) {
            warn!("data from unknown connection {peer_id}");
            return;
        }
        match proto::decode(bytes) {
            Ok(Inbound::Envelope(envelope)) => self.dispatch(peer_id, envelope, false),
            Ok(Inbound::LegacyText(text)) => self.handle_legacy_text(peer_id, &text),
            Err(e) => {
                warn!("dropping undecodable payload from {peer_id}: {e}");
            }
        }
    }

    /// Transport close signal. Also callable directly; calling it twice for
    /// the same peer is harmless.
    pub fn on_closed(&mut self, peer_id: &str) {
        self.handle_disconnect(peer_id);
    }

    /// Remove a closed connection and clean up after it. Idempotent: a
    /// second call for the same peer is a no-op.
    ///
    /// A close for an outbound dial that never opened is not a peer
    /// leaving; it takes the failed-connect path instead.
    pub fn handle_disconnect(&mut self, peer_id: &str) {
        let Some(mut entry) = self.connections.remove(peer_id) else {
            return;
        };
        let was_dialing = entry.is_dialing();
        entry.mark_closed();

        if was_dialing {
            warn!("dial to {peer_id} closed before opening");
            self.dial_failed(peer_id);
            return;
        }

        info!("{peer_id} disconnected");

        self.push_system(
            &format!("[{}] has disconnected.", short(peer_id, 6)),
            SYSTEM_SENDER,
        );
        if self.users.remove(peer_id).is_some() {
            self.ui.on_user_left(peer_id);
        }

        if self.connections.is_empty() {
            self.ui.on_connection_status(false);
            self.session.clear();
            self.push_system("All users have disconnected.", SYSTEM_SENDER);
        }
    }

    /// Transport-level error outside any specific connection.
    pub fn on_transport_error(&mut self, message: &str) {
        error!("transport error: {message}");
        self.ui.on_notify(
            &format!("Transport error: {message}"),
            Duration::from_secs(5),
            Severity::Error,
        );
    }

    /// Time-driven input; fires the connect timeout for stuck dials.
    pub fn on_tick(&mut self, now: Instant) {
        let timed_out: Vec<String> = self
            .connections
            .iter()
            .filter(|(_, c)| c.dial_timed_out(now, self.config.connect_timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for peer_id in timed_out {
            warn!("connect to {peer_id} timed out");
            if let Some(mut entry) = self.connections.remove(&peer_id) {
                entry.mark_closed();
            }
            self.dial_failed(&peer_id);
        }
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    /// Send an envelope to every eligible connection except `exclude`.
    ///
    /// Key-exchange envelopes travel in the clear to every open connection.
    /// Everything else requires the shared secret and goes, wrapped in an
    /// encrypted envelope, to secure connections only. The target list is a
    /// snapshot taken before the first send; connections added while
    /// sending are not picked up.
    pub fn broadcast(&mut self, envelope: &Envelope, exclude: Option<&str>) {
        if envelope.is_key_exchange() {
            let bytes = match proto::encode(envelope) {
                Ok(b) => b,
                Err(e) => {
                    error!("envelope encode failed: {e}");
                    return;
                }
            };
            self.send_to(|c| c.is_open(), exclude, &bytes);
            return;
        }

        if !self.session.has_secret() {
            warn!("no shared key; refusing to send");
            self.ui.on_notify(
                "No shared key available for encryption",
                Duration::from_secs(3),
                Severity::Warning,
            );
            return;
        }

        match self.encrypt_envelope(envelope) {
            Ok(wrapped) => {
                let bytes = match proto::encode(&wrapped) {
                    Ok(b) => b,
                    Err(e) => {
                        error!("envelope encode failed: {e}");
                        return;
                    }
                };
                self.send_to(|c| c.is_secure(), exclude, &bytes);
            }
            Err(e) => {
                // Nothing is ever sent in the clear on a failed encrypt.
                error!("encryption failed, nothing sent: {e}");
            }
        }
    }

    fn encrypt_envelope(&self, envelope: &Envelope) -> Result<Envelope, PeerError> {
        let plaintext = proto::encode(envelope)?;
        let (iv, ciphertext) = self.session.channel().encrypt(&plaintext)?;
        Ok(Envelope::encrypted(iv, ciphertext))
    }

    fn send_to(
        &mut self,
        eligible: impl Fn(&PeerConnection<T::Conn>) -> bool,
        exclude: Option<&str>,
        bytes: &[u8],
    ) {
        let targets: Vec<String> = self
            .connections
            .iter()
            .filter(|&(id, c)| exclude != Some(id.as_str()) && eligible(c))
            .map(|(id, _)| id.clone())
            .collect();

        for id in targets {
            if let Some(entry) = self.connections.get_mut(&id) {
                if let Err(e) = entry.conn.send(bytes) {
                    warn!("send to {id} failed: {e}");
                }
            }
        }
    }

    // ── Key exchange ──────────────────────────────────────────────────────────

    /// Send our public key to every open connection, generating the keypair
    /// on first use.
    fn initiate_key_exchange(&mut self) {
        self.session.ensure_keypair();
        self.send_public_key();
        self.push_system("🔄 Initiating key exchange...", SYSTEM_SENDER);
    }

    fn send_public_key(&mut self) {
        let Some(public_key) = self.session.public_key() else {
            return;
        };
        let ts = proto::now_millis();
        self.session.record_sent(ts);
        self.broadcast(&Envelope::key_exchange(public_key, ts), None);
    }

    fn handle_key_exchange(&mut self, peer_id: &str, data: KeyExchangeData) {
        self.push_system(
            &format!("Received public key: {}...", data.public_key.short_hex()),
            SYSTEM_SENDER,
        );

        // If the peer moved first we have no keypair yet; make one and let
        // them derive too.
        if self.session.ensure_keypair() {
            self.send_public_key();
        }

        match self.session.derive(&data.public_key, data.timestamp) {
            Ok(fingerprint) => {
                for entry in self.connections.values_mut() {
                    entry.mark_secure();
                }
                info!("session key derived after exchange with {peer_id}");
                self.push_system(
                    &format!("Computed shared secret key: {fingerprint}"),
                    SYSTEM_SENDER,
                );
                self.push_system(
                    "Key exchange complete! To verify integrity, compare the final key with the other party.",
                    SYSTEM_SENDER,
                );
            }
            Err(e) => {
                error!("key derivation with {peer_id} failed: {e}");
                self.push_system(&format!("Key exchange failed: {e}"), SYSTEM_SENDER);
            }
        }
    }

    // ── Inbound dispatch ──────────────────────────────────────────────────────

    fn dispatch(&mut self, peer_id: &str, envelope: Envelope, was_encrypted: bool) {
        if !was_encrypted
            && !matches!(
                envelope,
                Envelope::System { .. } | Envelope::KeyExchange { .. } | Envelope::Encrypted { .. }
            )
        {
            self.push_system(
                "⚠️ WARNING: This message was sent UNENCRYPTED and could be intercepted!",
                SYSTEM_SENDER,
            );
        }

        match envelope {
            Envelope::Encrypted { iv, ciphertext, .. } => {
                self.handle_encrypted(peer_id, &iv, &ciphertext);
            }
            Envelope::KeyExchange { data, .. } => {
                self.handle_key_exchange(peer_id, data);
            }
            Envelope::System { .. } => {
                warn!("blocked system envelope from {peer_id}");
                self.push_system(
                    &format!(
                        "⚠️ Security Warning: Peer {} attempted to send a system message (blocked)",
                        short(peer_id, 6)
                    ),
                    SYSTEM_SENDER,
                );
            }
            Envelope::Text { content, timestamp } => {
                let shown = format!("{}{content}", lock_prefix(was_encrypted));
                self.push_peer_message(peer_id, shown, timestamp, MessageKind::Text, None);
                self.relay(peer_id, Envelope::Text { content, timestamp });
            }
            Envelope::Image { data, timestamp } => {
                self.handle_media(peer_id, MediaKind::Image, data, timestamp, was_encrypted);
            }
            Envelope::Video { data, timestamp } => {
                self.handle_media(peer_id, MediaKind::Video, data, timestamp, was_encrypted);
            }
            Envelope::File { data, timestamp } => {
                self.handle_media(peer_id, MediaKind::File, data, timestamp, was_encrypted);
            }
        }
    }

    /// Unwrap an encrypted envelope and dispatch what it carries. Exactly
    /// one level: the inner payload is never decrypted again.
    fn handle_encrypted(&mut self, peer_id: &str, iv: &[u8], ciphertext: &[u8]) {
        let inner = self
            .session
            .channel()
            .decrypt(iv, ciphertext)
            .map_err(PeerError::from)
            .and_then(|plain| proto::decode_plaintext(&plain).map_err(PeerError::from));

        match inner {
            Ok(envelope) => self.dispatch(peer_id, envelope, true),
            Err(e) => {
                error!("decrypt from {peer_id} failed: {e}");
                self.push_system(
                    "🔒❌ Failed to decrypt message. It may be corrupted or tampered with.",
                    SYSTEM_SENDER,
                );
            }
        }
    }

    fn handle_media(
        &mut self,
        peer_id: &str,
        kind: MediaKind,
        data: MediaAttachment,
        timestamp: i64,
        was_encrypted: bool,
    ) {
        let caption = format!(
            "{}{}",
            lock_prefix(was_encrypted),
            media_caption(kind, &data.filename)
        );
        self.push_peer_message(peer_id, caption, timestamp, display_kind(kind), Some(data.clone()));
        self.relay(peer_id, Envelope::media_at(kind, data, timestamp));
    }

    /// Bare unstructured text from a pre-envelope client: display it as-is,
    /// then relay it to the rest of the room re-encoded in the structured,
    /// encrypted form.
    fn handle_legacy_text(&mut self, peer_id: &str, text: &str) {
        debug!("legacy message from {}", short(peer_id, 6));
        self.push_peer_message(
            peer_id,
            text.to_string(),
            proto::now_millis(),
            MessageKind::Text,
            None,
        );
        self.relay(peer_id, Envelope::text(text));
    }

    /// Forward a received envelope to every connection except the one it
    /// came from. The sender the recipients see is this process, never the
    /// origin peer; each hop re-attributes.
    fn relay(&mut self, origin: &str, envelope: Envelope) {
        if self.connections.len() <= 1 {
            return;
        }
        self.broadcast(&envelope, Some(origin));
    }

    // ── UI plumbing ───────────────────────────────────────────────────────────

    /// An outbound dial ended without ever opening (timeout or transport
    /// close): unreachable notice, reset, back to the home view.
    fn dial_failed(&mut self, peer_id: &str) {
        self.connect_failed(&format!(
            "Failed to connect to {} - peer not found or unreachable",
            short(peer_id, 8)
        ));
        if self.connections.is_empty() {
            self.session.clear();
        }
    }

    fn connect_failed(&mut self, notice: &str) {
        self.push_system(notice, SYSTEM_SENDER);
        self.ui.on_connection_status(false);
        self.clear_users();
        self.ui.on_return_home();
    }

    fn add_user(&mut self, peer_id: &str, is_host: bool) {
        self.users.insert(peer_id.to_string(), is_host);
        self.ui.on_user_joined(peer_id, is_host);
    }

    fn clear_users(&mut self) {
        for (peer_id, _) in self.users.drain() {
            self.ui.on_user_left(&peer_id);
        }
    }

    fn push_system(&mut self, content: &str, sender_id: &str) {
        self.ui.on_message(DisplayMessage {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: SYSTEM_NAME.to_string(),
            timestamp: proto::now_millis(),
            kind: MessageKind::System,
            media: None,
        });
    }

    fn push_peer_message(
        &mut self,
        peer_id: &str,
        content: String,
        timestamp: i64,
        kind: MessageKind,
        media: Option<MediaAttachment>,
    ) {
        self.ui.on_message(DisplayMessage {
            id: Uuid::new_v4().to_string(),
            content,
            sender_id: peer_id.to_string(),
            sender_name: short(peer_id, 8),
            timestamp,
            kind,
            media,
        });
    }
}

/// Shorten a peer id for display, safely on char boundaries.
fn short(peer_id: &str, len: usize) -> String {
    peer_id.chars().take(len).collect()
}

fn lock_prefix(was_encrypted: bool) -> &'static str {
    if was_encrypted {
        "🔒 "
    } else {
        "🔓 "
    }
}

fn media_caption(kind: MediaKind, filename: &str) -> String {
    match kind {
        MediaKind::Image => format!("Shared an image: {filename}"),
        MediaKind::Video => format!("Shared a video: {filename}"),
        MediaKind::File => format!("Shared a file: {filename}"),
    }
}

fn display_kind(kind: MediaKind) -> MessageKind {
    match kind {
        MediaKind::Image => MessageKind::Image,
        MediaKind::Video => MessageKind::Video,
        MediaKind::File => MessageKind::File,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_is_char_safe() {
        assert_eq!(short("abcdefghij", 6), "abcdef");
        assert_eq!(short("ab", 6), "ab");
        // Multi-byte ids must not split a char.
        assert_eq!(short("éééééééé", 4), "éééé");
    }

    #[test]
    fn media_captions_name_the_kind() {
        assert_eq!(media_caption(MediaKind::Image, "a.png"), "Shared an image: a.png");
        assert_eq!(media_caption(MediaKind::Video, "b.mp4"), "Shared a video: b.mp4");
        assert_eq!(media_caption(MediaKind::File, "c.zip"), "Shared a file: c.zip");
    }
}
