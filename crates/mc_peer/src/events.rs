//! Rendering boundary: everything the protocol layer tells the UI.

use std::time::Duration;

use serde::Serialize;

use mc_proto::MediaAttachment;

/// Toast severity, mirrored by the rendering layer's notification styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Kind of an entry in the chat log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Text,
    System,
    Image,
    Video,
    File,
}

/// One entry of the chat log, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    /// Random UUID, used by the rendering layer for list keys.
    pub id: String,

    pub content: String,

    /// Transport-verified peer id of the origin connection, the local id
    /// for echoes, or `"system"` for protocol notices. Never taken from a
    /// payload.
    pub sender_id: String,

    /// Short human form of the sender (first 8 chars of the peer id,
    /// `"You"` for echoes, `"System"` for notices).
    pub sender_name: String,

    /// Milliseconds since the epoch, as stamped by the sender.
    pub timestamp: i64,

    pub kind: MessageKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
}

/// Events consumed by the rendering layer.
///
/// The manager calls these synchronously from inside its handlers; an
/// implementation must not call back into the manager re-entrantly.
pub trait UiEvents {
    fn on_user_joined(&mut self, peer_id: &str, is_host: bool);

    fn on_user_left(&mut self, peer_id: &str);

    /// Overall connected/disconnected state of the session.
    fn on_connection_status(&mut self, connected: bool);

    /// Append a message to the chat log.
    fn on_message(&mut self, message: DisplayMessage);

    /// Show a transient toast.
    fn on_notify(&mut self, text: &str, duration: Duration, severity: Severity);

    /// Return the view to the home screen (a failed connect).
    fn on_return_home(&mut self);
}
