//! Outbound connection seam
//!
//! The session state machine never talks to sockets directly. It looks up a
//! [`Tunnel`] for each recipient through a `tunnel_finder` closure and pushes
//! messages into it, which keeps the state machine testable and lets the
//! gateway decide how messages reach the client.

use super::UpdateMessage;

/// Trait for sending messages to one connected client
pub trait Tunnel {
    /// Sends an update message to the client
    ///
    /// Delivery is fire-and-forget: a closed connection silently drops the
    /// message.
    fn send_message(&self, message: &UpdateMessage);

    /// Closes the connection
    ///
    /// Called when the session the client belonged to is gone.
    fn close(self);
}
