//! Session phases and their transitions.

use std::fmt;

/// Phase of a session.
///
/// ```text
///            Received              handled
/// Receive ───────────────▶ Process ─────────▶ Send
///    ▲  ◀─────────────────────┘                │
///    │        Rejected                         │
///    └─────────────────────────────────────────┘
///                      Sent
/// ```
///
/// `ReceiveNotReady` and `SendNotReady` leave the phase unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Waiting for the next request; event data flows from here.
    #[default]
    ReceivePayload,
    /// A request is in the payload container.
    ProcessPayload,
    /// A response is in the payload container.
    SendPayload,
}

/// Something that happened during one pump step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// A request arrived.
    Received,
    /// No request was available.
    ReceiveNotReady,
    /// The request was answered; a response is waiting to be sent.
    Handled,
    /// The request was dropped as a protocol violation.
    Rejected,
    /// The response went out.
    Sent,
    /// The transport did not take the response.
    SendNotReady,
}

impl SessionState {
    /// Phase after `event`.
    ///
    /// Events that do not belong to the current phase leave it unchanged.
    pub fn next(self, event: StepEvent) -> SessionState {
        use SessionState::*;
        use StepEvent::*;

        match (self, event) {
            (ReceivePayload, Received) => ProcessPayload,
            (ReceivePayload, ReceiveNotReady) => ReceivePayload,
            (ProcessPayload, Handled) => SendPayload,
            (ProcessPayload, Rejected) => ReceivePayload,
            (SendPayload, Sent) => ReceivePayload,
            (SendPayload, SendNotReady) => SendPayload,
            (state, _) => state,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::ReceivePayload => "ReceivePayload",
            SessionState::ProcessPayload => "ProcessPayload",
            SessionState::SendPayload => "SendPayload",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
