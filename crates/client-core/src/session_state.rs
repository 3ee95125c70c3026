use crate::{
    error::ChatError,
    types::{CloseReason, SessionEvent, SessionState},
};

/// Transport session lifecycle machine.
///
/// `Disconnected → Connecting → Open → {Reconnecting → Connecting, Closed}`.
/// `Closed` is absorbing: an explicit close or an auth rejection is never
/// followed by another connection attempt.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            state: SessionState::Disconnected,
        }
    }
}

impl SessionStateMachine {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Start a connection attempt (initial connect or reconnect retry).
    pub fn begin_connect(&mut self) -> Result<SessionEvent, ChatError> {
        match self.state {
            SessionState::Disconnected | SessionState::Reconnecting => {
                self.state = SessionState::Connecting;
                Ok(SessionEvent::state(SessionState::Connecting))
            }
            current => Err(ChatError::invalid_state(current, "begin_connect")),
        }
    }

    /// The handshake completed and the connection is live.
    pub fn handshake_succeeded(&mut self) -> Result<SessionEvent, ChatError> {
        match self.state {
            SessionState::Connecting => {
                self.state = SessionState::Open;
                Ok(SessionEvent::state(SessionState::Open))
            }
            current => Err(ChatError::invalid_state(current, "handshake_succeeded")),
        }
    }

    /// The connection dropped or a connect attempt failed at transport level.
    ///
    /// Returns `None` when the session is already closed; late network
    /// callbacks after an explicit close are ignored rather than reviving
    /// the session.
    pub fn connection_lost(&mut self) -> Option<SessionEvent> {
        match self.state {
            SessionState::Connecting | SessionState::Open => {
                self.state = SessionState::Reconnecting;
                Some(SessionEvent::state(SessionState::Reconnecting))
            }
            _ => None,
        }
    }

    /// The server rejected the handshake. Terminal; no reconnect follows.
    pub fn auth_rejected(&mut self) -> Option<SessionEvent> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.state = SessionState::Closed;
        Some(SessionEvent::closed(CloseReason::AuthRejected))
    }

    /// Explicit close. Idempotent and always wins, including over a pending
    /// reconnect.
    pub fn close(&mut self) -> Option<SessionEvent> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.state = SessionState::Closed;
        Some(SessionEvent::closed(CloseReason::LocalClose))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_connect_open_drop_reconnect_cycle() {
        let mut sm = SessionStateMachine::default();

        sm.begin_connect().expect("connect from disconnected");
        assert_eq!(sm.state(), SessionState::Connecting);

        sm.handshake_succeeded().expect("open from connecting");
        assert!(sm.is_open());

        let event = sm.connection_lost().expect("drop from open");
        assert_eq!(event, SessionEvent::state(SessionState::Reconnecting));

        sm.begin_connect().expect("retry from reconnecting");
        assert_eq!(sm.state(), SessionState::Connecting);
    }

    #[test]
    fn failed_connect_attempt_enters_reconnecting() {
        let mut sm = SessionStateMachine::default();
        sm.begin_connect().expect("connect");
        let event = sm.connection_lost().expect("drop from connecting");
        assert_eq!(event, SessionEvent::state(SessionState::Reconnecting));
    }

    #[test]
    fn auth_rejection_is_terminal() {
        let mut sm = SessionStateMachine::default();
        sm.begin_connect().expect("connect");

        let event = sm.auth_rejected().expect("should close");
        assert_eq!(event, SessionEvent::closed(CloseReason::AuthRejected));

        let err = sm.begin_connect().expect_err("closed is absorbing");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(sm.connection_lost(), None);
    }

    #[test]
    fn close_is_idempotent_and_wins_over_reconnect() {
        let mut sm = SessionStateMachine::default();
        sm.begin_connect().expect("connect");
        sm.handshake_succeeded().expect("open");
        sm.connection_lost().expect("drop");

        let event = sm.close().expect("close from reconnecting");
        assert_eq!(event, SessionEvent::closed(CloseReason::LocalClose));
        assert_eq!(sm.close(), None);
        assert!(sm.is_closed());
    }

    #[test]
    fn close_works_from_every_state() {
        let mut fresh = SessionStateMachine::default();
        assert!(fresh.close().is_some());

        let mut connecting = SessionStateMachine::default();
        connecting.begin_connect().expect("connect");
        assert!(connecting.close().is_some());
    }
}
