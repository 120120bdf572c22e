// ABOUTME: The one piece of state every task in a session reads: is the link up.
// ABOUTME: An atomic enum rather than a lock, since every reader only ever wants the latest value.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// No transport bound yet, or the transport has failed outright.
    TransportNotReady = 0,
    /// Transport is up, but there is no active CONNECT/CONNACK link.
    Disconnected = 1,
    /// A CONNECT/CONNACK handshake has completed and PUBLISH frames may flow.
    Connected = 2,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            0 => State::TransportNotReady,
            1 => State::Disconnected,
            2 => State::Connected,
            other => unreachable!("invalid session state byte {other}"),
        }
    }
}

pub struct SessionState(AtomicU8);

impl SessionState {
    pub fn new(initial: State) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> State {
        State::from(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: State) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.get() == State::Connected
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(State::TransportNotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_transport_not_ready() {
        assert_eq!(SessionState::default().get(), State::TransportNotReady);
    }

    #[test]
    fn set_then_get_round_trips_every_variant() {
        let state = SessionState::new(State::TransportNotReady);
        for variant in [State::TransportNotReady, State::Disconnected, State::Connected] {
            state.set(variant);
            assert_eq!(state.get(), variant);
        }
    }

    #[test]
    fn is_connected_tracks_the_connected_variant_only() {
        let state = SessionState::new(State::Disconnected);
        assert!(!state.is_connected());
        state.set(State::Connected);
        assert!(state.is_connected());
        state.set(State::TransportNotReady);
        assert!(!state.is_connected());
    }
}
