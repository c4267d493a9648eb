//! Server lifecycle state machine
//!
//! `uninitialized → initialized → shutting-down → exited`. The dispatch loop
//! consults it before every handler runs.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::infra::lsp::protocol::{RpcError, methods};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Uninitialized = 0,
    Initialized = 1,
    ShuttingDown = 2,
    Exited = 3,
}

impl ServerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            2 => Self::ShuttingDown,
            _ => Self::Exited,
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ServerState::Uninitialized as u8),
        }
    }

    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Gate a request before its handler runs
    pub fn check_request(&self, method: &str) -> Result<(), RpcError> {
        match (self.state(), method) {
            (ServerState::Uninitialized, methods::INITIALIZE) => Ok(()),
            (ServerState::Uninitialized, _) => Err(RpcError::server_not_initialized()),
            (ServerState::Initialized, methods::INITIALIZE) => {
                Err(RpcError::invalid_request("already initialized"))
            }
            (ServerState::Initialized, _) => Ok(()),
            (ServerState::ShuttingDown | ServerState::Exited, _) => {
                Err(RpcError::invalid_request("server is shutting down"))
            }
        }
    }

    /// Notifications other than `exit` are only acted on while initialized
    pub fn accepts_notifications(&self) -> bool {
        self.state() == ServerState::Initialized
    }

    pub fn mark_initialized(&self) -> bool {
        self.transition(ServerState::Uninitialized, ServerState::Initialized)
    }

    pub fn begin_shutdown(&self) -> bool {
        self.transition(ServerState::Initialized, ServerState::ShuttingDown)
    }

    /// Move to `Exited`; true when a shutdown request came first
    pub fn exit(&self) -> bool {
        let previous = self.state.swap(ServerState::Exited as u8, Ordering::AcqRel);
        ServerState::from_u8(previous) == ServerState::ShuttingDown
    }

    fn transition(&self, from: ServerState, to: ServerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
