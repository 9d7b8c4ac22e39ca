//! Cooperative cancellation shared between a worker and its controller.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct CancelState {
    requested: bool,
    locked: bool,
}

/// Cloneable cancellation flag.
///
/// Long-running steps poll [`CancelToken::is_cancelled`] between examples.
/// While a [`CancelLock`] is held, requests are refused so a model install
/// cannot be interrupted halfway.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<Mutex<CancelState>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CancelState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Ask the current job to stop. Returns `false` when the request is
    /// refused because an install is in progress.
    pub fn request_cancel(&self) -> bool {
        let mut state = self.state();
        if state.locked {
            return false;
        }
        state.requested = true;
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state().requested
    }

    /// Refuse cancel requests until the returned guard is dropped. Returns
    /// `None` when a cancel is already pending; the check and the lock
    /// happen under one acquisition of the state.
    pub fn try_lock(&self) -> Option<CancelLock<'_>> {
        let mut state = self.state();
        if state.requested {
            return None;
        }
        state.locked = true;
        Some(CancelLock { token: self })
    }
}

/// Guard returned by [`CancelToken::try_lock`].
#[derive(Debug)]
pub struct CancelLock<'a> {
    token: &'a CancelToken,
}

impl Drop for CancelLock<'_> {
    fn drop(&mut self) {
        self.token.state().locked = false;
    }
}
