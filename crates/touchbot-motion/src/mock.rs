//! In-process stand-in for the motion controller.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::LineTransport;

type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

#[derive(Default)]
struct ScriptState {
    sent: Vec<String>,
    unread: VecDeque<String>,
    discarded: usize,
    closed: bool,
}

/// A [`LineTransport`] whose replies come from a closure.
///
/// Every written line is passed to the responder; the lines it returns are
/// queued as device output. A [`ScriptHandle`] observes the traffic after
/// the transport has been handed to a protocol.
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    responder: Responder,
}

/// Shared view onto a [`ScriptedTransport`].
#[derive(Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> (Self, ScriptHandle)
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(ScriptState::default()));
        let transport = Self {
            state: Arc::clone(&state),
            responder: Box::new(responder),
        };
        (transport, ScriptHandle { state })
    }

    /// A well-behaved delta controller: answers the `IsDelta` handshake,
    /// stays silent on mode switches and acknowledges everything else.
    pub fn delta() -> (Self, ScriptHandle) {
        Self::new(|line| match line {
            "IsDelta" => vec!["YesDelta".to_string()],
            "G90" | "G91" => Vec::new(),
            _ => vec!["ok".to_string()],
        })
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        lock(&self.state).closed = true;
    }
}

impl LineTransport for ScriptedTransport {
    fn discard_input(&mut self) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.discarded += state.unread.len();
        state.unread.clear();
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let replies = (self.responder)(line);
        let mut state = lock(&self.state);
        state.sent.push(line.to_string());
        state.unread.extend(replies);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> io::Result<Option<String>> {
        if let Some(line) = lock(&self.state).unread.pop_front() {
            return Ok(Some(line));
        }
        thread::sleep(timeout.min(Duration::from_millis(2)));
        Ok(None)
    }
}

impl ScriptHandle {
    /// Every line written so far, in order.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }

    /// Device output queued but not yet read.
    pub fn unread(&self) -> usize {
        lock(&self.state).unread.len()
    }

    /// Lines dropped by [`LineTransport::discard_input`].
    pub fn discarded(&self) -> usize {
        lock(&self.state).discarded
    }

    /// Queue output the device sends on its own.
    pub fn push_unsolicited(&self, line: impl Into<String>) {
        lock(&self.state).unread.push_back(line.into());
    }

    /// Whether the transport has been dropped.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}
