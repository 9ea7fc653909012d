use crossbeam_channel::{unbounded, Receiver, Sender};

/// FIFO between the socket worker, which pushes parsed messages as they
/// arrive, and the editor thread, which takes whatever has accumulated on
/// each drain tick. Neither side blocks.
pub struct InboundQueue {
    tx: Sender<serde_json::Value>,
    rx: Receiver<serde_json::Value>,
}

impl InboundQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, message: serde_json::Value) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(message);
    }

    /// Everything queued at the time of the call, in arrival order. Messages
    /// pushed while draining wait for the next call.
    pub fn drain(&self) -> Vec<serde_json::Value> {
        let pending = self.rx.len();
        let mut messages = Vec::with_capacity(pending);
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(_) => break,
            }
        }
        messages
    }

    pub fn clear(&self) -> usize {
        self.drain().len()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}
