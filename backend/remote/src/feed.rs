use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::debug;

use crate::models::RowChange;

const FEED_CAPACITY: usize = 64;

/// Fan-out of row changes pushed by the backend.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: Sender<RowChange>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);

        Self { sender }
    }

    pub fn publish(&self, change: RowChange) {
        if self.sender.send(change).is_err() {
            debug!("Row change dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> Receiver<RowChange> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
