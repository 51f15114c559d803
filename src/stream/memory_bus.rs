//! In-process [`StreamBus`] that just records events, for tests and for a
//! CLI running with no external subscriber attached.

use parking_lot::Mutex;

use super::{StreamBus, StreamEvent};

#[derive(Default)]
pub struct InMemoryStreamBus {
    events: Mutex<Vec<(String, StreamEvent)>>,
}

impl InMemoryStreamBus {
    pub fn new() -> Self {
        InMemoryStreamBus {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events_for(&self, chat_id: &str) -> Vec<StreamEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(id, _)| id == chat_id)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl StreamBus for InMemoryStreamBus {
    fn emit(&self, chat_id: &str, event: StreamEvent) {
        self.events.lock().push((chat_id.to_string(), event));
    }
}
