use super::{KeySource, RawEvent};
use crate::errors::InputError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Bytes(Vec<u8>),
    Timeout,
}

/// Queue of records handed out one per read. An empty queue times out.
#[derive(Debug, Clone, Default)]
pub struct MockKeySource {
    queue: Arc<Mutex<VecDeque<Scripted>>>,
    reads: Arc<Mutex<usize>>,
}

impl MockKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Scripted>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_event(&self, event: RawEvent) {
        self.push_bytes(event.encode().to_vec());
    }

    pub fn push_key(&self, code: u16) {
        self.push_event(RawEvent::key_press(code));
    }

    pub fn push_bytes(&self, bytes: Vec<u8>) {
        self.queue().push_back(Scripted::Bytes(bytes));
    }

    pub fn push_timeout(&self) {
        self.queue().push_back(Scripted::Timeout);
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeySource for MockKeySource {
    fn read_record(&mut self, timeout: Duration) -> Result<Vec<u8>, InputError> {
        *self.reads.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        match self.queue().pop_front() {
            Some(Scripted::Bytes(bytes)) => Ok(bytes),
            Some(Scripted::Timeout) | None => Err(InputError::Timeout(timeout)),
        }
    }
}
