//! Records values passed to callbacks so tests can inspect them later.

use std::sync::{Arc, Mutex};

/// Shared log of every value a callback received.
#[derive(Debug)]
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A boxed callback that appends each value it is called with.
    pub fn callback(&self) -> Box<dyn FnMut(&T) + Send> {
        let events = self.events.clone();
        Box::new(move |value: &T| {
            events.lock().unwrap().push(value.clone());
        })
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<T> {
        self.events.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.events.lock().unwrap().last().cloned()
    }
}
