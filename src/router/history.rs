//! History Adapter
//! Mission: Stand in for the browser's address bar and back/forward stack

use crate::observer::{ListenerRegistry, Subscription};
use parking_lot::Mutex;

pub trait HistoryAdapter: Send + Sync {
    /// Add an entry and make it current. Does not fire path-change listeners.
    fn push(&self, path: &str);

    /// Overwrite the current entry. Does not fire path-change listeners.
    fn replace(&self, path: &str);

    fn current_path(&self) -> String;

    /// Listen for user-originated moves (back/forward).
    fn on_path_change(&self, callback: Box<dyn Fn(&String) + Send + Sync>) -> Subscription;
}

struct Stack {
    entries: Vec<String>,
    index: usize,
}

/// In-memory history with browser semantics: pushing drops forward entries.
pub struct MemoryHistory {
    stack: Mutex<Stack>,
    listeners: ListenerRegistry<String>,
}

impl MemoryHistory {
    pub fn new(initial_path: &str) -> Self {
        Self {
            stack: Mutex::new(Stack {
                entries: vec![initial_path.to_string()],
                index: 0,
            }),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Step back one entry. Returns false at the start of history.
    pub fn back(&self) -> bool {
        self.step(-1)
    }

    /// Step forward one entry. Returns false at the end of history.
    pub fn forward(&self) -> bool {
        self.step(1)
    }

    fn step(&self, delta: isize) -> bool {
        let path = {
            let mut stack = self.stack.lock();
            let target = stack.index as isize + delta;
            if target < 0 || target as usize >= stack.entries.len() {
                return false;
            }
            stack.index = target as usize;
            stack.entries[stack.index].clone()
        };
        self.listeners.notify(&path);
        true
    }

    pub fn len(&self) -> usize {
        self.stack.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<String> {
        self.stack.lock().entries.clone()
    }
}

impl HistoryAdapter for MemoryHistory {
    fn push(&self, path: &str) {
        let mut stack = self.stack.lock();
        let keep = stack.index + 1;
        stack.entries.truncate(keep);
        stack.entries.push(path.to_string());
        stack.index = keep;
    }

    fn replace(&self, path: &str) {
        let mut stack = self.stack.lock();
        let index = stack.index;
        stack.entries[index] = path.to_string();
    }

    fn current_path(&self) -> String {
        let stack = self.stack.lock();
        stack.entries[stack.index].clone()
    }

    fn on_path_change(&self, callback: Box<dyn Fn(&String) + Send + Sync>) -> Subscription {
        self.listeners.add(callback)
    }
}
