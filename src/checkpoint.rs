//! Session checkpointer — a process-wide, concurrency-safe map from
//! session id to current state. Only one orchestration per id may be
//! in-flight; a second `put`/`start` attempt is rejected. Bounded by an
//! LRU eviction policy so memory does not grow unboundedly (§5 Memory).

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::errors::EngineError;
use crate::state::DiscoveryState;

struct Entry {
    state: DiscoveryState,
    in_flight: bool,
}

pub struct Checkpointer {
    sessions: DashMap<String, Entry>,
    lru: Mutex<VecDeque<String>>,
    cap: usize,
}

impl Checkpointer {
    pub fn new(cap: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            lru: Mutex::new(VecDeque::new()),
            cap,
        }
    }

    /// Registers a new in-flight orchestration for `id`. Fails if one is
    /// already running for the same id.
    pub fn start(&self, id: &str, initial: DiscoveryState) -> Result<(), EngineError> {
        if let Some(entry) = self.sessions.get(id) {
            if entry.in_flight {
                return Err(EngineError::SessionAlreadyRunning(id.to_string()));
            }
        }
        self.sessions.insert(
            id.to_string(),
            Entry {
                state: initial,
                in_flight: true,
            },
        );
        self.touch(id);
        self.evict_if_over_cap();
        Ok(())
    }

    /// Overwrites the current state for an in-flight session (called
    /// after every super-step so the checkpointer always reflects the
    /// last fully-merged state, including after cancellation).
    pub fn put(&self, id: &str, state: DiscoveryState) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.state = state;
        } else {
            self.sessions.insert(
                id.to_string(),
                Entry {
                    state,
                    in_flight: true,
                },
            );
        }
        self.touch(id);
    }

    /// Marks the session's orchestration as finished; the state remains
    /// retrievable until evicted.
    pub fn finish(&self, id: &str, state: DiscoveryState) {
        self.sessions.insert(
            id.to_string(),
            Entry {
                state,
                in_flight: false,
            },
        );
        self.touch(id);
    }

    pub fn get(&self, id: &str) -> Option<DiscoveryState> {
        self.sessions.get(id).map(|e| e.state.clone())
    }

    pub fn clear(&self, id: &str) {
        self.sessions.remove(id);
        self.lru.lock().unwrap().retain(|existing| existing != id);
    }

    fn touch(&self, id: &str) {
        let mut lru = self.lru.lock().unwrap();
        lru.retain(|existing| existing != id);
        lru.push_back(id.to_string());
    }

    fn evict_if_over_cap(&self) {
        let mut lru = self.lru.lock().unwrap();
        while lru.len() > self.cap {
            if let Some(oldest) = lru.pop_front() {
                self.sessions.remove(&oldest);
            }
        }
    }
}
