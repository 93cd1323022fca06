// owned session registry, replacing the C original's intrusive list
// (rel_list) with a plain map the event loop owns outright

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use log::info;

use crate::io::DatagramSink;
use crate::session::Session;

pub struct SessionRegistry<K> {
    sessions: HashMap<K, Session>,
}

impl<K: Eq + Hash + Clone + std::fmt::Debug> SessionRegistry<K> {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn insert(&mut self, key: K, session: Session) {
        self.sessions.insert(key, session);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut Session> {
        self.sessions.get_mut(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<Session> {
        self.sessions.remove(key)
    }

    // drives every session's timer, then tears down and removes every
    // session whose teardown conditions now hold. make_sink builds the
    // per-session datagram sink on demand since the registry itself holds
    // no transport state.
    pub fn on_tick<F>(&mut self, now: Instant, mut make_sink: F)
    where
        F: FnMut(&K) -> Box<dyn DatagramSink + '_>,
    {
        let mut done = Vec::new();

        for (key, session) in self.sessions.iter_mut() {
            let mut sink = make_sink(key);
            if session.on_tick(now, sink.as_mut()) {
                done.push(key.clone());
            }
        }

        for key in done {
            self.sessions.remove(&key);
            info!("session {:?} torn down", key);
        }
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Debug> Default for SessionRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}
