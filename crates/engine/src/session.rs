//! Session store — bounded, injectable home for per-session state.
//!
//! Each entry owns the session's [`SessionState`] and, once the first
//! dialogue call happens, its [`DialogueHandle`]. Entries sit behind their
//! own async mutex; a turn holds that lock end to end, so turns for one
//! session are serialized while different sessions proceed in parallel.
//!
//! The map itself is guarded by a short-held synchronous mutex. Capacity is
//! enforced on insert by evicting the least recently used entry; idle entries
//! older than the TTL are treated as absent and removed by [`SessionStore::expire`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mindscope_config::SessionConfig;
use mindscope_core::event::{DomainEvent, EventBus};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::assessment::SessionState;
use crate::dialogue::DialogueHandle;

/// Shared, lockable handle to one session entry.
pub type SessionRef = Arc<tokio::sync::Mutex<SessionEntry>>;

/// Everything the engine keeps for one session.
#[derive(Debug)]
pub struct SessionEntry {
    id: String,
    state: SessionState,
    dialogue: Option<DialogueHandle>,
    created_at: DateTime<Utc>,
}

impl SessionEntry {
    fn new(id: String, assessment_mode: bool) -> Self {
        Self {
            id,
            state: SessionState::new(assessment_mode),
            dialogue: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The session's dialogue handle, started on first use.
    pub fn dialogue(&mut self) -> &mut DialogueHandle {
        let id = &self.id;
        self.dialogue
            .get_or_insert_with(|| DialogueHandle::new(id.clone()))
    }

    pub fn has_dialogue(&self) -> bool {
        self.dialogue.is_some()
    }

    /// Close the dialogue handle, if one was started.
    pub fn teardown(&mut self) {
        if let Some(dialogue) = self.dialogue.take() {
            dialogue.close();
        }
    }
}

struct Slot {
    entry: SessionRef,
    last_used: Instant,
    /// Recency counter; higher is more recent.
    tick: u64,
}

#[derive(Default)]
struct Table {
    slots: HashMap<String, Slot>,
    /// Ids by tick, least recently used first.
    recency: BTreeMap<u64, String>,
    clock: u64,
}

impl Table {
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn put(&mut self, id: &str, entry: SessionRef, now: Instant) {
        let tick = self.next_tick();
        self.recency.insert(tick, id.to_string());
        let old = self.slots.insert(
            id.to_string(),
            Slot {
                entry,
                last_used: now,
                tick,
            },
        );
        if let Some(old) = old {
            self.recency.remove(&old.tick);
        }
    }

    fn bump(&mut self, id: &str, now: Instant) -> Option<SessionRef> {
        let tick = self.next_tick();
        let slot = self.slots.get_mut(id)?;
        self.recency.remove(&slot.tick);
        self.recency.insert(tick, id.to_string());
        slot.tick = tick;
        slot.last_used = now;
        Some(slot.entry.clone())
    }

    fn remove(&mut self, id: &str) -> Option<Slot> {
        let slot = self.slots.remove(id)?;
        self.recency.remove(&slot.tick);
        Some(slot)
    }

    fn oldest(&self) -> Option<&Slot> {
        let (_, id) = self.recency.first_key_value()?;
        self.slots.get(id)
    }

    fn pop_oldest(&mut self) -> Option<(String, Slot)> {
        let (_, id) = self.recency.pop_first()?;
        let slot = self.slots.remove(&id)?;
        Some((id, slot))
    }
}

/// Bounded session table with LRU and TTL eviction.
pub struct SessionStore {
    capacity: usize,
    /// `None` disables idle expiry.
    ttl: Option<Duration>,
    table: Mutex<Table>,
    events: Option<Arc<EventBus>>,
}

impl SessionStore {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            table: Mutex::new(Table::default()),
            events: None,
        }
    }

    /// Build from config; `ttl_secs = 0` disables expiry.
    pub fn from_config(config: &SessionConfig) -> Self {
        let ttl = (config.ttl_secs > 0).then(|| Duration::from_secs(config.ttl_secs));
        Self::new(config.capacity, ttl)
    }

    /// Publish lifecycle events to `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, slot: &Slot, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(slot.last_used) > ttl)
    }

    /// Mark a live slot used and return its entry. An expired slot is
    /// removed and handed back for retirement.
    fn touch(&self, table: &mut Table, id: &str, now: Instant) -> Result<SessionRef, Option<Slot>> {
        let expired = match table.slots.get(id) {
            None => return Err(None),
            Some(slot) => self.is_expired(slot, now),
        };
        if expired {
            return Err(table.remove(id));
        }
        table.bump(id, now).ok_or(None)
    }

    /// Look up a live session and mark it used.
    pub fn get(&self, id: &str) -> Option<SessionRef> {
        let touched = self.touch(&mut self.lock(), id, Instant::now());
        match touched {
            Ok(entry) => Some(entry),
            Err(expired) => {
                if let Some(slot) = expired {
                    self.retire(id, slot, "expired");
                }
                None
            }
        }
    }

    /// Insert a fresh session, replacing any existing entry with this id.
    pub fn create(&self, id: &str, assessment_mode: bool) -> SessionRef {
        let mut retired = Vec::new();
        let entry = {
            let mut table = self.lock();
            if let Some(old) = table.remove(id) {
                retired.push((id.to_string(), old, "replaced"));
            }
            let (entry, evicted) = self.insert(&mut table, id, assessment_mode);
            retired.extend(evicted);
            entry
        };

        self.retire_all(retired);
        self.announce_created(id, assessment_mode);
        entry
    }

    /// Return the live session for `id`, creating it if needed.
    ///
    /// Lookup and insert happen under one lock, so racing first turns for
    /// the same id share a single entry. The flag reports whether the entry
    /// was created by this call.
    pub fn get_or_create(&self, id: &str, assessment_mode: bool) -> (SessionRef, bool) {
        let mut retired = Vec::new();
        let (entry, created) = {
            let mut table = self.lock();
            match self.touch(&mut table, id, Instant::now()) {
                Ok(entry) => (entry, false),
                Err(expired) => {
                    if let Some(slot) = expired {
                        retired.push((id.to_string(), slot, "expired"));
                    }
                    let (entry, evicted) = self.insert(&mut table, id, assessment_mode);
                    retired.extend(evicted);
                    (entry, true)
                }
            }
        };

        self.retire_all(retired);
        if created {
            self.announce_created(id, assessment_mode);
        }
        (entry, created)
    }

    /// Drop a session and close its dialogue handle.
    pub async fn remove(&self, id: &str) -> bool {
        let slot = self.lock().remove(id);
        match slot {
            Some(slot) => {
                slot.entry.lock().await.teardown();
                self.publish_evicted(id, "removed");
                info!(session_id = %id, "Removed session");
                true
            }
            None => false,
        }
    }

    /// Evict every idle-expired session and return their ids.
    ///
    /// Walks from the least recently used entry and stops at the first live one.
    pub fn expire(&self) -> Vec<String> {
        let now = Instant::now();
        let expired: Vec<(String, Slot)> = {
            let mut table = self.lock();
            let mut expired = Vec::new();
            while table
                .oldest()
                .is_some_and(|slot| self.is_expired(slot, now))
            {
                match table.pop_oldest() {
                    Some(pair) => expired.push(pair),
                    None => break,
                }
            }
            expired
        };

        let mut ids = Vec::with_capacity(expired.len());
        for (id, slot) in expired {
            self.retire(&id, slot, "expired");
            ids.push(id);
        }
        if !ids.is_empty() {
            debug!(count = ids.len(), "Expired idle sessions");
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a new slot, evicting least recently used entries to make room.
    fn insert(
        &self,
        table: &mut Table,
        id: &str,
        assessment_mode: bool,
    ) -> (SessionRef, Vec<(String, Slot, &'static str)>) {
        let mut evicted = Vec::new();
        while table.slots.len() >= self.capacity {
            match table.pop_oldest() {
                Some((oid, slot)) => evicted.push((oid, slot, "capacity")),
                None => break,
            }
        }

        let entry = Arc::new(tokio::sync::Mutex::new(SessionEntry::new(
            id.to_string(),
            assessment_mode,
        )));
        table.put(id, entry.clone(), Instant::now());
        (entry, evicted)
    }

    fn retire_all(&self, retired: Vec<(String, Slot, &'static str)>) {
        for (id, slot, reason) in retired {
            self.retire(&id, slot, reason);
        }
    }

    fn retire(&self, id: &str, slot: Slot, reason: &str) {
        match slot.entry.try_lock() {
            Ok(mut entry) => entry.teardown(),
            // The running turn holds the last strong reference; the handle
            // is dropped with it.
            Err(_) => debug!(session_id = %id, "Retired session is mid-turn"),
        }
        info!(session_id = %id, reason, "Evicted session");
        self.publish_evicted(id, reason);
    }

    fn announce_created(&self, id: &str, assessment_mode: bool) {
        info!(session_id = %id, assessment_mode, "Created session");
        if let Some(events) = &self.events {
            events.publish(DomainEvent::SessionCreated {
                session_id: id.to_string(),
                assessment_mode,
                timestamp: Utc::now(),
            });
        }
    }

    fn publish_evicted(&self, id: &str, reason: &str) {
        if let Some(events) = &self.events {
            events.publish(DomainEvent::SessionEvicted {
                session_id: id.to_string(),
                reason: reason.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
