use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use blueprint_core::{ArchitecturePlan, Eviction};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

/// Whether a turn designs from scratch or refines a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Fresh,
    Refining,
}

/// Append-only history of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    requirements: Vec<String>,
    plans: Vec<ArchitecturePlan>,
}

impl ConversationState {
    pub fn requirements(&self) -> &[String] {
        &self.requirements
    }

    pub fn plans(&self) -> &[ArchitecturePlan] {
        &self.plans
    }

    /// The most recent plan, which is the baseline for the next turn.
    pub fn baseline(&self) -> Option<&ArchitecturePlan> {
        self.plans.last()
    }

    pub fn mode(&self) -> Mode {
        if self.plans.is_empty() {
            Mode::Fresh
        } else {
            Mode::Refining
        }
    }

    /// Record a completed turn.
    pub(crate) fn commit(&mut self, requirement: String, plan: ArchitecturePlan) {
        self.requirements.push(requirement);
        self.plans.push(plan);
    }
}

struct Entry {
    state: Arc<AsyncMutex<ConversationState>>,
    last_touched: Instant,
    /// Outstanding checkouts, counted from inside the map lock
    users: Arc<AtomicUsize>,
}

impl Entry {
    fn in_flight(&self) -> bool {
        self.users.load(Ordering::SeqCst) > 0 || self.state.try_lock().is_err()
    }
}

/// A conversation handed out by [`ConversationStore::checkout`]. While it is
/// alive the conversation is pinned and eviction skips it, so every caller
/// holding one for the same id shares the same state.
pub struct Checkout {
    state: Arc<AsyncMutex<ConversationState>>,
    users: Arc<AtomicUsize>,
}

impl Checkout {
    pub fn state(&self) -> &Arc<AsyncMutex<ConversationState>> {
        &self.state
    }

    pub async fn lock(&self) -> AsyncMutexGuard<'_, ConversationState> {
        self.state.lock().await
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        self.users.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keyed store of conversation state with a pluggable retention policy.
///
/// The map lock only guards lookups and is never held across an await. Each
/// conversation has its own async lock so turns on one id run one at a time
/// while different ids proceed in parallel.
pub struct ConversationStore {
    entries: Mutex<HashMap<String, Entry>>,
    eviction: Eviction,
}

impl ConversationStore {
    pub fn new(eviction: Eviction) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            eviction,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the state for `id`, creating it on first reference. The
    /// conversation stays pinned until the returned [`Checkout`] is dropped.
    pub fn checkout(&self, id: &str) -> Checkout {
        self.checkout_at(id, Instant::now())
    }

    pub(crate) fn checkout_at(&self, id: &str, now: Instant) -> Checkout {
        let mut entries = self.lock();
        let checkout = {
            let entry = entries.entry(id.to_string()).or_insert_with(|| {
                tracing::debug!(conversation_id = %id, "new conversation");
                Entry {
                    state: Arc::new(AsyncMutex::new(ConversationState::default())),
                    last_touched: now,
                    users: Arc::new(AtomicUsize::new(0)),
                }
            });
            entry.last_touched = now;
            entry.users.fetch_add(1, Ordering::SeqCst);
            Checkout {
                state: entry.state.clone(),
                users: entry.users.clone(),
            }
        };
        self.evict(&mut entries, id, now);
        checkout
    }

    /// Get the state for `id` without creating it.
    pub fn get(&self, id: &str) -> Option<Arc<AsyncMutex<ConversationState>>> {
        let now = Instant::now();
        let mut entries = self.lock();
        self.evict(&mut entries, id, now);
        entries.get(id).map(|e| e.state.clone())
    }

    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    fn evict(&self, entries: &mut HashMap<String, Entry>, keep: &str, now: Instant) {
        match self.eviction {
            Eviction::Unbounded => {}
            Eviction::IdleSecs(secs) => {
                let limit = Duration::from_secs(secs);
                let before = entries.len();
                entries.retain(|id, e| {
                    id == keep
                        || e.in_flight()
                        || now.saturating_duration_since(e.last_touched) <= limit
                });
                let dropped = before - entries.len();
                if dropped > 0 {
                    tracing::debug!(dropped, "evicted idle conversations");
                }
            }
            Eviction::MaxConversations(max) => {
                while entries.len() > max {
                    let victim = entries
                        .iter()
                        .filter(|(id, e)| id.as_str() != keep && !e.in_flight())
                        .min_by_key(|(_, e)| e.last_touched)
                        .map(|(id, _)| id.clone());
                    match victim {
                        Some(id) => {
                            tracing::debug!(conversation_id = %id, "evicted least recently used conversation");
                            entries.remove(&id);
                        }
                        None => break,
                    }
                }
            }
        }
    }
}
