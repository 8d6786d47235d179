//! The reactive state store: a schema-checked map of fields with per-field reducers
//! and a subscriber list notified once per `update()` batch.
//!
//! Grounded on `btflow/core/state.py`'s `StateManager` for the operation set and on
//! `aura-core`'s `reactive/dynamic.rs` for the Rust idiom — a `parking_lot::RwLock`
//! guarding the data, with subscriber callbacks invoked outside the lock so a
//! subscriber can itself call back into the store without deadlocking.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{BtflowError, Result};
use crate::state::schema::Schema;
use crate::value::Value;

/// Handle returned by `subscribe`, used to `unsubscribe` later. Opaque and cheap to
/// copy; carries no borrow on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    fields: RwLock<HashMap<String, Value>>,
    schema: Schema,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

/// Shared, cloneable handle to a state store.
///
/// Cloning shares the same underlying data (an `Arc` internally) — every clone
/// observes the same fields and the same subscriber list, matching the single
/// `StateManager` instance shared by a tree's nodes in the original.
#[derive(Clone)]
pub struct StateStore(Arc<Inner>);

impl StateStore {
    pub fn new(schema: Schema) -> Self {
        let mut fields = HashMap::with_capacity(schema.fields().len());
        for field in schema.fields() {
            fields.insert(field.name.clone(), field.default.make());
        }
        StateStore(Arc::new(Inner {
            fields: RwLock::new(fields),
            schema,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }))
    }

    pub fn schema(&self) -> &Schema {
        &self.0.schema
    }

    /// Deep-copied snapshot of one field. `None` if the key doesn't exist yet
    /// (e.g. an extra key under `allow_extra` that was never written).
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.fields.read().get(name).cloned()
    }

    /// Deep-copied snapshot of the whole field map.
    pub fn get_all(&self) -> HashMap<String, Value> {
        self.0.fields.read().clone()
    }

    /// Snapshot restricted to fields marked `is_action` in the schema.
    pub fn get_actions(&self) -> HashMap<String, Value> {
        let fields = self.0.fields.read();
        self.0
            .schema
            .action_field_names()
            .filter_map(|name| fields.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }

    /// Applies `updates` atomically: validates every key first, reduces-or-replaces
    /// each field, commits the whole batch, then notifies subscribers once each. No
    /// partial commit on validation failure (spec.md §4.1).
    pub fn update(&self, updates: HashMap<String, Value>) -> Result<()> {
        for key in updates.keys() {
            self.0.schema.check_key(key)?;
        }

        {
            let mut fields = self.0.fields.write();
            for (key, incoming) in updates {
                let reducer = self.0.schema.get(&key).and_then(|f| f.reducer.clone());
                let combined = match reducer {
                    Some(reduce) => {
                        let current = fields.get(&key).cloned().unwrap_or_else(Value::null);
                        reduce(&current, incoming)
                            .map_err(|e| BtflowError::reducer(key.clone(), e.to_string()))?
                    }
                    None => incoming,
                };
                fields.insert(key, combined);
            }
        }

        self.notify_all();
        Ok(())
    }

    /// Replaces the whole record with schema defaults overlaid by `initial` —
    /// validates keys but skips reducers and does not notify subscribers (spec.md
    /// §4.1). Distinct from `update()`, which reduces incoming values against the
    /// current record and always notifies; used to seed the store from a
    /// checkpoint dump, where re-running an append reducer over an
    /// already-complete array would double it up and a notify would wake consumers
    /// before the tree itself is restored.
    pub fn initialize(&self, initial: HashMap<String, Value>) -> Result<()> {
        for key in initial.keys() {
            self.0.schema.check_key(key)?;
        }
        let mut fields = HashMap::with_capacity(self.0.schema.fields().len());
        for field in self.0.schema.fields() {
            fields.insert(field.name.clone(), field.default.make());
        }
        fields.extend(initial);
        *self.0.fields.write() = fields;
        Ok(())
    }

    /// Rebuilds every field (not just action fields) from the schema's defaults —
    /// used by `reset_data` in the runner/facade, not by the per-tick action reset.
    pub fn reset_to_defaults(&self) {
        let mut fields = HashMap::with_capacity(self.0.schema.fields().len());
        for field in self.0.schema.fields() {
            fields.insert(field.name.clone(), field.default.make());
        }
        *self.0.fields.write() = fields;
    }

    /// Resets every action field back to its schema default. Called once at the
    /// start of each tick (spec.md §3.4).
    pub fn reset_actions(&self) {
        let defaults: Vec<(String, Value)> = self
            .0
            .schema
            .fields()
            .iter()
            .filter(|f| f.is_action)
            .map(|f| (f.name.clone(), f.default.make()))
            .collect();
        if defaults.is_empty() {
            return;
        }
        let mut fields = self.0.fields.write();
        for (name, default) in defaults {
            fields.insert(name, default);
        }
    }

    /// Registers a listener invoked once per `update()`/`signal()` call. Returns an
    /// id for `unsubscribe`.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.0.next_id.fetch_add(1, Ordering::Relaxed));
        self.0.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Idempotent: unsubscribing an id twice (or one that was
    /// never registered) is a no-op rather than an error.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.0.listeners.lock().retain(|(listener_id, _)| *listener_id != id);
    }

    /// Notifies subscribers without changing any field — used to wake consumers
    /// after out-of-band mutation (e.g. an async leaf posting a result elsewhere).
    pub fn signal(&self) {
        self.notify_all();
    }

    fn notify_all(&self) {
        let listeners: Vec<Listener> = self
            .0
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                tracing::warn!("state store subscriber panicked; continuing");
            }
        }
    }
}
