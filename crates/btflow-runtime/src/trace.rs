//! Async-local span/event tracing.
//!
//! Grounded in `btflow/core/trace.py`: a `TraceContext` carrying a trace id, span
//! stack, and ambient metadata, propagated implicitly through nested calls.
//! Python does this with `contextvars.ContextVar`; Rust has no language-level
//! ambient context, so this uses `tokio::task_local!` (REDESIGN FLAGS: "scope it
//! with RAII-style guards"), which propagates across `.await` points within one
//! task the same way a context var does within one Python task. Call sites that
//! never entered a [`TraceContext::scope`] simply see no ambient trace id or span,
//! the same as the original's `_context.get()` returning `None`.
//!
//! Unlike the original's `_safe_serialize`, the depth-capped sanitizer here has no
//! `<recursion>` marker: event payloads are built from `serde_json::Value`, which
//! is a tree by construction and cannot contain reference cycles, so only the
//! depth cap (guarding against pathologically deep payloads) is meaningful.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::{json, Map, Value as Json};

const MAX_SERIALIZE_DEPTH: usize = 4;

tokio::task_local! {
    static CONTEXT: RefCell<TraceState>;
}

struct TraceState {
    trace_id: String,
    span_stack: Vec<String>,
    metadata: Map<String, Json>,
}

/// Enters a fresh trace scope for the duration of `fut`, generating a trace id if
/// none is supplied. Nested `span` guards push onto the same stack; code that
/// never runs inside a scope sees no ambient context, matching the original.
pub async fn with_trace<F>(trace_id: Option<String>, fut: F) -> F::Output
where
    F: std::future::Future,
{
    let state =
        RefCell::new(TraceState { trace_id: trace_id.unwrap_or_else(new_id), span_stack: Vec::new(), metadata: Map::new() });
    CONTEXT.scope(state, fut).await
}

pub fn current_trace_id() -> Option<String> {
    CONTEXT.try_with(|s| s.borrow().trace_id.clone()).ok()
}

pub fn current_span_id() -> Option<String> {
    CONTEXT.try_with(|s| s.borrow().span_stack.last().cloned()).ok().flatten()
}

/// Merges `key: value` into the ambient context's metadata, inherited by every
/// event emitted for the remainder of the current scope.
pub fn set_metadata(key: impl Into<String>, value: impl Into<Json>) {
    let _ = CONTEXT.try_with(|s| {
        s.borrow_mut().metadata.insert(key.into(), value.into());
    });
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// RAII span: on drop, emits `span_end` with the elapsed duration and a status of
/// `error` if the guard is dropping during a panic, `success` otherwise.
pub struct SpanGuard {
    span_id: String,
    trace_id: String,
    name: String,
    start: Instant,
    pushed: bool,
}

/// Opens a span, recording it on the ambient stack (if one exists) and emitting
/// `span_start`. Drop the returned guard (or let it fall out of scope) to close it.
pub fn span(name: impl Into<String>) -> SpanGuard {
    let name = name.into();
    let span_id = new_id();

    let (trace_id, parent_id, pushed) = CONTEXT
        .try_with(|s| {
            let mut state = s.borrow_mut();
            let parent_id = state.span_stack.last().cloned();
            state.span_stack.push(span_id.clone());
            (state.trace_id.clone(), parent_id, true)
        })
        .unwrap_or((new_id(), None, false));

    emit(
        "span_start",
        json!({
            "span_id": span_id,
            "parent_id": parent_id,
            "trace_id": trace_id,
            "name": name,
        }),
    );

    SpanGuard { span_id, trace_id, name, start: Instant::now(), pushed }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        let status = if std::thread::panicking() { "error" } else { "success" };
        let duration_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        emit(
            "span_end",
            json!({
                "span_id": self.span_id,
                "trace_id": self.trace_id,
                "name": self.name,
                "status": status,
                "duration_ms": duration_ms,
            }),
        );

        if self.pushed {
            let _ = CONTEXT.try_with(|s| {
                s.borrow_mut().span_stack.pop();
            });
        }
    }
}

type Listener = Arc<dyn Fn(&str, &Json) + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);
static LISTENERS: Mutex<Vec<(ListenerId, Listener)>> = Mutex::new(Vec::new());

pub fn subscribe(listener: impl Fn(&str, &Json) + Send + Sync + 'static) -> ListenerId {
    let id = ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed));
    LISTENERS.lock().push((id, Arc::new(listener)));
    id
}

pub fn unsubscribe(id: ListenerId) {
    LISTENERS.lock().retain(|(listener_id, _)| *listener_id != id);
}

/// Emits one trace event: always logs through `tracing::debug!` at trace level
/// (the Rust equivalent of the original's `BTFLOW_TRACE_LOG` gate, replaced by
/// `tracing`'s own level filtering), merges in ambient trace/span/metadata, then
/// notifies every subscribed listener, swallowing panics the way the state
/// store's subscriber bus does.
pub fn emit(event: &str, payload: Json) {
    let mut data = match payload {
        Json::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("payload".to_string(), other);
            map
        }
    };

    if let Ok((trace_id, span_id, metadata)) = CONTEXT.try_with(|s| {
        let state = s.borrow();
        (state.trace_id.clone(), state.span_stack.last().cloned(), state.metadata.clone())
    }) {
        data.entry("trace_id").or_insert(Json::String(trace_id));
        if let Some(span_id) = span_id {
            data.entry("span_id").or_insert(Json::String(span_id));
        }
        for (key, value) in metadata {
            data.entry(key).or_insert(value);
        }
    }

    let sanitized = sanitize(Json::Object(data), 0);
    tracing::debug!(event, payload = %sanitized, "trace event");

    let listeners: Vec<Listener> = LISTENERS.lock().iter().map(|(_, l)| l.clone()).collect();
    for listener in listeners {
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(event, &sanitized))).is_err() {
            tracing::warn!("trace listener panicked; continuing");
        }
    }
}

fn sanitize(value: Json, depth: usize) -> Json {
    if depth >= MAX_SERIALIZE_DEPTH {
        return Json::String(value.to_string());
    }
    match value {
        Json::Object(map) => {
            Json::Object(map.into_iter().map(|(k, v)| (k, sanitize(v, depth + 1))).collect())
        }
        Json::Array(items) => Json::Array(items.into_iter().map(|v| sanitize(v, depth + 1)).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn span_nests_trace_and_span_ids() {
        with_trace(Some("trace-1".to_string()), async {
            assert_eq!(current_trace_id().as_deref(), Some("trace-1"));
            let outer = span("outer");
            let outer_span_id = current_span_id();
            assert!(outer_span_id.is_some());
            {
                let _inner = span("inner");
                assert_ne!(current_span_id(), outer_span_id);
            }
            assert_eq!(current_span_id(), outer_span_id);
            drop(outer);
            assert_eq!(current_span_id(), None);
        })
        .await;
    }

    #[test]
    fn emitting_outside_a_scope_does_not_panic() {
        emit("standalone", json!({"k": "v"}));
    }

    #[tokio::test]
    async fn listeners_receive_events_and_survive_panics() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        subscribe(|_, _| panic!("boom"));
        subscribe(move |_, _| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        emit("tick", json!({}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sanitize_caps_depth() {
        let deep = json!({"a": {"b": {"c": {"d": {"e": 1}}}}});
        let sanitized = sanitize(deep, 0);
        // past MAX_SERIALIZE_DEPTH the subtree collapses to a string
        assert!(sanitized["a"]["b"]["c"]["d"].is_string());
    }
}
