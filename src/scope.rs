//! Observation substrate: hierarchical scopes with dirty-checked watches.
//!
//! The engine's change detection is a small, synchronous, cooperative
//! substrate. A [`Scope`] is a property bag (`name -> serde_json::Value`)
//! arranged in a tree; watchers observe one key ([`Scope::watch`]) or a
//! group of keys ([`Scope::watch_group`]) and are delivered changes during
//! a [`digest`](Scope::digest) pass that dirty-checks the whole tree from
//! the root until it stabilizes.
//!
//! Two properties of the digest matter to the component layer:
//!
//! - a group watcher fires at most once per pass no matter how many of its
//!   keys changed between passes, so a process recomputes at most once per
//!   pass;
//! - the substrate keeps an explicit per-key count of live watchers, and
//!   [`Scope::observe_watch_counts`] delivers 0↔1 transitions of those
//!   counts synchronously. Demand-driven activation is built on this
//!   reference count.
//!
//! There is no parallelism and no suspension point: every watcher callback
//! runs to completion inside the digest that triggered it. No internal lock
//! is held while user callbacks run, so callbacks may freely register or
//! remove watchers, set properties, and tear scopes down.
//!
//! # Examples
//!
//! ```
//! use floweave::scope::Scope;
//! use serde_json::json;
//!
//! let root = Scope::new();
//! let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let _watch = root.watch("greeting", move |new, _old| {
//!     sink.lock().push(new.clone());
//! });
//!
//! root.set("greeting", json!("hello"));
//! root.digest().unwrap();
//! assert_eq!(seen.lock().as_slice(), [json!("hello")]);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

/// Maximum dirty-checking passes one digest may take before giving up.
///
/// A digest that never stabilizes within this many passes is the symptom
/// of a feedback loop in the watched properties, e.g. a cycle in a
/// network's connection graph. Cycles are a caller error; the substrate
/// surfaces them as [`ScopeError::DigestUnstable`] instead of spinning.
pub const MAX_DIGEST_PASSES: usize = 10;

/// Error type watcher callbacks may raise to abort the digest.
pub type WatchError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by digest passes.
#[derive(Debug, Error, Diagnostic)]
pub enum ScopeError {
    /// The digest still produced changes after the maximum number of passes.
    #[error("digest did not stabilize after {passes} passes")]
    #[diagnostic(
        code(floweave::scope::digest_unstable),
        help("a watcher keeps producing new values every pass; check the wiring for cycles")
    )]
    DigestUnstable { passes: usize },

    /// A watcher callback failed; the digest was aborted.
    #[error("watcher callback failed: {source}")]
    #[diagnostic(code(floweave::scope::callback))]
    Callback {
        #[source]
        source: WatchError,
    },
}

// ============================================================================
// Internals
// ============================================================================

struct WatcherState {
    last: Option<Vec<Value>>,
    callback: Box<dyn FnMut(&[Value], &[Value]) -> Result<(), WatchError> + Send>,
}

#[derive(Clone)]
struct WatcherEntry {
    id: u64,
    keys: Arc<[String]>,
    alive: Arc<AtomicBool>,
    state: Arc<Mutex<WatcherState>>,
}

struct CountHookEntry {
    id: u64,
    keys: FxHashSet<String>,
    alive: Arc<AtomicBool>,
    callback: Arc<Mutex<Box<dyn FnMut(&str, usize) + Send>>>,
}

struct ScopeInner {
    parent: Mutex<Weak<ScopeInner>>,
    children: Mutex<Vec<Arc<ScopeInner>>>,
    props: Mutex<FxHashMap<String, Value>>,
    watchers: Mutex<Vec<WatcherEntry>>,
    counts: Mutex<FxHashMap<String, usize>>,
    count_hooks: Mutex<Vec<CountHookEntry>>,
    teardown_hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    destroyed: AtomicBool,
    next_id: AtomicU64,
    max_passes: usize,
}

impl ScopeInner {
    fn fresh(max_passes: usize) -> Arc<Self> {
        Arc::new(Self {
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            props: Mutex::new(FxHashMap::default()),
            watchers: Mutex::new(Vec::new()),
            counts: Mutex::new(FxHashMap::default()),
            count_hooks: Mutex::new(Vec::new()),
            teardown_hooks: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            max_passes,
        })
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Cancellation handle for a [`Scope::watch`] / [`Scope::watch_group`]
/// subscription. Unsubscribing twice is a no-op.
#[derive(Clone)]
pub struct WatchHandle {
    scope: Weak<ScopeInner>,
    id: u64,
    alive: Arc<AtomicBool>,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("alive", &self.alive.load(Ordering::SeqCst))
            .finish()
    }
}

impl WatchHandle {
    fn dead() -> Self {
        Self {
            scope: Weak::new(),
            id: 0,
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Remove the watcher and release its key counts.
    pub fn unsubscribe(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(inner) = self.scope.upgrade() else {
            return;
        };
        let keys = {
            let mut watchers = inner.watchers.lock();
            match watchers.iter().position(|w| w.id == self.id) {
                Some(idx) => watchers.remove(idx).keys,
                None => return,
            }
        };
        release_counts(&inner, &keys);
    }
}

/// Cancellation handle for [`Scope::observe_watch_counts`].
pub struct ObserverHandle {
    scope: Weak<ScopeInner>,
    id: u64,
    alive: Arc<AtomicBool>,
}

impl ObserverHandle {
    /// Stop observing watcher-count transitions. Idempotent.
    pub fn remove(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.scope.upgrade() {
            inner.count_hooks.lock().retain(|h| h.id != self.id);
        }
    }
}

fn release_counts(inner: &Arc<ScopeInner>, keys: &[String]) {
    let mut dropped = Vec::new();
    {
        let mut counts = inner.counts.lock();
        for key in keys {
            if let Some(count) = counts.get_mut(key) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    counts.remove(key);
                    dropped.push(key.clone());
                }
            }
        }
    }
    for key in dropped {
        fire_count_hooks(inner, &key, 0);
    }
}

fn fire_count_hooks(inner: &Arc<ScopeInner>, key: &str, count: usize) {
    let hooks: Vec<_> = inner
        .count_hooks
        .lock()
        .iter()
        .filter(|h| h.alive.load(Ordering::SeqCst) && h.keys.contains(key))
        .map(|h| h.callback.clone())
        .collect();
    for hook in hooks {
        (hook.lock())(key, count);
    }
}

// ============================================================================
// Scope
// ============================================================================

/// A node in the observation tree.
///
/// `Scope` is a cheap clonable handle; clones refer to the same underlying
/// scope. Child scopes are isolated (they do not inherit properties) but
/// participate in the root's digest.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Create a root scope with the default digest pass limit.
    pub fn new() -> Self {
        Self::with_max_passes(MAX_DIGEST_PASSES)
    }

    /// Create a root scope with an explicit digest pass limit.
    pub fn with_max_passes(max_passes: usize) -> Self {
        Self {
            inner: ScopeInner::fresh(max_passes),
        }
    }

    /// Create an isolated child scope.
    ///
    /// The child starts with no properties of its own and is digested
    /// together with the rest of the tree. Destroying the parent destroys
    /// the child.
    pub fn new_child(&self) -> Scope {
        let child = ScopeInner::fresh(self.inner.max_passes);
        *child.parent.lock() = Arc::downgrade(&self.inner);
        self.inner.children.lock().push(child.clone());
        Scope { inner: child }
    }

    /// Whether this scope has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Read a property; absent properties read as `null`.
    pub fn get(&self, key: &str) -> Value {
        self.inner
            .props
            .lock()
            .get(key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Write a property. No-op on a destroyed scope; the change is picked
    /// up by the next digest.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        if self.is_destroyed() {
            return;
        }
        let key = key.into();
        trace!(key = %key, "scope property set");
        self.inner.props.lock().insert(key, value);
    }

    /// Merge a keyed value map into this scope's properties, last write
    /// wins.
    pub fn extend(&self, values: impl IntoIterator<Item = (String, Value)>) {
        if self.is_destroyed() {
            return;
        }
        let mut props = self.inner.props.lock();
        for (key, value) in values {
            props.insert(key, value);
        }
    }

    /// Number of live watchers currently observing `key` on this scope.
    pub fn watch_count(&self, key: &str) -> usize {
        self.inner.counts.lock().get(key).copied().unwrap_or(0)
    }

    /// Watch a single property.
    ///
    /// The callback receives `(new, old)` and always fires on the first
    /// digest after registration (with `old == new`), then on every digest
    /// pass where the value changed.
    pub fn watch(
        &self,
        key: impl Into<String>,
        mut callback: impl FnMut(&Value, &Value) + Send + 'static,
    ) -> WatchHandle {
        self.register_watcher(
            vec![key.into()],
            Box::new(move |new, old| {
                callback(&new[0], &old[0]);
                Ok(())
            }),
        )
    }

    /// Watch a group of properties as one unit.
    ///
    /// The callback receives the positional `(new, old)` value slices in
    /// key order and fires at most once per digest pass when any member
    /// changed. A returned error aborts the digest and is surfaced as
    /// [`ScopeError::Callback`].
    pub fn watch_group<I>(
        &self,
        keys: I,
        callback: impl FnMut(&[Value], &[Value]) -> Result<(), WatchError> + Send + 'static,
    ) -> WatchHandle
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.register_watcher(keys, Box::new(callback))
    }

    fn register_watcher(
        &self,
        keys: Vec<String>,
        callback: Box<dyn FnMut(&[Value], &[Value]) -> Result<(), WatchError> + Send>,
    ) -> WatchHandle {
        if self.is_destroyed() {
            return WatchHandle::dead();
        }
        let inner = &self.inner;
        let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
        let alive = Arc::new(AtomicBool::new(true));
        let keys: Arc<[String]> = keys.into();
        let entry = WatcherEntry {
            id,
            keys: keys.clone(),
            alive: alive.clone(),
            state: Arc::new(Mutex::new(WatcherState {
                last: None,
                callback,
            })),
        };
        inner.watchers.lock().push(entry);

        // Count transitions are fired after every lock is released so a
        // hook may itself register or remove watchers.
        let mut raised = Vec::new();
        {
            let mut counts = inner.counts.lock();
            for key in keys.iter() {
                let count = counts.entry(key.clone()).or_insert(0);
                *count += 1;
                if *count == 1 {
                    raised.push(key.clone());
                }
            }
        }
        for key in raised {
            fire_count_hooks(inner, &key, 1);
        }

        WatchHandle {
            scope: Arc::downgrade(inner),
            id,
            alive,
        }
    }

    /// Observe 0↔1 transitions of the watcher count for any of `keys`.
    ///
    /// The hook is invoked synchronously, after the transition is applied,
    /// with the key and its new count. It is not invoked for counts moving
    /// between positive values.
    pub fn observe_watch_counts<I>(
        &self,
        keys: I,
        hook: impl FnMut(&str, usize) + Send + 'static,
    ) -> ObserverHandle
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        if self.is_destroyed() {
            return ObserverHandle {
                scope: Weak::new(),
                id: 0,
                alive: Arc::new(AtomicBool::new(false)),
            };
        }
        let inner = &self.inner;
        let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
        let alive = Arc::new(AtomicBool::new(true));
        inner.count_hooks.lock().push(CountHookEntry {
            id,
            keys: keys.into_iter().map(Into::into).collect(),
            alive: alive.clone(),
            callback: Arc::new(Mutex::new(Box::new(hook))),
        });
        ObserverHandle {
            scope: Arc::downgrade(inner),
            id,
            alive,
        }
    }

    /// Register a hook to run when this scope is destroyed.
    ///
    /// Hooks run exactly once, after all child scopes are torn down.
    pub fn on_teardown(&self, hook: impl FnOnce() + Send + 'static) {
        if self.is_destroyed() {
            return;
        }
        self.inner.teardown_hooks.lock().push(Box::new(hook));
    }

    /// Tear this scope down: children first, then this scope's teardown
    /// hooks, then every watcher and property. Idempotent.
    pub fn destroy(&self) {
        destroy_inner(&self.inner);
    }

    /// Run dirty-checking passes over the whole scope tree, starting from
    /// the root, until no watcher fires.
    ///
    /// # Errors
    ///
    /// [`ScopeError::DigestUnstable`] when the tree keeps changing after
    /// the pass limit, [`ScopeError::Callback`] when a group watcher
    /// reports a failure.
    pub fn digest(&self) -> Result<(), ScopeError> {
        let root = self.root();
        let max_passes = root.max_passes.max(1);
        for pass in 0..max_passes {
            trace!(pass, "digest pass");
            if !digest_pass(&root)? {
                return Ok(());
            }
        }
        Err(ScopeError::DigestUnstable { passes: max_passes })
    }

    fn root(&self) -> Arc<ScopeInner> {
        let mut current = self.inner.clone();
        loop {
            let parent = current.parent.lock().upgrade();
            match parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }
}

fn destroy_inner(inner: &Arc<ScopeInner>) {
    if inner.destroyed.swap(true, Ordering::SeqCst) {
        return;
    }
    let children = std::mem::take(&mut *inner.children.lock());
    for child in &children {
        destroy_inner(child);
    }
    let hooks = std::mem::take(&mut *inner.teardown_hooks.lock());
    for hook in hooks {
        hook();
    }
    {
        let mut watchers = inner.watchers.lock();
        for watcher in watchers.iter() {
            watcher.alive.store(false, Ordering::SeqCst);
        }
        watchers.clear();
    }
    inner.counts.lock().clear();
    {
        let mut count_hooks = inner.count_hooks.lock();
        for hook in count_hooks.iter() {
            hook.alive.store(false, Ordering::SeqCst);
        }
        count_hooks.clear();
    }
    inner.props.lock().clear();
    if let Some(parent) = inner.parent.lock().upgrade() {
        parent
            .children
            .lock()
            .retain(|c| !Arc::ptr_eq(c, inner));
    }
}

/// One breadth-first pass over the tree; returns whether any watcher fired.
fn digest_pass(root: &Arc<ScopeInner>) -> Result<bool, ScopeError> {
    let mut fired = false;
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(root.clone());
    while let Some(scope) = queue.pop_front() {
        if scope.destroyed.load(Ordering::SeqCst) {
            continue;
        }
        let entries: Vec<WatcherEntry> = scope.watchers.lock().clone();
        for entry in entries {
            if !entry.alive.load(Ordering::SeqCst) {
                continue;
            }
            let current: Vec<Value> = {
                let props = scope.props.lock();
                entry
                    .keys
                    .iter()
                    .map(|k| props.get(k).cloned().unwrap_or(Value::Null))
                    .collect()
            };
            let mut state = entry.state.lock();
            let dirty = match &state.last {
                None => true,
                Some(prev) => *prev != current,
            };
            if dirty {
                let old = state.last.take().unwrap_or_else(|| current.clone());
                state.last = Some(current.clone());
                fired = true;
                (state.callback)(&current, &old)
                    .map_err(|source| ScopeError::Callback { source })?;
            }
        }
        queue.extend(scope.children.lock().iter().cloned());
    }
    Ok(fired)
}
