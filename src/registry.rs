//! Context registry and scopes.
//!
//! A UI tree hands form contexts to its descendants by dependency injection: an ancestor
//! [`Scope`] provides a context under a [`ContextKey`], and any descendant scope can inject it.
//! Keys are derived from form ids through a process-wide table, so every lookup for the same id
//! yields the same key and distinct ids never collide.
//!
//! A scope also records the id of the form it hosts.  Inputs that are not told which form they
//! belong to bind to the nearest such form; see [`Scope::current_form_id`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use tracing::debug;

use crate::error::FormError;
use crate::form::FormContext;

/// An opaque binding token, one per form id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey(u64);

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);
static KEYS: LazyLock<Mutex<HashMap<String, ContextKey>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Returns the key bound to `id`, creating it on first use.
///
/// Keys are never evicted; the table grows with the number of distinct form ids seen.
pub fn context_key(id: &str) -> ContextKey {
    let mut keys = KEYS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(key) = keys.get(id) {
        return *key;
    }
    let key = ContextKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed));
    debug!(form = %id, key = key.0, "created context key");
    keys.insert(id.to_string(), key);
    key
}

/////////////////////////////////////////////// Scope ///////////////////////////////////////////////

/// A node in the tree of provider scopes.
///
/// Cloning a scope yields a handle to the same node.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    parent: Option<Scope>,
    provided: Mutex<HashMap<ContextKey, FormContext>>,
    current_form: Mutex<Option<String>>,
}

impl Scope {
    /// Creates a scope with no ancestors.
    pub fn root() -> Self {
        Scope::default()
    }

    /// Creates a descendant of this scope.
    pub fn child(&self) -> Self {
        Scope {
            inner: Arc::new(ScopeInner {
                parent: Some(self.clone()),
                provided: Mutex::new(HashMap::new()),
                current_form: Mutex::new(None),
            }),
        }
    }

    /// Makes `context` available under `key` to this scope and its descendants.
    pub fn provide(&self, key: ContextKey, context: FormContext) {
        self.inner
            .provided
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, context);
    }

    /// Records `id` as the form hosted by this scope.
    pub fn set_current_form(&self, id: impl Into<String>) {
        *self
            .inner
            .current_form
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id.into());
    }

    /// The id of the form hosted by this scope or the nearest ancestor that hosts one.
    pub fn current_form_id(&self) -> Option<String> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            let id = current
                .inner
                .current_form
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if id.is_some() {
                return id;
            }
            scope = current.inner.parent.as_ref();
        }
        None
    }

    /// Finds the context provided under `key` by this scope or the nearest ancestor.
    pub fn inject(&self, key: ContextKey) -> Option<FormContext> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            let provided = current
                .inner
                .provided
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(context) = provided.get(&key) {
                return Some(context.clone());
            }
            drop(provided);
            scope = current.inner.parent.as_ref();
        }
        None
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provided = self
            .inner
            .provided
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&ContextKey> = provided.keys().collect();
        keys.sort();
        f.debug_struct("Scope")
            .field("provided", &keys)
            .field(
                "current_form",
                &*self
                    .inner
                    .current_form
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            )
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

/// Resolves the context provided for form `id` in `scope` or one of its ancestors.
///
/// # Returns
/// * `Ok(FormContext)` - The nearest context bound to `id`
/// * `Err(FormError::ContextNotFound)` - No ancestor provided one
pub fn with_context(scope: &Scope, id: &str) -> Result<FormContext, FormError> {
    scope
        .inject(context_key(id))
        .ok_or_else(|| FormError::ContextNotFound { id: id.to_string() })
}

/// Resolves the nearest form hosted by `scope` or one of its ancestors.
pub fn with_current_form(scope: &Scope) -> Result<FormContext, FormError> {
    let id = scope.current_form_id().ok_or(FormError::NoCurrentForm)?;
    with_context(scope, &id)
}
