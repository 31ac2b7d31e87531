//! Attribute hooks: `set`/`get` modifiers, defaults and validators.
//!
//! Every hook may be synchronous or asynchronous. The marshaller awaits them
//! one at a time, in declared attribute order, so hook futures are never
//! polled concurrently.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use regex::Regex;

use crate::value::{Document, Value};

type SyncModifierFn = dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync;
type AsyncModifierFn = dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;
type SyncDefaultFn = dyn Fn(&Document) -> Value + Send + Sync;
type AsyncDefaultFn = dyn Fn(Document) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;
type SyncValidatorFn = dyn Fn(&Value) -> bool + Send + Sync;
type AsyncValidatorFn = dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync;

/// A value transform run on write (`set`) or on read (`get`).
#[derive(Clone)]
pub enum Modifier {
    /// Runs inline.
    Sync(Arc<SyncModifierFn>),
    /// Returns a future that is awaited before the next hook runs.
    Async(Arc<AsyncModifierFn>),
}

impl Modifier {
    /// Infallible synchronous modifier.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(move |value| Ok(f(value))))
    }

    /// Fallible synchronous modifier.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Asynchronous modifier.
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |value| f(value).boxed()))
    }

    pub(crate) async fn apply(&self, value: Value) -> anyhow::Result<Value> {
        match self {
            Self::Sync(f) => f(value),
            Self::Async(f) => f(value).await,
        }
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Modifier::Sync"),
            Self::Async(_) => f.write_str("Modifier::Async"),
        }
    }
}

/// Default value of an attribute.
///
/// Function defaults receive the document as built so far, so a default can
/// depend on siblings declared before it.
#[derive(Clone)]
pub enum DefaultValue {
    /// A literal.
    Literal(Value),
    /// Computed inline.
    Sync(Arc<SyncDefaultFn>),
    /// Computed by a future.
    Async(Arc<AsyncDefaultFn>),
}

impl DefaultValue {
    /// Synchronous default function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Asynchronous default function.
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Document) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |doc| f(doc).boxed()))
    }

    pub(crate) async fn evaluate(&self, document: &Document) -> anyhow::Result<Value> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Sync(f) => Ok(f(document)),
            Self::Async(f) => f(document.clone()).await,
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("DefaultValue::Literal").field(value).finish(),
            Self::Sync(_) => f.write_str("DefaultValue::Sync"),
            Self::Async(_) => f.write_str("DefaultValue::Async"),
        }
    }
}

/// Custom validation rule.
#[derive(Clone)]
pub enum Validator {
    /// The value must equal this literal.
    Equals(Value),
    /// String values must match this pattern; other values fail.
    Pattern(Regex),
    /// Predicate run inline.
    Sync(Arc<SyncValidatorFn>),
    /// Predicate computed by a future. A rejected future counts as failure.
    Async(Arc<AsyncValidatorFn>),
}

impl Validator {
    /// Synchronous predicate.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Asynchronous predicate.
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Self::Async(Arc::new(move |value| f(value).boxed()))
    }

    pub(crate) async fn check(&self, value: &Value) -> bool {
        match self {
            Self::Equals(expected) => expected == value,
            Self::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Self::Sync(f) => f(value),
            Self::Async(f) => f(value.clone()).await.unwrap_or(false),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(value) => f.debug_tuple("Validator::Equals").field(value).finish(),
            Self::Pattern(re) => f.debug_tuple("Validator::Pattern").field(&re.as_str()).finish(),
            Self::Sync(_) => f.write_str("Validator::Sync"),
            Self::Async(_) => f.write_str("Validator::Async"),
        }
    }
}
