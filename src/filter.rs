use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    context::ItemContext,
    error::{Error, Result},
    select::{Selected, Selector},
    value::{NValue, Value},
};

/// A composable extraction step: given one item, select a sub-value and
/// transform it into a typed result.
///
/// Implementations are plain configuration values.  They hold no per-call
/// state, so one instance can be applied to many items, including from
/// multiple threads (`Send + Sync` is required).  The only state a chain
/// shares is the caller-owned environment on the [`ItemContext`].
pub trait Filter: Send + Sync {
    /// Apply this filter to `item`, producing a typed value or an extraction
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an `Err` when selection or transformation fails *and* the
    /// filter was built without a default.  A configured default is returned
    /// silently instead.
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>>;

    /// The filter kind, for diagnostics ("CleanText", "Regexp", ...).
    fn kind(&self) -> &'static str;
}

/// Creation-order counter shared by every filter.  Diagnostics only, never
/// correctness: it lets trace output show the declaration order of the steps
/// that produced a value.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Resolve a failure against a configured default: return the default if one
/// is set, otherwise raise the typed error.
///
/// The default path is silent.  No logging, no partial result.
pub(crate) fn default_or_raise<'doc>(
    default: Option<&Value>,
    err: Error,
) -> Result<NValue<'doc>> {
    match default {
        Some(v) => Ok(Value::from_data(v.clone())),
        None => Err(err),
    }
}

/// Log one filter application at trace level, with the creation-order
/// sequence number and the owning item's label.
pub(crate) fn trace_apply(kind: &'static str, sequence: u64, item: &ItemContext<'_>, input: &str) {
    tracing::trace!(
        target: "pagesieve::filters",
        seq = sequence,
        label = item.label().unwrap_or(""),
        "{kind}({input:?})"
    );
}

/// Selector, default policy, and creation order: the configuration every
/// selector-driven filter shares.
pub(crate) struct Core {
    selector: Selector,
    default: Option<Value>,
    sequence: u64,
}

impl Core {
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self {
            selector: selector.into(),
            default: None,
            sequence: next_sequence(),
        }
    }

    pub fn set_default(&mut self, default: Value) {
        self.default = Some(default);
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn select<'doc>(&self, item: &ItemContext<'doc>) -> Result<Selected<'doc>> {
        self.selector.select(item)
    }

    pub fn default_or_raise<'doc>(&self, err: Error) -> Result<NValue<'doc>> {
        default_or_raise(self.default(), err)
    }
}
