//! Name allow-lists for event sources.

use std::collections::HashSet;
use std::sync::Arc;

use console_operator_client::ObjectRef;

/// Predicate deciding whether a change notification should trigger a sync.
pub type EventFilterFn = Arc<dyn Fn(&ObjectRef) -> bool + Send + Sync>;

/// Exact, case-sensitive set of object names.
#[derive(Debug, Clone, Default)]
pub struct NamesFilter {
    names: HashSet<String>,
}

impl NamesFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, object: &ObjectRef) -> bool {
        self.names.contains(&object.name)
    }

    pub fn into_fn(self) -> EventFilterFn {
        Arc::new(move |object| self.matches(object))
    }
}

/// Builds a predicate that accepts objects whose name is one of `names`.
pub fn names_filter<I, S>(names: I) -> EventFilterFn
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    NamesFilter::new(names).into_fn()
}
