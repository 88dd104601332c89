use super::*;
use crate::compare_values;
use std::{fmt, str::FromStr, sync::Arc};

const DESCENDING_MARKER: char = '-';

/// A field to sort by; written `"-field"` for descending order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
    key: String,
    descending: bool,
}

impl SortSpec {
    pub fn ascending<S: Into<String>>(key: S) -> Self {
        Self {
            key: key.into(),
            descending: false,
        }
    }

    pub fn descending<S: Into<String>>(key: S) -> Self {
        Self {
            key: key.into(),
            descending: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    pub fn reversed(&self) -> Self {
        Self {
            key: self.key.clone(),
            descending: !self.descending,
        }
    }
}

impl From<&str> for SortSpec {
    fn from(spec: &str) -> Self {
        match spec.strip_prefix(DESCENDING_MARKER) {
            Some(key) => Self::descending(key),
            None => Self::ascending(spec),
        }
    }
}

impl From<String> for SortSpec {
    fn from(spec: String) -> Self {
        spec.as_str().into()
    }
}

impl FromStr for SortSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{DESCENDING_MARKER}")?;
        }
        f.write_str(&self.key)
    }
}

/// Orders the documents of `map` by `spec`. Strings compare
/// case-insensitively and ties keep map order, in both directions.
pub fn sort_documents(map: &WatchedMap, spec: &SortSpec) -> Vec<Document> {
    let mut docs = map.values().cloned().collect::<Vec<_>>();
    docs.sort_by(|a, b| {
        let ordering = compare_values(a.get(spec.key()), b.get(spec.key()), true);
        if spec.is_descending() {
            ordering.reverse()
        } else {
            ordering
        }
    });
    docs
}

/// Sorted view over a [`MapWatcher`], recomputed whenever the watched map or
/// the sort spec changes.
pub struct SortedListWatcher {
    spec: Observable<SortSpec>,
    view: Derived<Arc<Vec<Document>>>,
}

impl SortedListWatcher {
    pub fn new(map: &MapWatcher, initial: impl Into<SortSpec>) -> Self {
        let spec = Observable::new(initial.into());
        let view = Derived::new(map.observable(), &spec, |map: &Arc<WatchedMap>, spec: &SortSpec| {
            Arc::new(sort_documents(map, spec))
        });
        Self { spec, view }
    }

    /// Replaces the sort spec and recomputes the view.
    pub fn sort(&self, spec: impl Into<SortSpec>) {
        let spec = spec.into();
        trace!("resorting by {spec}");
        self.spec.set(spec);
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.spec.get()
    }

    pub fn current(&self) -> Arc<Vec<Document>> {
        self.view.get()
    }

    pub fn subscribe(&self, observer: impl Fn(&Arc<Vec<Document>>) + Send + Sync + 'static) -> ObserverHandle {
        self.view.subscribe(observer)
    }
}
