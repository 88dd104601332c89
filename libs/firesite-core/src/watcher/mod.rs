mod map;
mod sorted;

use super::{
    debug, error, trace, warn, Change, ChangeKind, Derived, Document, DocumentGateway, FiresiteResult, Observable,
    ObserverHandle, Query,
};

pub use map::{MapWatcher, WatchedMap};
pub use sorted::{sort_documents, SortSpec, SortedListWatcher};
