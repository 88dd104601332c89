mod cache;
mod config;
mod context;
mod gateway;
mod observable;
mod session;
mod types;
mod utils;
mod watcher;

pub mod constants;

pub use cache::CollectionCache;
pub use config::{Environment, FiresiteConfig};
pub use context::Firesite;
pub use gateway::{
    get_doc, get_docs, BatchCallback, Change, ChangeKind, DocumentGateway, Filter, FilterOp, Lookup, MemoryGateway,
    Query, Subscription,
};
pub use observable::{Derived, Observable, ObserverHandle};
pub use session::{
    password_hash, AuthCallback, AuthProvider, AuthUser, CloudClient, CloudRequest, CloudTransport, Session,
    SessionState, SessionUser,
};
pub use tracing::{debug, error, info, trace, warn};
pub use types::{compare_values, Document, Fields, FiresiteError, FiresiteResult};
pub use utils::{file_size_str, now, page_id_to_path, page_path_to_id, slugify, uuid};
pub use watcher::{sort_documents, MapWatcher, SortSpec, SortedListWatcher, WatchedMap};

pub use firesite_widget::{Segment, WidgetError, WidgetInvocation};
