//! Client side of the folio pipeline: decides whether tracking is allowed,
//! enriches events with page and visitor context, and posts them to the
//! ingestion endpoint.

pub mod client;
pub mod client_id;
pub mod context;
pub mod error;
pub mod storage;
pub mod transport;

pub use client::{AnalyticsClient, ClientSettings, CLIENT_ID_KEY, OPT_OUT_KEY};
pub use context::{PageContext, StaticPageContext};
pub use error::{ClientError, StorageError};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageChain, StorageOptions, UnavailableStore};
pub use transport::{EventTransport, HttpTransport};
