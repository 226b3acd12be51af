//! pokedex-core: batching and pagination primitives for the catalog API
//!
//! - [`cursor`]: opaque offset cursors with tolerant decoding
//! - [`connection`]: Relay-style windowed pagination over fetched slices
//! - [`scope`]: per-request ambient state (task-local)
//! - [`batch`]: request-scoped coalescing loaders

pub mod batch;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod scope;

pub use batch::{load_batched, BatchRegistry, BatchResult, ByAddress, Coalescer};
pub use connection::{
    connection_from_slice, fetch_window, Connection, Edge, PageArguments, PageInfo, SliceMeta,
};
pub use error::{
    BatchError, KeyError, LoadError, LoadResult, PaginationError, PaginationResult, ScopeError,
};
pub use scope::RequestScope;
