//! pokedex-server: catalog store, batched field resolvers and the HTTP API

pub mod global_id;
pub mod http;
pub mod models;
pub mod resolvers;
pub mod state;
pub mod store;

pub use http::{build_router, run_server, ServerConfig, ServerError};
pub use resolvers::{PokemonResolver, ResolveError};
pub use state::{AppState, PageLimits};
pub use store::{InMemoryStore, PokemonStore, StoreError};
