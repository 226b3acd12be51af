//! Shared application state

use std::sync::Arc;

use pokedex_core::PageArguments;

use crate::resolvers::PokemonResolver;
use crate::store::PokemonStore;

/// Default page size when a request names neither `first` nor `last`
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest `first`/`last` a request may ask for
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size limits applied to every connection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Fill in the default page size and clamp counts to the maximum.
    ///
    /// Negative counts pass through untouched so validation reports them.
    pub fn apply(&self, mut args: PageArguments) -> PageArguments {
        if args.first.is_none() && args.last.is_none() {
            args.first = Some(self.default_page_size);
        }
        args.first = args.first.map(|n| n.min(self.max_page_size));
        args.last = args.last.map(|n| n.min(self.max_page_size));
        args
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PokemonStore>,
    pub page_limits: PageLimits,
}

impl AppState {
    pub fn new(store: Arc<dyn PokemonStore>, page_limits: PageLimits) -> Self {
        Self { store, page_limits }
    }

    pub fn resolver(&self) -> PokemonResolver {
        PokemonResolver::new(Arc::clone(&self.store))
    }
}
