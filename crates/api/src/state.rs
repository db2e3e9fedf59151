//! Shared application state.

use std::sync::Arc;

use crate::config::Config;
use crate::store::Store;
use crate::token::TokenCodec;

/// State shared across all route handlers.
///
/// Cheap to clone: everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    store: Arc<dyn Store>,
    tokens: TokenCodec,
}

impl AppState {
    /// Assemble state from configuration and a store backend.
    ///
    /// The token codec is derived from the config's signing secret and TTL.
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let tokens = TokenCodec::new(config.token_secret.clone(), config.token_ttl_secs);
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                tokens,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenCodec {
        &self.inner.tokens
    }
}
