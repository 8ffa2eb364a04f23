//! Shared handler state

use std::sync::Arc;

use grony_core::registry::RegistryStore;

use crate::service::{CommandDispatcher, CommandRegistry};

/// State handed to every request
#[derive(Clone)]
pub struct AppState {
    /// Bearer token callers must present
    pub secret: Arc<str>,
    pub dispatcher: Arc<dyn CommandDispatcher>,
}

impl AppState {
    pub fn new(secret: impl Into<Arc<str>>, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        Self {
            secret: secret.into(),
            dispatcher,
        }
    }

    /// State dispatching to a [`CommandRegistry`] over `store`
    pub fn with_store(secret: impl Into<Arc<str>>, store: Arc<RegistryStore>) -> Self {
        Self::new(secret, Arc::new(CommandRegistry::new(store)))
    }
}
