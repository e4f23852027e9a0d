use std::sync::Arc;

use crate::config::ApiConfig;


/// The context that is accessible to every resolver in our API.
pub(crate) struct Context {
    pub(crate) config: Arc<ApiConfig>,
}

impl juniper::Context for Context {}
