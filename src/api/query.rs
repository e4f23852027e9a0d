use juniper::graphql_object;
use serde_json::Value;

use super::{
    Context,
    err::ApiResult,
    model::layer::FirstLayer,
};


/// The root query object.
pub(crate) struct Query {
    /// Untyped map that `get_map` decodes on each call.
    map_literal: Value,
}

impl Query {
    pub(crate) fn new() -> Self {
        Self { map_literal: FirstLayer::map_literal() }
    }
}

#[cfg(test)]
impl Query {
    pub(crate) fn with_map_literal(map_literal: Value) -> Self {
        Self { map_literal }
    }
}

// Both root fields are nullable: a failing `get_map` must not take down
// `get_struct` when both are requested in one document.
#[graphql_object(context = Context, rename_all = "none")]
impl Query {
    /// Returns the record decoded from an untyped map.
    fn get_map(&self, context: &Context) -> ApiResult<Option<FirstLayer>> {
        let map = self.map_literal.clone();
        FirstLayer::decode(map, context.config.lenient_decoding).map(Some)
    }

    /// Returns the record built directly from its fields.
    fn get_struct() -> ApiResult<Option<FirstLayer>> {
        Ok(Some(FirstLayer::from_struct_literal()))
    }
}
