//! Definition of the GraphQL API.

use juniper::{EmptyMutation, EmptySubscription, Variables, http::GraphQLResponse};

use crate::prelude::*;
use self::query::Query;

pub(crate) mod err;
pub(crate) mod model;

mod context;
mod query;

pub(crate) use self::context::Context;


/// Creates and returns the API root node.
pub(crate) fn root_node() -> RootNode {
    RootNode::new(Query::new(), EmptyMutation::new(), EmptySubscription::new())
}

/// Type of our API root node.
pub(crate) type RootNode = juniper::RootNode<
    'static,
    Query,
    EmptyMutation<Context>,
    EmptySubscription<Context>,
>;

/// Executes the given query document against the schema. There are no
/// variables and no operation name. Parse, validation and resolver errors all
/// end up inside the returned response.
pub(crate) async fn execute(root: &RootNode, context: &Context, query: &str) -> GraphQLResponse {
    let result = juniper::execute(query, None, root, &Variables::new(), context).await;
    GraphQLResponse::from_result(result)
}

/// Query that touches every field of the schema.
const ALL_FIELDS_QUERY: &str = "{
    get_map { name address location second_layer { uid type } }
    get_struct { name address location second_layer { uid type } }
}";

/// Runs a query touching all fields against a freshly built schema. Used on
/// startup to refuse serving with a broken schema.
///
/// Field errors do not make the response as a whole fail (fields are
/// nullable), so they are checked separately here.
pub(crate) async fn self_test(root: &RootNode, context: &Context) -> Result<()> {
    let (_, errors) = juniper::execute(ALL_FIELDS_QUERY, None, root, &Variables::new(), context)
        .await
        .map_err(|e| anyhow!("API schema rejected query touching all fields: {e}"))?;

    if !errors.is_empty() {
        let details = errors.iter()
            .map(|e| format!("`{}`: {}", e.path().join("."), e.error().message()))
            .collect::<Vec<_>>()
            .join("; ");
        bail!("{} field(s) of the API schema failed to resolve: {details}", errors.len());
    }

    trace!("API schema self test succeeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use juniper::{EmptyMutation, EmptySubscription};
    use serde_json::{json, Value};

    use crate::config::ApiConfig;
    use super::{Context, RootNode, execute, self_test, query::Query, root_node};

    const FIELDS: &str = "{name,address,location,second_layer{uid,type}}";

    fn context() -> Context {
        context_with(false)
    }

    fn context_with(lenient_decoding: bool) -> Context {
        Context { config: Arc::new(ApiConfig { lenient_decoding }) }
    }

    /// Schema whose `get_map` decodes a map with a number where a string is
    /// expected.
    fn root_with_broken_map() -> RootNode {
        let map = json!({
            "name": "Map Name",
            "address": "Map Address",
            "location": "Map Location",
            "second_layer": {
                "uid": 17,
                "type": "Map Type",
            },
        });
        RootNode::new(Query::with_map_literal(map), EmptyMutation::new(), EmptySubscription::new())
    }

    async fn run(query: &str) -> Value {
        let response = execute(&root_node(), &context(), query).await;
        serde_json::to_value(&response).unwrap()
    }

    fn expected(prefix: &str) -> Value {
        json!({
            "name": format!("{prefix} Name"),
            "address": format!("{prefix} Address"),
            "location": format!("{prefix} Location"),
            "second_layer": {
                "uid": format!("{prefix} UID"),
                "type": format!("{prefix} Type"),
            },
        })
    }

    #[tokio::test]
    async fn get_struct() {
        let out = run(&format!("{{get_struct{FIELDS}}}")).await;
        assert_eq!(out, json!({ "data": { "get_struct": expected("Struct") } }));
    }

    #[tokio::test]
    async fn get_map() {
        let out = run(&format!("query {{get_map{FIELDS}}}")).await;
        assert_eq!(out, json!({ "data": { "get_map": expected("Map") } }));
    }

    #[tokio::test]
    async fn both_fields_in_one_document() {
        let combined = run(&format!("{{get_map{FIELDS},get_struct{FIELDS}}}")).await;
        let map = run(&format!("{{get_map{FIELDS}}}")).await;
        let strukt = run(&format!("{{get_struct{FIELDS}}}")).await;

        assert_eq!(combined["data"]["get_map"], map["data"]["get_map"]);
        assert_eq!(combined["data"]["get_struct"], strukt["data"]["get_struct"]);
        assert!(combined.get("errors").is_none());
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let query = format!("{{get_map{FIELDS},get_struct{FIELDS}}}");
        let first = run(&query).await;
        for _ in 0..5 {
            assert_eq!(run(&query).await, first);
        }
    }

    #[tokio::test]
    async fn subset_of_fields() {
        let out = run("{ get_struct { second_layer { type } } }").await;
        assert_eq!(
            out,
            json!({ "data": { "get_struct": { "second_layer": { "type": "Struct Type" } } } }),
        );
    }

    #[tokio::test]
    async fn empty_query_is_an_error() {
        let out = run("").await;
        assert!(out.get("data").is_none());
        assert!(!out["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn syntax_error() {
        let out = run("{ get_map { name ").await;
        assert!(out.get("data").is_none());
        assert!(!out["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_field() {
        let out = run("{ get_other { name } }").await;
        let errors = out["errors"].as_array().unwrap();
        assert!(!errors.is_empty());
        assert!(errors[0]["message"].as_str().unwrap().contains("get_other"));
        assert!(out.get("data").map_or(true, |data| data.get("get_other").is_none()));
    }

    #[tokio::test]
    async fn field_names_are_not_renamed() {
        let out = run("{ getMap { name } }").await;
        assert!(!out["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn self_test_passes() {
        self_test(&root_node(), &context()).await.unwrap();
    }

    #[tokio::test]
    async fn broken_map_fails_startup_check() {
        let err = self_test(&root_with_broken_map(), &context()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("`get_map`"), "unexpected message: {msg}");
        assert!(msg.contains("failed to decode record"), "unexpected message: {msg}");

        // Lenient mode hides the failure.
        self_test(&root_with_broken_map(), &context_with(true)).await.unwrap();
    }

    #[tokio::test]
    async fn broken_map_strict_keeps_sibling_field() {
        let query = format!("{{get_map{FIELDS},get_struct{FIELDS}}}");
        let response = execute(&root_with_broken_map(), &context(), &query).await;
        let mut out = serde_json::to_value(&response).unwrap();

        // The message contains the position within serde's intermediate JSON,
        // so it is only checked loosely.
        let msg = out["errors"][0].as_object_mut().unwrap().remove("message").unwrap();
        let msg = msg.as_str().unwrap();
        assert!(
            msg.starts_with("Internal server error: failed to decode record: invalid type: integer `17`"),
            "unexpected message: {msg}",
        );

        assert_eq!(out, json!({
            "data": {
                "get_map": null,
                "get_struct": expected("Struct"),
            },
            "errors": [{
                "locations": [{ "line": 1, "column": 2 }],
                "path": ["get_map"],
                "extensions": {
                    "kind": "INTERNAL_SERVER_ERROR",
                    "key": "record.decode-failed",
                },
            }],
        }));
    }

    #[tokio::test]
    async fn broken_map_lenient_returns_empty_record() {
        let query = format!("{{get_map{FIELDS},get_struct{FIELDS}}}");
        let response = execute(&root_with_broken_map(), &context_with(true), &query).await;
        let out = serde_json::to_value(&response).unwrap();

        assert_eq!(out, json!({
            "data": {
                "get_map": {
                    "name": "",
                    "address": "",
                    "location": "",
                    "second_layer": { "uid": "", "type": "" },
                },
                "get_struct": expected("Struct"),
            },
        }));
    }

    #[test]
    fn sdl_contains_types() {
        let sdl = root_node().as_sdl();
        assert!(sdl.contains("type FirstLayer"));
        assert!(sdl.contains("type SecondLayer"));
        assert!(sdl.contains("get_map: FirstLayer"));
        assert!(sdl.contains("get_struct: FirstLayer"));
        assert!(sdl.contains("second_layer: SecondLayer"));
        assert!(sdl.contains("type: String"));

        // Every field is nullable.
        assert!(!sdl.contains("FirstLayer!"), "{sdl}");
        assert!(!sdl.contains("SecondLayer!"), "{sdl}");
        assert!(!sdl.contains("String!"), "{sdl}");
    }
}
