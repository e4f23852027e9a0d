/// Behavior of the GraphQL API.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct ApiConfig {
    /// If set to `true`, failing to decode the record served by `get_map` is
    /// not reported as error. Instead, a warning is logged and a record with
    /// all fields empty is returned. By default, such failures are returned
    /// as errors in the GraphQL response.
    #[config(default = false)]
    pub(crate) lenient_decoding: bool,
}
