use server_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    /// Request bodies above this size are rejected before any handler runs.
    pub(crate) max_upload_bytes: usize,
}
