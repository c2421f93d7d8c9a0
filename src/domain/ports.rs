use crate::domain::model::InputType;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_file(&self) -> Option<&str>;
    fn index_name(&self) -> &str;
    fn project(&self) -> &str;
    fn host(&self) -> &str;
    fn input_type(&self) -> InputType;
    /// Check every JSON line before framing a bulk request.
    fn validate_json(&self) -> bool {
        false
    }
    /// Mapping file used to create the index before pushing.
    fn index_mapping(&self) -> Option<&str> {
        None
    }
}

/// Document store the pusher writes to.
///
/// Failures are reported as [`crate::PusherError::SinkError`] carrying the
/// HTTP status and the reason from the store's error envelope.
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Stores a single JSON document under a freshly generated id.
    async fn create_document(&self, index: &str, body: Vec<u8>) -> Result<()>;

    /// Submits an already framed NDJSON bulk payload.
    async fn bulk_write(&self, index: &str, framed_body: Vec<u8>) -> Result<()>;

    /// Creates `index` with the given JSON settings/mappings body.
    async fn create_index(&self, index: &str, mapping: &str) -> Result<()>;
}
