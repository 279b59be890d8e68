use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::RetrievalError;

/// Fetches the complete content behind a feed location, or fails.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, location: &Url) -> Result<Bytes, RetrievalError>;
}
