mod client;
mod local;
mod scheme;
mod sftp;
pub mod auth;

pub use client::Retriever;
pub use scheme::{DEFAULT_TIMEOUT, SchemeRetriever};

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::error::RetrievalError;

pub async fn fetch_bytes<R: Retriever + ?Sized>(
    retriever: &R,
    location: &Url,
) -> Result<Bytes, RetrievalError> {
    let bytes = retriever.retrieve(location).await?;
    debug!(scheme = location.scheme(), bytes = bytes.len(), "Feed bytes retrieved");
    Ok(bytes)
}
