use std::io;

use bytes::Bytes;
use url::Url;

use crate::error::RetrievalError;

/// Reads a `file://` location into memory.
pub async fn read_file(location: &Url) -> Result<Bytes, RetrievalError> {
    let path = location.to_file_path().map_err(|()| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{location} is not a local path"),
        )
    })?;
    let content = tokio::fs::read(&path).await?;
    Ok(Bytes::from(content))
}
