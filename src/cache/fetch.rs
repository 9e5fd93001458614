//! Archive download seam for the global cache

use crate::error::{TpoError, TpoResult};
use std::io::{self, Write};
use tracing::debug;

/// Something that can stream the bytes at a URL into a writer
pub trait ArchiveFetcher: Send + Sync {
    /// Write the archive at `url` into `dest`, returning the byte count
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> TpoResult<u64>;
}

/// Fetches archives over HTTP(S)
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl ArchiveFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> TpoResult<u64> {
        debug!(url, "Downloading archive");

        // Non-2xx statuses come back as errors
        let response = ureq::get(url)
            .header("User-Agent", concat!("tpo/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| TpoError::download(url, e.to_string()))?;

        let mut reader = response.into_body().into_reader();
        let bytes = io::copy(&mut reader, dest)
            .map_err(|e| TpoError::download(url, format!("reading response body: {e}")))?;

        debug!(url, bytes, "Download complete");
        Ok(bytes)
    }
}
