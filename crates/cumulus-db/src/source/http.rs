//! Ranged HTTP byte source
//!
//! Reads a remote database without downloading it: fixed-size windows are
//! fetched with `Range` requests on first touch and cached by window
//! index, so a lookup costs a handful of small GETs on a cold cache and
//! none on a warm one.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header::RANGE};

use crate::error::{DbError, Result};
use crate::source::ByteSource;

/// Default window size: half a megabyte
pub const DEFAULT_WINDOW_SIZE: u64 = 512 * 1024;

/// Byte source over a remote file served with `Range` support
///
/// The window size is a cache tuning knob, not part of the format
/// contract. The server must answer `Range` requests with
/// `206 Partial Content`; a request past the end of the file
/// (`416 Range Not Satisfiable`) reads as end-of-source.
#[derive(Debug, Clone)]
pub struct HttpRangeSource {
    client: Client,
    url: Url,
    window_size: u64,
    windows: HashMap<u64, Bytes>,
}

impl HttpRangeSource {
    /// Create a source over `url` with a default client and window size
    pub fn new(url: Url) -> Self {
        Self::with_client(Client::new(), url)
    }

    /// Create a source over `url` using an existing client
    pub fn with_client(client: Client, url: Url) -> Self {
        Self {
            client,
            url,
            window_size: DEFAULT_WINDOW_SIZE,
            windows: HashMap::new(),
        }
    }

    /// Override the cache window size
    pub fn with_window_size(mut self, window_size: u64) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    /// Number of windows currently cached
    pub fn cached_windows(&self) -> usize {
        self.windows.len()
    }

    /// Fetch or recall the window holding byte `index * window_size`
    async fn window(&mut self, index: u64) -> Result<Bytes> {
        if let Some(window) = self.windows.get(&index) {
            return Ok(window.clone());
        }

        let start = index * self.window_size;
        let end = start + self.window_size - 1;
        tracing::trace!(url = %self.url, start, end, "fetching window");
        let response = self
            .client
            .get(self.url.clone())
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await
            .map_err(DbError::http)?;

        let window = match response.status() {
            StatusCode::PARTIAL_CONTENT => response.bytes().await.map_err(DbError::http)?,
            StatusCode::RANGE_NOT_SATISFIABLE => Bytes::new(),
            status => return Err(DbError::http_status(status.as_u16())),
        };

        self.windows.insert(index, window.clone());
        Ok(window)
    }
}

impl ByteSource for HttpRangeSource {
    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes> {
        let mut out = Vec::with_capacity(len);
        let mut position = offset;
        while out.len() < len {
            let index = position / self.window_size;
            let within = (position % self.window_size) as usize;
            let window = self.window(index).await?;
            if within >= window.len() {
                // The file ends inside (or before) this window
                break;
            }
            let take = (len - out.len()).min(window.len() - within);
            out.extend_from_slice(&window[within..within + take]);
            position += take as u64;
        }
        Ok(Bytes::from(out))
    }
}
