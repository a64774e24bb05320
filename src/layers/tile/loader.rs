//! Image loading as pollable tasks.
//!
//! Every load hands back a [`LoadTask`]. The render thread polls it on each
//! tick the same way it drains any other result channel; the worker side
//! settles it exactly once through a [`LoadCompleter`]. Cancelling a task
//! flips its token and aborts the underlying fetch when the runtime allows
//! it; whatever the transport still delivers afterwards is discarded.

use crate::prelude::Arc;
use crate::rendering::resources::{svg_kind, ImageHandle};
use crate::rendering::svg::rasterize_svg;
use base64::Engine;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "tokio-runtime")]
use once_cell::sync::Lazy;

/// What to fetch and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    pub cross_origin: Option<String>,
    /// Raster size wanted for scalable sources
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl LoadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cross_origin: None,
            width: None,
            height: None,
        }
    }

    pub fn with_cross_origin(mut self, cross_origin: Option<String>) -> Self {
        self.cross_origin = cross_origin;
        self
    }

    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("image load aborted")]
    Aborted,
    #[error("HTTP {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("no async runtime available")]
    NoRuntime,
}

pub type LoadResult = std::result::Result<ImageHandle, LoadError>;

/// Create the two ends of a single image load
pub fn load_channel() -> (LoadCompleter, LoadTask) {
    let (tx, rx) = bounded(1);
    let cancelled = Arc::new(AtomicBool::new(false));
    (
        LoadCompleter {
            tx,
            cancelled: cancelled.clone(),
        },
        LoadTask {
            rx,
            cancelled,
            handle: None,
        },
    )
}

/// Worker side of a load
#[derive(Clone)]
pub struct LoadCompleter {
    tx: Sender<LoadResult>,
    cancelled: Arc<AtomicBool>,
}

impl LoadCompleter {
    /// Settle the load. Returns false when the result was discarded because
    /// the task was cancelled, dropped or already settled.
    pub fn complete(&self, result: LoadResult) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.try_send(result).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Render-thread side of a load
pub struct LoadTask {
    rx: Receiver<LoadResult>,
    cancelled: Arc<AtomicBool>,
    handle: Option<Box<dyn crate::runtime::AsyncHandle>>,
}

impl std::fmt::Debug for LoadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTask")
            .field("cancelled", &self.is_cancelled())
            .field("spawned", &self.handle.is_some())
            .finish()
    }
}

impl LoadTask {
    /// A task that is already settled
    pub fn settled(result: LoadResult) -> Self {
        let (completer, task) = load_channel();
        completer.complete(result);
        task
    }

    /// Attach the spawned fetch so cancellation can abort it
    pub fn with_handle(mut self, handle: Box<dyn crate::runtime::AsyncHandle>) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Non-blocking check for the outcome. A worker that went away without
    /// settling counts as an abort.
    pub fn poll(&self) -> Option<LoadResult> {
        if self.is_cancelled() {
            return None;
        }
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LoadError::Aborted)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Source of images for tiles and canvas resources
pub trait ImageLoader {
    fn load(&self, request: LoadRequest) -> LoadTask;

    /// Warm the transport cache for `request` without tracking the result
    fn prefetch(&self, request: LoadRequest) {
        drop(self.load(request));
    }
}

pub fn decode_image(bytes: &[u8]) -> LoadResult {
    image::load_from_memory(bytes)
        .map(|image| Arc::new(image.to_rgba8()))
        .map_err(|err| LoadError::Decode(err.to_string()))
}

/// Decode the bytes fetched for `request`. SVG sources are rasterized at
/// the requested size.
pub fn decode_for_request(request: &LoadRequest, bytes: &[u8]) -> LoadResult {
    if svg_kind(&request.url).is_some() {
        return rasterize_svg(bytes, request.width, request.height)
            .map(Arc::new)
            .map_err(|err| LoadError::Decode(err.to_string()));
    }
    decode_image(bytes)
}

/// Payload of a `data:` url, base64 or percent-encoded
pub fn decode_data_url(url: &str) -> std::result::Result<Vec<u8>, LoadError> {
    let invalid = |reason: &str| LoadError::Decode(format!("invalid data url: {reason}"));
    let rest = url.strip_prefix("data:").ok_or_else(|| invalid("missing scheme"))?;
    let (metadata, data) = rest.split_once(',').ok_or_else(|| invalid("missing comma"))?;
    let is_base64 = metadata
        .split(';')
        .any(|param| param.trim().eq_ignore_ascii_case("base64"));

    if is_base64 {
        let cleaned: Vec<u8> = data
            .bytes()
            .filter(|byte| !byte.is_ascii_whitespace())
            .collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| invalid(&e.to_string()))
    } else {
        Ok(urlencoding::decode_binary(data.as_bytes()).into_owned())
    }
}

/// Fetches the raw bytes behind a request
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    async fn fetch(&self, request: &LoadRequest) -> std::result::Result<Vec<u8>, LoadError>;
}

/// Shared async HTTP client for image fetching
#[cfg(feature = "tokio-runtime")]
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("maplayer/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

#[cfg(feature = "tokio-runtime")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestFetcher;

#[cfg(feature = "tokio-runtime")]
#[async_trait::async_trait]
impl ImageFetcher for ReqwestFetcher {
    async fn fetch(&self, request: &LoadRequest) -> std::result::Result<Vec<u8>, LoadError> {
        let response = HTTP_CLIENT
            .get(&request.url)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| LoadError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LoadError::Http(response.status().as_u16()));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| LoadError::Network(e.to_string()))?;
        Ok(data.to_vec())
    }
}

/// Loads images over HTTP on the async runtime and decodes them off the
/// render thread
#[cfg(feature = "tokio-runtime")]
pub struct HttpImageLoader<F: ImageFetcher = ReqwestFetcher> {
    fetcher: Arc<F>,
}

#[cfg(feature = "tokio-runtime")]
impl HttpImageLoader<ReqwestFetcher> {
    pub fn new() -> Self {
        Self::with_fetcher(ReqwestFetcher)
    }
}

#[cfg(feature = "tokio-runtime")]
impl Default for HttpImageLoader<ReqwestFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tokio-runtime")]
impl<F: ImageFetcher> HttpImageLoader<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }
}

#[cfg(feature = "tokio-runtime")]
impl<F: ImageFetcher> ImageLoader for HttpImageLoader<F> {
    fn load(&self, request: LoadRequest) -> LoadTask {
        if request.url.starts_with("data:") {
            let result = decode_data_url(&request.url)
                .and_then(|bytes| decode_for_request(&request, &bytes));
            return LoadTask::settled(result);
        }

        let (completer, task) = load_channel();
        let fallback = completer.clone();
        let fetcher = self.fetcher.clone();

        #[cfg(feature = "debug")]
        log::debug!("fetching image {}", request.url);

        let spawned = crate::runtime::spawn(async move {
            if completer.is_cancelled() {
                return;
            }
            let result = match fetcher.fetch(&request).await {
                Ok(bytes) => decode_for_request(&request, &bytes),
                Err(err) => Err(err),
            };
            completer.complete(result);
        });

        match spawned {
            Some(handle) => task.with_handle(handle),
            None => {
                fallback.complete(Err(LoadError::NoRuntime));
                task
            }
        }
    }
}
