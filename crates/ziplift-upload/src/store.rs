use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// A boxed stream type for object bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Content handed to [`ObjectStore::put`].
pub struct ObjectBody {
    len: u64,
    stream: BoxStream<'static, io::Result<Bytes>>,
}

impl ObjectBody {
    pub fn new(len: u64, stream: BoxStream<'static, io::Result<Bytes>>) -> Self {
        Self { len, stream }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::new(len, Box::pin(futures_util::stream::once(async move { Ok(bytes) })))
    }

    /// Stream a file from disk without reading it into memory.
    pub async fn from_file(path: &Path) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self::new(len, Box::pin(ReaderStream::new(file))))
    }

    /// Length announced by the source; the stream is not checked against it.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        self.stream
    }

    /// Drain the body into memory.
    pub async fn collect(self) -> io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.len as usize);
        let mut stream = self.stream;
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }
}

/// Destination for uploaded objects.
///
/// The uploader makes no assumption about the store's protocol, consistency
/// or retry behavior; a failed put is reported once and never retried.
///
/// # Implementations
///
/// - [`FsObjectStore`]: mirrors objects into a local directory
/// - `HttpObjectStore`: streaming HTTP `PUT` (feature `reqwest`)
/// - Mock implementations for testing
pub trait ObjectStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Stores objects as files under `root/<bucket>/<key>`.
///
/// Each object is written to a hidden staging file next to its target and
/// renamed into place once complete.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `bucket`/`key` lives on disk. Segments that could climb out of
    /// the root are refused.
    pub fn object_path(&self, bucket: &str, key: &str) -> io::Result<PathBuf> {
        let mut path = self.root.clone();
        let mut pushed = 0;
        for segment in std::iter::once(bucket).chain(key.split('/')) {
            if segment.is_empty() {
                continue;
            }
            if segment == "." || segment == ".." || segment.contains('\\') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid object name '{bucket}/{key}'"),
                ));
            }
            path.push(segment);
            pushed += 1;
        }
        if pushed < 2 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("object name '{bucket}/{key}' needs a bucket and a key"),
            ));
        }
        Ok(path)
    }
}

impl ObjectStore for FsObjectStore {
    type Error = io::Error;

    async fn put(&self, bucket: &str, key: &str, body: ObjectBody) -> io::Result<()> {
        let target = self.object_path(bucket, key)?;
        let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty object key"));
        };
        tokio::fs::create_dir_all(parent).await?;

        let staging = parent.join(format!(".{}.part", name.to_string_lossy()));
        if let Err(e) = write_stream(&staging, body).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }
        tokio::fs::rename(&staging, &target).await
    }
}

async fn write_stream(path: &Path, body: ObjectBody) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = body.into_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    pub enum HttpStoreError {
        #[error("invalid endpoint '{0}'")]
        InvalidEndpoint(String),

        #[error("HTTP request failed: {0}")]
        Request(#[from] reqwest::Error),
    }

    /// Uploads objects with a streaming HTTP `PUT` to
    /// `<endpoint>/<bucket>/<key>`.
    ///
    /// Requests are sent unauthenticated; the endpoint is expected to accept
    /// them (a presigning proxy, a local test server, a public bucket).
    #[derive(Clone, Debug)]
    pub struct HttpObjectStore {
        client: reqwest::Client,
        endpoint: reqwest::Url,
    }

    impl HttpObjectStore {
        pub fn new(endpoint: &str) -> Result<Self, HttpStoreError> {
            let endpoint = reqwest::Url::parse(endpoint)
                .map_err(|e| HttpStoreError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
            if endpoint.cannot_be_a_base() {
                return Err(HttpStoreError::InvalidEndpoint(endpoint.to_string()));
            }
            Ok(Self {
                client: reqwest::Client::new(),
                endpoint,
            })
        }

        /// The regional S3 endpoint, `https://s3.<region>.amazonaws.com`.
        pub fn for_region(region: &str) -> Result<Self, HttpStoreError> {
            Self::new(&format!("https://s3.{region}.amazonaws.com"))
        }

        pub fn object_url(&self, bucket: &str, key: &str) -> Result<reqwest::Url, HttpStoreError> {
            let mut url = self.endpoint.clone();
            {
                let mut segments = url
                    .path_segments_mut()
                    .map_err(|()| HttpStoreError::InvalidEndpoint(self.endpoint.to_string()))?;
                segments
                    .pop_if_empty()
                    .push(bucket)
                    .extend(key.split('/').filter(|s| !s.is_empty()));
            }
            Ok(url)
        }
    }

    impl ObjectStore for HttpObjectStore {
        type Error = HttpStoreError;

        async fn put(&self, bucket: &str, key: &str, body: ObjectBody) -> Result<(), Self::Error> {
            let url = self.object_url(bucket, key)?;
            let len = body.len();
            self.client
                .put(url)
                .header(reqwest::header::CONTENT_LENGTH, len)
                .body(reqwest::Body::wrap_stream(body.into_stream()))
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        }
    }

}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::{HttpObjectStore, HttpStoreError};
