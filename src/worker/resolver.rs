//! Blocking file resolvers handed to the engine.
//!
//! Two implementations of one interface:
//!
//! - [`SharedMemoryResolver`] posts a [`FileRequest`] to the host and blocks
//!   on its [`SharedBuffer`] until the host answers.
//! - [`DirectResolver`] is used where shared buffers are unavailable. It
//!   answers package requests from a preloaded list and fetches everything
//!   else with a synchronous HTTP GET.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::protocol::{
    is_binary_request, FileRequest, ReadError, SharedBuffer, VirtualPath, WorkerEvent,
    BINARY_SUFFIX, PACKAGE_PREFIX,
};

/// Content returned for one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    Text(String),
    Binary(Vec<u8>),
}

impl FileData {
    /// Decode a raw payload according to the request's binary marker.
    pub fn decode(path: &str, payload: Vec<u8>) -> Result<Self, ReadError> {
        if is_binary_request(path) {
            return Ok(Self::Binary(payload));
        }
        String::from_utf8(payload)
            .map(Self::Text)
            .map_err(|_| ReadError::Generic)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

/// Synchronous file access for the engine.
pub trait FileResolver {
    /// Read one virtual path. Never returns without data or an error.
    fn read(&self, path: &str) -> Result<FileData, ReadError>;
}

/// Resolves reads through the host coordinator.
pub struct SharedMemoryResolver {
    events: UnboundedSender<WorkerEvent>,
}

impl SharedMemoryResolver {
    pub fn new(events: UnboundedSender<WorkerEvent>) -> Self {
        Self { events }
    }
}

impl FileResolver for SharedMemoryResolver {
    fn read(&self, path: &str) -> Result<FileData, ReadError> {
        let buffer = SharedBuffer::new();
        let request = FileRequest::new(buffer.clone(), path);

        debug!(path, "requesting file from host");
        if self.events.send(WorkerEvent::FileRequest(request)).is_err() {
            // Nobody is left to notify us.
            warn!(path, "host is gone, failing read");
            return Err(ReadError::Generic);
        }

        let payload = buffer.wait()?;
        FileData::decode(path, payload)
    }
}

/// Resolves reads without a host round trip.
pub struct DirectResolver<'a> {
    pub client: &'a reqwest::blocking::Client,
    /// Prefix of every file URL, e.g. `http://localhost/_capacitor_file_`.
    pub base_url: &'a str,
    pub base_path: &'a str,
    pub package_path: &'a str,
    /// Available packages as `ns/name/version`.
    pub packages: &'a [String],
}

impl DirectResolver<'_> {
    fn file_url(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            self.base_path.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl FileResolver for DirectResolver<'_> {
    fn read(&self, path: &str) -> Result<FileData, ReadError> {
        if let Some(spec) = path.strip_prefix(PACKAGE_PREFIX) {
            let spec = spec.trim_end_matches('/');
            if self.packages.iter().any(|known| known == spec) {
                return Ok(FileData::Text(format!("{}{}", self.package_path, spec)));
            }
            return Err(ReadError::NotFound);
        }

        let (file, binary) = match VirtualPath::parse(path) {
            Ok(VirtualPath::File { path, binary }) => (path, binary),
            _ => (path.trim_end_matches(BINARY_SUFFIX).to_string(), false),
        };

        let url = self.file_url(&file);
        let response = self.client.get(&url).send().map_err(|err| {
            warn!(%url, error = %err, "file fetch failed");
            ReadError::Transport
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ReadError::NotFound);
        }
        if !response.status().is_success() {
            warn!(%url, status = %response.status(), "unexpected response");
            return Err(ReadError::Generic);
        }

        if binary {
            let bytes = response.bytes().map_err(|_| ReadError::Transport)?;
            Ok(FileData::Binary(bytes.to_vec()))
        } else {
            let text = response.text().map_err(|_| ReadError::Transport)?;
            Ok(FileData::Text(text))
        }
    }
}
