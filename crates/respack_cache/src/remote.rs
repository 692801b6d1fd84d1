//! Client side of the cache server protocol.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, warn};

use crate::artifact::ArtifactSet;
use crate::client::CacheBackend;
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::protocol::{read_frame, write_frame, CacheRequest, CacheResponse, StoreStatus};

/// A connection to a [`CacheServer`](crate::CacheServer).
///
/// Every call blocks for at most the configured timeout per socket
/// operation. A timeout or a dropped connection closes the stream and the
/// next request reconnects. After [`MAX_CONSECUTIVE_FAILURES`] failed
/// requests in a row the backend reports itself disconnected for good.
#[derive(Debug)]
pub struct RemoteCache {
    address: String,
    timeout_ms: u64,
    stream: Option<TcpStream>,
    failures: u32,
}

/// Failed requests in a row after which a [`RemoteCache`] gives up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

impl RemoteCache {
    /// Connects to `address` (`host:port`).
    pub fn connect(address: &str, timeout_ms: u64) -> Result<Self, CacheError> {
        let stream = open_stream(address, timeout_ms)?;
        debug!(address, "connected to cache server");
        Ok(Self {
            address: address.to_string(),
            timeout_ms,
            stream: Some(stream),
            failures: 0,
        })
    }

    /// Server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Asks the server for its statistics.
    pub fn status(&mut self) -> Result<StoreStatus, CacheError> {
        match self.roundtrip(&CacheRequest::Status)? {
            CacheResponse::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    fn roundtrip(&mut self, request: &CacheRequest) -> Result<CacheResponse, CacheError> {
        if !self.is_connected() {
            return Err(CacheError::Disabled);
        }
        if self.stream.is_none() {
            match open_stream(&self.address, self.timeout_ms) {
                Ok(stream) => {
                    debug!(address = %self.address, "reconnected to cache server");
                    self.stream = Some(stream);
                }
                Err(e) => {
                    self.failures += 1;
                    return Err(e);
                }
            }
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CacheError::Disabled);
        };
        let result = write_frame(stream, request).and_then(|()| read_frame(stream));
        match result {
            Ok(response) => {
                self.failures = 0;
                Ok(response)
            }
            Err(err) => {
                warn!(address = %self.address, error = %err, "cache connection dropped");
                self.stream = None;
                self.failures += 1;
                if !self.is_connected() {
                    warn!(address = %self.address, "giving up on cache server for this run");
                }
                if err.kind() == io::ErrorKind::InvalidData {
                    Err(CacheError::Protocol {
                        reason: err.to_string(),
                    })
                } else {
                    Err(CacheError::from_network(err, self.timeout_ms))
                }
            }
        }
    }
}

fn open_stream(address: &str, timeout_ms: u64) -> Result<TcpStream, CacheError> {
    let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
    let addrs = address
        .to_socket_addrs()
        .map_err(|e| CacheError::from_network(e, timeout_ms))?;

    let mut last_err =
        io::Error::new(io::ErrorKind::InvalidInput, format!("'{address}' resolved to no addresses"));
    for addr in addrs {
        let attempt = match timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                let configure = stream
                    .set_read_timeout(timeout)
                    .and_then(|()| stream.set_write_timeout(timeout))
                    .and_then(|()| stream.set_nodelay(true));
                configure.map_err(CacheError::Network)?;
                return Ok(stream);
            }
            Err(e) => last_err = e,
        }
    }
    Err(CacheError::from_network(last_err, timeout_ms))
}

fn unexpected(response: CacheResponse) -> CacheError {
    match response {
        CacheResponse::Error(message) => CacheError::Server { message },
        other => CacheError::Protocol {
            reason: format!("unexpected response {other:?}"),
        },
    }
}

impl CacheBackend for RemoteCache {
    fn fetch(&mut self, key: &CacheKey) -> Result<ArtifactSet, CacheError> {
        match self.roundtrip(&CacheRequest::Request { key: *key })? {
            CacheResponse::Found(record) => ArtifactSet::from_record(record),
            CacheResponse::NotFound => Err(CacheError::NotFound),
            other => Err(unexpected(other)),
        }
    }

    fn store(&mut self, key: &CacheKey, artifacts: &ArtifactSet) -> Result<(), CacheError> {
        let request = CacheRequest::Add {
            key: *key,
            artifacts: artifacts.to_record(),
        };
        match self.roundtrip(&request)? {
            CacheResponse::Added => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Result<(), CacheError> {
        match self.roundtrip(&CacheRequest::Remove { key: *key })? {
            CacheResponse::Removed => Ok(()),
            CacheResponse::NotFound => Err(CacheError::NotFound),
            other => Err(unexpected(other)),
        }
    }

    fn is_connected(&self) -> bool {
        self.failures < MAX_CONSECUTIVE_FAILURES
    }

    fn describe(&self) -> String {
        format!("cache server at {}", self.address)
    }
}
