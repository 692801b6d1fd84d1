//! TCP cache server.
//!
//! Serves one [`LocalStore`] to any number of clients, one thread per
//! connection. The store is shared behind a mutex; requests are short and
//! dominated by disk I/O.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use respack_common::CancelToken;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactSet;
use crate::error::CacheError;
use crate::protocol::{read_frame, write_frame, CacheRequest, CacheResponse, StoreStatus};
use crate::store::LocalStore;

/// Default port for the cache server.
pub const DEFAULT_PORT: u16 = 44234;

const ACCEPT_POLL: Duration = Duration::from_millis(25);

/// A listening cache server.
pub struct CacheServer {
    listener: TcpListener,
    store: Arc<Mutex<LocalStore>>,
    running: CancelToken,
}

impl CacheServer {
    /// Binds to `addr` and serves `store`.
    pub fn bind(addr: impl ToSocketAddrs, store: LocalStore) -> Result<Self, CacheError> {
        let listener = TcpListener::bind(addr).map_err(CacheError::Network)?;
        Ok(Self {
            listener,
            store: Arc::new(Mutex::new(store)),
            running: CancelToken::new(),
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, CacheError> {
        self.listener.local_addr().map_err(CacheError::Network)
    }

    /// Token that stops [`serve`](Self::serve) when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.running.clone()
    }

    /// Accepts connections until the cancel token is cleared.
    pub fn serve(&self) -> Result<(), CacheError> {
        self.listener
            .set_nonblocking(true)
            .map_err(CacheError::Network)?;
        info!(address = ?self.listener.local_addr().ok(), "cache server listening");

        while self.running.is_running() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!(%peer, error = %e, "failed to configure connection");
                        continue;
                    }
                    let store = Arc::clone(&self.store);
                    thread::spawn(move || serve_connection(stream, peer, &store));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
        info!("cache server stopped");
        Ok(())
    }
}

fn serve_connection(mut stream: TcpStream, peer: SocketAddr, store: &Mutex<LocalStore>) {
    debug!(%peer, "client connected");
    loop {
        let request: CacheRequest = match read_frame(&mut stream) {
            Ok(request) => request,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                warn!(%peer, error = %e, "bad request");
                break;
            }
        };
        let response = handle_request(store, request);
        if let Err(e) = write_frame(&mut stream, &response) {
            warn!(%peer, error = %e, "failed to send response");
            break;
        }
    }
    debug!(%peer, "client disconnected");
}

/// Applies one request to the store.
pub fn handle_request(store: &Mutex<LocalStore>, request: CacheRequest) -> CacheResponse {
    let Ok(mut store) = store.lock() else {
        return CacheResponse::Error("store lock poisoned".to_string());
    };
    let result = match request {
        CacheRequest::Add { key, artifacts } => ArtifactSet::from_record(artifacts)
            .and_then(|set| store.put(&key, &set))
            .map(|()| CacheResponse::Added),
        CacheRequest::Request { key } => match store.get(&key) {
            Ok(set) => Ok(CacheResponse::Found(set.to_record())),
            Err(CacheError::NotFound) => Ok(CacheResponse::NotFound),
            Err(e) => Err(e),
        },
        CacheRequest::Remove { key } => store.remove(&key).map(|existed| {
            if existed {
                CacheResponse::Removed
            } else {
                CacheResponse::NotFound
            }
        }),
        CacheRequest::Status => Ok(CacheResponse::Status(StoreStatus {
            entries: store.entry_count() as u64,
            total_bytes: store.total_size(),
            limit_bytes: store.limit(),
        })),
    };
    result.unwrap_or_else(|e| {
        warn!(error = %e, "request failed");
        CacheResponse::Error(e.to_string())
    })
}
