//! Per-server connection pool.
//!
//! One pool per configured server: a bounded deque of idle `TcpStream`s
//! guarded by a `tokio::sync::Mutex`. `pop_connection` either reuses an idle
//! connection or dials a fresh one up to `pool_max_connections`. The
//! returned guard pushes its connection back on `Drop` unless explicitly
//! marked broken — the Rust idiom for "release on every return path
//! including error" that the C original reaches with `goto cleanup`.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use stratum_core::StratumError;

struct PoolInner {
    addr: (String, u16),
    idle: Mutex<VecDeque<TcpStream>>,
    permits: Semaphore,
}

/// A pool of connections to a single server.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(host: impl Into<String>, port: u16, max_connections: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                addr: (host.into(), port),
                idle: Mutex::new(VecDeque::new()),
                permits: Semaphore::new(max_connections),
            }),
        }
    }

    /// Acquire a connection, reusing an idle one or dialing a fresh one.
    pub async fn pop_connection(&self) -> Result<PooledConnection<'_>, StratumError> {
        let permit = self
            .inner
            .permits
            .acquire()
            .await
            .expect("pool semaphore is never closed");

        let existing = self.inner.idle.lock().await.pop_front();
        let stream = match existing {
            Some(stream) => stream,
            None => {
                let (host, port) = &self.inner.addr;
                TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(StratumError::Io)?
            }
        };

        Ok(PooledConnection {
            pool: self,
            stream: Some(stream),
            _permit: permit,
        })
    }
}

/// An RAII-held connection. Pushed back onto the pool's idle deque on
/// `Drop` unless [`discard`](Self::discard) was called first.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    stream: Option<TcpStream>,
    _permit: SemaphorePermit<'a>,
}

impl<'a> PooledConnection<'a> {
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        self.stream.as_mut().expect("stream taken only by discard/drop")
    }

    /// Mark this connection broken. It will not be returned to the pool.
    /// Call this after any `Wire` error observed while using the connection.
    pub fn discard(mut self) {
        self.stream = None;
    }
}

impl<'a> Drop for PooledConnection<'a> {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            // `blocking_send` via try_lock: Drop cannot be async. A pool
            // under contention may occasionally drop a reusable connection
            // rather than block here; a fresh dial on the next pop is the
            // fallback, which is correct, just not maximally efficient.
            if let Ok(mut idle) = self.pool.inner.idle.try_lock() {
                idle.push_back(stream);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn pop_connection_dials_fresh_when_idle_is_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let pool = ConnectionPool::new("127.0.0.1", addr.port(), 4);
        let conn = pool.pop_connection().await.unwrap();
        assert!(conn.stream.is_some());
    }

    #[tokio::test]
    async fn dropped_connection_is_returned_to_idle_pool() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let pool = ConnectionPool::new("127.0.0.1", addr.port(), 4);
        {
            let _conn = pool.pop_connection().await.unwrap();
        }
        // Give Drop's try_lock a moment against any lingering guard state.
        tokio::task::yield_now().await;
        assert_eq!(pool.inner.idle.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn discarded_connection_is_not_returned() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let pool = ConnectionPool::new("127.0.0.1", addr.port(), 4);
        let conn = pool.pop_connection().await.unwrap();
        conn.discard();
        tokio::task::yield_now().await;
        assert_eq!(pool.inner.idle.lock().await.len(), 0);
    }
}
