use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use netchan_transport::{NetStream, Result};
use tracing::debug;

/// Live connections of one channel entry.
///
/// Holds a clone of every accepted stream so teardown can shut them down
/// and wake the workers blocked reading them. Once closed, no further
/// connection is admitted.
#[derive(Default)]
pub(crate) struct ConnectionSet {
    inner: Mutex<ConnectionSetInner>,
}

#[derive(Default)]
struct ConnectionSetInner {
    closed: bool,
    next_id: u64,
    streams: HashMap<u64, NetStream>,
}

/// An accepted connection on its way to (or held by) a worker.
pub(crate) struct Connection {
    pub(crate) stream: NetStream,
    pub(crate) peer: String,
    pub(crate) guard: ConnectionGuard,
}

/// Removes the connection from its set and shuts it down on drop.
pub(crate) struct ConnectionGuard {
    id: u64,
    set: Arc<ConnectionSet>,
}

impl ConnectionSet {
    fn lock(&self) -> MutexGuard<'_, ConnectionSetInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an accepted stream.
    ///
    /// Returns `Ok(None)` when the set is already closed; the stream is
    /// dropped, closing the connection.
    pub(crate) fn track(self: &Arc<Self>, stream: NetStream) -> Result<Option<Connection>> {
        let tracked = stream.try_clone()?;
        let peer = stream.peer_label();

        let mut inner = self.lock();
        if inner.closed {
            return Ok(None);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.streams.insert(id, tracked);

        Ok(Some(Connection {
            stream,
            peer,
            guard: ConnectionGuard {
                id,
                set: Arc::clone(self),
            },
        }))
    }

    /// Close the set and shut down every live connection.
    ///
    /// Returns how many connections were shut down.
    pub(crate) fn shutdown_all(&self) -> usize {
        let streams: Vec<NetStream> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.streams.drain().map(|(_, stream)| stream).collect()
        };
        for stream in &streams {
            if let Err(err) = stream.shutdown() {
                debug!(error = %err, "connection shutdown failed");
            }
        }
        streams.len()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().streams.len()
    }

    fn release(&self, id: u64) {
        let stream = self.lock().streams.remove(&id);
        if let Some(stream) = stream {
            let _ = stream.shutdown();
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.set.release(self.id);
    }
}
