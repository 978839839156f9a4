use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender};
use crossbeam::select;
use netchan_codec::{CodecConfig, CodecError, ValueReader};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::connections::Connection;
use crate::error::{ChanError, Result};
use crate::signal::CloseSignal;

/// How a served connection came to an end.
#[derive(Debug)]
pub(crate) enum ConnectionEnd {
    /// The peer hung up, or sent something that could not be decoded.
    ClosedByPeerOrError(CodecError),
    /// The channel was unbound while the connection was being served.
    ClosedByTeardown,
}

/// Shared inputs of the decode workers of one channel entry.
pub(crate) struct WorkerPool<T> {
    pub(crate) address: Arc<str>,
    pub(crate) dispatch: Receiver<Connection>,
    pub(crate) output: Sender<T>,
    pub(crate) closing: CloseSignal,
    pub(crate) codec: CodecConfig,
}

impl<T: DeserializeOwned + Send + 'static> WorkerPool<T> {
    /// Start `workers` threads. On failure the threads already started are
    /// returned alongside the error so the caller can join them.
    pub(crate) fn spawn(
        self,
        workers: usize,
    ) -> std::result::Result<Vec<JoinHandle<()>>, (Vec<JoinHandle<()>>, ChanError)> {
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let worker = Worker {
                address: Arc::clone(&self.address),
                dispatch: self.dispatch.clone(),
                output: self.output.clone(),
                closing: self.closing.clone(),
                codec: self.codec.clone(),
            };
            let spawned = std::thread::Builder::new()
                .name(format!("netchan-worker-{index}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    return Err((
                        handles,
                        ChanError::Spawn {
                            role: "worker",
                            source,
                        },
                    ))
                }
            }
        }
        Ok(handles)
    }
}

struct Worker<T> {
    address: Arc<str>,
    dispatch: Receiver<Connection>,
    output: Sender<T>,
    closing: CloseSignal,
    codec: CodecConfig,
}

impl<T: DeserializeOwned + Send + 'static> Worker<T> {
    fn run(self) {
        loop {
            let conn = select! {
                recv(self.dispatch) -> conn => match conn {
                    Ok(conn) => conn,
                    Err(_) => break,
                },
                recv(self.closing.receiver()) -> _ => break,
            };

            let peer = conn.peer.clone();
            match self.serve(conn) {
                ConnectionEnd::ClosedByPeerOrError(CodecError::ConnectionClosed) => {
                    debug!(address = %self.address, %peer, "peer closed connection");
                }
                ConnectionEnd::ClosedByPeerOrError(err) => {
                    warn!(address = %self.address, %peer, error = %err, "dropping connection");
                }
                ConnectionEnd::ClosedByTeardown => {
                    debug!(address = %self.address, %peer, "connection closed by unbind");
                }
            }
        }
    }

    /// Decode values off one connection and deliver them in arrival order
    /// until the connection ends.
    fn serve(&self, conn: Connection) -> ConnectionEnd {
        let Connection { stream, guard, .. } = conn;
        let mut reader = match ValueReader::with_config_net(stream, self.codec.clone()) {
            Ok(reader) => reader,
            Err(err) => return ConnectionEnd::ClosedByPeerOrError(err),
        };

        let end = loop {
            let value = match reader.read_value::<T>() {
                Ok(value) => value,
                Err(_) if self.closing.is_closed() => break ConnectionEnd::ClosedByTeardown,
                Err(err) => break ConnectionEnd::ClosedByPeerOrError(err),
            };

            // Blocks until a reader takes the value.
            select! {
                send(self.output, value) -> sent => {
                    if sent.is_err() {
                        break ConnectionEnd::ClosedByTeardown;
                    }
                }
                recv(self.closing.receiver()) -> _ => break ConnectionEnd::ClosedByTeardown,
            }
        };

        drop(reader);
        drop(guard);
        end
    }
}
