use std::any::{type_name, Any};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::bounded;
use netchan_transport::{Address, NetListener, NetStream};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::acceptor::Acceptor;
use crate::config::ChannelConfig;
use crate::connections::ConnectionSet;
use crate::error::{ChanError, Result};
use crate::pool::WorkerPool;
use crate::reader::ReadHandle;
use crate::signal::{close_signal, CloseTrigger};

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// One bound address: its listener thread, its workers and the handle
/// readers clone from.
pub(crate) struct ChannelEntry {
    address: Arc<str>,
    type_name: &'static str,
    handle: Box<dyn Any + Send + Sync>,
    trigger: CloseTrigger,
    connections: Arc<ConnectionSet>,
    accepting: Arc<AtomicBool>,
    wake: Option<Address>,
    acceptor: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl ChannelEntry {
    /// Listen on `address` and start the acceptor and worker pool.
    pub(crate) fn open<T>(address: &str, config: &ChannelConfig) -> Result<Self>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if config.workers == 0 {
            return Err(ChanError::InvalidConfig(
                "worker pool must have at least one worker".into(),
            ));
        }

        let bind_err = |source| ChanError::Bind {
            address: address.to_string(),
            source,
        };
        let parsed = Address::parse(address).map_err(bind_err)?;
        let listener = NetListener::bind(&parsed).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        let wake = match listener.wake_address() {
            Ok(wake) => Some(wake),
            Err(err) => {
                warn!(%address, error = %err, "no wake address; unbind may leave the acceptor detached");
                None
            }
        };

        let name: Arc<str> = Arc::from(address);
        let (mut trigger, closing) = close_signal();
        let (dispatch_tx, dispatch_rx) = bounded(0);
        let (output_tx, output_rx) = bounded::<T>(0);
        let connections = Arc::new(ConnectionSet::default());
        let accepting = Arc::new(AtomicBool::new(true));

        let workers = WorkerPool {
            address: Arc::clone(&name),
            dispatch: dispatch_rx,
            output: output_tx,
            closing: closing.clone(),
            codec: config.codec.clone(),
        }
        .spawn(config.workers);
        let workers = match workers {
            Ok(workers) => workers,
            Err((started, err)) => {
                trigger.fire();
                join_all(started);
                return Err(err);
            }
        };

        let acceptor = Acceptor {
            address: Arc::clone(&name),
            listener,
            dispatch: dispatch_tx,
            connections: Arc::clone(&connections),
            closing: closing.clone(),
            accepting: Arc::clone(&accepting),
            nodelay: config.nodelay,
        }
        .spawn();
        let acceptor = match acceptor {
            Ok(acceptor) => acceptor,
            Err(err) => {
                trigger.fire();
                join_all(workers);
                return Err(err);
            }
        };

        info!(
            %address,
            local = %local_addr,
            transport = local_addr.transport_name(),
            workers = config.workers,
            "channel bound"
        );

        let handle = ReadHandle::new(Arc::clone(&name), local_addr, output_rx, closing);
        Ok(Self {
            address: name,
            type_name: type_name::<T>(),
            handle: Box::new(handle),
            trigger,
            connections,
            accepting,
            wake,
            acceptor: Some(acceptor),
            workers,
        })
    }

    /// A new handle on this channel, if it carries values of type `T`.
    pub(crate) fn reader<T: 'static>(&self) -> Result<ReadHandle<T>> {
        self.handle
            .downcast_ref::<ReadHandle<T>>()
            .cloned()
            .ok_or_else(|| ChanError::TypeMismatch {
                address: self.address.to_string(),
                bound: self.type_name,
                requested: type_name::<T>(),
            })
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting, close every connection and join every thread.
    ///
    /// Idempotent; also runs on drop.
    pub(crate) fn teardown(&mut self) {
        self.trigger.fire();

        if let Some(acceptor) = self.acceptor.take() {
            if !acceptor.is_finished() && !self.wake_acceptor() {
                warn!(address = %self.address, "acceptor could not be woken; detaching it");
            } else if acceptor.join().is_err() {
                warn!(address = %self.address, "acceptor thread panicked");
            }
        }

        let closed = self.connections.shutdown_all();
        if closed > 0 {
            debug!(address = %self.address, connections = closed, "closed live connections");
        }

        let workers = std::mem::take(&mut self.workers);
        if !workers.is_empty() {
            join_all(workers);
            info!(address = %self.address, "channel unbound");
        }
    }

    /// Unblock the acceptor's pending `accept` with a throwaway connection.
    fn wake_acceptor(&self) -> bool {
        let Some(wake) = &self.wake else {
            return false;
        };
        match NetStream::connect_timeout(wake, WAKE_TIMEOUT) {
            Ok(_) => true,
            Err(err) => {
                debug!(address = %self.address, error = %err, "wake connection failed");
                false
            }
        }
    }
}

impl Drop for ChannelEntry {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }
}
