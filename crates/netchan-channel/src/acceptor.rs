use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::Sender;
use crossbeam::select;
use netchan_transport::{NetListener, NetStream};
use tracing::{debug, warn};

use crate::connections::{Connection, ConnectionSet};
use crate::error::{ChanError, Result};
use crate::signal::CloseSignal;

/// Source of incoming connections for an accept loop.
pub(crate) trait Accept: Send + 'static {
    fn accept(&self) -> netchan_transport::Result<NetStream>;
}

impl Accept for NetListener {
    fn accept(&self) -> netchan_transport::Result<NetStream> {
        NetListener::accept(self)
    }
}

/// Everything the accept loop of one channel entry owns.
pub(crate) struct Acceptor<L = NetListener> {
    pub(crate) address: Arc<str>,
    pub(crate) listener: L,
    pub(crate) dispatch: Sender<Connection>,
    pub(crate) connections: Arc<ConnectionSet>,
    pub(crate) closing: CloseSignal,
    pub(crate) accepting: Arc<AtomicBool>,
    pub(crate) nodelay: bool,
}

impl<L: Accept> Acceptor<L> {
    pub(crate) fn spawn(self) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name(format!("netchan-accept {}", self.address))
            .spawn(move || self.run())
            .map_err(|source| ChanError::Spawn {
                role: "acceptor",
                source,
            })
    }

    fn run(self) {
        let Self {
            address,
            listener,
            dispatch,
            connections,
            closing,
            accepting,
            nodelay,
        } = self;

        loop {
            let stream = match listener.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    if !closing.is_closed() {
                        warn!(%address, error = %err, "accept failed; channel no longer accepts connections");
                    }
                    break;
                }
            };

            if closing.is_closed() {
                debug!(%address, "acceptor woken for teardown");
                break;
            }

            if let Err(err) = stream.set_nodelay(nodelay) {
                debug!(%address, error = %err, "failed to set nodelay");
            }

            let conn = match connections.track(stream) {
                Ok(Some(conn)) => conn,
                Ok(None) => break,
                Err(err) => {
                    warn!(%address, error = %err, "dropping connection that could not be tracked");
                    continue;
                }
            };
            debug!(%address, peer = %conn.peer, "dispatching connection");

            // Blocks while every worker is busy.
            select! {
                send(dispatch, conn) -> sent => {
                    if sent.is_err() {
                        break;
                    }
                }
                recv(closing.receiver()) -> _ => break,
            }
        }

        accepting.store(false, Ordering::SeqCst);
        // The listener goes before the dispatch queue so a closed queue is
        // never offered a freshly accepted connection.
        drop(listener);
        drop(dispatch);
        debug!(%address, "acceptor stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use crossbeam::channel::bounded;
    use netchan_codec::CodecConfig;
    use netchan_transport::{Address, TransportError};

    use super::*;
    use crate::pool::WorkerPool;
    use crate::signal::close_signal;

    /// Hands out queued streams, then fails every accept.
    struct FailingListener {
        queued: Mutex<Vec<NetStream>>,
    }

    impl Accept for FailingListener {
        fn accept(&self) -> netchan_transport::Result<NetStream> {
            match self.queued.lock().unwrap().pop() {
                Some(stream) => Ok(stream),
                None => Err(TransportError::Accept(std::io::Error::other(
                    "listener went away",
                ))),
            }
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn accept_failure_stops_accepting_but_keeps_serving() {
        let real = NetListener::bind(&Address::parse("127.0.0.1:0").unwrap()).unwrap();
        let mut client = NetStream::connect(&real.local_addr().unwrap()).unwrap();
        let server = real.accept().unwrap();

        let connections = Arc::new(ConnectionSet::default());
        let (dispatch_tx, dispatch_rx) = bounded(0);
        let (output_tx, output_rx) = bounded::<String>(0);
        let (mut trigger, closing) = close_signal();
        let accepting = Arc::new(AtomicBool::new(true));

        let workers = WorkerPool {
            address: Arc::from("test"),
            dispatch: dispatch_rx,
            output: output_tx,
            closing: closing.clone(),
            codec: CodecConfig::default(),
        }
        .spawn(1)
        .unwrap();

        let acceptor = Acceptor {
            address: Arc::from("test"),
            listener: FailingListener {
                queued: Mutex::new(vec![server]),
            },
            dispatch: dispatch_tx,
            connections: Arc::clone(&connections),
            closing,
            accepting: Arc::clone(&accepting),
            nodelay: true,
        }
        .spawn()
        .unwrap();

        assert!(
            wait_until(|| !accepting.load(Ordering::SeqCst)),
            "accept error should mark the channel as not accepting"
        );
        acceptor.join().expect("acceptor exits on its own");

        // The connection dispatched before the failure is still served.
        client.write_all(b"\"still here\"\n").unwrap();
        assert_eq!(
            output_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "still here"
        );
        assert_eq!(connections.len(), 1);

        trigger.fire();
        connections.shutdown_all();
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn close_signal_ends_loop_after_wake() {
        let listener = NetListener::bind(&Address::parse("127.0.0.1:0").unwrap()).unwrap();
        let wake = listener.wake_address().unwrap();
        let (dispatch_tx, _dispatch_rx) = bounded(0);
        let (mut trigger, closing) = close_signal();
        let accepting = Arc::new(AtomicBool::new(true));

        let acceptor = Acceptor {
            address: Arc::from("test"),
            listener,
            dispatch: dispatch_tx,
            connections: Arc::new(ConnectionSet::default()),
            closing,
            accepting: Arc::clone(&accepting),
            nodelay: true,
        }
        .spawn()
        .unwrap();

        trigger.fire();
        let _wake = NetStream::connect(&wake).unwrap();
        acceptor.join().expect("acceptor stops on close");
        assert!(!accepting.load(Ordering::SeqCst));
    }
}
