use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, bounded, Receiver, Sender};
use netchan_codec::{CodecError, ValueWriter};
use netchan_transport::{Address, NetStream};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::WriterConfig;
use crate::error::{ChanError, Result, SendError, SendTimeoutError};

/// Lifecycle of a writer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected and idle.
    Open,
    /// At least one value has been handed to the encoder.
    Sending,
    /// The caller closed the session; the connection is shut down.
    ClosedByCaller,
    /// Encoding or writing failed; the connection is shut down.
    ClosedByError,
}

impl SessionState {
    const OPEN: u8 = 0;
    const SENDING: u8 = 1;
    const CLOSED_BY_CALLER: u8 = 2;
    const CLOSED_BY_ERROR: u8 = 3;

    fn to_u8(self) -> u8 {
        match self {
            Self::Open => Self::OPEN,
            Self::Sending => Self::SENDING,
            Self::ClosedByCaller => Self::CLOSED_BY_CALLER,
            Self::ClosedByError => Self::CLOSED_BY_ERROR,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            Self::OPEN => Self::Open,
            Self::SENDING => Self::Sending,
            Self::CLOSED_BY_CALLER => Self::ClosedByCaller,
            _ => Self::ClosedByError,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::ClosedByCaller | Self::ClosedByError)
    }
}

#[derive(Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SessionState::OPEN)))
    }

    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: SessionState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }

    fn mark_sending(&self) {
        let _ = self.0.compare_exchange(
            SessionState::OPEN,
            SessionState::SENDING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// Dial `address` and start a writer session for values of type `T`.
pub fn open<T>(address: &str) -> Result<WriteHandle<T>>
where
    T: Serialize + Send + 'static,
{
    open_with_config(address, WriterConfig::default())
}

/// Like [`open`] with an explicit configuration.
pub fn open_with_config<T>(address: &str, config: WriterConfig) -> Result<WriteHandle<T>>
where
    T: Serialize + Send + 'static,
{
    let dial_err = |source| ChanError::Dial {
        address: address.to_string(),
        source,
    };
    let parsed = Address::parse(address).map_err(dial_err)?;
    let stream = NetStream::connect(&parsed).map_err(dial_err)?;
    if let Err(err) = stream.set_nodelay(config.nodelay) {
        debug!(%address, error = %err, "failed to set nodelay");
    }
    let peer = stream.peer_label();
    let writer = ValueWriter::with_config_net(stream, config.codec)?;

    let name: Arc<str> = Arc::from(address);
    let state = SharedState::new();
    let (input_tx, input_rx) = bounded::<T>(0);

    let encoder = {
        let address = Arc::clone(&name);
        let state = state.clone();
        std::thread::Builder::new()
            .name("netchan-write".into())
            .spawn(move || encode_loop(&address, writer, input_rx, &state))
            .map_err(|source| ChanError::Spawn {
                role: "writer",
                source,
            })?
    };

    debug!(%address, %peer, "writer session opened");
    Ok(WriteHandle {
        address: name,
        input: Some(input_tx),
        state,
        encoder: Some(encoder),
    })
}

/// Encode values from `input` onto the connection until the input queue
/// disconnects or a write fails.
fn encode_loop<T: Serialize>(
    address: &str,
    mut writer: ValueWriter<NetStream>,
    input: Receiver<T>,
    state: &SharedState,
) -> std::result::Result<(), CodecError> {
    while let Ok(value) = input.recv() {
        if let Err(err) = writer.write_value(&value) {
            warn!(%address, error = %err, "writer session failed");
            state.set(SessionState::ClosedByError);
            // Disconnect the input first so pending and later sends fail.
            drop(input);
            let _ = writer.get_ref().shutdown();
            return Err(err);
        }
    }

    let _ = writer.get_ref().shutdown();
    state.set(SessionState::ClosedByCaller);
    debug!(%address, "writer session closed");
    Ok(())
}

/// Sending side of a writer session.
///
/// Values are handed to the session's encode thread one at a time; a send
/// returns once the encoder has taken the value. Dropping the handle closes
/// the session without waiting for the encoder.
pub struct WriteHandle<T> {
    address: Arc<str>,
    input: Option<Sender<T>>,
    state: SharedState,
    encoder: Option<JoinHandle<std::result::Result<(), CodecError>>>,
}

impl<T> WriteHandle<T> {
    /// Hand `value` to the encoder, blocking until it is taken.
    ///
    /// Fails, returning the value, once the session is closed.
    pub fn send(&self, value: T) -> std::result::Result<(), SendError<T>> {
        let Some(input) = &self.input else {
            return Err(SendError(value));
        };
        input
            .send(value)
            .map_err(|err| SendError(err.into_inner()))?;
        self.state.mark_sending();
        Ok(())
    }

    /// Like [`send`](Self::send), giving up after `timeout`.
    pub fn send_timeout(
        &self,
        value: T,
        timeout: Duration,
    ) -> std::result::Result<(), SendTimeoutError<T>> {
        let Some(input) = &self.input else {
            return Err(SendTimeoutError::Closed(value));
        };
        input.send_timeout(value, timeout).map_err(|err| match err {
            channel::SendTimeoutError::Timeout(value) => SendTimeoutError::Timeout(value),
            channel::SendTimeoutError::Disconnected(value) => SendTimeoutError::Closed(value),
        })?;
        self.state.mark_sending();
        Ok(())
    }

    /// Close the session and wait for the encoder to finish.
    ///
    /// Returns the encoder's error if the session had already failed.
    pub fn close(mut self) -> Result<()> {
        self.input.take();
        match self.encoder.take().map(JoinHandle::join) {
            Some(Ok(Ok(()))) | None => Ok(()),
            Some(Ok(Err(err))) => Err(ChanError::Encode(err)),
            Some(Err(_)) => Err(ChanError::SessionPanicked),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// The address string the session was opened with.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl<T> Drop for WriteHandle<T> {
    fn drop(&mut self) {
        self.input.take();
    }
}

impl<T> fmt::Debug for WriteHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("address", &self.address)
            .field("state", &self.state())
            .finish()
    }
}
