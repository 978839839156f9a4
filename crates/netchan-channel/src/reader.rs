use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use crossbeam::select;
use netchan_transport::Address;

use crate::error::{RecvError, RecvTimeoutError, TryRecvError};
use crate::signal::CloseSignal;

/// Receiving side of a bound channel.
///
/// Every clone observes the same stream of values; each value is handed
/// to exactly one receiver. Values are delivered unbuffered: a worker
/// holding a decoded value waits until some receiver takes it. Once the
/// address is unbound, every receive reports the channel as closed.
pub struct ReadHandle<T> {
    address: Arc<str>,
    local_addr: Address,
    values: Receiver<T>,
    closing: CloseSignal,
}

impl<T> ReadHandle<T> {
    pub(crate) fn new(
        address: Arc<str>,
        local_addr: Address,
        values: Receiver<T>,
        closing: CloseSignal,
    ) -> Self {
        Self {
            address,
            local_addr,
            values,
            closing,
        }
    }

    /// Block until a value arrives or the channel is closed.
    pub fn recv(&self) -> Result<T, RecvError> {
        if self.closing.is_closed() {
            return Err(RecvError);
        }
        select! {
            recv(self.values) -> value => value.map_err(|_| RecvError),
            recv(self.closing.receiver()) -> _ => Err(RecvError),
        }
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        if self.closing.is_closed() {
            return Err(RecvTimeoutError::Closed);
        }
        select! {
            recv(self.values) -> value => value.map_err(|_| RecvTimeoutError::Closed),
            recv(self.closing.receiver()) -> _ => Err(RecvTimeoutError::Closed),
            default(timeout) => Err(RecvTimeoutError::Timeout),
        }
    }

    /// Take a value only if a worker is offering one right now.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        if self.closing.is_closed() {
            return Err(TryRecvError::Closed);
        }
        self.values.try_recv().map_err(|err| match err {
            channel::TryRecvError::Empty => TryRecvError::Empty,
            channel::TryRecvError::Disconnected => TryRecvError::Closed,
        })
    }

    /// Blocking iterator that ends when the channel is closed.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { handle: self }
    }

    pub fn is_closed(&self) -> bool {
        self.closing.is_closed()
    }

    /// The address string the channel was bound under.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The address actually listened on, with any port 0 resolved.
    pub fn local_addr(&self) -> &Address {
        &self.local_addr
    }

    /// Whether both handles receive from the same bound channel.
    pub fn same_channel(&self, other: &ReadHandle<T>) -> bool {
        self.values.same_channel(&other.values)
    }
}

impl<T> Clone for ReadHandle<T> {
    fn clone(&self) -> Self {
        Self {
            address: Arc::clone(&self.address),
            local_addr: self.local_addr.clone(),
            values: self.values.clone(),
            closing: self.closing.clone(),
        }
    }
}

impl<T> fmt::Debug for ReadHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("address", &self.address)
            .field("local_addr", &self.local_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Iterator returned by [`ReadHandle::iter`].
pub struct Iter<'a, T> {
    handle: &'a ReadHandle<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.handle.recv().ok()
    }
}

impl<'a, T> IntoIterator for &'a ReadHandle<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crossbeam::channel::bounded;

    use super::*;
    use crate::signal::close_signal;

    fn handle<T>() -> (crossbeam::channel::Sender<T>, crate::signal::CloseTrigger, ReadHandle<T>) {
        let (tx, rx) = bounded(0);
        let (trigger, closing) = close_signal();
        let local = Address::parse("127.0.0.1:9").unwrap();
        (tx, trigger, ReadHandle::new(Arc::from(":9"), local, rx, closing))
    }

    #[test]
    fn recv_takes_offered_value() {
        let (tx, _trigger, reader) = handle::<u8>();
        let sender = std::thread::spawn(move || tx.send(5).unwrap());
        assert_eq!(reader.recv().unwrap(), 5);
        sender.join().unwrap();
    }

    #[test]
    fn recv_timeout_and_try_recv_report_empty() {
        let (_tx, _trigger, reader) = handle::<u8>();
        assert_eq!(
            reader.recv_timeout(Duration::from_millis(20)),
            Err(RecvTimeoutError::Timeout)
        );
        assert_eq!(reader.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn close_is_reported_everywhere() {
        let (_tx, mut trigger, reader) = handle::<u8>();
        let other = reader.clone();
        assert!(reader.same_channel(&other));

        let blocked = std::thread::spawn(move || other.recv());
        std::thread::sleep(Duration::from_millis(20));
        trigger.fire();

        assert_eq!(blocked.join().unwrap(), Err(RecvError));
        assert!(reader.is_closed());
        assert_eq!(reader.recv(), Err(RecvError));
        assert_eq!(
            reader.recv_timeout(Duration::from_millis(5)),
            Err(RecvTimeoutError::Closed)
        );
        assert_eq!(reader.try_recv(), Err(TryRecvError::Closed));
        assert_eq!(reader.iter().count(), 0);
    }

    #[test]
    fn distinct_channels_are_not_same() {
        let (_a_tx, _a, a) = handle::<u8>();
        let (_b_tx, _b, b) = handle::<u8>();
        assert!(!a.same_channel(&b));
        assert_eq!(a.address(), ":9");
    }
}
