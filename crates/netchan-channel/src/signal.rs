use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};

/// Creates a one-shot close signal.
///
/// Nothing is ever sent on the underlying channel: dropping the trigger's
/// sender disconnects every receiver at once, which makes the close both
/// observable with [`CloseSignal::is_closed`] and selectable in `select!`.
pub(crate) fn close_signal() -> (CloseTrigger, CloseSignal) {
    let (tx, rx) = bounded(0);
    (CloseTrigger { tx: Some(tx) }, CloseSignal { rx })
}

/// Owning side of a close signal.
pub(crate) struct CloseTrigger {
    tx: Option<Sender<()>>,
}

impl CloseTrigger {
    /// Fire the signal. Idempotent.
    pub(crate) fn fire(&mut self) {
        self.tx.take();
    }
}

/// Observing side of a close signal.
#[derive(Clone)]
pub(crate) struct CloseSignal {
    rx: Receiver<()>,
}

impl CloseSignal {
    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready once the signal fires.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}
