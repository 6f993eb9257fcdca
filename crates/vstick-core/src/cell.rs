use tokio::sync::watch;

/// Single owner of one piece of session state.
///
/// Readers call [`StateCell::get`] or hold a [`watch::Receiver`] from
/// [`StateCell::subscribe`]; only the owning component writes.
#[derive(Debug)]
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + PartialEq> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Last write wins. Receivers are only woken when the value changes.
    pub(crate) fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|cur| {
            if *cur == value {
                false
            } else {
                *cur = value;
                true
            }
        })
    }
}
