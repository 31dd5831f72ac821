//! Status subscriptions and the registry that wakes them.
//!
//! Every subscription is a task that pushes a status report, then sleeps
//! for the long interval. [`StatusRegistry::wake_all`] cuts that sleep short:
//! the task pushes immediately, sleeps the short interval once, pushes
//! again, and goes back to the long interval.
//!
//! Each subscription owns a [`Notify`]. `notify_one` stores a permit when
//! the task is not parked yet, so a wake that races with a push is
//! delivered late rather than lost.

use crate::controller::DoorController;
use garagedoor_core::StatusReport;
use garagedoor_hardware::{DigitalIo, Level, OutputPin};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Set of live subscriptions.
///
/// The status LED is lit while the set is non-empty. LED writes happen
/// under the registry lock so concurrent register/unregister calls cannot
/// leave it in the wrong state.
pub struct StatusRegistry {
    io: Arc<dyn DigitalIo>,
    subscribers: Mutex<HashMap<u64, Arc<Notify>>>,
    next_id: AtomicU64,
    wakes: AtomicU64,
}

impl StatusRegistry {
    pub fn new(io: Arc<dyn DigitalIo>) -> Self {
        Self {
            io,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            wakes: AtomicU64::new(0),
        }
    }

    /// Wake every subscription.
    pub fn wake_all(&self) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
        for notify in self.subscribers.lock().values() {
            notify.notify_one();
        }
    }

    /// Number of `wake_all` calls since creation.
    pub fn wake_count(&self) -> u64 {
        self.wakes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    fn register(&self) -> (u64, Arc<Notify>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let notify = Arc::new(Notify::new());

        let mut subscribers = self.subscribers.lock();
        subscribers.insert(id, Arc::clone(&notify));
        if subscribers.len() == 1 {
            self.set_status_led(true);
        }
        (id, notify)
    }

    fn unregister(&self, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.remove(&id).is_some() && subscribers.is_empty() {
            self.set_status_led(false);
        }
    }

    fn set_status_led(&self, on: bool) {
        if let Err(e) = self.io.set_output(OutputPin::LedStatus, Level::from_on(on)) {
            warn!(error = %e, "Unable to set status LED");
        }
    }
}

impl std::fmt::Debug for StatusRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusRegistry")
            .field("subscribers", &self.len())
            .field("wakes", &self.wake_count())
            .finish_non_exhaustive()
    }
}

/// Handle to a running subscription. Dropping it stops the task.
#[derive(Debug)]
pub struct StatusSubscription {
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StatusSubscription {
    pub(crate) fn spawn<T>(controller: Arc<DoorController>, sender: mpsc::Sender<T>) -> Self
    where
        T: From<StatusReport> + Send + 'static,
    {
        let (id, notify) = controller.registry().register();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(controller, id, notify, sender, cancel.clone()));
        debug!(id, "Status task start");

        Self { id, cancel, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task and wait for it to unregister.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!(id = self.id, error = %e, "Status task failed");
        }
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<T>(
    controller: Arc<DoorController>,
    id: u64,
    notify: Arc<Notify>,
    sender: mpsc::Sender<T>,
    cancel: CancellationToken,
) where
    T: From<StatusReport> + Send + 'static,
{
    let timings = controller.timings();
    let mut interval = timings.status_interval;

    loop {
        let report = controller.status_report();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = sender.send(T::from(report)) => {
                if sent.is_err() {
                    break;
                }
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = notify.notified() => interval = timings.status_wake_interval,
            () = tokio::time::sleep(interval) => interval = timings.status_interval,
        }
    }

    controller.registry().unregister(id);
    debug!(id, "Status task done");
}
