use std::num::NonZeroUsize;
use std::time::Duration;

use send_limit::OnSend;
use send_limit::SlidingWindow;
use send_limit::Strategy;
use send_limit::Throttler;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::sleep;
use tokio::time::sleep_until;
use tracing::debug;
use tracing::info;

use crate::DispatchError;

const DEFAULT_BUFFER: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

/// A message of any category, erased so one channel can carry them all.
trait Submit<H, C, S>: Send {
    fn submit(self: Box<Self>, throttler: &mut Throttler<H, C, S>) -> Duration;
}

struct Envelope<M>(M);

impl<H, C, S, M> Submit<H, C, S> for Envelope<M>
where
    H: Send + 'static,
    C: OnSend<H> + OnSend<M>,
    S: Strategy,
    M: Send + 'static,
{
    fn submit(self: Box<Self>, throttler: &mut Throttler<H, C, S>) -> Duration {
        throttler.try_send(self.0)
    }
}

type Inbound<H, C, S> = Box<dyn Submit<H, C, S>>;

/// Producer side of a running [`Dispatcher`].
///
/// Cheap to clone. The worker shuts down once every handle has been dropped.
pub struct DispatchHandle<H, C, S = SlidingWindow> {
    sender: mpsc::Sender<Inbound<H, C, S>>,
}

// Deriving Clone would require H, C and S to be Clone.
impl<H, C, S> Clone for DispatchHandle<H, C, S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<H, C, S> DispatchHandle<H, C, S>
where
    H: Send + 'static,
    C: OnSend<H>,
    S: Strategy,
{
    /// Queue `message` for the worker, waiting if the channel is full.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] if the worker has stopped.
    pub async fn send<M>(&self, message: M) -> Result<(), DispatchError>
    where
        M: Send + 'static,
        C: OnSend<M>,
    {
        let envelope: Inbound<H, C, S> = Box::new(Envelope(message));
        self.sender
            .send(envelope)
            .await
            .map_err(|_| DispatchError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Owns a [`Throttler`] and drives it from a dedicated tokio task.
#[derive(Debug)]
pub struct Dispatcher<H, C, S = SlidingWindow> {
    throttler: Throttler<H, C, S>,
    buffer: NonZeroUsize,
}

impl<H, C, S> Dispatcher<H, C, S>
where
    H: Send + 'static,
    C: OnSend<H> + Send + 'static,
    S: Strategy + Send + 'static,
{
    pub fn new(throttler: Throttler<H, C, S>) -> Self {
        Self {
            throttler,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Set how many inbound messages may wait in the channel before
    /// producers are made to wait.
    pub fn with_buffer(mut self, buffer: NonZeroUsize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Start the worker.
    ///
    /// The returned join handle resolves to the throttler once all handles
    /// are dropped and every queued message has been sent.
    pub fn spawn(self) -> (DispatchHandle<H, C, S>, JoinHandle<Throttler<H, C, S>>) {
        let (sender, inbound) = mpsc::channel(self.buffer.get());
        let worker = tokio::spawn(run(self.throttler, inbound));
        (DispatchHandle { sender }, worker)
    }
}

async fn run<H, C, S>(
    mut throttler: Throttler<H, C, S>,
    mut inbound: mpsc::Receiver<Inbound<H, C, S>>,
) -> Throttler<H, C, S>
where
    H: Send + 'static,
    C: OnSend<H>,
    S: Strategy,
{
    let mut scheduled: Option<Instant> = None;

    loop {
        // Only polled when a drain is scheduled
        let deadline = scheduled.unwrap_or_else(Instant::now);

        tokio::select! {
            received = inbound.recv() => {
                let Some(envelope) = received else {
                    break;
                };
                let delay = envelope.submit(&mut throttler);
                scheduled = reschedule(&throttler, scheduled, delay);
            }
            _ = sleep_until(deadline), if scheduled.is_some() => {
                let delay = throttler.send_queued();
                scheduled = reschedule(&throttler, None, delay);
            }
        }
    }

    info!(
        pending = throttler.pending(),
        "all handles dropped; flushing queued messages"
    );
    loop {
        let delay = throttler.send_queued();
        if delay.is_zero() {
            break;
        }
        sleep(delay).await;
    }
    info!("dispatcher stopped");

    throttler
}

/// Work out when the next drain is due after a call returned `delay`.
fn reschedule<H, C, S>(
    throttler: &Throttler<H, C, S>,
    current: Option<Instant>,
    delay: Duration,
) -> Option<Instant> {
    if !delay.is_zero() {
        debug!(?delay, pending = throttler.pending(), "drain scheduled");
        Some(Instant::now() + delay)
    } else if throttler.is_drained() {
        None
    } else {
        // A direct send got through while older messages still wait
        current.or_else(|| Some(Instant::now()))
    }
}
