//! Per-source work channels.
//!
//! A [`Channel`] queues the requests of one dispatch that go to one source.
//! The producer adds requests and calls [`Channel::done`]; a single worker
//! consumes them in order through a [`ChannelIter`], executing each against
//! one connection to the source.

use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};

use fedstore_core::{Connection, Error, Request, Response, WorkSource};
use tokio::sync::mpsc;

use crate::WorkerPool;

/// A count-down latch.
///
/// [`CompletionLatch::wait`] blocks until [`CompletionLatch::count_down`]
/// has been called `count` times.
#[derive(Debug)]
pub struct CompletionLatch {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        CompletionLatch {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.released.notify_all();
            }
        }
    }

    pub fn count(&self) -> usize {
        *self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_released(&self) -> bool {
        self.count() == 0
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            remaining = self
                .released
                .wait(remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Counts a latch down when dropped.
struct ReleaseOnDrop(Arc<CompletionLatch>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

type Slot = Arc<OnceLock<Result<Response, Error>>>;

/// Handle to the outcome of one queued request.
#[derive(Clone, Debug)]
pub struct Ticket {
    slot: Slot,
    finished: Arc<CompletionLatch>,
}

impl Ticket {
    /// The outcome, if the request has finished.
    pub fn outcome(&self) -> Option<Result<Response, Error>> {
        self.slot.get().cloned()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_released()
    }

    /// Block until the request has finished and return its outcome.
    pub fn wait(&self) -> Result<Response, Error> {
        self.finished.wait();
        self.outcome()
            .unwrap_or_else(|| Err(Error::execution("request finished without an outcome")))
    }
}

/// A request waiting in a channel.
///
/// Finishing it records the outcome and releases its signals. A request
/// dropped before it is finished fails with an execution error.
#[derive(Debug)]
pub struct QueuedRequest {
    request: Request,
    slot: Slot,
    finished: Arc<CompletionLatch>,
    signal: Option<Arc<CompletionLatch>>,
}

impl QueuedRequest {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn finish(self, outcome: Result<Response, Error>) {
        self.record(outcome);
    }

    fn record(&self, outcome: Result<Response, Error>) {
        if self.slot.set(outcome).is_ok() {
            self.finished.count_down();
            if let Some(signal) = &self.signal {
                signal.count_down();
            }
        }
    }
}

impl Drop for QueuedRequest {
    fn drop(&mut self) {
        self.record(Err(Error::execution("request was dropped before it ran")));
    }
}

/// An ordered, closable queue of requests for one source.
///
/// Adding never blocks. Once [`Channel::done`] is called no more requests
/// are accepted, and the channel's iterator ends after the last queued one.
///
/// # Example
///
/// ```rust
/// use fedstore_core::{path, Command, Request};
/// use fedstore_federation::Channel;
///
/// let channel = Channel::new("cars");
/// let mut requests = channel.create_iterator().unwrap();
///
/// channel.add(Request::new(Command::ReadNode { at: path!("/a") })).unwrap();
/// channel.done();
///
/// assert!(requests.has_next());
/// let queued = requests.next().unwrap();
/// assert_eq!(queued.request().path(), &path!("/a"));
/// assert!(!requests.has_next());
/// ```
#[derive(Debug)]
pub struct Channel {
    source_name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedRequest>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueuedRequest>>>,
    completed: Arc<CompletionLatch>,
}

impl Channel {
    pub fn new(source_name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Channel {
            source_name: source_name.into(),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            completed: Arc::new(CompletionLatch::new(1)),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Queue a request.
    ///
    /// Fails with [`Error::ChannelClosed`] after [`Channel::done`].
    pub fn add(&self, request: Request) -> Result<Ticket, Error> {
        self.enqueue(request, None)
    }

    /// Queue a request whose completion also counts down `signal`.
    pub fn add_with_signal(
        &self,
        request: Request,
        signal: Arc<CompletionLatch>,
    ) -> Result<Ticket, Error> {
        self.enqueue(request, Some(signal))
    }

    /// Queue a request and block until it has run.
    pub fn add_and_await(&self, request: Request) -> Result<Response, Error> {
        self.add(request)?.wait()
    }

    fn enqueue(
        &self,
        request: Request,
        signal: Option<Arc<CompletionLatch>>,
    ) -> Result<Ticket, Error> {
        let closed = || Error::ChannelClosed {
            source_name: self.source_name.clone(),
        };
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or_else(closed)?;

        let ticket = Ticket {
            slot: Arc::new(OnceLock::new()),
            finished: Arc::new(CompletionLatch::new(1)),
        };
        let queued = QueuedRequest {
            request,
            slot: Arc::clone(&ticket.slot),
            finished: Arc::clone(&ticket.finished),
            signal,
        };
        // If the consumer is gone, the returned request is dropped here and
        // fails on its own.
        sender.send(queued).map_err(|_| closed())?;
        Ok(ticket)
    }

    /// Close the channel to new requests. Later calls have no effect.
    pub fn done(&self) {
        if self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            tracing::trace!(source = %self.source_name, "channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Take the channel's single consuming iterator.
    ///
    /// Fails if the iterator was already taken.
    pub fn create_iterator(&self) -> Result<ChannelIter, Error> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|receiver| ChannelIter {
                receiver,
                next: None,
                finished: false,
            })
            .ok_or_else(|| {
                Error::execution(format!(
                    "channel for source '{}' is already being consumed",
                    self.source_name
                ))
            })
    }

    /// Drain the channel on `pool`, executing every request against one
    /// connection to the channel's source.
    ///
    /// Opening the connection is tried `1 + retry_limit` times. If it never
    /// succeeds every queued and future request fails with that error.
    pub fn start(
        &self,
        pool: &WorkerPool,
        work_source: Arc<dyn WorkSource>,
        retry_limit: u32,
    ) -> Result<(), Error> {
        let requests = self.create_iterator()?;
        let source_name = self.source_name.clone();
        let completed = ReleaseOnDrop(Arc::clone(&self.completed));
        pool.spawn(move || {
            let _completed = completed;
            drain(&source_name, requests, work_source.as_ref(), retry_limit);
        })
    }

    /// Block until the worker has run every request and closed its
    /// connection.
    pub fn await_completion(&self) {
        self.completed.wait();
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_released()
    }
}

/// The consuming side of a [`Channel`].
///
/// [`ChannelIter::has_next`] blocks until a request is available or the
/// channel is closed and empty.
#[derive(Debug)]
pub struct ChannelIter {
    receiver: mpsc::UnboundedReceiver<QueuedRequest>,
    next: Option<QueuedRequest>,
    finished: bool,
}

impl ChannelIter {
    pub fn has_next(&mut self) -> bool {
        if self.next.is_some() {
            return true;
        }
        if self.finished {
            return false;
        }
        match self.receiver.blocking_recv() {
            Some(queued) => {
                self.next = Some(queued);
                true
            }
            None => {
                self.finished = true;
                false
            }
        }
    }
}

impl Iterator for ChannelIter {
    type Item = QueuedRequest;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            self.next.take()
        } else {
            None
        }
    }
}

/// Open a connection, retrying up to `retry_limit` more times.
pub(crate) fn connect(
    work_source: &dyn WorkSource,
    source_name: &str,
    retry_limit: u32,
) -> Result<Box<dyn Connection>, Error> {
    let mut attempt = 0;
    loop {
        match work_source.create_connection(source_name) {
            Ok(connection) => return Ok(connection),
            Err(e) if attempt < retry_limit => {
                attempt += 1;
                tracing::warn!(source = source_name, attempt, error = %e, "retrying connection");
            }
            Err(e) => {
                tracing::warn!(source = source_name, error = %e, "giving up on connection");
                return Err(e);
            }
        }
    }
}

fn drain(source_name: &str, requests: ChannelIter, work_source: &dyn WorkSource, retry_limit: u32) {
    let mut connection = match connect(work_source, source_name, retry_limit) {
        Ok(connection) => connection,
        Err(e) => {
            for queued in requests {
                queued.finish(Err(e.clone()));
            }
            return;
        }
    };

    let mut executed = 0usize;
    for queued in requests {
        let outcome = connection.execute(queued.request());
        if let Err(e) = &outcome {
            tracing::debug!(source = source_name, error = %e, "request failed");
        }
        queued.finish(outcome);
        executed += 1;
    }
    connection.close();
    tracing::debug!(source = source_name, executed, "channel drained");
}
