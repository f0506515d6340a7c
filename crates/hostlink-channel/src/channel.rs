use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use hostlink_wire::{Call, Message, MessageReader, MessageWriter, Reply, WireError};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::demux::{DemuxState, QueueLimits};
use crate::error::{ChannelError, HandlerResult, Result};
use crate::registry::{MethodRegistry, Registered};
use crate::worker::WorkerPool;

/// Tuning knobs for a channel instance.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Socket read timeout granularity. A waiter that owns the stream
    /// blocks at most this long per read before yielding readership, so
    /// call deadlines are observed even while the stream is idle.
    pub read_slice: Duration,
    /// Maximum number of decoded replies nobody has claimed yet.
    pub max_unclaimed_replies: usize,
    /// How long an unclaimed reply may sit queued before it is dropped.
    pub unclaimed_reply_ttl: Duration,
    /// Maximum number of inbound calls awaiting dispatch.
    pub max_pending_calls: usize,
    /// Worker threads executing async-mode handlers.
    pub worker_threads: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_slice: Duration::from_millis(200),
            max_unclaimed_replies: 64,
            unclaimed_reply_ttl: Duration::from_secs(30),
            max_pending_calls: 256,
            worker_threads: 2,
        }
    }
}

/// A control channel over a connected Unix socket.
pub type SocketChannel = ControlChannel<UnixStream, UnixStream>;

/// One end of the bidirectional control channel.
///
/// Cheap to clone; clones share the underlying stream, correlation counter,
/// registry and pending-reply state. Any number of threads may issue calls
/// concurrently — replies are demultiplexed back to the thread that made
/// each call, and at most one thread performs physical reads at a time.
pub struct ControlChannel<R, W> {
    shared: Arc<Shared<R, W>>,
}

impl<R, W> Clone for ControlChannel<R, W> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<R, W> {
    reader: Mutex<MessageReader<R>>,
    writer: Mutex<MessageWriter<W>>,
    demux: Mutex<DemuxState>,
    wakeup: Condvar,
    next_reply_id: AtomicU64,
    registry: MethodRegistry,
    workers: Arc<WorkerPool>,
    limits: QueueLimits,
    closer: Option<Box<dyn Fn() + Send + Sync>>,
}

impl<R, W> Shared<R, W> {
    fn lock_demux(&self) -> MutexGuard<'_, DemuxState> {
        self.demux.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_reader(&self) -> MutexGuard<'_, MessageReader<R>> {
        self.reader.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_writer(&self) -> MutexGuard<'_, MessageWriter<W>> {
        self.writer.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ControlChannel<UnixStream, UnixStream> {
    /// Build a channel over a connected socket with default configuration
    /// and a private worker pool.
    pub fn over(stream: UnixStream) -> std::io::Result<Self> {
        let config = ChannelConfig::default();
        let workers = Arc::new(WorkerPool::new(config.worker_threads)?);
        Self::over_with(stream, config, workers)
    }

    /// Build a channel over a connected socket with explicit configuration
    /// and a caller-owned worker pool.
    pub fn over_with(
        stream: UnixStream,
        config: ChannelConfig,
        workers: Arc<WorkerPool>,
    ) -> std::io::Result<Self> {
        stream.set_read_timeout(Some(config.read_slice))?;
        let read_half = stream.try_clone()?;
        let shutdown_handle = stream.try_clone()?;
        let closer: Box<dyn Fn() + Send + Sync> = Box::new(move || {
            let _ = shutdown_handle.shutdown(Shutdown::Both);
        });
        Ok(Self::assemble(
            MessageReader::new(read_half),
            MessageWriter::new(stream),
            config,
            workers,
            Some(closer),
        ))
    }
}

impl<R: Read, W: Write> ControlChannel<R, W> {
    /// Build a channel from pre-constructed reader/writer halves.
    ///
    /// Intended for custom transports and instrumented streams in tests.
    /// No read timeout is applied to the halves, so call deadlines are only
    /// observed while data keeps arriving.
    pub fn from_parts(
        reader: MessageReader<R>,
        writer: MessageWriter<W>,
        config: ChannelConfig,
        workers: Arc<WorkerPool>,
    ) -> Self {
        Self::assemble(reader, writer, config, workers, None)
    }

    fn assemble(
        reader: MessageReader<R>,
        writer: MessageWriter<W>,
        config: ChannelConfig,
        workers: Arc<WorkerPool>,
        closer: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                reader: Mutex::new(reader),
                writer: Mutex::new(writer),
                demux: Mutex::new(DemuxState::new()),
                wakeup: Condvar::new(),
                next_reply_id: AtomicU64::new(0),
                registry: MethodRegistry::new(),
                workers,
                limits: QueueLimits {
                    max_unclaimed_replies: config.max_unclaimed_replies,
                    unclaimed_reply_ttl: config.unclaimed_reply_ttl,
                    max_pending_calls: config.max_pending_calls,
                },
                closer,
            }),
        }
    }

    /// Invoke a named remote operation and block until its reply arrives.
    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.call_inner(method, args, None)
    }

    /// Invoke a named remote operation with a deadline.
    ///
    /// On expiry the call fails locally with [`ChannelError::Timeout`]; a
    /// reply that arrives later is queued unclaimed and eventually evicted.
    pub fn call_with_timeout(
        &self,
        method: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.call_inner(method, args, Some(timeout))
    }

    fn call_inner(
        &self,
        method: &str,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let id = format!(
            "reply_{}",
            self.shared.next_reply_id.fetch_add(1, Ordering::Relaxed)
        );
        let deadline = timeout.map(|t| (Instant::now() + t, t));
        debug!(method, correlation = %id, "issuing call");
        self.write_message(&Message::Call(Call::new(method, args, id.clone())))?;
        let reply = self.await_queued(|demux| demux.take_reply(&id), deadline)?;
        reply.into_result().map_err(ChannelError::Remote)
    }

    /// Send a fire-and-forget call: no correlation id, no reply expected,
    /// no waiter registered.
    pub fn notify(&self, method: &str, args: Vec<Value>) -> Result<()> {
        debug!(method, "sending fire-and-forget call");
        self.write_message(&Message::Call(Call::fire_and_forget(method, args)))
    }

    /// Block until the remote endpoint sends an inbound call.
    ///
    /// Participates in the same reader-ownership protocol as reply waiters,
    /// so it can run concurrently with any number of outbound calls.
    pub fn recv_call(&self) -> Result<Call> {
        self.await_queued(|demux| demux.take_call(), None)
    }

    /// The registry of locally callable methods on this channel.
    pub fn registry(&self) -> &MethodRegistry {
        &self.shared.registry
    }

    /// Mark the channel closed and unblock everyone waiting on it.
    ///
    /// All outstanding calls fail with [`ChannelError::Closed`]; future
    /// calls fail fast.
    pub fn close(&self) {
        {
            let mut demux = self.shared.lock_demux();
            demux.close("channel closed locally");
        }
        if let Some(closer) = &self.shared.closer {
            closer();
        }
        self.shared.wakeup.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock_demux().closed_reason().is_some()
    }

    /// Wait for one queued item, becoming the physical reader when the
    /// stream has no owner.
    ///
    /// The protocol: scan the queues first; if another thread owns the
    /// stream, park on the condvar; otherwise take readership, decode one
    /// message, queue it and wake everyone. No decoded message is ever
    /// dropped — a reply read "for" someone else stays queued until its
    /// waiter claims it.
    fn await_queued<T>(
        &self,
        mut take: impl FnMut(&mut DemuxState) -> Option<T>,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<T> {
        let shared = &*self.shared;
        let mut demux = shared.lock_demux();
        loop {
            if let Some(item) = take(&mut demux) {
                return Ok(item);
            }
            if let Some(reason) = demux.closed_reason() {
                return Err(ChannelError::Closed(reason.to_string()));
            }
            if let Some((at, dur)) = deadline {
                if Instant::now() >= at {
                    return Err(ChannelError::Timeout(dur));
                }
            }

            if demux.reader_busy() {
                // Another thread is on the stream and will queue whatever
                // it decodes; a second physical read must not start.
                demux = match deadline {
                    Some((at, _)) => {
                        let remaining = at.saturating_duration_since(Instant::now());
                        let (guard, _) = shared
                            .wakeup
                            .wait_timeout(demux, remaining)
                            .unwrap_or_else(|p| p.into_inner());
                        guard
                    }
                    None => shared
                        .wakeup
                        .wait(demux)
                        .unwrap_or_else(|p| p.into_inner()),
                };
                continue;
            }

            demux.set_reader_busy(true);
            drop(demux);
            let outcome = {
                let mut reader = shared.lock_reader();
                reader.read_message()
            };
            demux = shared.lock_demux();
            demux.set_reader_busy(false);

            match outcome {
                Ok(Message::Reply(reply)) => demux.push_reply(reply, &shared.limits),
                Ok(Message::Call(call)) => demux.push_call(call, &shared.limits),
                Err(WireError::ReadTimedOut) => {
                    // Nothing arrived within the read slice. Yield
                    // readership so other waiters can check their
                    // deadlines; partial bytes stay buffered.
                }
                Err(err) => {
                    let err = ChannelError::from_wire(err);
                    demux.close(err.to_string());
                    shared.wakeup.notify_all();
                    return Err(err);
                }
            }
            shared.wakeup.notify_all();
        }
    }

    fn write_message(&self, msg: &Message) -> Result<()> {
        {
            let demux = self.shared.lock_demux();
            if let Some(reason) = demux.closed_reason() {
                return Err(ChannelError::Closed(reason.to_string()));
            }
        }

        let result = {
            let mut writer = self.shared.lock_writer();
            writer.write_message(msg)
        };
        match result {
            Ok(()) => Ok(()),
            // Encoding failed before anything hit the wire; the stream is
            // still in sync.
            Err(WireError::Encode(e)) => Err(ChannelError::Encode(e.to_string())),
            Err(err) => {
                let err = ChannelError::from_wire(err);
                self.mark_closed(&err);
                Err(err)
            }
        }
    }

    fn mark_closed(&self, err: &ChannelError) {
        {
            let mut demux = self.shared.lock_demux();
            demux.close(err.to_string());
        }
        self.shared.wakeup.notify_all();
    }

    fn send_reply(&self, reply: Reply) {
        if let Err(err) = self.write_message(&Message::Reply(reply)) {
            error!(error = %err, "failed to write reply");
        }
    }
}

impl<R, W> ControlChannel<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    /// Route one inbound call through the registry.
    ///
    /// Sync handlers run here; async handlers are handed to the worker
    /// pool and their reply is written whenever the worker finishes. A
    /// failing handler produces an error reply for this call only.
    pub fn dispatch(&self, call: Call) {
        let Call {
            method,
            args,
            reply_id,
        } = call;

        match self.shared.registry.lookup(&method) {
            None => {
                warn!(method, "call to unregistered method");
                if let Some(id) = reply_id {
                    self.send_reply(Reply::err(id, format!("unknown method: {method}")));
                }
            }
            Some(Registered::Sync(handler)) => {
                let outcome = handler.handle(&args);
                self.finish_call(&method, reply_id, outcome);
            }
            Some(Registered::Async(handler)) => {
                let channel = self.clone();
                self.shared.workers.execute(move || {
                    let outcome = handler.handle(&args);
                    channel.finish_call(&method, reply_id, outcome);
                });
            }
        }
    }

    fn finish_call(&self, method: &str, reply_id: Option<String>, outcome: HandlerResult) {
        match reply_id {
            Some(id) => {
                let reply = match outcome {
                    Ok(value) => Reply::ok(id, value),
                    Err(err) => {
                        warn!(method, error = %err, "handler failed");
                        Reply::err(id, err.to_string())
                    }
                };
                self.send_reply(reply);
            }
            None => {
                if let Err(err) = outcome {
                    warn!(method, error = %err, "fire-and-forget handler failed");
                }
            }
        }
    }

    /// Receive and dispatch inbound calls until the channel closes.
    ///
    /// Returns `Ok(())` on a clean close or peer disconnect; a protocol or
    /// I/O failure is returned to the owner, who should drop the channel.
    pub fn serve(&self) -> Result<()> {
        loop {
            match self.recv_call() {
                Ok(call) => self.dispatch(call),
                Err(ChannelError::Closed(reason)) => {
                    debug!(%reason, "dispatch loop stopped");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run [`serve`](Self::serve) on a dedicated thread.
    pub fn spawn_dispatcher(&self) -> std::io::Result<std::thread::JoinHandle<Result<()>>> {
        let channel = self.clone();
        std::thread::Builder::new()
            .name("hostlink-dispatch".to_string())
            .spawn(move || channel.serve())
    }
}

/// A connected channel pair over a socketpair, for in-process tests.
#[cfg(test)]
pub(crate) fn test_pair() -> (SocketChannel, SocketChannel) {
    let (left, right) = UnixStream::pair().unwrap();
    (
        ControlChannel::over(left).unwrap(),
        ControlChannel::over(right).unwrap(),
    )
}
