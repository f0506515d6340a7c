use std::collections::VecDeque;
use std::time::{Duration, Instant};

use hostlink_wire::{Call, Reply};
use tracing::warn;

/// Bounds on the demux queues.
///
/// A caller that timed out leaves its reply unclaimed when it eventually
/// arrives; without a bound such entries would accumulate forever. The
/// inbound-call queue is bounded too, against a peer that sends calls faster
/// than dispatch drains them.
#[derive(Debug, Clone)]
pub(crate) struct QueueLimits {
    pub max_unclaimed_replies: usize,
    pub unclaimed_reply_ttl: Duration,
    pub max_pending_calls: usize,
}

struct QueuedReply {
    reply: Reply,
    queued_at: Instant,
}

/// Shared demultiplexer state, guarded by the channel's single lock.
///
/// Holds replies read off the stream but not yet claimed by their waiter,
/// inbound calls not yet taken by the dispatch loop, the reader-ownership
/// flag, and the closed reason once the channel is broken.
pub(crate) struct DemuxState {
    replies: VecDeque<QueuedReply>,
    calls: VecDeque<Call>,
    reader_busy: bool,
    closed: Option<String>,
}

impl DemuxState {
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            calls: VecDeque::new(),
            reader_busy: false,
            closed: None,
        }
    }

    /// Remove and return the queued reply matching `id`, if present.
    pub fn take_reply(&mut self, id: &str) -> Option<Reply> {
        let pos = self.replies.iter().position(|q| q.reply.id == id)?;
        self.replies.remove(pos).map(|q| q.reply)
    }

    /// Queue a freshly decoded reply, pruning stale unclaimed entries.
    pub fn push_reply(&mut self, reply: Reply, limits: &QueueLimits) {
        let now = Instant::now();
        while let Some(front) = self.replies.front() {
            if now.duration_since(front.queued_at) > limits.unclaimed_reply_ttl {
                let stale = self.replies.pop_front();
                if let Some(stale) = stale {
                    warn!(id = %stale.reply.id, "dropping stale unclaimed reply");
                }
            } else {
                break;
            }
        }
        while self.replies.len() >= limits.max_unclaimed_replies {
            if let Some(evicted) = self.replies.pop_front() {
                warn!(id = %evicted.reply.id, "unclaimed reply queue full; evicting oldest");
            }
        }
        self.replies.push_back(QueuedReply {
            reply,
            queued_at: now,
        });
    }

    /// Remove and return the oldest inbound call, if any.
    pub fn take_call(&mut self) -> Option<Call> {
        self.calls.pop_front()
    }

    /// Queue an inbound call, evicting the oldest when the queue is full.
    pub fn push_call(&mut self, call: Call, limits: &QueueLimits) {
        while self.calls.len() >= limits.max_pending_calls {
            if let Some(evicted) = self.calls.pop_front() {
                warn!(method = %evicted.method, "inbound call queue full; evicting oldest");
            }
        }
        self.calls.push_back(call);
    }

    pub fn reader_busy(&self) -> bool {
        self.reader_busy
    }

    pub fn set_reader_busy(&mut self, busy: bool) {
        self.reader_busy = busy;
    }

    /// Record the first fatal failure; later failures keep the original
    /// reason.
    pub fn close(&mut self, reason: impl Into<String>) {
        if self.closed.is_none() {
            self.closed = Some(reason.into());
        }
    }

    pub fn closed_reason(&self) -> Option<&str> {
        self.closed.as_deref()
    }

    #[cfg(test)]
    pub fn unclaimed_replies(&self) -> usize {
        self.replies.len()
    }
}
