//! Transports that carry calls to the owning process.
//!
//! The byte-level channel is abstracted via [`FrameChannel`] so the same
//! framing works over a worker thread, a browser message port or a socket.
//! [`FramedTransport`] adds request ids and CBOR encoding on top of any
//! channel.

use crate::error::{BridgeError, BridgeResult};
use crate::host::BackgroundHost;
use crate::protocol::{decode, encode, DbCall, DbReply, Request, Response};
use localdb_core::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Delivers a call to the owning process and returns its reply.
pub trait BackgroundTransport: Send + Sync {
    /// Runs `call` against the agent registered under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns the operation's error rebuilt on this side, or
    /// `TransportFailure` if the call could not be delivered.
    fn call_background(&self, namespace: &str, call: &DbCall) -> CoreResult<DbReply>;
}

/// A request/response byte channel to the owning process.
pub trait FrameChannel: Send + Sync {
    /// Sends one request frame and waits for its response frame.
    fn round_trip(&self, frame: Vec<u8>) -> BridgeResult<Vec<u8>>;
}

/// CBOR-framed transport over a [`FrameChannel`].
pub struct FramedTransport<C: FrameChannel> {
    channel: C,
    next_id: AtomicU64,
}

impl<C: FrameChannel> FramedTransport<C> {
    /// Creates a transport over `channel`.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: FrameChannel> BackgroundTransport for FramedTransport<C> {
    fn call_background(&self, namespace: &str, call: &DbCall) -> CoreResult<DbReply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            id,
            namespace: namespace.to_string(),
            call: call.clone(),
        };
        let frame = encode(&request)?;
        let reply = self.channel.round_trip(frame).map_err(|err| {
            tracing::warn!(namespace, method = call.method(), error = %err, "background call failed");
            CoreError::from(err)
        })?;
        let response: Response = decode(&reply)?;
        if response.id != id {
            return Err(BridgeError::MismatchedReply {
                expected: id,
                got: response.id,
            }
            .into());
        }
        response.result.map_err(|err| err.into_core())
    }
}

impl<C: FrameChannel> std::fmt::Debug for FramedTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedTransport")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// A channel that hands frames straight to a host in the same thread.
///
/// Useful for testing the full encode/dispatch/decode path without a
/// second execution context.
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    host: Arc<BackgroundHost>,
}

impl LoopbackChannel {
    /// Creates a channel served by `host`.
    #[must_use]
    pub fn new(host: Arc<BackgroundHost>) -> Self {
        Self { host }
    }
}

impl FrameChannel for LoopbackChannel {
    fn round_trip(&self, frame: Vec<u8>) -> BridgeResult<Vec<u8>> {
        self.host.handle_frame(&frame)
    }
}

type Envelope = (Vec<u8>, mpsc::Sender<BridgeResult<Vec<u8>>>);

/// A channel to a host running on its own thread.
///
/// The host thread owns the database; callers only exchange frames with it.
/// Once the host thread stops, every call fails with `Disconnected`.
pub struct ThreadChannel {
    sender: Mutex<Option<mpsc::Sender<Envelope>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadChannel {
    /// Moves `host` onto a new thread and returns a channel to it.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` if the thread cannot be spawned.
    pub fn spawn(host: Arc<BackgroundHost>) -> BridgeResult<Self> {
        let (sender, receiver) = mpsc::channel::<Envelope>();
        let worker = std::thread::Builder::new()
            .name("localdb-background".into())
            .spawn(move || {
                tracing::debug!("background host started");
                for (frame, reply) in receiver {
                    // The caller may have given up; nothing to do then.
                    let _ = reply.send(host.handle_frame(&frame));
                }
                tracing::debug!("background host stopped");
            })
            .map_err(|err| {
                tracing::error!(error = %err, "failed to spawn background host");
                BridgeError::Disconnected
            })?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stops the host thread after it drains queued calls.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("background host panicked");
            }
        }
    }

    /// Returns whether the host thread still accepts calls.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
            && self
                .worker
                .lock()
                .as_ref()
                .is_some_and(|worker| !worker.is_finished())
    }
}

impl FrameChannel for ThreadChannel {
    fn round_trip(&self, frame: Vec<u8>) -> BridgeResult<Vec<u8>> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(BridgeError::Disconnected)?;
        let (reply_tx, reply_rx) = mpsc::channel();
        sender
            .send((frame, reply_tx))
            .map_err(|_| BridgeError::Disconnected)?;
        reply_rx.recv().map_err(|_| BridgeError::Disconnected)?
    }
}

impl Drop for ThreadChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadChannel")
            .field("running", &self.is_running())
            .finish()
    }
}

/// Transport that runs calls in the caller's thread.
pub type LoopbackTransport = FramedTransport<LoopbackChannel>;

/// Transport to a host on a dedicated thread.
pub type ThreadTransport = FramedTransport<ThreadChannel>;

impl LoopbackTransport {
    /// Creates a loopback transport served by `host`.
    #[must_use]
    pub fn loopback(host: Arc<BackgroundHost>) -> Self {
        Self::new(LoopbackChannel::new(host))
    }
}

impl ThreadTransport {
    /// Moves `host` onto its own thread and returns a transport to it.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` if the thread cannot be spawned.
    pub fn spawn(host: Arc<BackgroundHost>) -> BridgeResult<Self> {
        ThreadChannel::spawn(host).map(Self::new)
    }
}
