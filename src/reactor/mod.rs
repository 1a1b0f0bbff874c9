//! The reactor: composes the poller, task queue, timer wheel,
//! connection table, lifecycle callbacks, worker supervision and pub/sub
//! fabric into the single object an application drives.
//!
//! Everything below this module (`conn`, `queue`, `timer`, `pubsub`) is
//! usable standalone; `Reactor` is the orchestration layer that wires them
//! to a real [`Poll`] and to real sockets, built on the same `Poll`/
//! `Registry` split an application on plain `mio` would use — `Reactor`
//! just adds the connection and lifecycle bookkeeping on top.

mod config;
mod cycle;
mod lifecycle;
mod signals;
mod worker;

pub use config::{CpuCount, ReactorConfig, MAX_AUTO_COUNT};
pub use lifecycle::{Hook, StateCallbacks};
pub use signals::SignalFlags;
pub use worker::{ChildEntry, WorkerSupervisor};

use std::io;
use std::net::SocketAddr as InetSocketAddr;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crate::conn::{
    ConnectionTable, DefaultHooks, Packet, Protocol, ReactorOps, RwHooks, Uuid, DEFAULT_TIMEOUT_SECS,
    PING_ETERNAL,
};
use crate::error::{ReactorError, ReactorResult};
use crate::pubsub::{socket_path, Frame, FrameType, Message, OnMessage, PostOffice, PublishScope, Subscription};
use crate::queue::{Priority, Task, TaskQueue, WorkerPool};
use crate::sync::Spinlock;
use crate::timer::{TimerId, TimerWheel};
use crate::unix::SourceFd;
use crate::{net, Interest, Poll, Registry, Token};

/// Readiness events carry the fd directly as the token (the connection
/// table is itself indexed by fd, so no separate token<->uuid map is
/// needed).
fn token_for(fd: RawFd) -> Token {
    Token(fd as usize)
}

const ARMED_READ: u8 = 0b01;
const ARMED_WRITE: u8 = 0b10;

/// The reactor core. One instance per worker process; the root
/// process in multi-worker mode holds one too (to run the cluster
/// listener and broadcast lifecycle events) without itself servicing
/// application connections.
pub struct Reactor {
    config: ReactorConfig,
    table: ConnectionTable,
    queue: Arc<TaskQueue>,
    timers: TimerWheel,
    poll: Spinlock<Option<Poll>>,
    registry: Registry,
    armed: Vec<AtomicU8>,
    post_office: PostOffice,
    callbacks: StateCallbacks,
    signals: Arc<SignalFlags>,
    running: Arc<AtomicBool>,
    worker_pool: Spinlock<Option<WorkerPool>>,
    is_master: AtomicBool,
    parent_pid: u32,
    review_timeouts: AtomicBool,
    idle: AtomicBool,
    last_tick: Spinlock<Instant>,
    cluster_uuid: Spinlock<Option<Uuid>>,
    cluster_peers: Spinlock<Vec<Uuid>>,
    /// Back-reference to this reactor's own `Arc`, so `&self`-only methods
    /// (in particular the ones `ReactorOps` exposes to `Protocol`
    /// callbacks, which never see an `Arc<Reactor>`) can still hand an
    /// owned `Arc<Reactor>` to a task closure. Set once at construction via
    /// `Arc::new_cyclic`, the same self-referential-`Arc` idiom used
    /// elsewhere in the retrieval pack for types that need to hand out a
    /// strong reference to themselves from a borrowed method.
    self_weak: Weak<Reactor>,
}

impl Reactor {
    /// Builds a reactor with `config`'s tunables. Does not start any
    /// threads or install signal handlers; call [`Reactor::start`] for
    /// that.
    pub fn new(config: ReactorConfig) -> io::Result<Arc<Reactor>> {
        let now = Instant::now();
        let table = ConnectionTable::from_rlimit(now);
        let armed = (0..table.capacity()).map(|_| AtomicU8::new(0)).collect();
        let poll = Poll::new()?;
        let registry = poll.registry().clone();
        Ok(Arc::new_cyclic(|weak| Reactor {
            config,
            table,
            queue: Arc::new(TaskQueue::new()),
            timers: TimerWheel::new(),
            poll: Spinlock::new(Some(poll)),
            registry,
            armed,
            post_office: PostOffice::new(),
            callbacks: StateCallbacks::new(),
            signals: Arc::new(SignalFlags::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker_pool: Spinlock::new(None),
            is_master: AtomicBool::new(false),
            parent_pid: std::process::id(),
            review_timeouts: AtomicBool::new(true),
            idle: AtomicBool::new(false),
            last_tick: Spinlock::new(now),
            cluster_uuid: Spinlock::new(None),
            cluster_peers: Spinlock::new(Vec::new()),
            self_weak: weak.clone(),
        }))
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Recovers the `Arc<Reactor>` this instance was constructed inside,
    /// for `&self`-only methods that need to move an owned reference into a
    /// task closure. Panics only if called after the last `Arc<Reactor>`
    /// has been dropped, which cannot happen for a method invoked on `&self`
    /// (a live `&self` borrow implies a live `Arc` keeping it allocated).
    fn self_arc(&self) -> Arc<Reactor> {
        self.self_weak.upgrade().expect("Reactor::self_arc called while no Arc<Reactor> is alive")
    }

    // ---- socket / accept / connect ----------------------

    /// Binds and listens on a TCP address, returning the listener's `Uuid`.
    /// The listener is attached like any other connection, with no
    /// protocol of its own; callers drive `accept` from their own
    /// `on_data`-equivalent when `is_valid` and readability indicate a
    /// pending connection (the cycle loop arms read interest on it exactly
    /// like a regular socket).
    pub fn listen_tcp(self: &Arc<Self>, addr: InetSocketAddr) -> io::Result<Uuid> {
        let listener = net::TcpListener::bind(addr)?;
        let fd = listener.into_raw_fd();
        enable_tcp_fastopen(fd);
        self.open_fd(fd, Box::new(DefaultHooks), Vec::new())
    }

    /// Binds and listens on a Unix-domain socket path.
    pub fn listen_unix<P: AsRef<Path>>(self: &Arc<Self>, path: P) -> io::Result<Uuid> {
        let listener = net::UnixListener::bind(path)?;
        let fd = listener.into_raw_fd();
        self.open_fd(fd, Box::new(DefaultHooks), Vec::new())
    }

    /// Initiates a non-blocking TCP connect, tolerating `EINPROGRESS`
    /// completion (the socket becomes writable once the handshake
    /// finishes; `on_ready` is the usual signal).
    pub fn connect_tcp(self: &Arc<Self>, addr: InetSocketAddr) -> io::Result<Uuid> {
        let stream = net::TcpStream::connect(addr)?;
        let peer = addr.to_string().into_bytes();
        let fd = stream.into_raw_fd();
        let uuid = self.open_fd(fd, Box::new(DefaultHooks), peer)?;
        self.arm(uuid, Interest::READABLE | Interest::WRITABLE)?;
        Ok(uuid)
    }

    /// Initiates a non-blocking Unix-domain connect.
    pub fn connect_unix<P: AsRef<Path>>(self: &Arc<Self>, path: P) -> io::Result<Uuid> {
        let path = path.as_ref().to_path_buf();
        let stream = net::UnixStream::connect(&path)?;
        let fd = stream.into_raw_fd();
        let uuid = self.open_fd(fd, Box::new(DefaultHooks), path_bytes(&path))?;
        self.arm(uuid, Interest::READABLE | Interest::WRITABLE)?;
        Ok(uuid)
    }

    /// Accepts one pending connection from a listener previously returned
    /// by [`Reactor::listen_tcp`]/[`Reactor::listen_unix`]. Returns
    /// `Ok(None)` on `EAGAIN` (no pending connection, not an error).
    pub fn accept(self: &Arc<Self>, listener: Uuid) -> io::Result<Option<Uuid>> {
        let fd = listener.fd() as RawFd;
        if !self.table.validate(listener) {
            return Err(io::ErrorKind::NotConnected.into());
        }
        match accept_raw(fd) {
            Ok(Some((client_fd, peer))) => {
                enlarge_buffers(client_fd);
                enable_nodelay(client_fd);
                let uuid = self.open_fd(client_fd, Box::new(DefaultHooks), peer)?;
                self.arm(uuid, Interest::READABLE | Interest::WRITABLE)?;
                Ok(Some(uuid))
            }
            Ok(None) => {
                // Re-arm the listener for the next incoming connection.
                let _ = self.arm(listener, Interest::READABLE);
                Ok(None)
            }
            Err(err) => {
                self.force_close(listener);
                Err(err)
            }
        }
    }

    fn open_fd(&self, fd: RawFd, hooks: Box<dyn RwHooks>, peer_addr: Vec<u8>) -> io::Result<Uuid> {
        set_nonblocking(fd);
        let now = Instant::now();
        let uuid = self
            .table
            .open(fd, hooks, peer_addr, now)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "connection table capacity exceeded"))?;
        if self.config.default_timeout_secs != DEFAULT_TIMEOUT_SECS {
            self.timeout_set(uuid, self.config.default_timeout_secs);
        }
        Ok(uuid)
    }

    fn arm(&self, uuid: Uuid, interests: Interest) -> io::Result<()> {
        let fd = uuid.fd() as RawFd;
        let Some(slot) = self.armed.get(uuid.fd()) else {
            return Err(io::ErrorKind::InvalidInput.into());
        };
        let wanted = (interests.is_readable() as u8) * ARMED_READ | (interests.is_writable() as u8) * ARMED_WRITE;
        let previous = slot.swap(wanted, Ordering::AcqRel);
        let mut source = SourceFd(&fd);
        if previous == 0 {
            self.registry.register(&mut source, token_for(fd), interests)
        } else {
            self.registry.reregister(&mut source, token_for(fd), interests)
        }
    }

    fn disarm(&self, fd: RawFd) {
        if let Some(slot) = self.armed.get(fd as usize) {
            slot.store(0, Ordering::Release);
        }
        let _ = self.registry.deregister(&mut SourceFd(&fd));
    }

    // ---- attach ------------------------------------------

    /// Installs `protocol` on an already-open descriptor (from `listen_*`,
    /// `connect_*`, or `accept`), arms both read and write interest, and
    /// touches the activity tick. If a protocol was already attached its
    /// `on_close` is scheduled first.
    pub fn attach(self: &Arc<Self>, uuid: Uuid, protocol: Box<dyn Protocol>) -> bool {
        let Some(slot) = self.table.slot_for(uuid) else {
            return false;
        };
        let previous = slot.protocol.lock().replace(protocol);
        slot.touch(Instant::now());
        if let Some(mut previous) = previous {
            let reactor = Arc::clone(self);
            self.queue.push(
                Priority::Normal,
                Task::new(move || previous.on_close(reactor.as_ref(), uuid)),
            );
        }
        let _ = self.arm(uuid, Interest::READABLE | Interest::WRITABLE);
        true
    }

    /// Adopts an externally-owned, already-open raw descriptor (e.g. one
    /// inherited across a hot-restart re-exec, or handed over by a
    /// socket-activation launcher) into the connection table and attaches
    /// `protocol` to it in one step. The descriptor is switched to
    /// non-blocking and given the default R/W hooks; callers that need a
    /// non-default hook (TLS, etc.) should use `attach` after installing it
    /// themselves. Returns the new `Uuid`, or an error if the table is
    /// full.
    pub fn attach_fd(self: &Arc<Self>, fd: RawFd, protocol: Box<dyn Protocol>) -> io::Result<Uuid> {
        let uuid = self.open_fd(fd, Box::new(DefaultHooks), Vec::new())?;
        self.attach(uuid, protocol);
        Ok(uuid)
    }

    /// Detaches whatever protocol is installed (attaching `None`), leaving
    /// the descriptor open but inert to poller events beyond write-flush
    /// and close.
    pub fn detach(self: &Arc<Self>, uuid: Uuid) {
        let Some(slot) = self.table.slot_for(uuid) else {
            return;
        };
        if let Some(mut previous) = slot.protocol.lock().take() {
            let reactor = Arc::clone(self);
            self.queue.push(
                Priority::Normal,
                Task::new(move || previous.on_close(reactor.as_ref(), uuid)),
            );
        }
    }

    // ---- read / write / flush ----------------------------

    fn read_raw(&self, uuid: Uuid, buf: &mut [u8]) -> io::Result<usize> {
        let Some(slot) = self.table.slot_for(uuid) else {
            return Err(io::ErrorKind::NotConnected.into());
        };
        let mut socket = slot.socket.lock();
        let Some(state) = socket.as_mut() else {
            return Err(io::ErrorKind::NotConnected.into());
        };
        match state.hooks.read(state.fd, buf) {
            Ok(n) => {
                drop(socket);
                slot.touch(Instant::now());
                Ok(n)
            }
            Err(err) if is_would_block(&err) => Ok(0),
            Err(err) => {
                drop(socket);
                self.force_close(uuid);
                Err(err)
            }
        }
    }

    fn write2_raw(&self, uuid: Uuid, packet: Packet, urgent: bool) -> io::Result<()> {
        let Some(slot) = self.table.slot_for(uuid) else {
            return Err(io::ErrorKind::NotConnected.into());
        };
        let was_empty;
        {
            let mut socket = slot.socket.lock();
            let Some(state) = socket.as_mut() else {
                return Err(io::ErrorKind::NotConnected.into());
            };
            was_empty = state.packets.is_empty();
            if urgent && !state.packets.is_empty() {
                // Never preempt the currently-draining head: insert at
                // index 1 rather than 0.
                state.packets.insert(1, packet);
            } else if urgent {
                state.packets.push_front(packet);
            } else {
                state.packets.push_back(packet);
            }
        }
        if was_empty {
            // Don't wait for poller readiness; schedule a flush now.
            self.schedule_flush(uuid);
        }
        Ok(())
    }

    fn schedule_flush(&self, uuid: Uuid) {
        let reactor = self.self_arc();
        self.queue.push(Priority::Urgent, Task::new(move || reactor.flush_task(uuid)));
    }

    /// Drains queued packets for `uuid` under the socket lock while the
    /// hook reports progress, applying the Slowloris guard.
    pub fn flush(&self, uuid: Uuid) -> io::Result<()> {
        self.flush_task(uuid);
        Ok(())
    }

    /// Drains the packet queue, then — once it's empty — either drives a
    /// deferred abrupt close's own hook-internal flush to completion, or
    /// finishes an ordinary graceful close if one was requested while
    /// packets were still draining (§4.E.3: "flush drains remaining
    /// packets and then tears down").
    fn flush_task(&self, uuid: Uuid) {
        let Some(slot) = self.table.slot_for(uuid) else {
            return;
        };
        loop {
            let outcome = {
                let mut socket = slot.socket.lock();
                let Some(state) = socket.as_mut() else {
                    return;
                };
                let Some(packet) = state.packets.front_mut() else {
                    break;
                };
                let before_len = state.packets.len();
                let written = match packet {
                    Packet::Buffer { .. } => {
                        let hooks = &mut state.hooks;
                        let fd = state.fd;
                        packet.write_buffer_chunk(|chunk| hooks.write(fd, chunk))
                    }
                    Packet::File { .. } => {
                        let fd = state.fd;
                        let src = packet.file_fd().unwrap();
                        let offset = packet.file_offset().unwrap();
                        let remaining = packet.file_remaining().unwrap();
                        const CHUNK: usize = 256 * 1024;
                        crate::sys::raw_sendfile(fd, src, offset, remaining.min(CHUNK as u64) as usize)
                            .map(|n| {
                                packet.advance_file(n as u64);
                                n
                            })
                    }
                };

                match written {
                    Ok(n) => {
                        if packet.is_drained() {
                            state.packets.pop_front();
                        }
                        // Slowloris bookkeeping: track bytes
                        // written while the queue length hasn't shrunk
                        // below the threshold with the same head packet.
                        if before_len >= self.config.slowloris_queue_threshold {
                            if state.flush_window_queue_len != before_len {
                                state.flush_window_queue_len = before_len;
                                state.flush_window_bytes = 0;
                            }
                            state.flush_window_bytes += n;
                            if state.flush_window_bytes < self.config.slowloris_min_bytes_per_window {
                                state.attacked = true;
                            }
                        } else {
                            state.flush_window_queue_len = 0;
                            state.flush_window_bytes = 0;
                        }
                        FlushOutcome::Progress
                    }
                    Err(err) if is_would_block(&err) => FlushOutcome::WouldBlock,
                    Err(err) if is_fatal_write_error(&err) => FlushOutcome::Fatal,
                    Err(_) => FlushOutcome::WouldBlock,
                }
            };

            match outcome {
                FlushOutcome::Progress => {
                    if slot.socket.lock().as_ref().map_or(true, |s| s.attacked) {
                        log::warn!("slowloris guard tripped for fd {}; evicting silently", uuid.fd());
                        self.force_close(uuid);
                        return;
                    }
                    continue;
                }
                FlushOutcome::WouldBlock => {
                    let _ = self.arm(uuid, Interest::READABLE | Interest::WRITABLE);
                    return;
                }
                FlushOutcome::Fatal => {
                    self.force_close(uuid);
                    return;
                }
            }
        }

        // Packet queue is empty. A deferred abrupt close takes priority:
        // the R/W hook asked (via `before_close`) for one more chance to
        // flush its own internal buffering (e.g. a TLS close-notify alert)
        // before the fd actually closes.
        let hook_flush = {
            let mut socket = slot.socket.lock();
            socket.as_mut().and_then(|state| {
                if state.close_deferred {
                    Some(state.hooks.flush(state.fd))
                } else {
                    None
                }
            })
        };
        match hook_flush {
            Some(Ok(true)) => {
                let _ = self.arm(uuid, Interest::WRITABLE);
            }
            Some(Ok(false)) | Some(Err(_)) => {
                self.finish_close(uuid);
            }
            None => {
                if slot.closing.load(Ordering::Acquire) {
                    self.force_close(uuid);
                }
            }
        }
    }

    // ---- close -------------------------------------------

    /// Graceful close: further writes still drain; once the packet queue
    /// empties, `flush_task` notices `closing` and tears the connection
    /// down exactly as `force_close` would.
    pub fn close(&self, uuid: Uuid) {
        let Some(slot) = self.table.slot_for(uuid) else {
            return;
        };
        slot.closing.store(true, Ordering::Release);
        let pending = slot.socket.lock().as_ref().map_or(0, |s| s.packets.len());
        if pending == 0 {
            self.force_close(uuid);
        } else {
            self.schedule_flush(uuid);
        }
    }

    /// Abrupt close: drops pending packets and invokes `before_close`. If
    /// the hook asks to defer (it has its own data left to send) the
    /// actual teardown waits for `flush_task` to observe the hook's own
    /// `flush` report fully drained; otherwise teardown happens here and
    /// now, dispatching `on_close` exactly once.
    pub fn force_close(&self, uuid: Uuid) {
        let Some(slot) = self.table.slot_for(uuid) else {
            return;
        };
        let already_deferred = slot.socket.lock().as_ref().is_some_and(|s| s.close_deferred);
        if !already_deferred {
            let deferred = {
                let mut socket = slot.socket.lock();
                match socket.as_mut() {
                    Some(state) => {
                        state.packets.clear();
                        state.hooks.before_close(state.fd).unwrap_or(false)
                    }
                    None => false,
                }
            };
            if deferred {
                if let Some(state) = slot.socket.lock().as_mut() {
                    state.close_deferred = true;
                }
                self.schedule_flush(uuid);
                return;
            }
        }
        self.finish_close(uuid);
    }

    /// Tears a descriptor down for real: disarms poller interest, drops
    /// the socket state (running the hook's `cleanup` before the actual
    /// `close(2)`), runs every uuid-linked destructor, and schedules the
    /// protocol's `on_close` exactly once.
    fn finish_close(&self, uuid: Uuid) {
        let Some(slot) = self.table.slot_for(uuid) else {
            return;
        };
        self.disarm(uuid.fd() as RawFd);
        let (socket, protocol, links) = slot.take_for_close();
        if let Some(mut state) = socket {
            state.hooks.cleanup(state.fd);
            unsafe {
                libc::close(state.fd);
            }
        }
        for link in links {
            (link.destructor)();
        }
        if let Some(mut protocol) = protocol {
            let reactor = self.self_arc();
            self.queue.push(Priority::Normal, Task::new(move || protocol.on_close(reactor.as_ref(), uuid)));
        }
    }

    // ---- misc connection ops --------------------------------------------

    pub fn is_valid(&self, uuid: Uuid) -> bool {
        self.table.validate(uuid)
    }

    pub fn is_closed(&self, uuid: Uuid) -> bool {
        !self.table.validate(uuid)
    }

    pub fn touch(&self, uuid: Uuid) {
        if let Some(slot) = self.table.slot_for(uuid) {
            slot.touch(Instant::now());
        }
    }

    pub fn peer_addr(&self, uuid: Uuid) -> Option<Vec<u8>> {
        let slot = self.table.slot_for(uuid)?;
        let socket = slot.socket.lock();
        socket.as_ref().map(|s| s.peer_addr.clone())
    }

    pub fn timeout_set(&self, uuid: Uuid, secs: u32) {
        if let Some(slot) = self.table.slot_for(uuid) {
            slot.timeout_secs.store(secs, Ordering::Release);
        }
    }

    pub fn timeout_get(&self, uuid: Uuid) -> Option<u32> {
        self.table.slot_for(uuid).map(|s| s.timeout_secs.load(Ordering::Acquire))
    }

    /// Replaces a connection's read/write hooks (e.g. installing a TLS
    /// session). Callers must not hold on to the old hooks' invariants
    /// once replaced.
    pub fn rw_hook_set(&self, uuid: Uuid, hooks: Box<dyn RwHooks>) -> bool {
        let Some(slot) = self.table.slot_for(uuid) else {
            return false;
        };
        let mut socket = slot.socket.lock();
        match socket.as_mut() {
            Some(state) => {
                state.hooks = hooks;
                true
            }
            None => false,
        }
    }

    /// Registers a destructor to run exactly once when `uuid` closes.
    pub fn uuid_link(&self, uuid: Uuid, destructor: Box<dyn FnOnce() + Send>) -> Option<u64> {
        self.table.link(uuid, destructor)
    }

    pub fn uuid_unlink(&self, uuid: Uuid, id: u64) -> bool {
        self.table.unlink(uuid, id)
    }

    /// Suspends a connection: disarms its poller interest without closing
    /// it, so no further `on_data`/`on_ready` fires until `force_event`
    /// (or a fresh `attach`) rearms it.
    pub fn suspend(&self, uuid: Uuid) {
        self.disarm(uuid.fd() as RawFd);
        if let Some(armed) = self.armed.get(uuid.fd()) {
            armed.store(0, Ordering::Release);
        }
    }

    /// Forces readiness re-evaluation for `uuid` (re-arms read+write
    /// interest), as if the poller had just reported it ready.
    pub fn force_event(&self, uuid: Uuid) -> io::Result<()> {
        self.arm(uuid, Interest::READABLE | Interest::WRITABLE)
    }

    // ---- task queue / timers -------------------------

    /// Defers `f` onto the normal-priority task queue.
    pub fn defer<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Priority::Normal, Task::new(f));
        if let Some(pool) = self.worker_pool.lock().as_ref() {
            pool.wake_all();
        }
    }

    /// Defers `f` onto the urgent-priority task queue (I/O-adjacent work
    /// that should run ahead of ordinary callbacks, e.g. a write flush
    /// triggered from outside the poller).
    pub fn defer_io_task<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Priority::Urgent, Task::new(f));
        if let Some(pool) = self.worker_pool.lock().as_ref() {
            pool.wake_all();
        }
    }

    /// Schedules `task` to run every `interval`, `repetitions` times (`0`
    /// = forever), starting one `interval` from now.
    pub fn run_every<F, G>(&self, interval: Duration, repetitions: u32, task: F, on_finish: Option<G>) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
        G: FnOnce() + Send + 'static,
    {
        self.timers.run_every(Instant::now(), interval, repetitions, task, on_finish)
    }

    pub fn cancel_timer(&self, id: TimerId) {
        self.timers.cancel(id, &self.queue);
    }

    pub fn last_tick(&self) -> Instant {
        *self.last_tick.lock()
    }

    // ---- lifecycle callbacks ------------------------------

    pub fn state_callback_add<F>(&self, hook: Hook, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.add(hook, callback);
    }

    pub fn state_callback_clear(&self, hook: Hook) {
        self.callbacks.clear(hook);
    }

    pub fn state_callback_force(&self, hook: Hook) {
        self.callbacks.force(hook);
    }

    // ---- process role / running state -----------------------------------

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_master(&self) -> bool {
        self.is_master.load(Ordering::Acquire)
    }

    pub fn is_worker(&self) -> bool {
        !self.is_master()
    }

    pub fn parent_pid(&self) -> u32 {
        self.parent_pid
    }

    pub fn open_count(&self) -> usize {
        self.table.open_count()
    }

    // ---- pub/sub --------------------------------------------

    pub fn subscribe(&self, channel: impl Into<Vec<u8>>, callback: OnMessage) -> Arc<Subscription> {
        let channel = channel.into();
        let sub = self.post_office.subscribe(channel.clone(), callback);
        self.notify_cluster_subscribe(channel, false);
        sub
    }

    pub fn subscribe_pattern(&self, pattern: impl Into<Vec<u8>>, callback: OnMessage) -> Arc<Subscription> {
        let pattern = pattern.into();
        let sub = self.post_office.subscribe_pattern(pattern.clone(), callback);
        self.notify_cluster_subscribe(pattern, true);
        sub
    }

    /// Filter-keyed subscriptions are process-local by definition and are
    /// never announced to the cluster master.
    pub fn subscribe_filter(&self, filter: i32, callback: OnMessage) -> Arc<Subscription> {
        self.post_office.subscribe_filter(filter, callback)
    }

    pub fn unsubscribe(&self, subscription: &Arc<Subscription>) {
        if !subscription.is_pattern && subscription.filter == 0 {
            self.notify_cluster_unsubscribe(subscription.channel.clone(), false);
        } else if subscription.is_pattern {
            self.notify_cluster_unsubscribe(subscription.channel.clone(), true);
        }
        self.post_office.unsubscribe(subscription);
    }

    /// Publishes `msg`. Dispatch to matching local subscriptions and any
    /// cluster-forward happen synchronously on the caller's thread; the
    /// forward hook itself only ever encodes a frame and calls `write2`,
    /// which is cheap and non-blocking.
    pub fn publish(&self, scope: PublishScope, msg: Message) {
        self.post_office.publish(scope, msg);
    }

    /// Installs (replacing any previous one) the global metadata callback
    /// `publish` runs once per message, before any subscriber sees it
    /// (`message_metadata`, spec §4.G "Metadata").
    pub fn message_metadata(&self, callback: impl Fn(&Message) + Send + Sync + 'static) {
        self.post_office.set_message_metadata(Arc::new(callback));
    }

    /// Attaches this reactor to a cluster master Unix socket, wiring the
    /// post office's cluster-forward hook to send frames over it and
    /// installing a protocol on the connection that decodes inbound
    /// frames and delivers them locally ("Cluster transport").
    pub fn pubsub_attach(self: &Arc<Self>, master_path: &Path) -> io::Result<Uuid> {
        let uuid = self.connect_unix(master_path)?;
        self.attach(uuid, Box::new(ClusterClientProtocol::new(Arc::clone(self))));
        *self.cluster_uuid.lock() = Some(uuid);

        let reactor = Arc::clone(self);
        self.post_office.set_cluster_forward(Arc::new(move |scope, msg| {
            let frame = if scope == PublishScope::Root { Frame::root_only(msg) } else { Frame::forward(msg) };
            if let Some(cluster_uuid) = *reactor.cluster_uuid.lock() {
                let _ = reactor.write2_raw(cluster_uuid, Packet::from_buffer(frame.encode()), false);
            }
        }));
        Ok(uuid)
    }

    /// Closes this reactor's connection to the cluster master, if attached.
    pub fn pubsub_detach(self: &Arc<Self>) {
        if let Some(uuid) = self.cluster_uuid.lock().take() {
            self.close(uuid);
        }
    }

    /// The default path the master's cluster-listener Unix socket is
    /// created at: a randomly suffixed name under the configured cluster
    /// socket directory.
    pub fn cluster_socket_path(&self) -> PathBuf {
        socket_path(Some(self.config.resolved_cluster_socket_dir()))
    }

    /// Starts the master-side cluster listener: accepts worker connections
    /// and relays every `Cluster`/`Siblings`/`Root`-scoped publish frame it
    /// receives from one
    /// worker to every other connected worker. The master never interprets
    /// `Subscribe`/`Unsubscribe` frames — each worker's own `PostOffice`
    /// already filters delivery against its own local subscription table,
    /// so the master only ever needs to fan the raw frame out.
    pub fn listen_cluster(self: &Arc<Self>, path: &Path) -> io::Result<Uuid> {
        let uuid = self.listen_unix(path)?;
        self.attach(uuid, Box::new(ClusterListenerProtocol::new(Arc::clone(self))));
        Ok(uuid)
    }

    fn notify_cluster_subscribe(&self, channel: Vec<u8>, pattern: bool) {
        if let Some(cluster_uuid) = *self.cluster_uuid.lock() {
            let frame = Frame::subscribe(channel, pattern);
            let _ = self.write2_raw(cluster_uuid, Packet::from_buffer(frame.encode()), false);
        }
    }

    fn notify_cluster_unsubscribe(&self, channel: Vec<u8>, pattern: bool) {
        if let Some(cluster_uuid) = *self.cluster_uuid.lock() {
            let frame = Frame::unsubscribe(channel, pattern);
            let _ = self.write2_raw(cluster_uuid, Packet::from_buffer(frame.encode()), false);
        }
    }

    /// Re-queues `msg` to `subscription`, as if it had just been delivered
    /// again. A callback calls this from within its own `on_message` to
    /// retry later instead of blocking.
    pub fn message_defer(&self, subscription: &Arc<Subscription>, msg: Arc<Message>) {
        let subscription = Arc::clone(subscription);
        self.queue.push(Priority::Normal, Task::new(move || subscription.dispatch(msg)));
    }

    // ---- lifecycle: start/stop ---------------------

    /// Resolves `threads`/`workers` against the detected core count,
    /// installs signal handlers, fires `PRE_START`, and runs the reactor.
    /// Blocks until `stop()` (or a fatal signal) completes the shutdown
    /// unwind. In single-worker mode the calling process is the sole
    /// worker; in multi-worker mode it forks `workers` children (each
    /// running a freshly constructed `Reactor` via `child_reactor`) and
    /// acts as the supervising root until every child exits.
    pub fn start<F>(self: &Arc<Self>, child_reactor: F) -> ReactorResult<()>
    where
        F: Fn() -> ReactorResult<()> + Send + Sync + 'static,
    {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let thread_count = self.config.threads.resolve(cores).max(1);
        let worker_count = self.config.workers.resolve(cores).max(1);

        signals::install(Arc::clone(&self.signals)).map_err(ReactorError::Io)?;
        self.running.store(true, Ordering::Release);
        self.callbacks.force(Hook::PreStart);

        if worker_count <= 1 {
            // No separate master process in single-worker mode: this sole
            // process is its own root, so root-scoped publishes it makes
            // dispatch to its own subscribers.
            self.post_office.set_is_master(true);
            self.callbacks.force(Hook::InChild);
            self.run_as_worker(thread_count);
            return Ok(());
        }

        self.is_master.store(true, Ordering::Release);
        self.post_office.set_is_master(true);
        self.callbacks.force(Hook::InMaster);
        let fork_lock = Arc::new(Spinlock::new(()));
        let running = Arc::clone(&self.running);
        let entry: ChildEntry = Arc::new(move || {
            if let Err(err) = child_reactor() {
                log::error!("worker process exited with error: {err}");
            }
        });
        self.callbacks.force(Hook::BeforeFork);
        let supervisor = WorkerSupervisor::spawn(worker_count, fork_lock, running, entry);
        self.callbacks.force(Hook::AfterFork);
        self.callbacks.force(Hook::OnStart);

        while self.running.load(Ordering::Acquire) {
            if self.signals.stop_requested.load(Ordering::Acquire) {
                self.running.store(false, Ordering::Release);
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        self.post_office.publish(PublishScope::Cluster, Message::new(0, b"__shutdown__".to_vec(), Vec::new()));
        supervisor.join();
        self.callbacks.force(Hook::OnFinish);
        Ok(())
    }

    fn run_as_worker(self: &Arc<Self>, thread_count: usize) {
        let pool = WorkerPool::spawn(
            "revio-worker",
            thread_count,
            Arc::clone(&self.queue),
            Arc::clone(&self.running),
            Duration::from_millis(50),
        );
        *self.worker_pool.lock() = Some(pool);
        self.callbacks.force(Hook::OnStart);

        cycle::run(self);

        self.callbacks.force(Hook::OnShutdown);
        self.unwind();
        if let Some(pool) = self.worker_pool.lock().take() {
            pool.join();
        }
        self.callbacks.force(Hook::OnFinish);
    }

    /// The shutdown unwind phase: ask every live protocol
    /// for a grace period, keep cycling until every connection has closed
    /// (or its grace period elapses), then force-close any stragglers.
    fn unwind(self: &Arc<Self>) {
        let deadline_by_fd: Vec<Option<Instant>> = self
            .table
            .open_fds()
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|fd| {
                let uuid = self.table.uuid_for_fd(fd)?;
                let grace = self.with_protocol(uuid, |p, ops| p.on_shutdown(ops, uuid)).unwrap_or(0);
                if grace == 0 {
                    self.force_close(uuid);
                    None
                } else if grace == PING_ETERNAL {
                    None
                } else {
                    Some(Instant::now() + Duration::from_secs(grace as u64))
                }
            })
            .collect();

        let overall_deadline = deadline_by_fd.into_iter().max().unwrap_or_else(Instant::now);
        while self.table.open_count() > 0 && Instant::now() < overall_deadline {
            self.queue.perform_all();
            std::thread::sleep(Duration::from_millis(10));
        }
        for fd in self.table.open_fds().collect::<Vec<_>>() {
            if let Some(uuid) = self.table.uuid_for_fd(fd) {
                self.force_close(uuid);
            }
        }
        self.queue.perform_all();
    }

    /// Requests a graceful stop: clears the running flag so the cycle loop
    /// exits on its next iteration (within one `next_wait` tick, at most
    /// [`crate::timer::DEFAULT_MAX_WAIT`]) and the unwind phase begins.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub(crate) fn table(&self) -> &ConnectionTable {
        &self.table
    }

    pub(crate) fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub(crate) fn timers(&self) -> &TimerWheel {
        &self.timers
    }

    pub(crate) fn take_poll(&self) -> Option<Poll> {
        self.poll.lock().take()
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn set_last_tick(&self, now: Instant) {
        *self.last_tick.lock() = now;
    }

    pub(crate) fn review_timeouts(&self) -> bool {
        self.review_timeouts.load(Ordering::Acquire)
    }

    pub(crate) fn mark_idle(&self, idle: bool) -> bool {
        self.idle.swap(idle, Ordering::AcqRel) != idle
    }

    pub(crate) fn fire_idle(&self) {
        self.callbacks.force(Hook::OnIdle);
    }

    pub(crate) fn armed_for(&self, fd: RawFd) -> Interest {
        let bits = self.armed.get(fd as usize).map(|a| a.load(Ordering::Acquire)).unwrap_or(0);
        match (bits & ARMED_READ != 0, bits & ARMED_WRITE != 0) {
            (true, true) => Interest::READABLE | Interest::WRITABLE,
            (true, false) => Interest::READABLE,
            (false, true) => Interest::WRITABLE,
            (false, false) => Interest::READABLE,
        }
    }

    pub(crate) fn signal_flags(&self) -> &Arc<SignalFlags> {
        &self.signals
    }

    pub(crate) fn post_office(&self) -> &PostOffice {
        &self.post_office
    }

    // ---- cycle dispatch -----------------------------------

    /// Calls `f` with exclusive access to `uuid`'s protocol, without
    /// holding the protocol spinlock for the duration of the call. A
    /// naive `slot.protocol.lock().as_mut()` held across the callback
    /// deadlocks the moment the callback re-enters the reactor on the same
    /// uuid — which the default `ping` does unconditionally
    /// (`reactor.force_close`), and which any `on_data`/`on_ready`
    /// override is free to do too. Instead the protocol is taken out of
    /// the slot for the duration of the call and put back afterwards;
    /// if the callback closed the connection (the slot is no longer open
    /// when it returns), `force_close` found no protocol to hand off to
    /// `on_close` — since we're holding the only copy — so we dispatch
    /// `on_close` ourselves here instead, preserving "fires exactly once,
    /// after every other callback for that uuid".
    ///
    /// Returns `None` (without calling `f`) if no protocol is attached.
    fn with_protocol<R>(self: &Arc<Self>, uuid: Uuid, f: impl FnOnce(&mut dyn Protocol, &dyn ReactorOps) -> R) -> Option<R> {
        let slot = self.table.slot_for(uuid)?;
        let mut protocol = slot.protocol.lock().take()?;
        let result = f(protocol.as_mut(), self.as_ref());
        if slot.is_open() {
            let mut guard = slot.protocol.lock();
            if guard.is_none() {
                *guard = Some(protocol);
            }
            // Else: `attach` installed a new protocol while `f` ran
            // (e.g. the callback itself re-attached); ours has been
            // superseded and is simply dropped here.
        } else {
            protocol.on_close(self.as_ref(), uuid);
        }
        Some(result)
    }

    /// Queues `on_data` for `uuid` onto the normal-priority task queue,
    /// unless one is already in flight (the slot's `scheduled` flag): the
    /// cycle thread only ever detects readiness, the worker pool runs the
    /// callback.
    pub(crate) fn dispatch_readable(self: &Arc<Self>, uuid: Uuid) {
        let Some(slot) = self.table.slot_for(uuid) else {
            return;
        };
        if slot.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let reactor = Arc::clone(self);
        self.queue.push(
            Priority::Normal,
            Task::new(move || {
                if let Some(slot) = reactor.table.slot_for(uuid) {
                    slot.scheduled.store(false, Ordering::Release);
                }
                reactor.with_protocol(uuid, |p, ops| p.on_data(ops, uuid));
            }),
        );
    }

    /// Drains pending writes for `uuid` and, once the queue empties, calls
    /// `on_ready` — both run as an urgent task so a slow `on_ready` never
    /// blocks the cycle thread.
    pub(crate) fn dispatch_writable(self: &Arc<Self>, uuid: Uuid) {
        let reactor = Arc::clone(self);
        self.queue.push(
            Priority::Urgent,
            Task::new(move || {
                reactor.flush_task(uuid);
                reactor.with_protocol(uuid, |p, ops| p.on_ready(ops, uuid));
            }),
        );
    }

    /// Pings every open connection idle past its configured timeout,
    /// force-closing any with no protocol attached to answer.
    pub(crate) fn walk_timeouts(self: &Arc<Self>, now: Instant) {
        for fd in self.table.open_fds().collect::<Vec<_>>() {
            let Some(uuid) = self.table.uuid_for_fd(fd) else {
                continue;
            };
            let Some(slot) = self.table.slot_for(uuid) else {
                continue;
            };
            if !slot.is_idle_past_timeout(now) {
                continue;
            }
            match self.with_protocol(uuid, |p, ops| p.ping(ops, uuid)) {
                Some(grace) => {
                    if grace != PING_ETERNAL {
                        slot.touch(now);
                    }
                }
                None => {
                    self.force_close(uuid);
                }
            }
        }
    }
}

enum FlushOutcome {
    Progress,
    WouldBlock,
    Fatal,
}

/// Implements the narrow callback-facing interface `Protocol` methods see.
impl ReactorOps for Reactor {
    fn read(&self, uuid: Uuid, buf: &mut [u8]) -> io::Result<usize> {
        self.read_raw(uuid, buf)
    }

    fn write(&self, uuid: Uuid, data: Vec<u8>) -> io::Result<()> {
        self.write2_raw(uuid, Packet::from_buffer(data), false)
    }

    fn write_urgent(&self, uuid: Uuid, data: Vec<u8>) -> io::Result<()> {
        self.write2_raw(uuid, Packet::from_buffer(data), true)
    }

    fn close(&self, uuid: Uuid) {
        Reactor::close(self, uuid);
    }

    fn force_close(&self, uuid: Uuid) {
        Reactor::force_close(self, uuid);
    }

    fn touch(&self, uuid: Uuid) {
        Reactor::touch(self, uuid)
    }

    fn is_valid(&self, uuid: Uuid) -> bool {
        self.table.validate(uuid)
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("open_connections", &self.table.open_count())
            .field("running", &self.is_running())
            .field("is_master", &self.is_master())
            .finish_non_exhaustive()
    }
}

fn path_bytes(path: &PathBuf) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

fn is_would_block(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::NotConnected
    )
}

fn is_fatal_write_error(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EPIPE) | Some(libc::EIO) | Some(libc::EINVAL) | Some(libc::EBADF) | Some(libc::EFAULT)
    )
}

fn set_nonblocking(fd: RawFd) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }
}

fn enable_nodelay(fd: RawFd) {
    unsafe {
        let one: libc::c_int = 1;
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_NODELAY,
            &one as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

/// Best-effort `TCP_FASTOPEN`; ignored where unsupported.
fn enable_tcp_fastopen(fd: RawFd) {
    #[cfg(target_os = "linux")]
    unsafe {
        let qlen: libc::c_int = 128;
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_FASTOPEN,
            &qlen as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
    #[cfg(not(target_os = "linux"))]
    let _ = fd;
}

/// Enlarges send/receive buffers to at least 128 KiB.
fn enlarge_buffers(fd: RawFd) {
    const MIN_BUF: libc::c_int = 128 * 1024;
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &MIN_BUF as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &MIN_BUF as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

/// `accept(2)` on a raw, non-blocking listener fd. Returns `Ok(None)` on
/// `EAGAIN`/`EWOULDBLOCK`.
fn accept_raw(listener_fd: RawFd) -> io::Result<Option<(RawFd, Vec<u8>)>> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let fd = unsafe {
        libc::accept4(
            listener_fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
            libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
        )
    };
    if fd < 0 {
        let err = io::Error::last_os_error();
        return if is_would_block(&err) { Ok(None) } else { Err(err) };
    }
    let peer = format_sockaddr(&storage, len);
    Ok(Some((fd, peer)))
}

/// Renders a peer address for the connection table's `peer_addr` field.
/// Reimplements the address-family dispatch `sys::unix::net::to_socket_addr`
/// does internally (that helper isn't reachable outside the `sys` tree), so
/// this only ever needs to produce a display string, not a `SocketAddr`.
fn format_sockaddr(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Vec<u8> {
    match storage.ss_family as libc::c_int {
        libc::AF_INET => unsafe {
            let sa: libc::sockaddr_in = *(storage as *const _ as *const libc::sockaddr_in);
            let ip = std::net::Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr));
            let port = u16::from_be(sa.sin_port);
            format!("{ip}:{port}").into_bytes()
        },
        libc::AF_INET6 => unsafe {
            let sa: libc::sockaddr_in6 = *(storage as *const _ as *const libc::sockaddr_in6);
            let ip = std::net::Ipv6Addr::from(sa.sin6_addr.s6_addr);
            let port = u16::from_be(sa.sin6_port);
            format!("[{ip}]:{port}").into_bytes()
        },
        libc::AF_UNIX => {
            let _ = len;
            b"(unix)".to_vec()
        }
        _ => Vec::new(),
    }
}

/// The protocol the reactor installs on its own cluster-client connection
/// ("Cluster transport"): decodes inbound frames and either
/// delivers them locally or, when running as the master, rebroadcasts a
/// publish to every other connected worker.
struct ClusterClientProtocol {
    reactor: Arc<Reactor>,
    buf: Vec<u8>,
}

impl ClusterClientProtocol {
    fn new(reactor: Arc<Reactor>) -> ClusterClientProtocol {
        ClusterClientProtocol {
            reactor,
            buf: Vec::new(),
        }
    }
}

impl Protocol for ClusterClientProtocol {
    fn on_data(&mut self, ops: &dyn ReactorOps, uuid: Uuid) {
        let mut chunk = [0u8; 4096];
        loop {
            match ops.read(uuid, &mut chunk) {
                Ok(0) => break,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            }
        }
        loop {
            match Frame::decode(&self.buf) {
                Ok(Some((frame, consumed))) => {
                    self.buf.drain(..consumed);
                    self.handle_frame(frame);
                }
                Ok(None) => break,
                Err(err) => {
                    log::warn!("malformed cluster frame: {err}");
                    self.buf.clear();
                    break;
                }
            }
        }
    }

    fn on_close(&mut self, _ops: &dyn ReactorOps, _uuid: Uuid) {
        log::warn!("cluster transport connection closed");
    }
}

impl ClusterClientProtocol {
    fn handle_frame(&self, frame: Frame) {
        match frame.frame_type {
            FrameType::ForwardMsg | FrameType::ForwardJson => {
                let mut msg = Message::new(frame.filter, frame.channel, frame.payload);
                msg.is_json = frame.frame_type == FrameType::ForwardJson;
                self.reactor.post_office().deliver_local(msg);
            }
            FrameType::RootOnlyMsg | FrameType::RootOnlyJson => {
                let mut msg = Message::new(frame.filter, frame.channel, frame.payload);
                msg.is_json = frame.frame_type == FrameType::RootOnlyJson;
                self.reactor.post_office().deliver_local(msg);
            }
            FrameType::Shutdown => {
                self.reactor.stop();
            }
            FrameType::Subscribe
            | FrameType::Unsubscribe
            | FrameType::PatternSubscribe
            | FrameType::PatternUnsubscribe
            | FrameType::Error
            | FrameType::Ping => {
                // The master-side fan-out table (subscribe/unsubscribe
                // bookkeeping) is driven by a dedicated master protocol,
                // not this client-side one; a worker never receives these
                // frame types from the master.
            }
        }
    }
}

/// Installed on the master's cluster-listener socket; its only job is to
/// accept worker connections and attach a [`ClusterPeerProtocol`] to each.
struct ClusterListenerProtocol {
    reactor: Arc<Reactor>,
}

impl ClusterListenerProtocol {
    fn new(reactor: Arc<Reactor>) -> ClusterListenerProtocol {
        ClusterListenerProtocol { reactor }
    }
}

impl Protocol for ClusterListenerProtocol {
    fn on_data(&mut self, _ops: &dyn ReactorOps, listener: Uuid) {
        loop {
            match self.reactor.accept(listener) {
                Ok(Some(peer)) => {
                    self.reactor.attach(peer, Box::new(ClusterPeerProtocol::new(Arc::clone(&self.reactor))));
                    self.reactor.cluster_peers.lock().push(peer);
                }
                Ok(None) => break,
                Err(err) => {
                    log::warn!("cluster listener accept failed: {err}");
                    break;
                }
            }
        }
    }
}

/// Installed on each worker connection accepted by the master's cluster
/// listener. Relays `Cluster`/`Siblings`-scoped publishes to every other
/// connected peer; `Root`-scoped publishes are delivered to the master's own
/// subscribers only and never relayed further.
struct ClusterPeerProtocol {
    reactor: Arc<Reactor>,
    buf: Vec<u8>,
}

impl ClusterPeerProtocol {
    fn new(reactor: Arc<Reactor>) -> ClusterPeerProtocol {
        ClusterPeerProtocol {
            reactor,
            buf: Vec::new(),
        }
    }

    fn relay_to_others(&self, sender: Uuid, bytes: &[u8]) {
        for peer in self.reactor.cluster_peers.lock().iter().copied() {
            if peer != sender {
                let _ = self.reactor.write2_raw(peer, Packet::from_buffer(bytes.to_vec()), false);
            }
        }
    }
}

impl Protocol for ClusterPeerProtocol {
    fn on_data(&mut self, ops: &dyn ReactorOps, uuid: Uuid) {
        let mut chunk = [0u8; 4096];
        loop {
            match ops.read(uuid, &mut chunk) {
                Ok(0) => break,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            }
        }
        loop {
            match Frame::decode(&self.buf) {
                Ok(Some((frame, consumed))) => {
                    let raw = self.buf[..consumed].to_vec();
                    self.buf.drain(..consumed);
                    self.handle_frame(uuid, frame, &raw);
                }
                Ok(None) => break,
                Err(err) => {
                    log::warn!("malformed cluster frame from peer: {err}");
                    self.buf.clear();
                    break;
                }
            }
        }
    }

    fn on_close(&mut self, _ops: &dyn ReactorOps, uuid: Uuid) {
        self.reactor.cluster_peers.lock().retain(|peer| *peer != uuid);
    }
}

impl ClusterPeerProtocol {
    fn handle_frame(&self, sender: Uuid, frame: Frame, raw: &[u8]) {
        match frame.frame_type {
            FrameType::ForwardMsg | FrameType::ForwardJson => {
                let mut msg = Message::new(frame.filter, frame.channel.clone(), frame.payload.clone());
                msg.is_json = frame.frame_type == FrameType::ForwardJson;
                self.reactor.post_office().deliver_local(msg);
                self.relay_to_others(sender, raw);
            }
            FrameType::RootOnlyMsg | FrameType::RootOnlyJson => {
                let mut msg = Message::new(frame.filter, frame.channel, frame.payload);
                msg.is_json = frame.frame_type == FrameType::RootOnlyJson;
                self.reactor.post_office().deliver_local(msg);
            }
            FrameType::Shutdown => {
                self.relay_to_others(sender, raw);
            }
            FrameType::Subscribe
            | FrameType::Unsubscribe
            | FrameType::PatternSubscribe
            | FrameType::PatternUnsubscribe
            | FrameType::Error
            | FrameType::Ping => {
                // Each worker's own `PostOffice` already filters delivery
                // against its local subscription table; the master never
                // needs a parallel channel-interest table of its own.
            }
        }
    }
}
