use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::connection::{ConnectOptions, Connection, ConnectionId, Duplicate};
use crate::descriptor::SignalSpec;
use crate::error::{ConnectError, EmitError, ListenerError};
use crate::listener::{AnyListener, IntoListener, Listener, ListenerKey};

/// The live, per-owner registry and dispatcher for one declared signal.
///
/// Emission is synchronous: `emit` runs every listener alive at snapshot time
/// on the calling thread before returning. The connection list is only locked
/// for snapshotting and mutation, never while a listener runs, so listeners
/// may freely connect, disconnect, or re-emit on the same instance.
pub struct Signal<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    spec: &'static SignalSpec,
    connections: Mutex<Vec<Connection<T>>>,
    block_depth: Arc<AtomicUsize>,
    next_id: AtomicUsize,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self { Signal { inner: self.inner.clone() } }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.inner.spec.name())
            .field("connections", &self.inner.connections.lock().unwrap().len())
            .finish()
    }
}

enum Registered {
    Existing(ConnectionId),
    Added(ConnectionId),
}

/// Scoped emission blocker. Dropping the guard (on any exit path, including
/// panics) re-enables emission once the outermost guard is gone.
pub struct BlockGuard {
    depth: Arc<AtomicUsize>,
}

impl Drop for BlockGuard {
    fn drop(&mut self) { self.depth.fetch_sub(1, Ordering::AcqRel); }
}

impl<T: 'static> Signal<T> {
    pub fn new(spec: &'static SignalSpec) -> Self {
        Signal {
            inner: Arc::new(Inner {
                spec,
                connections: Mutex::new(Vec::new()),
                block_depth: Arc::new(AtomicUsize::new(0)),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    pub fn spec(&self) -> &'static SignalSpec { self.inner.spec }

    /// Number of live connections. Connections whose weak target has already
    /// died but has not been pruned yet are not counted.
    pub fn len(&self) -> usize {
        self.inner.connections.lock().unwrap().iter().filter(|c| !c.listener.is_dead()).count()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Connect a listener. Emission order is connection order, oldest first.
    pub fn connect<L: IntoListener<T>>(&self, listener: L) -> ConnectionId {
        let listener = listener.into_listener();
        let accepts = listener.accepts(self.inner.spec.arity());
        match self.register(listener, accepts, false) {
            Registered::Existing(id) | Registered::Added(id) => id,
        }
    }

    /// Connect a notification-only listener that receives no arguments.
    pub fn connect_notify(&self, f: impl Fn() + Send + Sync + 'static) -> ConnectionId {
        match self.register(Listener::notify(f), 0, false) {
            Registered::Existing(id) | Registered::Added(id) => id,
        }
    }

    /// Connect with deduplication: if a listener with an equal identity key is
    /// already present, this is a no-op returning the existing connection.
    pub fn connect_unique<L: IntoListener<T>>(&self, listener: L) -> ConnectionId {
        let listener = listener.into_listener();
        let accepts = listener.accepts(self.inner.spec.arity());
        match self.register(listener, accepts, true) {
            Registered::Existing(id) | Registered::Added(id) => id,
        }
    }

    /// Connect with explicit options. Validation failures are raised before
    /// any connection is stored.
    pub fn connect_with<L: IntoListener<T>>(
        &self,
        listener: L,
        opts: ConnectOptions,
    ) -> Result<ConnectionId, ConnectError> {
        let spec = self.inner.spec;
        let listener = listener.into_listener();
        let natural = listener.accepts(spec.arity());
        let accepts = opts.max_args.unwrap_or(natural);
        // A typed listener's shape fixes what it can receive: the full
        // payload or nothing. Anything else cannot be adapted.
        if accepts > spec.arity() || accepts != natural {
            return Err(ConnectError::Arity { signal: spec.name(), accepts, arity: spec.arity() });
        }
        match self.register(listener, accepts, opts.unique) {
            Registered::Added(id) => Ok(id),
            Registered::Existing(id) => match opts.on_duplicate {
                Duplicate::Ignore => Ok(id),
                Duplicate::Error => Err(ConnectError::AlreadyConnected { signal: spec.name() }),
            },
        }
    }

    fn register(&self, listener: Listener<T>, accepts: usize, unique: bool) -> Registered {
        let key = listener.key();
        let mut connections = self.inner.connections.lock().unwrap();
        if unique {
            if let Some(existing) = connections.iter().find(|c| c.key == key) {
                trace!(signal = self.inner.spec.name(), id = %existing.id, "already connected");
                return Registered::Existing(existing.id);
            }
        }
        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        trace!(signal = self.inner.spec.name(), id = %id, accepts, "listener connected");
        connections.push(Connection { id, listener, key });
        Registered::Added(id)
    }

    /// Remove the connection with the given handle. A miss is a no-op, since
    /// dead listeners may already have been pruned.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut connections = self.inner.connections.lock().unwrap();
        match connections.iter().position(|c| c.id == id) {
            Some(index) => {
                connections.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove the first connection whose identity key matches.
    pub fn disconnect_key(&self, key: &ListenerKey) -> bool {
        let mut connections = self.inner.connections.lock().unwrap();
        match connections.iter().position(|c| c.key == *key) {
            Some(index) => {
                connections.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every connection whose identity key matches; returns how many
    /// were removed.
    pub fn disconnect_key_all(&self, key: &ListenerKey) -> usize {
        let mut connections = self.inner.connections.lock().unwrap();
        let before = connections.len();
        connections.retain(|c| c.key != *key);
        before - connections.len()
    }

    /// Disconnect by target: anything connectable can be used as a lookup
    /// key, e.g. `signal.disconnect_target(Listener::method(&recv, on_value))`.
    pub fn disconnect_target<L: IntoListener<T>>(&self, target: L) -> bool {
        self.disconnect_key(&target.into_listener().key())
    }

    /// Scoped blocking: while any guard is alive, `emit` drops its arguments
    /// and returns immediately. Nesting is supported; emission resumes when
    /// the outermost guard is dropped, on any exit path.
    pub fn blocked(&self) -> BlockGuard {
        self.inner.block_depth.fetch_add(1, Ordering::AcqRel);
        BlockGuard { depth: self.inner.block_depth.clone() }
    }

    pub fn is_blocked(&self) -> bool { self.inner.block_depth.load(Ordering::Acquire) > 0 }

    /// Synchronously broadcast `args` to every listener alive at snapshot
    /// time, in connection order.
    ///
    /// Listener failures never abort the pass: every live listener runs
    /// exactly once, and failures are aggregated into one [`EmitError`]
    /// afterward. Dead weak targets are pruned after the pass without
    /// surfacing an error. A listener may re-enter `emit` on this instance;
    /// the nested call takes its own snapshot.
    pub fn emit(&self, args: T) -> Result<(), EmitError> {
        let spec = self.inner.spec;
        if self.is_blocked() {
            trace!(signal = spec.name(), "emission suppressed while blocked");
            return Ok(());
        }

        // Stable snapshot: mutations from listeners affect the live list,
        // not this pass.
        let snapshot: Vec<Connection<T>> = self.inner.connections.lock().unwrap().clone();

        let mut dead: Vec<ConnectionId> = Vec::new();
        let mut failures: Vec<ListenerError> = Vec::new();
        let mut invoked = 0usize;
        for connection in &snapshot {
            match connection.listener.invoke(&args) {
                None => dead.push(connection.id),
                Some(Ok(())) => invoked += 1,
                Some(Err(source)) => {
                    invoked += 1;
                    failures.push(ListenerError { signal: spec.name(), connection: connection.id, source });
                }
            }
        }

        if !dead.is_empty() {
            trace!(signal = spec.name(), pruned = dead.len(), "pruning dead listeners");
            self.inner.connections.lock().unwrap().retain(|c| !dead.contains(&c.id));
        }

        if failures.is_empty() { Ok(()) } else { Err(EmitError { signal: spec.name(), invoked, failures }) }
    }
}

impl<T> Signal<T>
where T: Send + Sync + 'static
{
    /// Type-erased registration path for dynamic collaborators. The declared
    /// payload type and accepted-argument count are validated here, once;
    /// nothing is re-inspected per emission.
    pub fn connect_any(&self, listener: AnyListener) -> Result<ConnectionId, ConnectError> {
        let spec = self.inner.spec;
        if listener.expects() != TypeId::of::<T>() {
            return Err(ConnectError::TypeMismatch {
                signal: spec.name(),
                expected: listener.expects_name(),
                emitted: std::any::type_name::<T>(),
            });
        }
        let accepts = listener.accepts();
        if accepts > spec.arity() {
            return Err(ConnectError::Arity { signal: spec.name(), accepts, arity: spec.arity() });
        }
        match self.register(listener.into_typed::<T>(), accepts, false) {
            Registered::Existing(id) | Registered::Added(id) => Ok(id),
        }
    }
}
