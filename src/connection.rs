use crate::listener::{Listener, ListenerKey};

/// Handle returned by `connect`, usable for disconnection. Does not keep the
/// connection (or the signal) alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) usize);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// What `unique` connects do when an equal identity key is already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Duplicate {
    /// Already connected; keep the existing connection and return its id.
    #[default]
    Ignore,
    /// Fail with [`crate::ConnectError::AlreadyConnected`].
    Error,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectOptions {
    /// Deduplicate by listener identity key.
    pub unique: bool,
    /// Policy applied when `unique` finds an existing equal key.
    pub on_duplicate: Duplicate,
    /// Override of the number of leading emitted arguments forwarded to the
    /// listener. Values above the signal's arity fail at connect time.
    pub max_args: Option<usize>,
}

/// One registered listener plus its identity key. Argument adaptation is
/// baked into the listener's shape at connect time, so nothing here is
/// re-inspected per emission.
pub(crate) struct Connection<T> {
    pub id: ConnectionId,
    pub listener: Listener<T>,
    pub key: ListenerKey,
}

impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Connection { id: self.id, listener: self.listener.clone(), key: self.key }
    }
}
