use thiserror::Error;

use crate::connection::ConnectionId;

/// Boxed error type carried by fallible listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Validation failures raised by `connect_with` / `connect_any` before any
/// connection is stored.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("cannot forward {accepts} of `{signal}`'s {arity} emitted arguments to this listener")]
    Arity { signal: &'static str, accepts: usize, arity: usize },
    #[error("listener expects `{expected}` but signal `{signal}` emits `{emitted}`")]
    TypeMismatch { signal: &'static str, expected: &'static str, emitted: &'static str },
    #[error("an equivalent listener is already connected to signal `{signal}`")]
    AlreadyConnected { signal: &'static str },
}

/// One listener failure captured during an emission pass.
#[derive(Error, Debug)]
#[error("listener #{connection} on `{signal}`: {source}")]
pub struct ListenerError {
    pub signal: &'static str,
    pub connection: ConnectionId,
    #[source]
    pub source: BoxError,
}

/// Aggregate of every listener failure from one emission pass. By the time
/// this is returned, every listener that was alive at snapshot time has run.
#[derive(Error, Debug)]
#[error("{} of {invoked} listeners failed during emission of `{signal}`", .failures.len())]
pub struct EmitError {
    pub signal: &'static str,
    pub invoked: usize,
    pub failures: Vec<ListenerError>,
}
