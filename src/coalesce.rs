use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::error;

use crate::listener::{IntoListener, Listener};

/// Firing policy of a [`Coalesced`] wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Throttle,
    Debounce,
}

struct State<T> {
    /// Latest-call-wins argument slot; earlier calls in a burst are
    /// discarded, not queued.
    pending: Option<T>,
    trailing_owed: bool,
    deadline: Option<Instant>,
    disposed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    cv: Condvar,
    callback: Box<dyn Fn(T) + Send + Sync>,
    timeout: Duration,
    leading: bool,
    mode: Mode,
}

impl<T> Shared<T> {
    /// Panics in the wrapped callable must not take the timer thread down
    /// with them.
    fn invoke(&self, args: T) {
        if catch_unwind(AssertUnwindSafe(|| (self.callback)(args))).is_err() {
            error!(mode = ?self.mode, "coalesced callback panicked; timer continues");
        }
    }
}

/// A callable wrapped with a minimum time spacing between invocations.
/// Created by [`throttle`] or [`debounce`]; call it via [`Coalesced::call`]
/// or attach an `Arc<Coalesced<T>>` to a signal as a listener.
///
/// One timer thread per wrapper parks on a condvar and shares a single mutex
/// with the synchronous call path. Dropping the wrapper cancels any pending
/// invocation and joins the timer thread.
pub struct Coalesced<T> {
    shared: Arc<Shared<T>>,
    timer: Option<JoinHandle<()>>,
}

impl<T> std::fmt::Debug for Coalesced<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalesced")
            .field("mode", &self.shared.mode)
            .field("timeout", &self.shared.timeout)
            .field("leading", &self.shared.leading)
            .finish()
    }
}

/// Rate-limit `f` to at most one invocation per `timeout` window. With
/// `leading`, the first call of a burst fires synchronously; the last call's
/// arguments fire again when the window elapses. Without `leading`, a burst
/// produces only the trailing invocation.
pub fn throttle<T, F>(f: F, timeout: Duration, leading: bool) -> Coalesced<T>
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    Coalesced::new(Mode::Throttle, f, timeout, leading)
}

/// Collapse a burst of calls into activity at its edges: the wrapped callable
/// fires once `timeout` has elapsed with no further call, with the latest
/// arguments. With `leading`, the first call of a burst also fires
/// immediately, and the trailing invocation is suppressed when it was the
/// only call in the burst.
pub fn debounce<T, F>(f: F, timeout: Duration, leading: bool) -> Coalesced<T>
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    Coalesced::new(Mode::Debounce, f, timeout, leading)
}

impl<T: Send + 'static> Coalesced<T> {
    fn new<F>(mode: Mode, f: F, timeout: Duration, leading: bool) -> Self
    where F: Fn(T) + Send + Sync + 'static {
        let shared = Arc::new(Shared {
            state: Mutex::new(State { pending: None, trailing_owed: false, deadline: None, disposed: false }),
            cv: Condvar::new(),
            callback: Box::new(f),
            timeout,
            leading,
            mode,
        });
        let timer = {
            let shared = shared.clone();
            thread::spawn(move || timer_loop(&shared))
        };
        Coalesced { shared, timer: Some(timer) }
    }

    /// Feed a call into the wrapper. Depending on the policy this either
    /// invokes the wrapped callable synchronously (leading edge) or records
    /// the arguments for a deferred invocation.
    pub fn call(&self, args: T) {
        let shared = &self.shared;
        let mut state = shared.state.lock().unwrap();
        if state.disposed {
            return;
        }
        let now = Instant::now();
        match shared.mode {
            Mode::Throttle => {
                if state.deadline.is_none() {
                    state.deadline = Some(now + shared.timeout);
                    shared.cv.notify_all();
                    if shared.leading {
                        drop(state);
                        shared.invoke(args);
                        return;
                    }
                    state.pending = Some(args);
                    state.trailing_owed = true;
                } else {
                    // window already open: update the pending slot only
                    state.pending = Some(args);
                    state.trailing_owed = true;
                }
            }
            Mode::Debounce => {
                let first_in_burst = state.deadline.is_none();
                state.deadline = Some(now + shared.timeout);
                shared.cv.notify_all();
                if shared.leading && first_in_burst {
                    // fires alone; a trailing call is owed only if more
                    // calls arrive before the quiet period elapses
                    state.pending = None;
                    state.trailing_owed = false;
                    drop(state);
                    shared.invoke(args);
                    return;
                }
                state.pending = Some(args);
                state.trailing_owed = true;
            }
        }
    }

    /// Fire an owed trailing invocation immediately instead of waiting for
    /// the timer.
    pub fn flush(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock().unwrap();
        if state.disposed || !state.trailing_owed {
            return;
        }
        state.trailing_owed = false;
        let args = state.pending.take();
        if shared.mode == Mode::Debounce {
            state.deadline = None;
            shared.cv.notify_all();
        }
        if let Some(args) = args {
            drop(state);
            shared.invoke(args);
        }
    }

    /// Discard any pending invocation. Idempotent; the wrapper remains
    /// usable afterwards.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.pending = None;
        state.trailing_owed = false;
        state.deadline = None;
        self.shared.cv.notify_all();
    }
}

impl<T> Drop for Coalesced<T> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.disposed = true;
            state.pending = None;
            state.trailing_owed = false;
            state.deadline = None;
            self.shared.cv.notify_all();
        }
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
    }
}

fn timer_loop<T>(shared: &Shared<T>) {
    let mut state = shared.state.lock().unwrap();
    loop {
        if state.disposed {
            return;
        }
        match state.deadline {
            None => state = shared.cv.wait(state).unwrap(),
            Some(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    // the deadline may move (debounce resets) or vanish
                    // (cancel) while we sleep; re-evaluate on every wakeup
                    state = shared.cv.wait_timeout(state, deadline - now).unwrap().0;
                } else {
                    state = expire(shared, state);
                }
            }
        }
    }
}

/// Apply the firing policy once a window/quiet-period deadline has elapsed.
/// The lock is released while the wrapped callable runs.
fn expire<'a, T>(shared: &'a Shared<T>, mut state: MutexGuard<'a, State<T>>) -> MutexGuard<'a, State<T>> {
    match shared.mode {
        Mode::Throttle => {
            if state.trailing_owed {
                state.trailing_owed = false;
                let args = state.pending.take();
                // the trailing call opens a fresh rate-limit window
                state.deadline = Some(Instant::now() + shared.timeout);
                if let Some(args) = args {
                    drop(state);
                    shared.invoke(args);
                    return shared.state.lock().unwrap();
                }
            } else {
                state.deadline = None;
            }
        }
        Mode::Debounce => {
            state.deadline = None;
            if state.trailing_owed {
                state.trailing_owed = false;
                if let Some(args) = state.pending.take() {
                    drop(state);
                    shared.invoke(args);
                    return shared.state.lock().unwrap();
                }
            }
        }
    }
    state
}

/// A coalesced callable attaches to a signal like any other listener; the
/// connection holds it strongly through the `Arc`.
impl<T> IntoListener<T> for Arc<Coalesced<T>>
where T: Clone + Send + Sync + 'static
{
    fn into_listener(self) -> Listener<T> {
        Listener::payload(move |args: &T| self.call(args.clone()))
    }
}
