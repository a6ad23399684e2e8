use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

use crate::error::BoxError;

/// Outcome of one listener invocation.
pub type ListenerResult = Result<(), BoxError>;

type PayloadFn<T> = dyn Fn(&T) -> ListenerResult + Send + Sync;
type NotifyFn = dyn Fn() -> ListenerResult + Send + Sync;
type BoundFn<T> = dyn Fn(&(dyn Any + Send + Sync), &T) -> ListenerResult + Send + Sync;
type ErasedFn = dyn Fn(&(dyn Any + Send + Sync)) -> ListenerResult + Send + Sync;

/// Identity of the underlying callable, stable across repeated wrapping of
/// the same target. Two keys compare equal iff they would invoke the same
/// function on the same receiver, so it is usable for deduplication and
/// disconnection lookups without holding the target alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    target: usize,
    method: usize,
}

/// A registered callable in one of three ownership shapes:
///
/// - [`Listener::Payload`] / [`Listener::NotifyOnly`] hold the callable
///   strongly. This is the escape hatch for closures with no external strong
///   holder; the caller is responsible for disconnecting them.
/// - [`Listener::Weak`] holds only a weak reference to its target (a receiver
///   object or a caller-owned closure) and re-binds at call time. When the
///   target is gone the listener reports dead and is pruned silently.
pub enum Listener<T> {
    /// Strong callback receiving the full emitted payload.
    Payload(Arc<PayloadFn<T>>),
    /// Strong callback receiving no arguments.
    NotifyOnly(Arc<NotifyFn>),
    /// Weakly-held target plus the function to re-bind onto it at call time.
    Weak { target: Weak<dyn Any + Send + Sync>, call: Arc<BoundFn<T>>, fn_addr: usize },
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        match self {
            Listener::Payload(f) => Listener::Payload(f.clone()),
            Listener::NotifyOnly(f) => Listener::NotifyOnly(f.clone()),
            Listener::Weak { target, call, fn_addr } => {
                Listener::Weak { target: target.clone(), call: call.clone(), fn_addr: *fn_addr }
            }
        }
    }
}

impl<T: 'static> Listener<T> {
    /// Infallible strong payload callback.
    pub fn payload(f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Listener::Payload(Arc::new(move |args| {
            f(args);
            Ok(())
        }))
    }

    /// Fallible strong payload callback. Failures are collected per emission
    /// pass and surfaced to the emitter as one aggregated error.
    pub fn try_payload(f: impl Fn(&T) -> ListenerResult + Send + Sync + 'static) -> Self {
        Listener::Payload(Arc::new(f))
    }

    /// Strong callback that only wants the notification, not the arguments.
    pub fn notify(f: impl Fn() + Send + Sync + 'static) -> Self {
        Listener::NotifyOnly(Arc::new(move || {
            f();
            Ok(())
        }))
    }

    /// Fallible variant of [`Listener::notify`].
    pub fn try_notify(f: impl Fn() -> ListenerResult + Send + Sync + 'static) -> Self {
        Listener::NotifyOnly(Arc::new(f))
    }

    /// Weakly-held closure. The connection does not keep `f` alive; when the
    /// caller drops its `Arc`, the listener is pruned on the next emission.
    pub fn weak<F>(f: &Arc<F>) -> Self
    where F: Fn(&T) + Send + Sync + 'static {
        let target: Arc<dyn Any + Send + Sync> = f.clone();
        Listener::Weak {
            target: Arc::downgrade(&target),
            call: Arc::new(move |any, args| {
                if let Some(f) = any.downcast_ref::<F>() {
                    f(args);
                }
                Ok(())
            }),
            fn_addr: 0,
        }
    }

    /// Method on a weakly-held receiver. Resolution re-binds `method` onto the
    /// receiver at call time; a dead receiver makes the listener dead.
    ///
    /// Repeated wrapping of the same `(receiver, method)` pair yields equal
    /// identity keys.
    pub fn method<R>(receiver: &Arc<R>, method: fn(&R, &T)) -> Self
    where R: Send + Sync + 'static {
        let target: Arc<dyn Any + Send + Sync> = receiver.clone();
        Listener::Weak {
            target: Arc::downgrade(&target),
            call: Arc::new(move |any, args| {
                if let Some(receiver) = any.downcast_ref::<R>() {
                    method(receiver, args);
                }
                Ok(())
            }),
            fn_addr: method as usize,
        }
    }

    /// Fallible variant of [`Listener::method`].
    pub fn try_method<R>(receiver: &Arc<R>, method: fn(&R, &T) -> ListenerResult) -> Self
    where R: Send + Sync + 'static {
        let target: Arc<dyn Any + Send + Sync> = receiver.clone();
        Listener::Weak {
            target: Arc::downgrade(&target),
            call: Arc::new(move |any, args| match any.downcast_ref::<R>() {
                Some(receiver) => method(receiver, args),
                None => Ok(()),
            }),
            fn_addr: method as usize,
        }
    }

    /// Method with fixed extra arguments bound at connect time (partial
    /// application). Identity remains `(receiver, method)`: the bound
    /// arguments are considered part of the method's identity.
    pub fn method_bound<R, B>(receiver: &Arc<R>, bound: B, method: fn(&R, &B, &T)) -> Self
    where
        R: Send + Sync + 'static,
        B: Send + Sync + 'static,
    {
        let target: Arc<dyn Any + Send + Sync> = receiver.clone();
        Listener::Weak {
            target: Arc::downgrade(&target),
            call: Arc::new(move |any, args| {
                if let Some(receiver) = any.downcast_ref::<R>() {
                    method(receiver, &bound, args);
                }
                Ok(())
            }),
            fn_addr: method as usize,
        }
    }

    /// Invoke the listener, resolving weak targets first.
    /// Returns `None` when the target is dead.
    pub(crate) fn invoke(&self, args: &T) -> Option<ListenerResult> {
        match self {
            Listener::Payload(f) => Some(f(args)),
            Listener::NotifyOnly(f) => Some(f()),
            Listener::Weak { target, call, .. } => {
                let target = target.upgrade()?;
                Some(call(&*target, args))
            }
        }
    }

    /// Whether a weakly-held target has already been dropped.
    pub fn is_dead(&self) -> bool {
        match self {
            Listener::Weak { target, .. } => target.strong_count() == 0,
            _ => false,
        }
    }

    /// Number of leading emitted arguments this listener naturally accepts,
    /// given the signal's declared arity.
    pub(crate) fn accepts(&self, arity: usize) -> usize {
        match self {
            Listener::NotifyOnly(_) => 0,
            _ => arity,
        }
    }

    /// Stable identity key for deduplication and disconnection.
    pub fn key(&self) -> ListenerKey {
        match self {
            Listener::Payload(f) => ListenerKey { target: Arc::as_ptr(f) as *const () as usize, method: 0 },
            Listener::NotifyOnly(f) => ListenerKey { target: Arc::as_ptr(f) as *const () as usize, method: 0 },
            Listener::Weak { target, fn_addr, .. } => {
                ListenerKey { target: target.as_ptr() as *const () as usize, method: *fn_addr }
            }
        }
    }
}

/// Conversion into a [`Listener`], mirroring what `connect` accepts.
pub trait IntoListener<T> {
    fn into_listener(self) -> Listener<T>;
}

impl<T, F> IntoListener<T> for F
where
    T: 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    fn into_listener(self) -> Listener<T> { Listener::payload(self) }
}

impl<T> IntoListener<T> for Listener<T> {
    fn into_listener(self) -> Listener<T> { self }
}

impl<T> IntoListener<T> for Arc<PayloadFn<T>> {
    fn into_listener(self) -> Listener<T> { Listener::Payload(self) }
}

impl<T> IntoListener<T> for std::sync::mpsc::Sender<T>
where T: Clone + Send + 'static
{
    fn into_listener(self) -> Listener<T> {
        Listener::payload(move |value: &T| {
            let _ = self.send(value.clone()); // receiver may be gone; not our problem
        })
    }
}

#[cfg(feature = "tokio")]
impl<T> IntoListener<T> for tokio::sync::mpsc::UnboundedSender<T>
where T: Clone + Send + 'static
{
    fn into_listener(self) -> Listener<T> {
        Listener::payload(move |value: &T| {
            let _ = self.send(value.clone());
        })
    }
}

/// Type-erased registration form used by dynamic collaborators (signal
/// groups, evented proxies) that cannot name the payload type statically.
/// The declared payload type and accepted-argument count are validated once
/// at connect time; emission invokes the erased callable directly.
pub struct AnyListener {
    expects: TypeId,
    expects_name: &'static str,
    accepts: usize,
    call: Arc<ErasedFn>,
}

impl AnyListener {
    pub fn new<U>(accepts: usize, f: impl Fn(&U) -> ListenerResult + Send + Sync + 'static) -> Self
    where U: Send + Sync + 'static {
        AnyListener {
            expects: TypeId::of::<U>(),
            expects_name: std::any::type_name::<U>(),
            accepts,
            call: Arc::new(move |any| match any.downcast_ref::<U>() {
                Some(args) => f(args),
                None => Ok(()),
            }),
        }
    }

    pub(crate) fn expects(&self) -> TypeId { self.expects }

    pub(crate) fn expects_name(&self) -> &'static str { self.expects_name }

    pub(crate) fn accepts(&self) -> usize { self.accepts }

    pub(crate) fn into_typed<T>(self) -> Listener<T>
    where T: Send + Sync + 'static {
        let call = self.call;
        Listener::Payload(Arc::new(move |args: &T| call(args)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Receiver;

    fn on_value(_receiver: &Receiver, _value: &i32) {}
    fn on_other(_receiver: &Receiver, _value: &i32) {}

    #[test]
    fn test_method_key_stable_across_rewrapping() {
        let receiver = Arc::new(Receiver);
        let a = Listener::method(&receiver, on_value);
        let b = Listener::method(&receiver, on_value);
        assert_eq!(a.key(), b.key());

        let c = Listener::method(&receiver, on_other);
        assert_ne!(a.key(), c.key());

        let other = Arc::new(Receiver);
        let d = Listener::method(&other, on_value);
        assert_ne!(a.key(), d.key());
    }

    #[test]
    fn test_distinct_closures_have_distinct_keys() {
        let a = Listener::<i32>::payload(|_| {});
        let b = Listener::<i32>::payload(|_| {});
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a.clone().key());
    }

    #[test]
    fn test_dead_receiver_resolves_to_none() {
        let receiver = Arc::new(Receiver);
        let listener = Listener::method(&receiver, on_value);
        assert!(listener.invoke(&1).is_some());
        drop(receiver);
        assert!(listener.is_dead());
        assert!(listener.invoke(&1).is_none());
    }

    #[test]
    fn test_notify_only_accepts_zero_arguments() {
        let listener = Listener::<i32>::notify(|| {});
        assert_eq!(listener.accepts(3), 0);
        let listener = Listener::<i32>::payload(|_| {});
        assert_eq!(listener.accepts(3), 3);
    }
}
