use std::ops::Deref;
use std::sync::OnceLock;

use crate::signal::Signal;

/// Class-level declaration of a signal: a name plus the ordered argument
/// kinds it emits. Declared once (typically as a `static`) and shared by
/// every instance bound to it; never mutated.
#[derive(Debug)]
pub struct SignalSpec {
    name: &'static str,
    args: &'static [&'static str],
}

impl SignalSpec {
    pub const fn new(name: &'static str, args: &'static [&'static str]) -> Self { SignalSpec { name, args } }

    pub const fn name(&self) -> &'static str { self.name }

    /// Ordered argument kind names, used for connect-time diagnostics.
    pub const fn args(&self) -> &'static [&'static str] { self.args }

    pub const fn arity(&self) -> usize { self.args.len() }
}

/// Lazy per-owner binding of a [`SignalSpec`]: the owner embeds one cell per
/// declared signal, and the first access creates exactly one [`Signal`]
/// instance for that (owner, spec) pair. The instance lives inside the owner
/// and dies with it.
///
/// ```rust
/// use relay_signals::{SignalCell, SignalSpec};
///
/// static VALUE_CHANGED: SignalSpec = SignalSpec::new("value_changed", &["i32"]);
///
/// struct Counter {
///     value_changed: SignalCell<i32>,
/// }
///
/// let counter = Counter { value_changed: SignalCell::new(&VALUE_CHANGED) };
/// counter.value_changed.connect(|value: &i32| println!("now {value}"));
/// counter.value_changed.emit(1).unwrap();
/// ```
pub struct SignalCell<T> {
    spec: &'static SignalSpec,
    cell: OnceLock<Signal<T>>,
}

impl<T: 'static> SignalCell<T> {
    pub const fn new(spec: &'static SignalSpec) -> Self { SignalCell { spec, cell: OnceLock::new() } }

    /// The signal instance for this owner, created on first access.
    pub fn get(&self) -> &Signal<T> { self.cell.get_or_init(|| Signal::new(self.spec)) }
}

impl<T: 'static> Deref for SignalCell<T> {
    type Target = Signal<T>;

    fn deref(&self) -> &Signal<T> { self.get() }
}
