/*!
In-process signal dispatch for relay.

Objects declare typed signals; other code attaches listeners to a per-object
signal instance; emitting invokes every live listener synchronously with the
emitted arguments, in connection order.

# Design requirements:
- Connections must not keep their listener's owner alive: bound-method and
  weak-closure listeners are held weakly and pruned silently once dead.
- Emission works from a stable snapshot, so listeners can connect, disconnect,
  or re-emit on the same instance without affecting the in-flight pass.
- A failing listener never prevents its siblings from running; failures are
  aggregated and surfaced to the emitter after the pass.
- Blocking silences emission, it does not queue it.
- Rate limiting is a wrapper concern: `throttle`/`debounce` wrap any callable,
  including listeners, with leading/trailing firing policies.

# Basic usage

```rust
use relay_signals::{Signal, SignalSpec};

static VALUE_CHANGED: SignalSpec = SignalSpec::new("value_changed", &["i32"]);

let signal = Signal::<i32>::new(&VALUE_CHANGED);
signal.connect(|value: &i32| println!("value changed: {value}"));
signal.emit(42).unwrap();

let guard = signal.blocked();
signal.emit(43).unwrap(); // silenced, arguments dropped
drop(guard);
signal.emit(44).unwrap(); // delivered again
```

# Weakly-held listeners

```rust
use std::sync::Arc;
use relay_signals::{Listener, Signal, SignalSpec};

static RENAMED: SignalSpec = SignalSpec::new("renamed", &["String"]);

struct View;
impl View {
    fn on_renamed(&self, name: &String) { println!("now called {name}"); }
}

let signal = Signal::<String>::new(&RENAMED);
let view = Arc::new(View);
signal.connect(Listener::method(&view, View::on_renamed));

signal.emit("buffy".to_string()).unwrap();
drop(view); // connection dies with its receiver
signal.emit("willow".to_string()).unwrap(); // pruned silently
assert!(signal.is_empty());
```

# Rate-limited listeners

```rust
use std::time::Duration;
use relay_signals::debounce;

let wrapped = debounce(|n: u32| println!("settled at {n}"), Duration::from_millis(10), false);
for i in 0..10 {
    wrapped.call(i); // latest call wins
}
std::thread::sleep(Duration::from_millis(40)); // prints "settled at 9" once
```
*/

mod coalesce;
mod connection;
mod descriptor;
mod error;
mod listener;
mod signal;

pub use coalesce::*;
pub use connection::*;
pub use descriptor::*;
pub use error::*;
pub use listener::*;
pub use signal::*;
