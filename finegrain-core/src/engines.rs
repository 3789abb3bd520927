//! Counter Engines
//!
//! Three implementations of the same tiny app: a counter whose content shows
//! the count and whose "class" flips once the count exceeds 10. Each engine
//! reports how many times it touched the output, which is what separates
//! coarse-grained from fine-grained propagation.
//!
//! # The Engines
//!
//! - [`GetterSetterEngine`]: one cell that notifies on every write, watched
//!   by a single render function that updates both content and class.
//! - [`ProxyEngine`]: the same thing over a reactive object.
//! - [`SignalsEngine`]: an equality-gated signal, a computed `is_too_big`,
//!   and one effect per output. The class effect only runs when
//!   `is_too_big` actually changes.
//!
//! Every engine renders once on creation. After 20 increments the coarse
//! engines report 42 touches (21 of them class updates); the signals engine
//! reports 23 (2 class updates).

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ReactiveError;
use crate::reactive::{
    Computed, Effect, NotifyPolicy, Object, ProxyOptions, ReactiveObject, Signal, Value,
};

/// Threshold above which the counter is "too big".
pub const TOO_BIG: i64 = 10;

fn is_too_big(count: i64) -> bool {
    count > TOO_BIG
}

/// Output touches recorded by a [`RenderCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderCounts {
    /// Content and class touches together.
    pub total: usize,
    pub class_updates: usize,
}

#[derive(Default)]
struct CounterState {
    total: Cell<usize>,
    class_updates: Cell<usize>,
    content: Cell<i64>,
    too_big: Cell<bool>,
}

/// Stand-in for the rendered output. Counts every touch.
///
/// Cloning shares the counts.
#[derive(Clone, Default)]
pub struct RenderCounter {
    state: Rc<CounterState>,
}

impl RenderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the displayed count.
    pub fn touch_content(&self, value: i64) {
        let state = &self.state;
        state.total.set(state.total.get() + 1);
        state.content.set(value);
        trace!(value, total = state.total.get(), "content touched");
    }

    /// Write the "too big" class.
    pub fn touch_class(&self, too_big: bool) {
        let state = &self.state;
        state.total.set(state.total.get() + 1);
        state.class_updates.set(state.class_updates.get() + 1);
        state.too_big.set(too_big);
        trace!(too_big, class_updates = state.class_updates.get(), "class touched");
    }

    pub fn counts(&self) -> RenderCounts {
        RenderCounts {
            total: self.state.total.get(),
            class_updates: self.state.class_updates.get(),
        }
    }

    /// Last rendered count.
    pub fn content(&self) -> i64 {
        self.state.content.get()
    }

    /// Last rendered class.
    pub fn too_big(&self) -> bool {
        self.state.too_big.get()
    }
}

impl fmt::Debug for RenderCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCounter")
            .field("counts", &self.counts())
            .field("content", &self.content())
            .field("too_big", &self.too_big())
            .finish()
    }
}

/// Common interface of the counter engines.
pub trait CounterEngine {
    fn kind(&self) -> EngineKind;

    /// Add one to the count.
    fn increment(&self);

    /// Current count.
    fn value(&self) -> i64;

    /// Output touches so far.
    fn counts(&self) -> RenderCounts;

    /// The output the engine renders into.
    fn output(&self) -> &RenderCounter;
}

/// Coarse-grained: a cell that notifies on every write.
pub struct GetterSetterEngine {
    count: Signal<i64>,
    output: RenderCounter,
    _render: Effect,
}

impl GetterSetterEngine {
    pub fn new() -> Self {
        let count = Signal::with_policy(0_i64, NotifyPolicy::Always);
        let output = RenderCounter::new();

        let render = Effect::new({
            let count = count.clone();
            let output = output.clone();
            move || {
                let value = count.get();
                output.touch_content(value);
                output.touch_class(is_too_big(value));
            }
        });

        Self {
            count,
            output,
            _render: render,
        }
    }
}

impl Default for GetterSetterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterEngine for GetterSetterEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::GetterSetter
    }

    fn increment(&self) {
        let next = self.count.get_untracked() + 1;
        self.count.set(next);
    }

    fn value(&self) -> i64 {
        self.count.get_untracked()
    }

    fn counts(&self) -> RenderCounts {
        self.output.counts()
    }

    fn output(&self) -> &RenderCounter {
        &self.output
    }
}

/// Coarse-grained: a reactive object that notifies on every write.
pub struct ProxyEngine {
    state: ReactiveObject,
    output: RenderCounter,
    _render: Effect,
}

impl ProxyEngine {
    pub fn new() -> Self {
        let options = ProxyOptions::new().policy(NotifyPolicy::Always);
        let state = ReactiveObject::wrap_with(Object::from_pairs([("count", 0)]), options)
            .expect("a fresh object is always wrappable");
        let output = RenderCounter::new();

        let render = Effect::new({
            let state = state.clone();
            let output = output.clone();
            move || {
                let value = read_count(state.get_value("count"));
                output.touch_content(value);
                output.touch_class(is_too_big(value));
            }
        });

        Self {
            state,
            output,
            _render: render,
        }
    }
}

impl Default for ProxyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn read_count(value: Option<Value>) -> i64 {
    value.and_then(|v| v.as_f64()).unwrap_or_default() as i64
}

impl CounterEngine for ProxyEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Proxy
    }

    fn increment(&self) {
        let next = self.value() + 1;
        self.state.set("count", next as f64);
    }

    fn value(&self) -> i64 {
        read_count(self.state.raw().get("count"))
    }

    fn counts(&self) -> RenderCounts {
        self.output.counts()
    }

    fn output(&self) -> &RenderCounter {
        &self.output
    }
}

/// Fine-grained: a gated signal, a computed threshold, one effect per
/// output.
pub struct SignalsEngine {
    count: Signal<i64>,
    too_big: Computed<bool>,
    output: RenderCounter,
    _content: Effect,
    _class: Effect,
}

impl SignalsEngine {
    pub fn new() -> Self {
        let count = Signal::new(0_i64);
        let output = RenderCounter::new();

        let too_big = Computed::new({
            let count = count.clone();
            move || is_too_big(count.get())
        });

        let content = Effect::new({
            let count = count.clone();
            let output = output.clone();
            move || output.touch_content(count.get())
        });

        let class = Effect::new({
            let too_big = too_big.clone();
            let output = output.clone();
            move || output.touch_class(too_big.get())
        });

        Self {
            count,
            too_big,
            output,
            _content: content,
            _class: class,
        }
    }

    /// Current value of the computed threshold.
    pub fn is_too_big(&self) -> bool {
        self.too_big.get_untracked()
    }
}

impl Default for SignalsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterEngine for SignalsEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Signals
    }

    fn increment(&self) {
        self.count.update(|count| count + 1);
    }

    fn value(&self) -> i64 {
        self.count.get_untracked()
    }

    fn counts(&self) -> RenderCounts {
        self.output.counts()
    }

    fn output(&self) -> &RenderCounter {
        &self.output
    }
}

/// Names the counter engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    GetterSetter,
    Proxy,
    Signals,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [Self::GetterSetter, Self::Proxy, Self::Signals];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetterSetter => "getter-setter",
            Self::Proxy => "proxy",
            Self::Signals => "signals",
        }
    }

    /// Build a fresh engine of this kind.
    pub fn build(self) -> Box<dyn CounterEngine> {
        match self {
            Self::GetterSetter => Box::new(GetterSetterEngine::new()),
            Self::Proxy => Box::new(ProxyEngine::new()),
            Self::Signals => Box::new(SignalsEngine::new()),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = ReactiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "getter-setter" | "getter_setter" | "getters" => Ok(Self::GetterSetter),
            "proxy" => Ok(Self::Proxy),
            "signals" | "signal" => Ok(Self::Signals),
            _ => Err(ReactiveError::UnknownStrategy(s.to_string())),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: EngineKind, increments: usize) -> Box<dyn CounterEngine> {
        let engine = kind.build();
        for _ in 0..increments {
            engine.increment();
        }
        engine
    }

    #[test]
    fn every_engine_renders_once_on_creation() {
        for kind in EngineKind::ALL {
            let engine = kind.build();
            assert_eq!(engine.kind(), kind);
            assert_eq!(engine.counts().class_updates, 1, "{kind}");
            assert_eq!(engine.counts().total, 2, "{kind}");
        }
    }

    #[test]
    fn coarse_engines_touch_class_on_every_increment() {
        for kind in [EngineKind::GetterSetter, EngineKind::Proxy] {
            let engine = run(kind, 20);
            assert_eq!(engine.value(), 20);
            assert_eq!(
                engine.counts(),
                RenderCounts { total: 42, class_updates: 21 },
                "{kind}"
            );
        }
    }

    #[test]
    fn signals_engine_touches_class_only_when_threshold_flips() {
        let engine = run(EngineKind::Signals, 20);
        assert_eq!(engine.value(), 20);
        assert_eq!(engine.counts(), RenderCounts { total: 23, class_updates: 2 });
        assert!(engine.output().too_big());
        assert_eq!(engine.output().content(), 20);
    }

    #[test]
    fn threshold_flips_on_the_eleventh_increment() {
        let engine = SignalsEngine::new();
        for _ in 0..10 {
            engine.increment();
        }
        assert!(!engine.is_too_big());
        assert_eq!(engine.counts().class_updates, 1);

        engine.increment();
        assert!(engine.is_too_big());
        assert_eq!(engine.counts().class_updates, 2);
    }

    #[test]
    fn engine_kind_parses_and_displays() {
        assert_eq!("proxy".parse::<EngineKind>().unwrap(), EngineKind::Proxy);
        assert_eq!(" Signals ".parse::<EngineKind>().unwrap(), EngineKind::Signals);
        assert_eq!(
            "getter_setter".parse::<EngineKind>().unwrap(),
            EngineKind::GetterSetter
        );
        assert_eq!(EngineKind::GetterSetter.to_string(), "getter-setter");

        let err = "vdom".parse::<EngineKind>().unwrap_err();
        assert!(matches!(err, ReactiveError::UnknownStrategy(name) if name == "vdom"));
    }
}
