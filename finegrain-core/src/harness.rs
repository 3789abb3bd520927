//! Benchmark Harness
//!
//! Runs a fixed number of counter writes through each reactivity strategy and
//! reports the final value, how many renders happened, and how long the
//! writes took.
//!
//! - `legacy`: a [`LegacyObject`] over `{ count: 0 }`. On the last iteration
//!   a key is added, which the listener never hears about.
//! - `proxy`: a [`ReactiveObject`] over `{ nested: { count: 0 } }`, written
//!   through the nested path. Halfway through, `nested.extra` is added and
//!   that addition *is* observed.
//! - `signals`: a signal read by one effect. The effect's initial run counts
//!   as a render.
//!
//! With the default 1000 iterations the render counts are 1000, 1001 and
//! 1001 respectively.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{ReactiveError, Result};
use crate::reactive::{
    ChangeEvent, Effect, LegacyObject, Object, ProxyOptions, ReactiveObject, Signal, Value,
};

/// Iterations used when none are configured.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// A benchmarked reactivity strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Legacy,
    Proxy,
    Signals,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Self::Legacy, Self::Proxy, Self::Signals];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Proxy => "proxy",
            Self::Signals => "signals",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ReactiveError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ReactiveError::UnknownStrategy(s.to_string()))
    }
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn default_strategies() -> Vec<Strategy> {
    Strategy::ALL.to_vec()
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<Strategy>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            strategies: default_strategies(),
        }
    }
}

impl BenchConfig {
    /// Parse a configuration document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn strategies(mut self, strategies: impl IntoIterator<Item = Strategy>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }
}

/// Outcome of one strategy run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchReport {
    pub strategy: Strategy,
    pub iterations: usize,
    pub final_value: f64,
    pub render_count: usize,
    pub elapsed: Duration,
}

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

fn bump(renders: &Cell<usize>) {
    renders.set(renders.get() + 1);
}

fn number(value: Option<Value>) -> f64 {
    value.and_then(|v| v.as_f64()).unwrap_or_default()
}

fn report(
    strategy: Strategy,
    iterations: usize,
    final_value: f64,
    render_count: usize,
    elapsed: Duration,
) -> BenchReport {
    let report = BenchReport {
        strategy,
        iterations,
        final_value,
        render_count,
        elapsed,
    };
    info!(
        strategy = %strategy,
        iterations,
        final_value,
        render_count,
        elapsed_us = elapsed.as_micros() as u64,
        "bench finished"
    );
    report
}

/// Accessor-pair object; the late key stays silent.
pub fn run_legacy(iterations: usize) -> Result<BenchReport> {
    let renders = counter();
    let state = LegacyObject::instrument_with(Object::from_pairs([("count", 0)]), {
        let renders = renders.clone();
        move |_: &ChangeEvent| bump(&renders)
    })?;

    let start = Instant::now();
    for i in 0..iterations {
        let next = number(state.get("count")) + 1.0;
        state.set("count", next);
        if i + 1 == iterations {
            state.set("added_later", i as f64);
        }
    }
    let elapsed = start.elapsed();

    let final_value = number(state.get("count"));
    Ok(report(Strategy::Legacy, iterations, final_value, renders.get(), elapsed))
}

/// Deep proxy written through a nested path; the mid-run key is observed.
pub fn run_proxy(iterations: usize) -> Result<BenchReport> {
    let renders = counter();
    let options = ProxyOptions::new().on_change({
        let renders = renders.clone();
        move |_: &ChangeEvent| bump(&renders)
    });
    let state = ReactiveObject::from_json(json!({ "nested": { "count": 0 } }), options)?;

    let nested_count = |state: &ReactiveObject| {
        number(state.get_object("nested").and_then(|nested| nested.get_value("count")))
    };

    let start = Instant::now();
    for i in 0..iterations {
        let next = nested_count(&state) + 1.0;
        if let Some(nested) = state.get_object("nested") {
            nested.set("count", next);
            if i == iterations / 2 {
                nested.set("extra", "added mid-flight");
            }
        }
    }
    let elapsed = start.elapsed();

    let final_value = nested_count(&state);
    Ok(report(Strategy::Proxy, iterations, final_value, renders.get(), elapsed))
}

/// A signal and one rendering effect.
pub fn run_signals(iterations: usize) -> Result<BenchReport> {
    let renders = counter();
    let count = Signal::new(0.0_f64);
    let _render = Effect::new({
        let count = count.clone();
        let renders = renders.clone();
        move || {
            count.get();
            bump(&renders);
        }
    });

    let start = Instant::now();
    for _ in 0..iterations {
        count.set(count.get_untracked() + 1.0);
    }
    let elapsed = start.elapsed();

    Ok(report(Strategy::Signals, iterations, count.get_untracked(), renders.get(), elapsed))
}

/// Run one strategy.
pub fn run(strategy: Strategy, iterations: usize) -> Result<BenchReport> {
    match strategy {
        Strategy::Legacy => run_legacy(iterations),
        Strategy::Proxy => run_proxy(iterations),
        Strategy::Signals => run_signals(iterations),
    }
}

/// Run every configured strategy in order.
pub fn run_all(config: &BenchConfig) -> Result<Vec<BenchReport>> {
    config
        .strategies
        .iter()
        .map(|&strategy| run(strategy, config.iterations))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config = BenchConfig::from_json("{}").unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.iterations, 1000);
        assert_eq!(config.strategies, Strategy::ALL);

        let config = BenchConfig::from_json(r#"{ "iterations": 5, "strategies": ["signals"] }"#).unwrap();
        assert_eq!(config.iterations, 5);
        assert_eq!(config.strategies, [Strategy::Signals]);
    }

    #[test]
    fn bad_config_is_a_config_error() {
        let err = BenchConfig::from_json(r#"{ "strategies": ["vdom"] }"#).unwrap_err();
        assert!(matches!(err, ReactiveError::Config(_)));

        let err = BenchConfig::from_json(r#"{ "iterations": 1, "warmup": 2 }"#).unwrap_err();
        assert!(matches!(err, ReactiveError::Config(_)));
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Legacy".parse::<Strategy>().unwrap(), Strategy::Legacy);
        assert!(matches!(
            "vdom".parse::<Strategy>(),
            Err(ReactiveError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn legacy_never_hears_the_late_key() {
        let report = run_legacy(1000).unwrap();
        assert_eq!(report.final_value, 1000.0);
        assert_eq!(report.render_count, 1000);
    }

    #[test]
    fn proxy_hears_the_mid_run_key() {
        let report = run_proxy(1000).unwrap();
        assert_eq!(report.final_value, 1000.0);
        assert_eq!(report.render_count, 1001);
    }

    #[test]
    fn signals_count_the_initial_render() {
        let report = run_signals(1000).unwrap();
        assert_eq!(report.final_value, 1000.0);
        assert_eq!(report.render_count, 1001);
    }

    #[test]
    fn zero_iterations_render_nothing_but_the_effect() {
        let reports = run_all(&BenchConfig::default().iterations(0)).unwrap();
        let renders: Vec<usize> = reports.iter().map(|r| r.render_count).collect();
        assert_eq!(renders, [0, 0, 1]);
    }
}
