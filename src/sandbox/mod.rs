//! Sandboxed execution context
//!
//! A [`Sandbox`] owns one interpreter whose global scope holds nothing but
//! the language intrinsics, a capturing `console`, and whatever bindings the
//! caller installs (the test shim). There is no filesystem, network,
//! process, timer, `eval` or `globalThis` access. Every run is bounded by an
//! operation budget, a call-depth limit and a wall-clock deadline.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::runtime::inspect::format_args;
use crate::runtime::{Interpreter, Limits, Value};

// ---------------------------------------------------------------------------
// SandboxConfig
// ---------------------------------------------------------------------------

/// Resource limits and knobs for a [`Sandbox`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxConfig {
    /// Interpreter steps allowed per run.
    pub max_operations: u64,
    /// Maximum nesting of script function calls.
    pub max_call_depth: usize,
    /// Wall-clock deadline per run in milliseconds (0 disables it).
    pub timeout_ms: u64,
    /// Stack size of the worker thread a run executes on.
    pub stack_size: usize,
    /// Seed for `Math.random`.
    pub random_seed: u64,
    /// Console lines kept per run; later lines are counted but dropped.
    pub max_console_entries: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_operations: 50_000_000,
            max_call_depth: 400,
            timeout_ms: 5_000,
            stack_size: 256 * 1024 * 1024, // 256 MiB
            random_seed: 42,
            max_console_entries: 1_000,
        }
    }
}

impl SandboxConfig {
    /// Interpreter limits derived from this configuration.
    pub fn limits(&self) -> Limits {
        Limits {
            max_operations: self.max_operations,
            max_call_depth: self.max_call_depth,
            timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputEntry
// ---------------------------------------------------------------------------

/// Console method that produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl OutputLevel {
    fn method(self) -> &'static str {
        match self {
            OutputLevel::Log => "log",
            OutputLevel::Info => "info",
            OutputLevel::Warn => "warn",
            OutputLevel::Error => "error",
        }
    }
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// A single captured console line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub level: OutputLevel,
    pub message: String,
}

#[derive(Debug, Default)]
struct ConsoleBuffer {
    entries: Vec<OutputEntry>,
    dropped: usize,
}

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

/// An isolated script realm for one test run.
///
/// Sandboxes are cheap to build and are never reused across runs: the test
/// shim's state lives in bindings installed into exactly one sandbox.
pub struct Sandbox {
    config: SandboxConfig,
    interp: Interpreter,
    console: Rc<RefCell<ConsoleBuffer>>,
    created: Instant,
}

impl Sandbox {
    /// Build a fresh sandbox with intrinsics and a capturing console.
    pub fn new(config: SandboxConfig) -> Self {
        let interp = Interpreter::new(config.limits(), config.random_seed);
        let mut sandbox = Self {
            config,
            interp,
            console: Rc::new(RefCell::new(ConsoleBuffer::default())),
            created: Instant::now(),
        };
        sandbox.install_console();
        sandbox
    }

    fn install_console(&mut self) {
        let console = self.interp.new_object();
        for level in [
            OutputLevel::Log,
            OutputLevel::Info,
            OutputLevel::Warn,
            OutputLevel::Error,
        ] {
            let buffer = self.console.clone();
            let capacity = self.config.max_console_entries;
            let method = self
                .interp
                .native_function(level.method(), 0, move |_interp, _this, args| {
                    let message = format_args(args);
                    match level {
                        OutputLevel::Log | OutputLevel::Info => info!("[Test] {}", message),
                        OutputLevel::Warn => warn!("[Test] {}", message),
                        OutputLevel::Error => error!("[Test] {}", message),
                    }
                    let mut buffer = buffer.borrow_mut();
                    if buffer.entries.len() < capacity {
                        buffer.entries.push(OutputEntry { level, message });
                    } else {
                        buffer.dropped += 1;
                    }
                    Ok(Value::Undefined)
                });
            console
                .borrow_mut()
                .properties
                .define(level.method().into(), method, false);
        }
        // console.debug is an alias of console.log
        let log = console
            .borrow()
            .properties
            .get("log")
            .map(|property| property.value.clone());
        if let Some(log) = log {
            console.borrow_mut().properties.define("debug".into(), log, false);
        }
        self.interp.define_global("console", Value::Object(console));
    }

    /// The configuration this sandbox was built with.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Bind a host value in the global scope.
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.interp.define_global(name, value);
    }

    /// Look up a global binding the way script code would.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.interp.get_global(name)
    }

    /// Direct access to the interpreter, for installing native bindings.
    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    /// Evaluate one script in the shared global scope.
    ///
    /// `label` names the script in logs ("learner code", "test code").
    pub fn eval(&mut self, label: &str, source: &str) -> Result<Value> {
        debug!(label, bytes = source.len(), "evaluating script");
        let result = self.interp.eval_script(source);
        match &result {
            Ok(_) => debug!(label, operations = self.interp.operations(), "script completed"),
            Err(e) if e.is_resource_limit() => warn!(label, "script aborted: {}", e),
            Err(e) => debug!(label, "script failed: {}", e),
        }
        result
    }

    /// Console lines captured so far.
    pub fn console_output(&self) -> Vec<OutputEntry> {
        self.console.borrow().entries.clone()
    }

    /// Drain the captured console lines.
    pub fn take_console_output(&mut self) -> Vec<OutputEntry> {
        std::mem::take(&mut self.console.borrow_mut().entries)
    }

    /// Console lines dropped because the capture limit was reached.
    pub fn dropped_console_entries(&self) -> usize {
        self.console.borrow().dropped
    }

    /// Interpreter steps executed so far.
    pub fn operations(&self) -> u64 {
        self.interp.operations()
    }

    /// Time since the sandbox was created.
    pub fn elapsed(&self) -> Duration {
        self.created.elapsed()
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        // closures capture their scopes, so bindings form cycles
        self.interp.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ResourceLimitKind};

    fn sandbox() -> Sandbox {
        Sandbox::new(SandboxConfig::default())
    }

    #[test]
    fn test_config_defaults() {
        let cfg = SandboxConfig::default();
        assert_eq!(cfg.max_operations, 50_000_000);
        assert_eq!(cfg.max_call_depth, 400);
        assert_eq!(cfg.timeout_ms, 5_000);
        assert_eq!(cfg.stack_size, 256 * 1024 * 1024);
        assert_eq!(cfg.random_seed, 42);
        assert_eq!(cfg.max_console_entries, 1_000);
        assert_eq!(cfg.limits().timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let cfg: SandboxConfig = serde_json::from_str(r#"{"timeoutMs": 0, "maxCallDepth": 50}"#).unwrap();
        assert_eq!(cfg.max_call_depth, 50);
        assert_eq!(cfg.limits().timeout, None);
        assert_eq!(cfg.max_operations, 50_000_000);
    }

    #[test]
    fn test_eval_shares_global_scope() {
        let mut sb = sandbox();
        sb.eval("first", "function double(x) { return x * 2 }").unwrap();
        let value = sb.eval("second", "double(21)").unwrap();
        assert_eq!(value, Value::Number(42.0));
    }

    #[test]
    fn test_syntax_error() {
        let mut sb = sandbox();
        let err = sb.eval("broken", "let x = ;").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }), "{}", err);
    }

    #[test]
    fn test_no_host_globals() {
        let mut sb = sandbox();
        let value = sb
            .eval(
                "globals",
                "[typeof process, typeof require, typeof globalThis, typeof eval, typeof setTimeout, typeof fetch].join()",
            )
            .unwrap();
        assert_eq!(
            value,
            Value::from("undefined,undefined,undefined,undefined,undefined,undefined")
        );
        let err = sb.eval("dynamic", "Function('return 1')()").unwrap_err();
        assert!(err.to_string().contains("not supported"), "{}", err);
    }

    #[test]
    fn test_console_capture() {
        let mut sb = sandbox();
        sb.eval("logging", "console.log('sum is', 1 + 2, { ok: true }); console.error(new Error('bad').message)")
            .unwrap();
        let output = sb.console_output();
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].level, OutputLevel::Log);
        assert_eq!(output[0].message, "sum is 3 { ok: true }");
        assert_eq!(output[1], OutputEntry { level: OutputLevel::Error, message: "bad".into() });
        assert_eq!(sb.take_console_output().len(), 2);
        assert!(sb.console_output().is_empty());
    }

    #[test]
    fn test_console_capture_limit() {
        let mut sb = Sandbox::new(SandboxConfig {
            max_console_entries: 3,
            ..SandboxConfig::default()
        });
        sb.eval("flood", "for (let i = 0; i < 10; i++) console.log(i)").unwrap();
        assert_eq!(sb.console_output().len(), 3);
        assert_eq!(sb.dropped_console_entries(), 7);
    }

    #[test]
    fn test_operation_limit() {
        let mut sb = Sandbox::new(SandboxConfig {
            max_operations: 10_000,
            ..SandboxConfig::default()
        });
        let err = sb.eval("spin", "while (true) {}").unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceLimitError { kind: ResourceLimitKind::OperationLimit, .. }
        ));
    }

    #[test]
    fn test_timeout() {
        let mut sb = Sandbox::new(SandboxConfig {
            timeout_ms: 50,
            max_operations: u64::MAX,
            ..SandboxConfig::default()
        });
        let err = sb.eval("spin", "try { while (true) {} } catch (e) {}").unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceLimitError { kind: ResourceLimitKind::TimeLimit, .. }
        ));
    }

    #[test]
    fn test_seeded_random() {
        let mut a = sandbox();
        let mut b = sandbox();
        let script = "[Math.random(), Math.random()].join()";
        assert_eq!(a.eval("a", script).unwrap(), b.eval("b", script).unwrap());
    }
}
