//! Prelude module for convenient imports
//!
//! ```no_run
//! use mission_runner::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let config = RunnerConfig::from_json(r#"{"sandbox": {"timeoutMs": 1000}}"#)?;
//!     let report = config.orchestrator().run("const x: number = 1", "test('x', () => expect(x).toBe(1))");
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

// Running tests
pub use crate::test_runner::{run_tests, Orchestrator, TestCaseResult, TestRunReport};

// Execution environment
pub use crate::config::RunnerConfig;
pub use crate::sandbox::{Sandbox, SandboxConfig};
pub use crate::strip::{strip_test_code, strip_types, StripRules, TypeStripper};

// Service layer
pub use crate::service::{ApiResponse, Catalog, MemoryStore, MissionService, SubmitRequest};

// Error handling
pub use crate::error::{Error, ErrorKind, Result};
