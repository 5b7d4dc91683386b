//! A library for running untrusted code snippets.
//!
//! Runcell provides an async Rust API that turns a (code, language, input)
//! triple into a time-bounded process run against locally installed
//! toolchains, compiling first where the language needs it, and always
//! removing the per-request working directory afterwards.
//!
//! # Features
//!
//! - **Multi-language**: Compiled and interpreted languages described by TOML driver records.
//! - **Session isolation**: Each request gets its own UUID-named directory, removed on every path.
//! - **Wall clock limits**: Stages are killed when their budget expires; partial output is kept.
//! - **Toolchain diagnostics**: Binaries resolve through `*_PATH`/`*_HOME` overrides and can be probed.
//! - **Content rules**: Per-language textual pre-checks reject code before anything touches disk.
//!
//! Runcell does not contain the programs it runs. There is no namespace,
//! cgroup or seccomp confinement, and memory limits are advisory.
//!
//! # Example
//!
//! ```no_run
//! use runcell::{Engine, ExecutionRequest};
//!
//! # async fn demo() -> Result<(), runcell::RejectedError> {
//! let engine = Engine::with_defaults();
//! let result = engine
//!     .execute(&ExecutionRequest::new("python", "print(input())").with_input("hi"))
//!     .await?;
//! assert_eq!(result.stdout, "hi");
//! # Ok(())
//! # }
//! ```

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language, ToolchainConfig};
pub use engine::{Engine, LanguageInfo, RejectedError};
pub use guard::{ContentRule, GuardError};
pub use runner::{CompileResult, PreparedSource, Runner};
pub use session::{Session, SessionError, SessionState};
pub use toolchain::BinaryStatus;
pub use types::{ExecutionRequest, ExecutionResult, ExecutionStatus, ResourceLimits, Stage};

pub mod config;
pub mod engine;
pub mod guard;
pub mod runner;
pub mod session;
pub mod supervisor;
pub mod toolchain;
pub mod types;
