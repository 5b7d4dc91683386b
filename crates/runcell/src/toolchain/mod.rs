//! Toolchain discovery
//!
//! Resolves logical toolchains (a C compiler, a JVM runtime) to executables
//! and probes them for availability.

pub use crate::toolchain::probe::{BinaryStatus, PROBE_TIMEOUT, probe, probe_all};
pub use crate::toolchain::resolve::{resolve, resolve_with};

mod probe;
mod resolve;
