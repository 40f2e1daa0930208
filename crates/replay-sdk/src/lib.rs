// replay-sdk: Foundation layer for the replay match runner.
// This crate has no dependencies on other replay crates. It owns the child
// process lifecycle and the diagnostics trait every other crate logs through.

pub mod build_constants;
pub mod process_invoker;
pub mod trace;

pub use build_constants::{ReplayPackage, Source};
pub use process_invoker::{LaunchError, OutputLine, ProcessCompletion, ProcessInvoker};
pub use trace::TraceWriter;
