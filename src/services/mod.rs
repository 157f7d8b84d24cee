//! Services layer for mathrpc
//!
//! Provides the remote model client, the two-tier problem solver, and the
//! headline provider.

pub mod news;
pub mod remote;
pub mod solver;

pub use news::{NewsProvider, UolNewsProvider};
pub use remote::{GeminiClient, RemoteConfig, RemoteModel};
pub use solver::{AnswerSource, ProblemSolver, SolveOutcome, Solution, SolverConfig};
