//! Request engine: validate, dispatch, normalize.
//!
//! - `validator`: per-operation payload schemas
//! - `registry`: operation → provider capability decisions
//! - `normalizer`: upstream JSON → stable response shapes
//! - `pipeline`: the orchestrator tying the three together

pub mod normalizer;
pub mod pipeline;
pub mod registry;
pub mod validator;

pub use pipeline::{Pipeline, Stage};
