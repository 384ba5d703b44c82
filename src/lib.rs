//! bonehealth: osteoporosis risk prediction backend
//!
//! A demo web backend that predicts osteoporosis risk from patient
//! attributes and explains each prediction with exact tree-based SHAP
//! attribution. Every request trains from scratch over a CSV or synthetic
//! dataset: negative-case synthesis, class balancing, one-hot encoding, a
//! calibrated random forest and per-feature attribution.

pub mod dataset;
pub mod encoding;
pub mod error;
pub mod explain;
pub mod model;
pub mod pipeline;
pub mod server;

pub use error::{Result, RiskError};
