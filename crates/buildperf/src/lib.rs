//! Build performance feedback action internals.
//!
//! The capture pipeline (vcperf start/stop, ETL conversion, artifact
//! upload) is linear glue around external tools; the [`tracker`] module
//! holds the iteration state machine that drives the optimization
//! conversation on the tracking issue.

pub mod actions;
pub mod artifact;
pub mod convert;
pub mod tracker;
pub mod vcperf;
