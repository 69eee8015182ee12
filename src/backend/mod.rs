//! Backend process lifecycle.
//!
//! - `discovery`: ordered probing of interpreter candidates.
//! - `spawner`: child process construction with piped stdio.
//! - `supervisor`: owns the single backend process for the application run.

pub mod discovery;
pub mod spawner;
pub mod supervisor;
