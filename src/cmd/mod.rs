//! CLI command implementations.
//!
//! | Module    | Commands handled              |
//! |-----------|-------------------------------|
//! | `run`     | `Run`, `Smartviews`           |
//! | `session` | `Status`, `Resume`, `Reset`   |

pub mod run;
pub mod session;

pub use run::{cmd_run, cmd_smartviews};
pub use session::{cmd_reset, cmd_resume, cmd_status};
