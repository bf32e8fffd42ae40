//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod input;
pub mod replay;
pub mod rules;
pub mod run;
pub mod validate;

pub use replay::run_replay;
pub use rules::run_rules;
pub use run::run_live;
pub use validate::run_validate;
