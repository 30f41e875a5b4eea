//! Configuration validation
//!
//! Every section implements [`Validate`]; `Config` checks its unique options
//! and then each section in turn, so the first error names its section.

mod config_validators;
mod store_validators;
mod trait_def;

pub use trait_def::Validate;
