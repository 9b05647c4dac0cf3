pub mod candidates;
pub mod core;
pub mod grading;
pub mod import;
pub mod results;
pub mod setup;
