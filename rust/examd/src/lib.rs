pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod import;
pub mod ipc;
pub mod model;
pub mod results;
pub mod roster;
