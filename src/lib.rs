//! reviewctl: access review notifications and membership audits for Entra ID

pub mod cmd;
pub mod config;
pub mod diag;
pub mod error;
pub mod graph;
pub mod membership;
pub mod notify;
pub mod report;
pub mod review;

pub use error::{Error, Result};
