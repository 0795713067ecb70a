//! Network troubleshooting helpers
//!
//! - [`capture`] runs platform diagnostics and collects their raw output
//! - [`netlog`] triages an existing network log

pub mod capture;
pub mod netlog;
