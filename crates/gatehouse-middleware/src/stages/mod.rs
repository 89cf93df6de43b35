//! Pipeline stages.
//!
//! Stages run in this order for every request:
//!
//! 1. [`request_log`] - Writes one log line per completed request
//! 2. [`access`] - Refuses requests outside the allow-list with 403

pub mod access;
pub mod request_log;

pub use access::{AccessFilter, AccessMiddleware, AccessMode, AccessRuleSet, AddressRules};
pub use request_log::{RequestLogEntry, RequestLogMiddleware};
