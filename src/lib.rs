//! Media request tracking.
//!
//! Requests are links to movies, shows or music. Each one is pending until
//! someone marks it done, and is addressed by its position among the pending
//! requests at the time of the call.

pub mod config;
pub mod core;
pub mod dispatch;
pub mod logging;
pub mod service;
pub mod store;
