//! Terminal client for field engineers and their administrators.
//! Engineers check in and out at customer sites and file shift and break requests, administrators
//! review them. Writes that can't reach the server are kept in a local outbox and delivered later
//! by the `fieldtrack-sync` daemon.

pub mod api;
pub mod checkin;
pub mod cli;
pub mod config;
pub mod report;
pub mod storage;
pub mod sync;
pub mod utils;
