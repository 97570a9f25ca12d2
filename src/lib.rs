//! Blue/green deployment alert watcher.
//!
//! Tails the load balancer's JSON access log, tracks a rolling error rate
//! and the active upstream pool, and raises webhook alerts on failover or
//! sustained errors.

pub mod config;
pub mod monitoring;
pub mod utils;
