//! StatusBoard - dependency health dashboard backend.
//!
//! Probes databases, caches, backend APIs, frontends and LLM providers on a
//! timer, keeps a bounded in-memory history per service and serves both over
//! HTTP.

pub mod config;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod web;
