//! Fair-share scheduling core for a distributed cluster compute framework.
//!
//! Two actors compose this crate: [`policy`] (the registry + priority
//! queue that answers `next_job`) and [`controller`] (the periodic
//! fairness loop that rewrites priorities). They communicate only
//! through [`policy::PolicyHandle`]; see each module for the detailed
//! contract.

pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod models;
pub mod policy;
