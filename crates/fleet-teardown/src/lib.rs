//! fleet-teardown - cleanup engine for an IoT training fleet
//!
//! This crate removes every cloud resource a simulated vehicle fleet
//! created, in dependency order, without touching anything that belongs to
//! someone else in the same account.

pub mod aws;
pub mod config;
pub mod error;
pub mod identify;
pub mod orchestrator;
pub mod pacer;
pub mod report;
pub mod resolver;
pub mod resource;
pub mod wait;
