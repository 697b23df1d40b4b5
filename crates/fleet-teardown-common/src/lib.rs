//! fleet-teardown-common - Shared types for the fleet teardown engine
//!
//! This crate holds the vocabulary shared by the engine, its AWS binding and
//! the test fixtures, without any AWS SDK dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Rate limits, batch sizes and wait bounds
//! - [`resource_kind`]: Resource categories, in cleanup order
//! - [`sequence`]: The fixed cross-category teardown sequence
//! - [`stats`]: Per-category deletion statistics
//! - [`tags`]: Fleet marker tag constants

pub mod defaults;
pub mod resource_kind;
pub mod sequence;
pub mod stats;
pub mod tags;

pub use resource_kind::{ParseKindError, ResourceKind};
pub use sequence::{CLEANUP_SEQUENCE, CleanupStep, SettingsToggle};
pub use stats::CategoryStats;
