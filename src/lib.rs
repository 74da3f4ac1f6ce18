//! # Creational Patterns: Factory Method and Concurrent Singletons
//!
//! ## Factory Method
//! - [`factory::Factory`] / [`factory::Product`] interfaces with one concrete
//!   pair; every call allocates a new product.
//!
//! ## Singleton
//! Four ways to guarantee exactly one instance under concurrent first access:
//! - [`singleton::eager`] - built before `main`, never blocks
//! - [`singleton::locked`] - mutex around every access
//! - [`singleton::double_checked`] - atomic fast path, locked re-check
//! - [`singleton::once`] - hand-rolled execute-once state machine
//!
//! ## Stress Harness
//! [`stress::run`] races many threads against fresh holders and reports
//! how many constructions and distinct instances it saw.
//!
//! Run the demo (optionally with a TOML config, see [`config`]):
//! ```bash
//! cargo run --bin patterns
//! RUST_LOG=debug cargo run --bin patterns -- stress.toml
//! cargo bench --bench singleton_access
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod singleton;
pub mod stress;

pub use error::{PatternError, Result};
