//! ficp-core: incremental, stateless-across-runs simulator for a
//! credit-registry lifecycle (surveillance → inscription → radiation).
//!
//! Each day is computed from the files already published for earlier
//! days and nothing else. See engine.rs for the execution order.

pub mod balancer;
pub mod codec;
pub mod config;
pub mod consultation;
pub mod engine;
pub mod error;
pub mod event;
pub mod history;
pub mod oracle;
pub mod rng;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod validate;
pub mod writer;
