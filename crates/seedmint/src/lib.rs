#![doc = include_str!("../README.md")]

mod chain;
mod config;
mod deriver;
mod engine;
mod error;
mod job;
mod output;
mod quota;
mod store;

pub use crate::chain::*;
pub use crate::config::*;
pub use crate::deriver::*;
pub use crate::engine::*;
pub use crate::error::*;
pub use crate::job::*;
pub use crate::output::*;
pub use crate::quota::*;
pub use crate::store::*;
