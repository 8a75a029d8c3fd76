//! `vendo-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod config;
pub mod error;
pub mod id;

pub use config::{FreeLabelSource, SharedLabel, StaticLabel};
pub use error::{OrderError, OrderResult};
pub use id::{LineId, OrderId, PriceLineId, SkuId, UserId};
