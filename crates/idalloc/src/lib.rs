#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod allocator;
mod environment;
mod error;
mod id;
#[cfg(test)]
mod mock;
mod service;

pub use crate::allocator::*;
pub use crate::environment::*;
pub use crate::error::*;
pub use crate::id::*;
pub use crate::service::*;
pub use tokio_util::sync::CancellationToken;
