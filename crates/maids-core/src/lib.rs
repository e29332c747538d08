//! Unique application ID allocation on top of a conditional store.
//!
//! The pipeline is layered:
//!
//! - [`AppIdService`] validates register and create requests and builds
//!   candidate [`AppId`] records.
//! - [`BatchCoordinator`] drives a batch of candidates, keeping per-item
//!   outcomes independent and in input order.
//! - [`Allocator`] performs one conditional insert per attempt and regenerates
//!   generated IDs on conflict, up to a retry budget.
//! - [`ConditionalStore`] is the backend seam providing atomic
//!   insert-if-absent.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod allocator;
mod batch;
mod config;
mod error;
mod generator;
mod messages;
mod record;
mod service;
mod store;

#[cfg(test)]
mod testing;

pub use crate::allocator::*;
pub use crate::batch::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::messages::*;
pub use crate::record::*;
pub use crate::service::*;
pub use crate::store::*;
