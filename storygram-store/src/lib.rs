//! StoryGram Store Adapter
//!
//! The persistent store is an external collaborator. This crate defines the
//! contract the services rely on and ships an in-memory implementation:
//! - append and owner queries
//! - read tracking (view counts)
//! - a live insert stream in commit order

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod event;
pub mod memory;
pub mod store;

pub use event::{ChangeEvent, ChangeType};
pub use memory::MemoryStore;
pub use store::{ChangeStream, StoryStore};
