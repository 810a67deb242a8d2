//! StoryGram Ingress
//!
//! Accepts new stories and serves story reads:
//! - `POST /new-story` with submission validation
//! - per-owner story listing and view tracking
//! - periodic purge of expired stories

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod handlers;
pub mod purge;
pub mod validation;

pub use handlers::{IngressState, NewStoryRequest};
pub use purge::spawn_purge_task;
pub use validation::{validate_submission, Submission};
