//! StoryGram Common Types and Utilities
//!
//! Shared types, configuration, clock and error handling for the StoryGram services.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::StoryGramConfig;
pub use error::{Error, Result};
pub use types::{ApiError, Story, StoryId, StoryNotification};
