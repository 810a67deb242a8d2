//! StoryGram Realtime Engine
//!
//! Fans newly appended stories out to every connected websocket client:
//! - Subscriber registry with snapshot broadcast
//! - Change listener with bounded resubscription
//! - Websocket notification endpoint and session lifecycle

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod endpoint;
pub mod listener;
pub mod registry;

pub use endpoint::{websocket_handler, RealtimeState};
pub use listener::{ChangeListener, ListenerHandle, ListenerState};
pub use registry::{DeliveryFailure, DeliveryReport, SubscriberHandle, SubscriberId, SubscriberRegistry};
