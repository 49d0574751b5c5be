//! `tillsight-middleware` – callback and event plumbing.
//!
//! - [`listeners`] – [`ListenerRegistry`], the snapshot-notify callback list
//!   used by the status monitor, the battery alert engine and battery event
//!   streams.
//! - [`bus`] – [`EventBus`], a topic-based broadcast bus that carries status
//!   snapshots and alerts to async consumers.

pub mod bus;
pub mod listeners;

pub use bus::{BusError, EventBus, Topic, TopicReceiver};
pub use listeners::{Listener, ListenerId, ListenerRegistry, Subscription};
