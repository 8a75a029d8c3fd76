//! Domain events and their synchronous in-process dispatch.

pub mod dispatcher;
pub mod event;

pub use dispatcher::{Dispatcher, Subscriber};
pub use event::Event;
