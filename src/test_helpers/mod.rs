//! Shared builders and fixtures for unit and integration tests.

mod clock;
mod event;
mod rule;

pub use clock::ManualClock;
pub use event::EventBuilder;
pub use rule::RuleBuilder;
