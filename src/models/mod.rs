//! Data model definitions for events, rules, and triggers.

pub mod event;
pub mod rule;
pub mod trigger;

pub use event::FirewallEvent;
pub use rule::AlertRule;
pub use trigger::AlertTrigger;
