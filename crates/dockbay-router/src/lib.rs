//! dockbay-router
//!
//! Multi-target chat routing: failover or weighted round-robin ordering,
//! per-target cooldowns after repeated failures, sticky selection kept in a
//! caller-owned `ContextStore`, and history sanitizing before dispatch.

pub mod config;
pub mod health;
pub mod router;
pub mod sanitize;
pub mod session;

pub use config::{RouterConfig, StickyMode, Strategy, TargetSettings};
pub use health::{Clock, HealthSnapshot, ManualClock, SystemClock};
pub use router::{Capability, ChatRouter, Operation, RouteAction, RouteTarget, TargetPolicy};
pub use session::SessionRouter;
