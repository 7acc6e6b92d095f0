//! admin-kit: backend glue for admin front-ends.
//!
//! Route dispatch with the account and config handlers, a resource-scoped
//! data proxy, and the onboarding step and loading-overlay state machines.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod onboarding;
pub mod proxy;
