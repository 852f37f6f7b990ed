//! Application services: use-case orchestration composed from domain logic
//! and port traits.

pub mod launch;
pub mod lifecycle;
pub mod poller;
pub mod registry;
pub mod session;
pub mod ssh_provision;
