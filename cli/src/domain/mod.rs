//! Domain layer: pure types, parsers, validators and classification tables.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod image;
pub mod info;
pub mod instance;
pub mod launch;
pub mod ssh;

pub use config::AppConfig;
pub use error::{ErrorKind, InvokeError, LaunchSpecError, MultipassError, SshError};
pub use image::{FindImagesResult, Image};
pub use info::InstanceInfo;
pub use instance::{Instance, InstanceLists, InstanceState, Transition};
pub use launch::{LaunchProgress, LaunchSpec};
