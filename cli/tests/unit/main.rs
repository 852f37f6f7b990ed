//! Unit tests for mprun
//!
//! These tests use scripted runners and fake ports and run without spawning
//! multipass or ssh.

mod helpers;
mod launch;
mod poller;
mod registry;
mod resolver;
