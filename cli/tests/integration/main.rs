//! Integration tests for the mprun CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! Every test points `MPRUN_CONFIG` at a temp file whose multipass path does
//! not exist, so no real daemon is ever touched.
