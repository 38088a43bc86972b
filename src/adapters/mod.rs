// Copyright (c) 2025 - Cowboy AI, Inc.

//! Record source adapters
//!
//! Implementations of [`crate::source::RecordSource`] against real
//! provider APIs.

pub mod outscale;

pub use outscale::{OutscaleClient, OutscaleConfig};
