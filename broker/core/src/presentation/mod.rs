// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Presentation
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** HTTP surface of the broker and the server that carries it

pub mod api;
pub mod auth;
pub mod error;
pub mod server;

pub use api::{app, AppState};
