// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Dataverse Service Broker Core
//!
//! Open Service Broker API v2 implementation that advertises Dataverse
//! collections as services.
//!
//! # Architecture
//!
//! - **domain:** instances, catalog, OSB wire types, errors, collaborator traits
//! - **application:** the OSB state machine (`ServiceBroker`)
//! - **infrastructure:** instance store, Dataverse client, whitelist, TokenReview
//! - **presentation:** axum router, auth middleware, plain/TLS server

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
