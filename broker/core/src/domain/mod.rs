// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Broker aggregates, OSB message types and the interfaces the
//!   application layer depends on

pub mod api_version;
pub mod catalog;
pub mod config;
pub mod error;
pub mod instance;
pub mod operation;
pub mod osb;
pub mod provider;
pub mod repository;
