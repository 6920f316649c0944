// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the broker CLI

pub mod serve;
pub mod whitelist;

pub use self::serve::ServeArgs;
pub use self::whitelist::WhitelistCommand;
