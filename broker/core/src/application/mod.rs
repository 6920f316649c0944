// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod broker;

pub use broker::{ServiceBroker, StandardServiceBroker};
