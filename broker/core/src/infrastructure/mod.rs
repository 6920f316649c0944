// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod catalog;
pub mod dataverse;
pub mod repositories;
pub mod token_review;
pub mod whitelist;

pub use catalog::StaticCatalogProvider;
pub use dataverse::DataverseClient;
pub use repositories::InMemoryInstanceRepository;
pub use token_review::KubernetesTokenReviewer;
