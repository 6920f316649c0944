// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Catalog Types
//!
//! Two views of the same data live here:
//!
//! - [`ServiceOffering`] is what a catalog provider hands the broker: one
//!   Dataverse collection on one server, plus the ids it is advertised under.
//! - [`Service`] / [`Plan`] / [`Schemas`] are the OSB wire shapes returned by
//!   `GET /v2/catalog`.
//!
//! Every offering renders to exactly one service with a single `default`
//! plan. The plan's create schema exposes one optional `credentials` string
//! so platforms can prompt for a Dataverse API token.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Image shown for collections that do not publish their own.
pub const DEFAULT_IMAGE_URL: &str = "https://avatars2.githubusercontent.com/u/19862012?s=200&v=4";

const DEFAULT_SERVICE_DESCRIPTION: &str = "A Dataverse service";
const DEFAULT_PLAN_NAME: &str = "default";

/// A collection as described by the Dataverse search API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataverseDescription {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// One provisionable service/plan pair backed by a Dataverse collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub service_id: String,
    pub plan_id: String,
    pub server_name: String,
    pub server_url: String,
    pub description: DataverseDescription,
}

impl ServiceOffering {
    /// Offering for a collection found on `server_url`, advertised under
    /// `<server_alias>-<identifier>`.
    pub fn from_description(
        server_alias: &str,
        server_url: &str,
        description: DataverseDescription,
    ) -> Self {
        let service_id = format!("{}-{}", server_alias, description.identifier);
        Self {
            plan_id: format!("{}-{}", service_id, DEFAULT_PLAN_NAME),
            service_id,
            server_name: server_alias.to_string(),
            server_url: server_url.trim_end_matches('/').to_string(),
            description,
        }
    }

    /// DNS-label style service name derived from the collection name.
    pub fn service_name(&self) -> String {
        self.description.name.trim().replace(' ', "-").to_lowercase()
    }

    pub fn has_plan(&self, plan_id: &str) -> bool {
        self.plan_id == plan_id
    }

    pub fn to_service(&self) -> Service {
        let display_name = self.description.name.clone();
        let description = self
            .description
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVICE_DESCRIPTION.to_string());
        let image_url = self
            .description
            .image_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string());

        let mut metadata = Map::new();
        metadata.insert("displayName".to_string(), Value::String(display_name.clone()));
        metadata.insert("imageUrl".to_string(), Value::String(image_url));

        Service {
            name: self.service_name(),
            id: self.service_id.clone(),
            description,
            tags: Vec::new(),
            bindable: true,
            plan_updateable: Some(true),
            metadata,
            plans: vec![Plan {
                name: DEFAULT_PLAN_NAME.to_string(),
                id: self.plan_id.clone(),
                description: format!("The default plan for {}", display_name),
                free: Some(true),
                bindable: None,
                schemas: Some(Schemas {
                    service_instance: Some(ServiceInstanceSchema {
                        create: Some(InputParametersSchema {
                            parameters: credentials_schema(),
                        }),
                        update: Some(InputParametersSchema {
                            parameters: credentials_schema(),
                        }),
                    }),
                    service_binding: None,
                }),
            }],
        }
    }
}

fn credentials_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "type": "object",
        "properties": {
            "credentials": {
                "type": "string",
                "description": "API key to access restricted files and dataset on dataverse",
                "default": "",
            }
        }
    })
}

/// Immutable set of offerings the broker advertises.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    offerings: Vec<ServiceOffering>,
}

impl Catalog {
    /// Later duplicates of a service id are dropped.
    pub fn new(offerings: Vec<ServiceOffering>) -> Self {
        let mut unique: Vec<ServiceOffering> = Vec::with_capacity(offerings.len());
        for offering in offerings {
            if unique.iter().any(|o| o.service_id == offering.service_id) {
                tracing::warn!(service_id = %offering.service_id, "Duplicate catalog offering ignored");
                continue;
            }
            unique.push(offering);
        }
        Self { offerings: unique }
    }

    pub fn offerings(&self) -> &[ServiceOffering] {
        &self.offerings
    }

    pub fn find(&self, service_id: &str) -> Option<&ServiceOffering> {
        self.offerings.iter().find(|o| o.service_id == service_id)
    }

    pub fn len(&self) -> usize {
        self.offerings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offerings.is_empty()
    }

    pub fn to_response(&self) -> CatalogResponse {
        CatalogResponse {
            services: self.offerings.iter().map(ServiceOffering::to_service).collect(),
        }
    }
}

// ============================================================================
// OSB wire types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub bindable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_updateable: Option<bool>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Schemas>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schemas {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_instance: Option<ServiceInstanceSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_binding: Option<ServiceBindingSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstanceSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<InputParametersSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<InputParametersSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBindingSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<InputParametersSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParametersSchema {
    pub parameters: Value,
}
