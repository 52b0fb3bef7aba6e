//! Registry and permission requests.

use serde::{Deserialize, Serialize};

use super::Validate;
use crate::error::ValidationError;
use crate::registry::{InfraKind, PermissionRole, ServerDraft, ServerPatch};

/// Creates an infra record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CreateInfra {
    /// Display name.
    pub name: String,
    /// Infrastructure kind.
    #[serde(rename = "type")]
    pub kind: InfraKind,
    /// Opaque configuration blob.
    #[serde(default)]
    pub info: serde_json::Value,
}

impl Validate for CreateInfra {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.name, "name")
    }
}

/// Updates fields of an infra record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UpdateInfra {
    /// Infra identifier.
    pub id: String,
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New kind.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<InfraKind>,
    /// Replacement configuration blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
}

impl Validate for UpdateInfra {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.id, "id")?;
        if let Some(name) = &self.name {
            ValidationError::require(name, "name")?;
        }
        Ok(())
    }
}

/// Deletes an infra record.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeleteInfra {
    /// Infra identifier.
    pub id: String,
}

/// Reads one infra record.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GetInfraById {
    /// Infra identifier.
    pub id: String,
}

/// Lists every infra record.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct GetInfras {}

impl Validate for DeleteInfra {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.id, "id")
    }
}

impl Validate for GetInfraById {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.id, "id")
    }
}

impl Validate for GetInfras {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Creates a server record.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CreateServer(pub ServerDraft);

impl Validate for CreateServer {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }
}

/// Updates fields of a server record.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UpdateServer {
    /// Server identifier.
    pub id: String,
    /// Fields to change.
    pub patch: ServerPatch,
}

impl Validate for UpdateServer {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.id, "id")?;
        self.patch.validate()
    }
}

/// Deletes a server record. Does not touch the live cluster.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeleteServer {
    /// Server identifier.
    pub id: String,
}

/// Reads one server record.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GetServerById {
    /// Server identifier.
    pub id: String,
}

/// Lists the server records of one infra.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetServers {
    /// Infra identifier.
    pub infra_id: String,
}

impl Validate for DeleteServer {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.id, "id")
    }
}

impl Validate for GetServerById {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.id, "id")
    }
}

impl Validate for GetServers {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.infra_id, "infraId")
    }
}

/// Lists the permissions on an infra.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInfraPermissions {
    /// Infra identifier.
    pub infra_id: String,
}

/// Grants or changes a user's role on an infra.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInfraPermission {
    /// Infra identifier.
    pub infra_id: String,
    /// User identifier.
    pub user_id: String,
    /// Role to grant.
    pub role: PermissionRole,
}

/// Revokes a user's role on an infra.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveInfraPermission {
    /// Infra identifier.
    pub infra_id: String,
    /// User identifier.
    pub user_id: String,
}

/// Lists every user.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct GetAllUsers {}

impl Validate for GetInfraPermissions {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.infra_id, "infraId")
    }
}

impl Validate for SetInfraPermission {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.infra_id, "infraId")?;
        ValidationError::require(&self.user_id, "userId")
    }
}

impl Validate for RemoveInfraPermission {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require(&self.infra_id, "infraId")?;
        ValidationError::require(&self.user_id, "userId")
    }
}

impl Validate for GetAllUsers {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
