//! Registry and permission operations.

use super::ClusterClient;
use crate::error::ClusterError;
use crate::operation::{
    CreateInfra, CreateServer, DeleteInfra, DeleteServer, GetAllUsers, GetInfraById,
    GetInfraPermissions, GetInfras, GetServerById, GetServers, RemoveInfraPermission,
    SetInfraPermission, UpdateInfra, UpdateServer,
};
use crate::registry::{
    Infra, Permission, PermissionRole, Server, ServerDraft, ServerPatch, User,
};
use crate::transport::Transport;

impl<T: Transport> ClusterClient<T> {
    /// Creates an infra record.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn create_infra(&self, request: CreateInfra) -> Result<Infra, ClusterError> {
        self.call(request).await
    }

    /// Updates an infra record.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn update_infra(&self, request: UpdateInfra) -> Result<Infra, ClusterError> {
        self.call(request).await
    }

    /// Deletes an infra record.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn delete_infra(&self, id: impl Into<String>) -> Result<(), ClusterError> {
        self.call(DeleteInfra { id: id.into() }).await.map(drop)
    }

    /// Reads one infra record.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InfraNotFound`] when the registry has no such
    /// record, otherwise see [`ClusterClient::call`].
    pub async fn get_infra(&self, id: impl Into<String>) -> Result<Infra, ClusterError> {
        let infra_id = id.into();
        self.call(GetInfraById {
            id: infra_id.clone(),
        })
        .await?
        .ok_or(ClusterError::InfraNotFound { infra_id })
    }

    /// Lists every infra; empty when the registry cannot be read.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::list`].
    pub async fn get_infras(&self) -> Result<Vec<Infra>, ClusterError> {
        self.list(GetInfras {}).await
    }

    /// Creates a server record. Does not touch the live cluster.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn create_server(&self, draft: ServerDraft) -> Result<Server, ClusterError> {
        self.call(CreateServer(draft)).await
    }

    /// Updates a server record.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn update_server(
        &self,
        id: impl Into<String>,
        patch: ServerPatch,
    ) -> Result<Server, ClusterError> {
        self.call(UpdateServer {
            id: id.into(),
            patch,
        })
        .await
    }

    /// Deletes a server record. The node stays in the live cluster.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn delete_server(&self, id: impl Into<String>) -> Result<(), ClusterError> {
        self.call(DeleteServer { id: id.into() }).await.map(drop)
    }

    /// Reads one server record.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ServerNotFound`] when the registry has no such
    /// record, otherwise see [`ClusterClient::call`].
    pub async fn get_server(&self, id: impl Into<String>) -> Result<Server, ClusterError> {
        let server_id = id.into();
        self.call(GetServerById {
            id: server_id.clone(),
        })
        .await?
        .ok_or(ClusterError::ServerNotFound { server_id })
    }

    /// Lists the servers of an infra; empty when the registry cannot be read.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::list`].
    pub async fn get_servers(&self, infra_id: impl Into<String>) -> Result<Vec<Server>, ClusterError> {
        self.list(GetServers {
            infra_id: infra_id.into(),
        })
        .await
    }

    /// Lists permissions on an infra; empty when they cannot be read.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::list`].
    pub async fn get_infra_permissions(
        &self,
        infra_id: impl Into<String>,
    ) -> Result<Vec<Permission>, ClusterError> {
        self.list(GetInfraPermissions {
            infra_id: infra_id.into(),
        })
        .await
    }

    /// Grants or changes a user's role on an infra.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn set_infra_permission(
        &self,
        request: SetInfraPermission,
    ) -> Result<Permission, ClusterError> {
        self.call(request).await
    }

    /// Revokes a user's role on an infra.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::call`].
    pub async fn remove_infra_permission(
        &self,
        infra_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<(), ClusterError> {
        self.call(RemoveInfraPermission {
            infra_id: infra_id.into(),
            user_id: user_id.into(),
        })
        .await
        .map(drop)
    }

    /// Lists users; empty when they cannot be read.
    ///
    /// # Errors
    ///
    /// See [`ClusterClient::list`].
    pub async fn get_all_users(&self) -> Result<Vec<User>, ClusterError> {
        self.list(GetAllUsers {}).await
    }

    /// Checks that `user_id` holds at least `required` on `infra_id`.
    ///
    /// Unreadable permissions count as no permissions, so the check fails
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::PermissionDenied`] when the user has no
    /// sufficient grant, or [`ClusterError::Validation`] for blank ids.
    pub async fn authorize(
        &self,
        user_id: &str,
        infra_id: &str,
        required: PermissionRole,
    ) -> Result<(), ClusterError> {
        let permissions = self.get_infra_permissions(infra_id).await?;
        let granted = permissions
            .iter()
            .any(|grant| grant.user_id == user_id && grant.role.allows(required));
        if granted {
            return Ok(());
        }
        Err(ClusterError::PermissionDenied {
            user_id: user_id.to_owned(),
            infra_id: infra_id.to_owned(),
            required: required.to_string(),
        })
    }
}
