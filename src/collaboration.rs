//! Folder collaboration endpoints.
//!
//! `invite_collaborator` and `remove_collaborator` behave like remote callable
//! functions: they take the caller's auth context plus a request body and answer
//! `{success, message}`, or fail with an error whose [`NovaError::code`] is one of
//! `unauthenticated`, `invalid-argument`, `permission-denied`, `not-found` or
//! `internal`. Invitations are kept in the local store until accepted.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{keys, Collaborator, ErrorPayload, GoalStorage, NovaError, Result, Role};

/// Identity of the caller, as an auth layer would supply it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCollaboratorRequest {
    pub folder_id: i64,
    pub folder_name: String,
    pub invitee_email: String,
    pub inviter_email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCollaboratorRequest {
    pub folder_id: i64,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

/// A stored invitation to collaborate on a folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub folder_id: i64,
    pub folder_name: String,
    pub invitee_email: String,
    pub inviter_email: String,
    pub inviter_id: String,
    pub role: Role,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
}

/// An email ready to be handed to a mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Mailer that logs messages instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        info!("Mail to {}: {}\n{}", email.to, email.subject, email.body);
        Ok(())
    }
}

/// Minimal address shape check: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Converts an endpoint result into the wire shape callers see.
pub fn into_callable(result: Result<CallableResponse>) -> std::result::Result<CallableResponse, ErrorPayload> {
    result.map_err(|e| e.to_payload())
}

fn require_auth(auth: Option<&AuthContext>) -> Result<&AuthContext> {
    auth.filter(|a| !a.user_id.trim().is_empty())
        .ok_or_else(|| NovaError::Unauthenticated {
            message: "The function must be called while authenticated.".to_string(),
        })
}

fn require_field<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(NovaError::validation(format!("'{}' is required", name)));
    }
    Ok(value)
}

/// Storage failures surface as `internal`; the caller only learns that it failed.
fn internal(e: NovaError) -> NovaError {
    match e {
        NovaError::Io(_) | NovaError::Serialization(_) | NovaError::LockAcquisitionFailed { .. } => {
            error!("Collaboration storage failure: {}", e);
            NovaError::ApplicationError {
                message: "Could not save the change".to_string(),
            }
        }
        other => other,
    }
}

pub struct CollaborationService {
    storage: Arc<Mutex<GoalStorage>>,
    mailer: Arc<dyn Mailer>,
    app_url: String,
}

impl CollaborationService {
    pub fn new(storage: Arc<Mutex<GoalStorage>>, mailer: Arc<dyn Mailer>, app_url: impl Into<String>) -> Self {
        Self {
            storage,
            mailer,
            app_url: app_url.into(),
        }
    }

    /// Emails an invitation and records it as pending.
    pub async fn invite_collaborator(
        &self,
        auth: Option<&AuthContext>,
        request: InviteCollaboratorRequest,
        now: DateTime<Utc>,
    ) -> Result<CallableResponse> {
        let caller = require_auth(auth)?;
        let folder_name = require_field(&request.folder_name, "folderName")?;
        let invitee = require_field(&request.invitee_email, "inviteeEmail")?.to_lowercase();
        let inviter = require_field(&request.inviter_email, "inviterEmail")?;
        let role: Role = require_field(&request.role, "role")?.parse()?;
        if !is_valid_email(&invitee) {
            return Err(NovaError::validation(format!(
                "'{}' is not a valid email address",
                invitee
            )));
        }

        {
            let storage = self.storage.lock().await;
            let folder = storage
                .get_folder(request.folder_id)
                .ok_or(NovaError::FolderNotFound {
                    id: request.folder_id,
                })?;
            let allowed = folder.owner_id == caller.user_id
                || folder.role_for(&caller.user_id).is_some_and(Role::can_edit);
            if !allowed {
                return Err(NovaError::PermissionDenied {
                    message: format!("You cannot invite people to '{}'", folder.name),
                });
            }
        }

        let invitation = Invitation {
            id: format!("inv_{}", now.timestamp_millis()),
            folder_id: request.folder_id,
            folder_name: folder_name.to_string(),
            invitee_email: invitee.clone(),
            inviter_email: inviter.to_string(),
            inviter_id: caller.user_id.clone(),
            role,
            status: InvitationStatus::Pending,
            created_at: now,
        };

        let email = OutgoingEmail {
            to: invitee.clone(),
            subject: format!("{} invited you to collaborate on \"{}\"", inviter, folder_name),
            body: format!(
                "{} has invited you to the folder \"{}\" as {}.\n\nOpen {}?invite={} to accept.",
                inviter,
                folder_name,
                role.as_str(),
                self.app_url,
                invitation.id
            ),
        };
        self.mailer.send(&email).await.map_err(|e| {
            error!("Failed to send invitation to {}: {}", invitee, e);
            NovaError::ApplicationError {
                message: "Failed to send invitation email".to_string(),
            }
        })?;

        let storage = self.storage.lock().await;
        let mut invitations = load_invitations(&storage)?;
        let mut invitation = invitation;
        let same_moment = invitations
            .iter()
            .filter(|i| i.id.starts_with(&invitation.id))
            .count();
        if same_moment > 0 {
            invitation.id = format!("{}_{}", invitation.id, same_moment);
        }
        invitations.push(invitation);
        storage
            .store()
            .set(keys::INVITATIONS, &invitations)
            .map_err(internal)?;

        info!(
            "Invited {} to folder {} as {}",
            invitee,
            request.folder_id,
            role.as_str()
        );
        Ok(CallableResponse {
            success: true,
            message: format!("Invitation sent to {}", invitee),
        })
    }

    /// Removes a user from a folder's collaborators. Only the owner may do this.
    pub async fn remove_collaborator(
        &self,
        auth: Option<&AuthContext>,
        request: RemoveCollaboratorRequest,
    ) -> Result<CallableResponse> {
        let caller = require_auth(auth)?;
        let user_id = require_field(&request.user_id, "userId")?;

        let storage = self.storage.lock().await;
        let mut folder = storage
            .get_folder(request.folder_id)
            .ok_or(NovaError::FolderNotFound {
                id: request.folder_id,
            })?;
        if folder.owner_id != caller.user_id {
            warn!(
                "User {} tried to remove {} from folder {} they do not own",
                caller.user_id, user_id, folder.id
            );
            return Err(NovaError::PermissionDenied {
                message: "Only the folder owner can remove collaborators".to_string(),
            });
        }

        let before = folder.collaborators.len();
        folder.collaborators.retain(|c| c.user_id != user_id);
        if folder.collaborators.len() == before {
            return Ok(CallableResponse {
                success: false,
                message: format!("{} is not a collaborator on '{}'", user_id, folder.name),
            });
        }

        let name = folder.name.clone();
        storage.save_folder(folder).map_err(internal)?;
        info!("Removed {} from folder {}", user_id, request.folder_id);
        Ok(CallableResponse {
            success: true,
            message: format!("Removed {} from '{}'", user_id, name),
        })
    }

    /// Accepts a pending invitation addressed to the caller's email.
    pub async fn accept_invitation(&self, auth: Option<&AuthContext>, invitation_id: &str) -> Result<CallableResponse> {
        let caller = require_auth(auth)?;
        let storage = self.storage.lock().await;
        let previous = load_invitations(&storage)?;
        let mut invitations = previous.clone();

        let invitation = invitations
            .iter_mut()
            .find(|i| i.id == invitation_id)
            .ok_or_else(|| NovaError::InvitationNotFound {
                id: invitation_id.to_string(),
            })?;
        if invitation.status != InvitationStatus::Pending {
            return Err(NovaError::validation("The invitation was already accepted"));
        }
        if !invitation.invitee_email.eq_ignore_ascii_case(caller.email.trim()) {
            return Err(NovaError::PermissionDenied {
                message: "The invitation was sent to a different address".to_string(),
            });
        }

        let mut folder = storage
            .get_folder(invitation.folder_id)
            .ok_or(NovaError::FolderNotFound {
                id: invitation.folder_id,
            })?;
        folder.collaborators.retain(|c| c.user_id != caller.user_id);
        folder.collaborators.push(Collaborator {
            user_id: caller.user_id.clone(),
            email: caller.email.trim().to_string(),
            role: invitation.role,
        });
        invitation.status = InvitationStatus::Accepted;
        let message = format!(
            "Joined '{}' as {}",
            invitation.folder_name,
            invitation.role.as_str()
        );

        storage
            .store()
            .set(keys::INVITATIONS, &invitations)
            .map_err(internal)?;
        if let Err(e) = storage.save_folder(folder) {
            if let Err(restore) = storage.store().set(keys::INVITATIONS, &previous) {
                error!("Failed to restore invitation {}: {}", invitation_id, restore);
            }
            return Err(internal(e));
        }

        info!("{} accepted invitation {}", caller.user_id, invitation_id);
        Ok(CallableResponse {
            success: true,
            message,
        })
    }

    pub async fn list_invitations(&self) -> Result<Vec<Invitation>> {
        let storage = self.storage.lock().await;
        load_invitations(&storage)
    }
}

fn load_invitations(storage: &GoalStorage) -> Result<Vec<Invitation>> {
    Ok(storage
        .store()
        .get(keys::INVITATIONS)
        .map_err(internal)?
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use chrono::TimeZone;

    use super::*;
    use crate::Config;

    #[derive(Default)]
    struct Outbox(StdMutex<Vec<OutgoingEmail>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, email: &OutgoingEmail) -> Result<()> {
            self.0.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct DownMailer;

    #[async_trait]
    impl Mailer for DownMailer {
        async fn send(&self, _email: &OutgoingEmail) -> Result<()> {
            Err(NovaError::RemoteService {
                message: "smtp refused".to_string(),
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn owner() -> AuthContext {
        AuthContext {
            user_id: "owner".to_string(),
            email: "owner@example.com".to_string(),
        }
    }

    fn guest() -> AuthContext {
        AuthContext {
            user_id: "guest".to_string(),
            email: "guest@example.com".to_string(),
        }
    }

    async fn setup(mailer: Arc<dyn Mailer>) -> (tempfile::TempDir, CollaborationService, i64) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            user_id: "owner".to_string(),
            ..Config::default()
        };
        let mut storage = GoalStorage::new(config).unwrap();
        storage.initialize(now().date_naive()).unwrap();
        let folder = storage
            .create_folder("Book club".to_string(), None, now())
            .unwrap();
        let service = CollaborationService::new(
            Arc::new(Mutex::new(storage)),
            mailer,
            "https://nova.example.com/",
        );
        (dir, service, folder.id)
    }

    fn invite(folder_id: i64, email: &str, role: &str) -> InviteCollaboratorRequest {
        InviteCollaboratorRequest {
            folder_id,
            folder_name: "Book club".to_string(),
            invitee_email: email.to_string(),
            inviter_email: "owner@example.com".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@@b.co"));
    }

    #[tokio::test]
    async fn invite_then_accept_adds_collaborator() {
        let outbox = Arc::new(Outbox::default());
        let (_dir, service, folder_id) = setup(outbox.clone()).await;

        let response = service
            .invite_collaborator(Some(&owner()), invite(folder_id, "Guest@Example.com", "editor"), now())
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(outbox.0.lock().unwrap().len(), 1);

        let invitations = service.list_invitations().await.unwrap();
        assert_eq!(invitations.len(), 1);
        assert_eq!(invitations[0].status, InvitationStatus::Pending);
        assert_eq!(invitations[0].invitee_email, "guest@example.com");

        let id = invitations[0].id.clone();
        assert!(matches!(
            service.accept_invitation(Some(&owner()), &id).await,
            Err(NovaError::PermissionDenied { .. })
        ));
        service.accept_invitation(Some(&guest()), &id).await.unwrap();

        let storage = service.storage.lock().await;
        let folder = storage.get_folder(folder_id).unwrap();
        assert_eq!(folder.role_for("guest"), Some(Role::Editor));
    }

    #[tokio::test]
    async fn invite_validates_input() {
        let (_dir, service, folder_id) = setup(Arc::new(Outbox::default())).await;

        let err = service
            .invite_collaborator(None, invite(folder_id, "guest@example.com", "viewer"), now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unauthenticated");

        let err = service
            .invite_collaborator(Some(&owner()), invite(folder_id, "not-an-email", "viewer"), now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid-argument");

        let err = service
            .invite_collaborator(Some(&owner()), invite(folder_id, "guest@example.com", "admin"), now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid-argument");

        let err = service
            .invite_collaborator(Some(&owner()), invite(folder_id, "", "viewer"), now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid-argument");
    }

    #[tokio::test]
    async fn mail_failure_is_internal_and_stores_nothing() {
        let (_dir, service, folder_id) = setup(Arc::new(DownMailer)).await;
        let err = service
            .invite_collaborator(Some(&owner()), invite(folder_id, "guest@example.com", "viewer"), now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "internal");
        assert!(service.list_invitations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_owner_removes_collaborators() {
        let (_dir, service, folder_id) = setup(Arc::new(Outbox::default())).await;
        {
            let storage = service.storage.lock().await;
            let mut folder = storage.get_folder(folder_id).unwrap();
            folder.collaborators.push(Collaborator {
                user_id: "guest".to_string(),
                email: "guest@example.com".to_string(),
                role: Role::Editor,
            });
            storage.save_folder(folder).unwrap();
        }

        let request = || RemoveCollaboratorRequest {
            folder_id,
            user_id: "guest".to_string(),
        };

        let denied = into_callable(service.remove_collaborator(Some(&guest()), request()).await);
        assert_eq!(denied.unwrap_err().code, "permission-denied");

        let removed = service
            .remove_collaborator(Some(&owner()), request())
            .await
            .unwrap();
        assert!(removed.success);

        let again = service
            .remove_collaborator(Some(&owner()), request())
            .await
            .unwrap();
        assert!(!again.success);

        let missing = service
            .remove_collaborator(
                Some(&owner()),
                RemoveCollaboratorRequest {
                    folder_id: 1,
                    user_id: "guest".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(missing.code(), "not-found");
    }

    #[tokio::test]
    async fn unknown_invitation_is_not_found() {
        let (_dir, service, _folder_id) = setup(Arc::new(Outbox::default())).await;
        let err = service
            .accept_invitation(Some(&guest()), "no-such-invitation")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[tokio::test]
    async fn failed_accept_leaves_invitation_pending() {
        let (dir, service, folder_id) = setup(Arc::new(Outbox::default())).await;
        service
            .invite_collaborator(Some(&owner()), invite(folder_id, "guest@example.com", "viewer"), now())
            .await
            .unwrap();
        let id = service.list_invitations().await.unwrap()[0].id.clone();

        // A directory where the folder file belongs makes the folder write fail
        let folders_path = dir.path().join("folders.json");
        std::fs::remove_file(&folders_path).unwrap();
        std::fs::create_dir(&folders_path).unwrap();

        let err = service.accept_invitation(Some(&guest()), &id).await.unwrap_err();
        assert_eq!(err.code(), "internal");

        let invitations = service.list_invitations().await.unwrap();
        assert_eq!(invitations[0].status, InvitationStatus::Pending);
        let storage = service.storage.lock().await;
        assert_eq!(storage.get_folder(folder_id).unwrap().role_for("guest"), None);
    }
}
