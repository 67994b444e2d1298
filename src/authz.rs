//! Permission checks for privileged operations.
//!
//! Every privileged handler goes through [`authorize`]. A request is allowed
//! when the caller's role is a configured super-role, or when the role holds
//! the exact `(resource, action)` pair. Any lookup failure denies.

use crate::{AppState, auth::AuthUser, error::AppError, models::UserAccess};

/// A `(resource, action)` pair.
pub type Perm = (&'static str, &'static str);

pub mod perms {
    use super::Perm;

    pub const USERS_READ: Perm = ("users", "read");
    pub const USERS_CREATE: Perm = ("users", "create");
    pub const USERS_UPDATE: Perm = ("users", "update");
    pub const ROLES_READ: Perm = ("roles", "read");
    pub const ROLES_MANAGE: Perm = ("roles", "manage");
    pub const ROLES_ASSIGN: Perm = ("roles", "assign");
    pub const PINS_CREATE: Perm = ("pins", "create");
    pub const PINS_UPDATE: Perm = ("pins", "update");
    pub const PINS_AWARD: Perm = ("pins", "award");
    pub const PINS_REVOKE: Perm = ("pins", "revoke");
    pub const ARTICLES_CREATE: Perm = ("articles", "create");
    pub const ARTICLES_UPDATE: Perm = ("articles", "update");
    pub const ARTICLES_MODERATE: Perm = ("articles", "moderate");
    pub const BOOKS_CREATE: Perm = ("books", "create");
    pub const QUOTES_READ: Perm = ("quotes", "read");
    pub const QUOTES_UPDATE: Perm = ("quotes", "update");
    pub const REFERRALS_READ: Perm = ("referrals", "read");
    pub const STATS_READ: Perm = ("stats", "read");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub fn is_super_role(role: &str, super_roles: &[String]) -> bool {
    super_roles.iter().any(|r| r == role)
}

/// Pure decision over an already-loaded access record.
pub fn decide(access: &UserAccess, resource: &str, action: &str, super_roles: &[String]) -> Decision {
    if !access.is_active {
        return Decision::Deny;
    }
    if is_super_role(&access.role_name, super_roles) {
        return Decision::Allow;
    }
    let granted = access
        .permissions
        .iter()
        .any(|(r, a)| r == resource && a == action);
    if granted { Decision::Allow } else { Decision::Deny }
}

/// authorize
///
/// Loads the caller's role and permissions in one round trip and applies
/// [`decide`]. Returns `AppError::Forbidden` on deny, including when the user
/// vanished or the database could not be read.
pub async fn authorize(state: &AppState, user: &AuthUser, perm: Perm) -> Result<(), AppError> {
    let (resource, action) = perm;
    let access = match state.repo.get_user_access(user.id).await {
        Ok(Some(access)) => access,
        Ok(None) => {
            tracing::warn!(user_id = %user.id, resource, action, "access check for missing user");
            return Err(AppError::forbidden());
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, resource, action, error = %e, "access lookup failed; denying");
            return Err(AppError::forbidden());
        }
    };

    match decide(&access, resource, action, &state.config.super_roles) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::info!(user_id = %user.id, role = %access.role_name, resource, action, "permission denied");
            Err(AppError::forbidden())
        }
    }
}

/// Like [`authorize`] but returns a boolean, for handlers where a missing
/// permission narrows the result instead of rejecting the request.
pub async fn is_allowed(state: &AppState, user: &AuthUser, perm: Perm) -> bool {
    authorize(state, user, perm).await.is_ok()
}

/// Subscriber-only content is readable by subscribers and super-roles.
pub fn has_premium_access(user: Option<&AuthUser>, super_roles: &[String]) -> bool {
    user.is_some_and(|u| u.is_subscribed || is_super_role(&u.role, super_roles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn supers() -> Vec<String> {
        vec!["admin".to_string(), "Administrador".to_string()]
    }

    fn access(role: &str, grants: &[Perm]) -> UserAccess {
        UserAccess {
            user_id: Uuid::new_v4(),
            is_active: true,
            role_name: role.to_string(),
            permissions: grants
                .iter()
                .map(|(r, a)| (r.to_string(), a.to_string()))
                .collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn exact_pair_is_required() {
        let editor = access("Editor", &[perms::ARTICLES_CREATE]);
        assert_eq!(decide(&editor, "articles", "create", &supers()), Decision::Allow);
        assert_eq!(decide(&editor, "articles", "update", &supers()), Decision::Deny);
        assert_eq!(decide(&editor, "users", "create", &supers()), Decision::Deny);
    }

    #[test]
    fn both_super_role_labels_allow_everything() {
        for label in ["admin", "Administrador"] {
            let a = access(label, &[]);
            assert_eq!(decide(&a, "stats", "read", &supers()), Decision::Allow);
            assert_eq!(decide(&a, "anything", "at-all", &supers()), Decision::Allow);
        }
    }

    #[test]
    fn super_roles_are_configurable() {
        let a = access("Administrador", &[]);
        let only_admin = vec!["admin".to_string()];
        assert_eq!(decide(&a, "stats", "read", &only_admin), Decision::Deny);
    }

    #[test]
    fn inactive_users_are_denied_even_as_admin() {
        let mut a = access("admin", &[]);
        a.is_active = false;
        assert_eq!(decide(&a, "stats", "read", &supers()), Decision::Deny);
    }

    #[test]
    fn premium_access_rules() {
        let member = AuthUser {
            id: Uuid::new_v4(),
            email: "m@x.io".to_string(),
            role: "Usuario".to_string(),
            is_subscribed: false,
        };
        assert!(!has_premium_access(None, &supers()));
        assert!(!has_premium_access(Some(&member), &supers()));
        let subscriber = AuthUser { is_subscribed: true, ..member.clone() };
        assert!(has_premium_access(Some(&subscriber), &supers()));
        let admin = AuthUser { role: "admin".to_string(), ..member };
        assert!(has_premium_access(Some(&admin), &supers()));
    }
}
