//! Authenticated subjects and their roles.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::VisibilityScope;

/// The fixed three-role model. Wire names are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "SYSTEM_ADMIN")]
    SystemAdmin,
    #[serde(rename = "TENANT_ADMIN")]
    TenantAdmin,
    #[serde(rename = "USER")]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "SYSTEM_ADMIN",
            Role::TenantAdmin => "TENANT_ADMIN",
            Role::User => "USER",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "SYSTEM_ADMIN" => Some(Role::SystemAdmin),
            "TENANT_ADMIN" => Some(Role::TenantAdmin),
            "USER" => Some(Role::User),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated subject.
///
/// `visible_tenant_ids` is derived at login from the tenant forest and the
/// role, never authoritative on its own. A SYSTEM_ADMIN has no tenant and an
/// empty visible list, interpreted as the universal set.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
    pub visible_tenant_ids: Vec<Uuid>,
}

impl Principal {
    pub fn is_system_admin(&self) -> bool {
        self.role == Role::SystemAdmin
    }

    /// The record filter this principal is allowed to read through.
    pub fn scope(&self) -> VisibilityScope {
        match self.role {
            Role::SystemAdmin => VisibilityScope::Unrestricted,
            Role::TenantAdmin | Role::User => {
                VisibilityScope::tenants(self.visible_tenant_ids.iter().copied())
            }
        }
    }
}

/// Authentication state of a request, carried explicitly instead of a loose
/// request attribute.
#[derive(Debug, Clone)]
pub enum AuthContext {
    Anonymous,
    Authenticated(Principal),
}

impl AuthContext {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthContext::Authenticated(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthContext::Anonymous => None,
            AuthContext::Authenticated(principal) => Some(principal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, visible: Vec<Uuid>) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            role,
            tenant_id: None,
            visible_tenant_ids: visible,
        }
    }

    #[test]
    fn role_wire_names_are_stable() {
        assert_eq!(Role::SystemAdmin.as_str(), "SYSTEM_ADMIN");
        assert_eq!(Role::TenantAdmin.as_str(), "TENANT_ADMIN");
        assert_eq!(Role::User.as_str(), "USER");

        assert_eq!(Role::parse("TENANT_ADMIN"), Some(Role::TenantAdmin));
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn system_admin_scope_is_unrestricted_even_with_empty_list() {
        let principal = principal(Role::SystemAdmin, vec![]);
        assert_eq!(principal.scope(), VisibilityScope::Unrestricted);
    }

    #[test]
    fn non_admin_without_tenants_has_empty_scope() {
        let principal = principal(Role::User, vec![]);
        let scope = principal.scope();
        assert!(scope.is_empty());
        assert!(!scope.permits(&[Uuid::new_v4()]));
    }

    #[test]
    fn tenant_admin_scope_is_the_visible_set() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let principal = principal(Role::TenantAdmin, vec![a, b]);

        let scope = principal.scope();
        assert!(scope.permits(&[b]));
        assert!(!scope.permits(&[Uuid::new_v4()]));
    }

    #[test]
    fn auth_context_exposes_principal_only_when_authenticated() {
        assert!(AuthContext::Anonymous.principal().is_none());

        let context = AuthContext::Authenticated(principal(Role::User, vec![]));
        assert!(context.is_authenticated());
        assert!(context.principal().is_some());
    }
}
