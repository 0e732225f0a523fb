use serde::Serialize;

use super::plans::Plan;

// key: entitlement-principal -> authenticated actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    Regular { id: i32, plan: Plan },
    Admin { id: i32, plan: Plan, is_super_admin: bool },
}

/// Owner of usage records. User and admin ids come from separate sequences
/// and may collide, so the account type is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKey {
    User(i32),
    Admin(i32),
}

impl PrincipalKey {
    pub fn id(self) -> i32 {
        match self {
            PrincipalKey::User(id) | PrincipalKey::Admin(id) => id,
        }
    }
}

impl std::fmt::Display for PrincipalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrincipalKey::User(id) => write!(f, "user:{id}"),
            PrincipalKey::Admin(id) => write!(f, "admin:{id}"),
        }
    }
}

impl Principal {
    pub fn regular(id: i32, plan: Option<&str>) -> Self {
        Principal::Regular {
            id,
            plan: Plan::from_stored(plan),
        }
    }

    pub fn admin(id: i32, plan: Option<&str>, is_super_admin: bool) -> Self {
        Principal::Admin {
            id,
            plan: Plan::from_stored(plan),
            is_super_admin,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Principal::Regular { id, .. } | Principal::Admin { id, .. } => *id,
        }
    }

    pub fn key(&self) -> PrincipalKey {
        match self {
            Principal::Regular { id, .. } => PrincipalKey::User(*id),
            Principal::Admin { id, .. } => PrincipalKey::Admin(*id),
        }
    }

    pub fn plan(&self) -> Plan {
        match self {
            Principal::Regular { plan, .. } | Principal::Admin { plan, .. } => *plan,
        }
    }

    /// Super admins bypass every quota, feature, plan and template check.
    pub fn is_unrestricted(&self) -> bool {
        matches!(
            self,
            Principal::Admin {
                is_super_admin: true,
                ..
            }
        )
    }
}
