//! # RBAC evaluator (C7)
//!
//! Replaces the lineage's flat `UserRole{Student,Instructor,Admin}` +
//! `has_permission` linear hierarchy with a banded evaluator operating over
//! the `roles[]`/`permissions[]` claims embedded by the token codec (C2).
//!
//! Every checked action/resource key is classified into one of three bands
//! by a static prefix table:
//!
//! - **Administrative** (`admin:*`, `system:*`, `users:create`,
//!   `organizations:delete`, `roles:create`, ...): superadmin bypasses;
//!   otherwise the principal must hold the exact permission.
//! - **Role-specific** (`role:*`, `dashboard:admin`, `access:member-routes`):
//!   superadmin does NOT bypass. Exact permission required. This prevents a
//!   global superadmin from implicitly passing role-gated UX checks.
//! - **User-facing** (`profile:*`, `member:*`, `organization:view`, ...):
//!   either the exact permission or a role-hierarchy match
//!   (superadmin > admin > member > user) grants access.
//!
//! Cross-organization leakage is prevented by always scoping checks to the
//! organization id embedded in the caller's [`Principal`](super::principal::Principal) —
//! callers never pass a bare permission string without it being evaluated
//! against that principal's own claims.

use std::collections::HashSet;

/// The three permission bands (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionBand {
    Administrative,
    RoleSpecific,
    UserFacing,
}

/// Prefixes (or exact keys) that classify into the administrative band.
const ADMINISTRATIVE_PREFIXES: &[&str] = &[
    "admin:", "system:", "users:create", "organizations:delete", "roles:create", "roles:delete",
    "permissions:",
];

/// Prefixes that classify into the role-specific band.
const ROLE_SPECIFIC_PREFIXES: &[&str] = &["role:", "dashboard:admin", "access:member-routes"];

/// Role hierarchy used for the user-facing band's fallback match, ordered
/// from least to most privileged.
const ROLE_HIERARCHY: &[&str] = &["user", "member", "admin", "superadmin"];

/// Classifies an action/resource key into its permission band by longest
/// matching prefix in the administrative/role-specific tables; anything
/// unmatched defaults to user-facing.
pub fn classify(permission: &str) -> PermissionBand {
    if ADMINISTRATIVE_PREFIXES.iter().any(|p| permission.starts_with(p)) {
        return PermissionBand::Administrative;
    }
    if ROLE_SPECIFIC_PREFIXES.iter().any(|p| permission.starts_with(p)) {
        return PermissionBand::RoleSpecific;
    }
    PermissionBand::UserFacing
}

/// The claims an RBAC check needs: the principal's effective role names,
/// effective permission names, and superadmin flag — all cached in the
/// access token at issuance time (§4.7 step 3).
pub struct RbacContext<'a> {
    pub is_superadmin: bool,
    pub roles: &'a [String],
    pub permissions: &'a [String],
}

impl<'a> RbacContext<'a> {
    fn highest_role_rank(&self) -> Option<usize> {
        self.roles
            .iter()
            .filter_map(|r| ROLE_HIERARCHY.iter().position(|h| h == r))
            .max()
    }

    fn has_role_at_least(&self, required: &str) -> bool {
        let Some(required_rank) = ROLE_HIERARCHY.iter().position(|h| *h == required) else {
            return false;
        };
        self.highest_role_rank().map(|r| r >= required_rank).unwrap_or(false)
    }

    /// Evaluates a single permission check per the band rules (§4.7).
    pub fn check(&self, permission: &str) -> bool {
        let has_exact = self.permissions.iter().any(|p| p == permission);

        match classify(permission) {
            PermissionBand::Administrative => self.is_superadmin || has_exact,
            PermissionBand::RoleSpecific => has_exact,
            PermissionBand::UserFacing => has_exact || self.user_facing_hierarchy_match(),
        }
    }

    /// User-facing band's role-hierarchy fallback: superadmin > admin >
    /// member > user, any of which (at or above member) is treated as
    /// holding every user-facing permission. A bare `user` role alone is
    /// not sufficient — it only ever matches its own exact permissions.
    fn user_facing_hierarchy_match(&self) -> bool {
        self.is_superadmin || self.has_role_at_least("member")
    }

    /// `any(p_1...p_n)` — true if at least one permission is held.
    pub fn check_any(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.check(p))
    }

    /// `all(p_1...p_n)` — true only if every permission is held. On
    /// failure, returns the missing subset for the caller to report.
    pub fn check_all<'p>(&self, permissions: &[&'p str]) -> Result<(), Vec<&'p str>> {
        let missing: Vec<&str> = permissions.iter().copied().filter(|p| !self.check(p)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Permission names held, deduplicated, for callers that want the raw set.
    pub fn permission_set(&self) -> HashSet<&str> {
        self.permissions.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(is_superadmin: bool, roles: &'a [String], permissions: &'a [String]) -> RbacContext<'a> {
        RbacContext { is_superadmin, roles, permissions }
    }

    #[test]
    fn test_classify_administrative() {
        assert_eq!(classify("admin:dashboard"), PermissionBand::Administrative);
        assert_eq!(classify("users:create"), PermissionBand::Administrative);
        assert_eq!(classify("organizations:delete"), PermissionBand::Administrative);
    }

    #[test]
    fn test_classify_role_specific() {
        assert_eq!(classify("role:user"), PermissionBand::RoleSpecific);
        assert_eq!(classify("dashboard:admin"), PermissionBand::RoleSpecific);
    }

    #[test]
    fn test_classify_user_facing_default() {
        assert_eq!(classify("profile:view"), PermissionBand::UserFacing);
        assert_eq!(classify("member:view"), PermissionBand::UserFacing);
    }

    #[test]
    fn test_administrative_band_superadmin_bypasses() {
        let roles = vec!["superadmin".to_string()];
        let perms = vec![];
        let c = ctx(true, &roles, &perms);
        assert!(c.check("users:create"));
    }

    #[test]
    fn test_administrative_band_requires_exact_permission_without_superadmin() {
        let roles = vec!["admin".to_string()];
        let perms = vec![];
        let c = ctx(false, &roles, &perms);
        assert!(!c.check("users:create"));

        let perms_with = vec!["users:create".to_string()];
        let c2 = ctx(false, &roles, &perms_with);
        assert!(c2.check("users:create"));
    }

    #[test]
    fn test_role_specific_band_superadmin_does_not_bypass() {
        let roles = vec!["superadmin".to_string()];
        let perms = vec![];
        let c = ctx(true, &roles, &perms);
        assert!(!c.check("role:user"));

        let perms_with = vec!["role:user".to_string()];
        let c2 = ctx(true, &roles, &perms_with);
        assert!(c2.check("role:user"));
    }

    #[test]
    fn test_user_facing_band_allows_exact_permission() {
        let roles = vec!["user".to_string()];
        let perms = vec!["profile:view".to_string()];
        let c = ctx(false, &roles, &perms);
        assert!(c.check("profile:view"));
    }

    #[test]
    fn test_user_facing_band_allows_role_hierarchy_fallback() {
        let roles = vec!["admin".to_string()];
        let perms = vec![];
        let c = ctx(false, &roles, &perms);
        assert!(c.check("profile:view"));
    }

    #[test]
    fn test_user_facing_band_member_role_gets_hierarchy_fallback() {
        let roles = vec!["member".to_string()];
        let perms = vec![];
        let c = ctx(false, &roles, &perms);
        assert!(c.check("profile:view"));
    }

    #[test]
    fn test_user_facing_band_bare_user_role_does_not_get_hierarchy_fallback() {
        let roles = vec!["user".to_string()];
        let perms = vec![];
        let c = ctx(false, &roles, &perms);
        assert!(!c.check("profile:view"));
    }

    #[test]
    fn test_check_any() {
        let roles = vec!["user".to_string()];
        let perms = vec!["profile:view".to_string()];
        let c = ctx(false, &roles, &perms);
        assert!(c.check_any(&["profile:view", "profile:edit"]));
        assert!(!c.check_any(&["profile:edit", "member:invite"]));
    }

    #[test]
    fn test_check_all_reports_missing() {
        let roles = vec!["user".to_string()];
        let perms = vec!["profile:view".to_string()];
        let c = ctx(false, &roles, &perms);
        let result = c.check_all(&["profile:view", "profile:edit"]);
        assert_eq!(result.unwrap_err(), vec!["profile:edit"]);
    }
}
