//! Role-based route authorization.
//!
//! Routes are gated by a static table mapping a route prefix to the role
//! allowed through it. Matching always runs against the mounted route path
//! (Rocket's routing path), never the raw request URI, so the table cannot
//! drift from what the router actually resolved.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Closed set of staff roles. Stored in the database as the uppercase
/// token returned by [`Role::as_str`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Doctor,
    Pharmacist,
    Receptionist,
}

impl Role {
    /// Parse an exact role token. Compound or partial strings such as
    /// `"DOCTOR,ADMIN"` or `"ADMINISTRATOR"` do not parse; role checks are
    /// whole-token only.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "ADMIN" => Some(Role::Admin),
            "DOCTOR" => Some(Role::Doctor),
            "PHARMACIST" => Some(Role::Pharmacist),
            "RECEPTIONIST" => Some(Role::Receptionist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Doctor => "DOCTOR",
            Role::Pharmacist => "PHARMACIST",
            Role::Receptionist => "RECEPTIONIST",
        }
    }

    /// Prefix used when minting external user identifiers (`DOC-xxxxxxxx`).
    pub fn user_id_prefix(&self) -> &'static str {
        match self {
            Role::Admin => "ADM",
            Role::Doctor => "DOC",
            Role::Pharmacist => "PHM",
            Role::Receptionist => "RCP",
        }
    }
}

/// Route prefixes reachable without a bearer token.
const PUBLIC_PREFIXES: &[&str] = &[
    "/auth/login",
    "/auth/register",
    "/auth/create-admin",
    "/auth/forgot-password",
    "/auth/reset-password",
    "/health",
    "/docs",
    "/openapi.json",
];

/// Route prefix to required role. Routes outside this table require only
/// an authenticated identity.
const ROLE_PREFIXES: &[(&str, Role)] = &[
    ("/admin", Role::Admin),
    ("/doctor", Role::Doctor),
    ("/pharmacist", Role::Pharmacist),
    ("/receptionist", Role::Receptionist),
];

/// Prefix match on path-segment boundaries, so `/admin` matches `/admin`
/// and `/admin/users` but not `/administrator`.
fn prefix_matches(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Whether the routing path is on the unauthenticated allow-list.
pub fn is_public(path: &str) -> bool {
    PUBLIC_PREFIXES
        .iter()
        .any(|prefix| prefix_matches(path, prefix))
}

/// The role a routing path demands, if it sits under a role-gated prefix.
pub fn required_role(path: &str) -> Option<Role> {
    ROLE_PREFIXES
        .iter()
        .find(|(prefix, _)| prefix_matches(path, prefix))
        .map(|(_, role)| *role)
}

/// Authorization decision for an authenticated identity.
pub fn allows(role: Role, path: &str) -> bool {
    match required_role(path) {
        Some(required) => role == required,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_tokens_parse_exactly() {
        assert_eq!(Role::parse("DOCTOR"), Some(Role::Doctor));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        // Substring containment is not a match.
        assert_eq!(Role::parse("DOCTOR,ADMIN"), None);
        assert_eq!(Role::parse("ADMINISTRATOR"), None);
        assert_eq!(Role::parse("doctor"), None);
    }

    #[test]
    fn prefixes_match_on_segment_boundaries() {
        assert_eq!(required_role("/admin/users"), Some(Role::Admin));
        assert_eq!(required_role("/admin"), Some(Role::Admin));
        assert_eq!(required_role("/administrator/users"), None);
        assert_eq!(required_role("/doctor/appointments"), Some(Role::Doctor));
    }

    #[test]
    fn cross_role_access_is_denied() {
        assert!(allows(Role::Admin, "/admin/users"));
        assert!(!allows(Role::Doctor, "/admin/users"));
        assert!(!allows(Role::Pharmacist, "/receptionist/patients"));
        // Routes without a role prefix accept any authenticated role.
        assert!(allows(Role::Receptionist, "/auth/validate"));
    }

    #[test]
    fn public_allow_list_is_prefix_based() {
        assert!(is_public("/auth/login"));
        assert!(is_public("/docs/swagger/index.html"));
        assert!(!is_public("/auth/validate"));
        assert!(!is_public("/admin/users"));
    }
}
