//! Route access policy: (resolved identity, path) → render or redirect.
//!
//! - No IO
//! - No panics
//! - No hidden state (pure function of identity, path and the policy table)

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{ResolvedIdentity, Role};

/// Outcome of a route check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteDecision {
    /// Render the requested surface.
    Render,
    /// Render the fixed "awaiting approval" surface instead of the requested one.
    RenderPending,
    /// Resolution failed; render the retry surface. Never the requested one.
    RenderRetry,
    /// Resolution still in flight; render nothing yet.
    Hold,
    /// Navigate elsewhere. `return_to` carries the originally requested path.
    Redirect {
        target: String,
        return_to: Option<String>,
    },
}

impl RouteDecision {
    pub fn redirect(target: impl Into<String>) -> Self {
        Self::Redirect {
            target: target.into(),
            return_to: None,
        }
    }

    pub fn is_render(&self) -> bool {
        matches!(self, RouteDecision::Render)
    }
}

/// A decision plus the reason it was made (for audit logs and debugging).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteExplanation {
    pub path: String,
    pub decision: RouteDecision,
    pub reason: String,
}

/// Landing page for a role. Unknown roles go to the site root.
pub fn home_path_for(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Student) => "/student-profile",
        Some(Role::Teacher) | Some(Role::Hod) | Some(Role::Admin) => "/dashboard",
        None => "/",
    }
}

/// Policy table: public routes, special surfaces and the route → allowed-roles map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    login: String,
    profile_completion: String,
    public_routes: BTreeSet<String>,
    restricted: BTreeMap<String, BTreeSet<Role>>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new("/login", "/complete-profile")
            .with_public_route("/")
            .with_public_route("/login")
            .with_public_route("/signup")
            .with_public_route("/about")
            .with_public_route("/courses")
            .restrict("/dashboard", [Role::Teacher, Role::Hod, Role::Admin])
            .restrict("/student-profile", [Role::Student])
            .restrict("/teacher-profile", [Role::Teacher])
            .restrict("/department", [Role::Hod])
            .restrict("/approvals", [Role::Hod, Role::Admin])
            .restrict("/admin", [Role::Admin])
    }
}

impl RoutePolicy {
    /// An empty policy: no public routes, nothing restricted.
    pub fn new(login: impl Into<String>, profile_completion: impl Into<String>) -> Self {
        Self {
            login: normalize_path(&login.into()),
            profile_completion: normalize_path(&profile_completion.into()),
            public_routes: BTreeSet::new(),
            restricted: BTreeMap::new(),
        }
    }

    pub fn with_public_route(mut self, path: &str) -> Self {
        self.public_routes.insert(normalize_path(path));
        self
    }

    pub fn restrict(mut self, path: &str, roles: impl IntoIterator<Item = Role>) -> Self {
        self.restricted
            .entry(normalize_path(path))
            .or_default()
            .extend(roles);
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login
    }

    pub fn profile_completion_path(&self) -> &str {
        &self.profile_completion
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.public_routes.iter().any(|route| route_matches(&path, route))
    }

    /// Roles allowed on `path`, from the most specific listed route covering it.
    pub fn allowed_roles(&self, path: &str) -> Option<&BTreeSet<Role>> {
        let path = normalize_path(path);
        self.restricted
            .iter()
            .filter(|(route, _)| route_matches(&path, route))
            .max_by_key(|(route, _)| route.len())
            .map(|(_, roles)| roles)
    }

    pub fn decide(&self, resolved: &ResolvedIdentity, path: &str) -> RouteDecision {
        self.explain(resolved, path).decision
    }

    /// Decide and say why.
    pub fn explain(&self, resolved: &ResolvedIdentity, path: &str) -> RouteExplanation {
        let path = normalize_path(path);
        let (decision, reason) = self.evaluate(resolved, &path);
        RouteExplanation {
            path,
            decision,
            reason,
        }
    }

    fn evaluate(&self, resolved: &ResolvedIdentity, path: &str) -> (RouteDecision, String) {
        if self.is_public(path) {
            return (RouteDecision::Render, format!("'{path}' is a public route"));
        }

        match resolved {
            ResolvedIdentity::Loading => {
                return (RouteDecision::Hold, "identity resolution still in progress".to_string());
            }
            ResolvedIdentity::ResolutionError { message } => {
                return (
                    RouteDecision::RenderRetry,
                    format!("identity resolution failed: {message}"),
                );
            }
            ResolvedIdentity::PendingApproval { status } => {
                return (
                    RouteDecision::RenderPending,
                    format!("teacher approval request is {status}"),
                );
            }
            ResolvedIdentity::Unauthenticated => {
                return (
                    RouteDecision::Redirect {
                        target: self.login.clone(),
                        return_to: Some(path.to_string()),
                    },
                    "no authenticated session".to_string(),
                );
            }
            _ => {}
        }

        if path == self.profile_completion {
            return match resolved {
                ResolvedIdentity::NewUnregistered => (
                    RouteDecision::Render,
                    "profile completion is open to unregistered identities".to_string(),
                ),
                other => {
                    let home = home_path_for(other.role());
                    (
                        RouteDecision::redirect(home),
                        format!("profile already complete; sending to '{home}'"),
                    )
                }
            };
        }

        let role = match resolved {
            ResolvedIdentity::RoleResolved { role, .. } => *role,
            _ => {
                return (
                    RouteDecision::redirect(self.profile_completion.clone()),
                    "identity has no role yet; profile completion required".to_string(),
                );
            }
        };

        match self.allowed_roles(path) {
            None => (RouteDecision::Render, format!("'{path}' is not role-restricted")),
            Some(allowed) if allowed.contains(&role) => (
                RouteDecision::Render,
                format!("role '{role}' is allowed on '{path}'"),
            ),
            Some(allowed) => {
                let home = home_path_for(Some(role));
                let allowed: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
                (
                    RouteDecision::redirect(home),
                    format!("role '{role}' is not in {allowed:?} for '{path}'; sending to '{home}'"),
                )
            }
        }
    }
}

/// Strip query/fragment, ensure a leading slash and drop trailing slashes.
fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Segment-prefix match; the root route only matches itself.
fn route_matches(path: &str, route: &str) -> bool {
    if route == "/" {
        return path == "/";
    }
    path == route
        || path
            .strip_prefix(route)
            .is_some_and(|rest| rest.starts_with('/'))
}
