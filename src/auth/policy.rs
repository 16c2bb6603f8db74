use actix_web::http::Method;

use super::identity::{AuthenticatedIdentity, Role};

// ============================================================================
// Access Policy - route rules
// ============================================================================
//
// Pattern segments:
// - `literal`  exact match
// - `*`        any single segment
// - `{owner}`  any single segment, captured as the resource owner
// - `**`       trailing only; any suffix, including empty
//
// The most specific matching rule wins: more literal segments first, then
// more segments overall, then declaration order. Paths no rule matches
// require authentication.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Any role
    Authenticated,
    Roles(Vec<Role>),
    /// Subject must equal the `{owner}` segment unless its role is listed
    OwnerOr(Vec<Role>),
}

impl Access {
    pub fn is_public(&self) -> bool {
        matches!(self, Access::Public)
    }

    /// Whether an authenticated identity may proceed.
    pub fn permits(&self, identity: &AuthenticatedIdentity, owner: Option<&str>) -> bool {
        match self {
            Access::Public | Access::Authenticated => true,
            Access::Roles(roles) => roles.contains(&identity.role),
            Access::OwnerOr(roles) => {
                roles.contains(&identity.role) || owner == Some(identity.subject.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
    Owner,
    Rest,
}

#[derive(Debug, Clone)]
pub struct AccessRule {
    /// `None` matches every method
    method: Option<Method>,
    pattern: String,
    segments: Vec<Segment>,
    access: Access,
}

impl AccessRule {
    pub fn new(method: Option<Method>, pattern: &str, access: Access) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::Rest,
                "{owner}" => Segment::Owner,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();

        Self {
            method,
            pattern: pattern.to_string(),
            segments,
            access,
        }
    }

    pub fn on(method: Method, pattern: &str, access: Access) -> Self {
        Self::new(Some(method), pattern, access)
    }

    pub fn any_method(pattern: &str, access: Access) -> Self {
        Self::new(None, pattern, access)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    /// (literal segments, total segments); `**` counts toward neither.
    fn specificity(&self) -> (usize, usize) {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let total = self
            .segments
            .iter()
            .filter(|s| !matches!(s, Segment::Rest))
            .count();
        (literals, total)
    }

    /// On match, returns the captured owner segment if the pattern has one.
    fn matches(&self, method: &Method, path: &[&str]) -> Option<Option<String>> {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return None;
        }

        let mut owner = None;
        let mut rest = path.iter();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => return (index + 1 == self.segments.len()).then_some(owner),
                Segment::Literal(literal) => {
                    if literal.as_str() != *rest.next()? {
                        return None;
                    }
                }
                Segment::Any => {
                    rest.next()?;
                }
                Segment::Owner => owner = Some(rest.next()?.to_string()),
            }
        }

        rest.next().is_none().then_some(owner)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Outcome of resolving a request against the policy.
#[derive(Debug, Clone)]
pub struct ResolvedAccess<'a> {
    pub access: &'a Access,
    pub owner: Option<String>,
    /// Matched pattern, `None` for the fail-closed default
    pub pattern: Option<&'a str>,
}

static FAIL_CLOSED: Access = Access::Authenticated;

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    pub fn resolve(&self, method: &Method, path: &str) -> ResolvedAccess<'_> {
        let segments: Vec<&str> = split_path(path).collect();

        let mut best: Option<(&AccessRule, Option<String>)> = None;
        for rule in &self.rules {
            let Some(owner) = rule.matches(method, &segments) else {
                continue;
            };
            let better = match &best {
                Some((current, _)) => rule.specificity() > current.specificity(),
                None => true,
            };
            if better {
                best = Some((rule, owner));
            }
        }

        match best {
            Some((rule, owner)) => ResolvedAccess {
                access: &rule.access,
                owner,
                pattern: Some(&rule.pattern),
            },
            None => ResolvedAccess {
                access: &FAIL_CLOSED,
                owner: None,
                pattern: None,
            },
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

/// Route table for the marketplace API.
pub fn default_rules() -> Vec<AccessRule> {
    use Access::*;
    use Role::*;

    vec![
        AccessRule::any_method("/api/health/**", Public),
        AccessRule::on(Method::GET, "/api/products/**", Public),
        AccessRule::on(Method::GET, "/api/categories/**", Public),
        AccessRule::on(Method::GET, "/api/orders", Roles(vec![Admin])),
        AccessRule::on(Method::POST, "/api/orders", Roles(vec![Buyer])),
        AccessRule::on(Method::GET, "/api/orders/user/{owner}", OwnerOr(vec![Vendor, Admin])),
        AccessRule::on(Method::PUT, "/api/orders/*/status", Roles(vec![Vendor, Admin])),
        AccessRule::on(Method::DELETE, "/api/orders/*", Roles(vec![Admin])),
        AccessRule::on(Method::GET, "/api/vendors/{owner}/stats", OwnerOr(vec![Admin])),
        AccessRule::on(Method::GET, "/api/vendors/{owner}/orders", OwnerOr(vec![Admin])),
        AccessRule::on(
            Method::PUT,
            "/api/vendors/{owner}/orders/*/status",
            OwnerOr(vec![Admin]),
        ),
        AccessRule::any_method("/api/**", Authenticated),
    ]
}
