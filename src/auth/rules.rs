// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Declarative route-rule table.
//!
//! Each route group owns an ordered list of rules. The first path segment
//! selects the group; within it, the first rule whose method and pattern
//! match decides the access policy. Paths outside every group are not
//! guarded by this table.

use axum::http::Method;

use super::roles::Role;

/// Response to an authenticated caller on an anonymous-only route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BadRequest,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Allowed without authentication
    Public,
    /// Allowed only when the caller holds no valid refresh token
    AnonymousOnly(Rejection),
    /// Requires authentication and a role from the rule
    Protected,
}

/// Relation between the captured path id and the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Any,
    /// Path id must be the caller's id
    SelfOnly,
    /// Path id must not be the caller's id
    OthersOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture,
}

/// A path pattern such as `/admin/{id}`, compiled into segments.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Successful match of a [`PathPattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMatch<'a> {
    pub id: Option<&'a str>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') {
                    Segment::Capture
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches<'a>(&self, path: &'a str) -> Option<PathMatch<'a>> {
        let mut id = None;
        let mut parts = split(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Capture => id = Some(part),
            }
        }

        match parts.next() {
            Some(_) => None,
            None => Some(PathMatch { id }),
        }
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// One row of the table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub method: Method,
    pub pattern: PathPattern,
    pub access: Access,
    /// Caller must hold at least one of these
    pub roles: Vec<Role>,
    pub ownership: Ownership,
}

impl RouteRule {
    pub fn public(method: Method, pattern: &str) -> Self {
        Self::new(method, pattern, Access::Public, &[])
    }

    pub fn anonymous_only(method: Method, pattern: &str, rejection: Rejection) -> Self {
        Self::new(method, pattern, Access::AnonymousOnly(rejection), &[])
    }

    pub fn protected(method: Method, pattern: &str, roles: &[Role]) -> Self {
        Self::new(method, pattern, Access::Protected, roles)
    }

    pub fn self_only(mut self) -> Self {
        self.ownership = Ownership::SelfOnly;
        self
    }

    pub fn others_only(mut self) -> Self {
        self.ownership = Ownership::OthersOnly;
        self
    }

    fn new(method: Method, pattern: &str, access: Access, roles: &[Role]) -> Self {
        Self {
            method,
            pattern: PathPattern::compile(pattern),
            access,
            roles: roles.to_vec(),
            ownership: Ownership::Any,
        }
    }
}

/// Ordered rules for one first-level path segment.
#[derive(Debug, Clone)]
pub struct RouteGroup {
    pub name: &'static str,
    pub rules: Vec<RouteRule>,
}

impl RouteGroup {
    pub fn new(name: &'static str, rules: Vec<RouteRule>) -> Self {
        Self { name, rules }
    }

    /// First rule matching both method and path.
    pub fn find<'a>(&self, method: &Method, path: &'a str) -> Option<(&RouteRule, PathMatch<'a>)> {
        self.rules.iter().find_map(|rule| {
            if rule.method != *method {
                return None;
            }
            rule.pattern.matches(path).map(|m| (rule, m))
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    groups: Vec<RouteGroup>,
}

impl RouteTable {
    pub fn new(groups: Vec<RouteGroup>) -> Self {
        Self { groups }
    }

    /// Group owning the path, if any.
    pub fn group_for(&self, path: &str) -> Option<&RouteGroup> {
        let first = split(path).next()?;
        self.groups.iter().find(|group| group.name == first)
    }

    /// The admin backend's route table.
    pub fn default_table() -> Self {
        use Role::{Admin, SuperAdmin, User};

        let staff = [Admin, SuperAdmin];

        Self::new(vec![
            RouteGroup::new(
                "city",
                vec![
                    RouteRule::public(Method::GET, "/city"),
                    RouteRule::public(Method::GET, "/city/{id}"),
                    RouteRule::protected(Method::POST, "/city", &staff),
                    RouteRule::protected(Method::PUT, "/city/{id}", &staff),
                    RouteRule::protected(Method::DELETE, "/city/{id}", &staff),
                ],
            ),
            RouteGroup::new(
                "user",
                vec![
                    RouteRule::anonymous_only(Method::POST, "/user", Rejection::Forbidden),
                    RouteRule::protected(Method::GET, "/user", &staff),
                    RouteRule::protected(Method::GET, "/user/{id}", &[User]).self_only(),
                    RouteRule::protected(Method::PUT, "/user/{id}", &[User]).self_only(),
                    RouteRule::protected(Method::DELETE, "/user/{id}", &[User]).self_only(),
                ],
            ),
            RouteGroup::new(
                "admin",
                vec![
                    RouteRule::protected(Method::GET, "/admin", &[SuperAdmin]),
                    RouteRule::protected(Method::POST, "/admin", &[SuperAdmin]),
                    RouteRule::protected(Method::GET, "/admin/{id}", &[Admin]).self_only(),
                    RouteRule::protected(Method::PUT, "/admin/{id}", &[Admin]).self_only(),
                    RouteRule::protected(Method::DELETE, "/admin/{id}", &[SuperAdmin]),
                ],
            ),
            RouteGroup::new(
                "super-admin",
                vec![
                    RouteRule::protected(Method::GET, "/super-admin/{id}", &[SuperAdmin])
                        .self_only(),
                    RouteRule::protected(Method::PUT, "/super-admin/transfer/{id}", &[SuperAdmin])
                        .others_only(),
                ],
            ),
            RouteGroup::new(
                "auth",
                vec![
                    RouteRule::anonymous_only(Method::POST, "/auth/pre-login", Rejection::BadRequest),
                    RouteRule::anonymous_only(Method::POST, "/auth/login", Rejection::BadRequest),
                    RouteRule::public(Method::POST, "/auth/logout"),
                ],
            ),
        ])
    }
}
