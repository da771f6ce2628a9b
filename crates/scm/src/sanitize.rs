// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential redaction for URLs that reach logs or callers.

/// Mask substituted for the userinfo portion of a URL authority.
const MASK: &str = "***:***";

/// Redact credentials from a URL before it is logged or surfaced.
///
/// Any URL whose authority carries a username or password is rewritten with
/// both replaced by `***:***`; host and port pass through. Plain URLs and
/// the scp-like `user@host:path` form (no scheme separator) are returned
/// unchanged. Idempotent: sanitizing twice yields the same string.
pub fn sanitize_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let Some(at) = authority.rfind('@') else {
        return url.to_string();
    };
    let host_port = &authority[at + 1..];
    format!("{scheme}://{MASK}@{host_port}{tail}")
}

/// Host name of a URL's authority, for allow-list checks.
///
/// Only scheme URLs yield a host; the scp-like form yields `None`, matching
/// how the allow-list treats it (unlisted).
pub fn host_of(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let host_port = match authority.rfind('@') {
        Some(at) => &authority[at + 1..],
        None => authority,
    };
    let host = match host_port.rfind(':') {
        Some(colon) if host_port[colon + 1..].chars().all(|c| c.is_ascii_digit()) => {
            &host_port[..colon]
        }
        _ => host_port,
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
