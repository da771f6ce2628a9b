// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translation of raw verb requests into validated plans.

use thiserror::Error;
use wbab_core::{Plan, SourceSpec, UnsupportedVerb, Verb};

/// Planner rejection; a caller error, never retried.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    UnsupportedVerb(#[from] UnsupportedVerb),
}

/// Stateless translator from `(verb, args, source)` to a [`Plan`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Validate the verb and assemble the deterministic step list.
    ///
    /// A git URL turns the source into `kind=git`; the ref defaults to
    /// empty (clone HEAD).
    pub fn plan(
        &self,
        op_id: &str,
        verb: &str,
        args: Vec<String>,
        git_url: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<Plan, PlanError> {
        let verb: Verb = verb.parse()?;
        let source = match git_url {
            Some(url) => SourceSpec::Git {
                url: url.to_string(),
                git_ref: git_ref.unwrap_or_default().to_string(),
            },
            None => SourceSpec::Local,
        };
        Ok(Plan::new(op_id, verb, args, source))
    }
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
