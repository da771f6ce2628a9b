// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed set of build/test/package/sign actions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A verb outside the closed set was requested.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported verb: {0}")]
pub struct UnsupportedVerb(pub String);

/// One of the seven recognized actions an operation can perform.
///
/// The set is closed: anything else is rejected at planning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Build,
    Package,
    Sign,
    Smoke,
    Doctor,
    Lint,
    Test,
}

crate::str_enum! {
    Verb {
        Build => "build",
        Package => "package",
        Sign => "sign",
        Smoke => "smoke",
        Doctor => "doctor",
        Lint => "lint",
        Test => "test",
    }
}

impl Verb {
    /// Name of the execution step for this verb, e.g. `execute_build`.
    pub fn exec_step(&self) -> String {
        format!("execute_{}", self.as_str())
    }

    /// Output directories this verb is expected to leave in the project
    /// directory on success. Empty for verbs with no on-disk outputs.
    pub fn output_dirs(&self) -> &'static [&'static str] {
        match self {
            Verb::Build => &["out"],
            Verb::Package | Verb::Sign => &["dist"],
            Verb::Smoke | Verb::Doctor | Verb::Lint | Verb::Test => &[],
        }
    }
}

impl FromStr for Verb {
    type Err = UnsupportedVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(Verb::Build),
            "package" => Ok(Verb::Package),
            "sign" => Ok(Verb::Sign),
            "smoke" => Ok(Verb::Smoke),
            "doctor" => Ok(Verb::Doctor),
            "lint" => Ok(Verb::Lint),
            "test" => Ok(Verb::Test),
            other => Err(UnsupportedVerb(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "verb_tests.rs"]
mod tests;
