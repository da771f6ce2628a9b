// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn plan_steps_are_deterministic() {
    let plan = Plan::new("op-1", Verb::Build, vec!["./proj".into()], SourceSpec::Local);
    assert_eq!(
        plan.steps,
        vec!["validate_inputs", "execute_build", "record_result"]
    );

    let again = Plan::new("op-2", Verb::Build, vec![], SourceSpec::Local);
    assert_eq!(plan.steps, again.steps);
}

#[test]
fn local_source_serializes_with_kind_tag() {
    let json = serde_json::to_value(SourceSpec::Local).unwrap();
    assert_eq!(json, serde_json::json!({"kind": "local"}));
}

#[test]
fn git_source_serializes_url_and_ref() {
    let source = SourceSpec::Git {
        url: "https://host/repo".into(),
        git_ref: "main".into(),
    };
    let json = serde_json::to_value(&source).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"kind": "git", "url": "https://host/repo", "ref": "main"})
    );

    let parsed: SourceSpec = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, source);
}

#[test]
fn git_ref_defaults_to_empty_on_deserialize() {
    let parsed: SourceSpec =
        serde_json::from_str(r#"{"kind": "git", "url": "https://host/repo"}"#).unwrap();
    assert_eq!(
        parsed,
        SourceSpec::Git {
            url: "https://host/repo".into(),
            git_ref: String::new(),
        }
    );
}

#[test]
fn is_git_discriminates() {
    assert!(!SourceSpec::Local.is_git());
    assert!(SourceSpec::Git {
        url: "u".into(),
        git_ref: String::new()
    }
    .is_git());
}

#[test]
fn plan_round_trips_through_json() {
    let plan = Plan::new(
        "op-9",
        Verb::Smoke,
        vec!["./proj".into(), "installer.exe".into()],
        SourceSpec::Local,
    );
    let json = serde_json::to_string(&plan).unwrap();
    let parsed: Plan = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, plan);
}
