// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache hits, output validation, and git-source cache exclusion.

use super::*;
use std::process::Command as StdCommand;
use wbab_core::OutcomeStatus;

#[tokio::test]
async fn identical_resubmission_serves_from_cache() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "echo ran-once; exit 0");

    let first = h.executor.run(plan("A", Verb::Doctor, &[]), &h.ctx).await.unwrap();
    let second = h.executor.run(plan("A", Verb::Doctor, &[]), &h.ctx).await.unwrap();

    assert_eq!(first.status, OutcomeStatus::Succeeded);
    assert_eq!(second.status, OutcomeStatus::Cached);
    // Bit-equal replay of the stored result.
    assert_eq!(
        serde_json::to_string(&second.result).unwrap(),
        serde_json::to_string(&first.result).unwrap()
    );
    assert!(h.event_types().contains(&"operation.cached".to_string()));

    // Cached replay did not bump the attempt counter.
    assert_eq!(h.store.get("A").unwrap().unwrap().attempts, 1);
}

#[tokio::test]
async fn missing_outputs_invalidate_the_cache_and_rerun() {
    let h = Harness::new();
    h.install_tool("tools/winbuild-build.sh", "mkdir -p \"$1/out\"; exit 0");
    let proj = h.project("proj");

    let first = h.executor.run(plan("B", Verb::Build, &[&proj]), &h.ctx).await.unwrap();
    assert_eq!(first.status, OutcomeStatus::Succeeded);
    assert!(h.project_path("proj").join("out").exists());

    // Delete the build output out-of-band; the success record is no longer
    // a cache hit.
    std::fs::remove_dir_all(h.project_path("proj").join("out")).unwrap();

    let second = h.executor.run(plan("B", Verb::Build, &[&proj]), &h.ctx).await.unwrap();

    assert_eq!(second.status, OutcomeStatus::Succeeded);
    assert!(h.event_types().contains(&"operation.cache_invalidated".to_string()));
    assert!(h.project_path("proj").join("out").exists());

    let record = h.store.get("B").unwrap().unwrap();
    assert_eq!(record.attempts, 2);
    assert_eq!(record.retry_count, 1);
}

#[tokio::test]
async fn package_cache_requires_dist_to_exist() {
    let h = Harness::new();
    h.install_tool("tools/package-nsis.sh", "mkdir -p \"$1/dist\"; exit 0");
    let proj = h.project("proj");

    h.executor.run(plan("P", Verb::Package, &[&proj]), &h.ctx).await.unwrap();
    let cached = h.executor.run(plan("P", Verb::Package, &[&proj]), &h.ctx).await.unwrap();
    assert_eq!(cached.status, OutcomeStatus::Cached);

    std::fs::remove_dir_all(h.project_path("proj").join("dist")).unwrap();
    let rerun = h.executor.run(plan("P", Verb::Package, &[&proj]), &h.ctx).await.unwrap();
    assert_eq!(rerun.status, OutcomeStatus::Succeeded);
}

fn seed_repo(root: &std::path::Path) -> std::path::PathBuf {
    let repo = root.join("origin");
    std::fs::create_dir_all(&repo).unwrap();
    let git = |args: &[&str]| {
        let status = StdCommand::new("git").current_dir(&repo).args(args).status().unwrap();
        assert!(status.success());
    };
    git(&["init", "--quiet", "--initial-branch=main"]);
    std::fs::create_dir_all(repo.join(".config")).unwrap();
    std::fs::write(repo.join(".config/settings.ini"), "[core]\n").unwrap();
    std::fs::write(repo.join("a.txt"), "hello\n").unwrap();
    git(&["add", "."]);
    git(&[
        "-c",
        "user.email=t@example.com",
        "-c",
        "user.name=t",
        "commit",
        "--quiet",
        "-m",
        "init",
    ]);
    repo
}

#[tokio::test]
async fn git_sources_are_provisioned_and_never_cached() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "exit 0");
    let repo = seed_repo(h.root.path());

    let git_plan = |op_id: &str| {
        Plan::new(
            op_id,
            Verb::Doctor,
            vec![".".to_string()],
            SourceSpec::Git { url: repo.display().to_string(), git_ref: "main".to_string() },
        )
    };

    let first = h.executor.run(git_plan("G"), &h.ctx).await.unwrap();
    assert_eq!(first.status, OutcomeStatus::Succeeded);

    let second = h.executor.run(git_plan("G"), &h.ctx).await.unwrap();
    assert_eq!(second.status, OutcomeStatus::Succeeded, "git sources never serve cached");

    let types = h.event_types();
    assert!(types.contains(&"source.fetch".to_string()));
    assert!(types.contains(&"source.artifacts".to_string()));
    assert!(!types.contains(&"operation.cached".to_string()));

    // The transient checkout is gone once the run finishes.
    let leftovers: Vec<_> = std::fs::read_dir(h.config.sandbox_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("git-source-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn leading_dot_subdirectories_survive_path_rebasing() {
    let h = Harness::new();
    h.install_tool("tools/wbab", "exit 0");
    let repo = seed_repo(h.root.path());

    let plan = Plan::new(
        "G2",
        Verb::Doctor,
        // Leading slash is stripped, the dot is not: `.config` inside the
        // checkout.
        vec!["/.config".to_string()],
        SourceSpec::Git { url: repo.display().to_string(), git_ref: String::new() },
    );

    let outcome = h.executor.run(plan, &h.ctx).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    let record = h.store.get("G2").unwrap().unwrap();
    assert!(record.args[0].ends_with("/.config"), "args[0] = {}", record.args[0]);
}
