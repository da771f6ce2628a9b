// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command synthesis: maps (verb, project dir) to the exact child argv.

use crate::config::EngineConfig;
use thiserror::Error;
use wbab_core::Verb;

const BUILD_IMAGE: &str = "wbab/buildtools";
const PACKAGER_IMAGE: &str = "wbab/packager";
const SIGNER_IMAGE: &str = "wbab/signer";

/// Synthesis rejection, duplicated from `validate_inputs` on purpose.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("smoke requires installer path argument")]
    MissingInstaller,
}

/// Pure mapping from `(verb, args)` to the child-process command line.
///
/// Mock mode returns direct invocations of the local tool scripts;
/// production mode returns a container-runner line mounting the project
/// directory (`args[0]`) into the image for the verb. `doctor` and `smoke`
/// stay local in both modes.
pub fn synthesize(
    verb: Verb,
    args: &[String],
    config: &EngineConfig,
) -> Result<Vec<String>, CommandError> {
    if verb == Verb::Smoke && args.is_empty() {
        return Err(CommandError::MissingInstaller);
    }

    let argv = match verb {
        Verb::Doctor => vec![tool(config, "tools/wbab"), "doctor".to_string()],
        Verb::Smoke => prepend(tool(config, "tools/winebot-smoke.sh"), args),
        Verb::Lint if config.mock_exec => prepend(tool(config, "tools/winbuild-lint.sh"), args),
        Verb::Test if config.mock_exec => prepend(tool(config, "tools/winbuild-test.sh"), args),
        Verb::Build if config.mock_exec => prepend(tool(config, "tools/winbuild-build.sh"), args),
        Verb::Package if config.mock_exec => prepend(tool(config, "tools/package-nsis.sh"), args),
        Verb::Sign if config.mock_exec => prepend(tool(config, "tools/sign-dev.sh"), args),
        Verb::Lint | Verb::Test | Verb::Build => container(BUILD_IMAGE, verb, args, config),
        Verb::Package => container(PACKAGER_IMAGE, verb, args, config),
        Verb::Sign => container(SIGNER_IMAGE, verb, args, config),
    };
    Ok(argv)
}

fn tool(config: &EngineConfig, rel: &str) -> String {
    config.tool_path(rel).display().to_string()
}

fn prepend(tool: String, args: &[String]) -> Vec<String> {
    let mut argv = vec![tool];
    argv.extend(args.iter().cloned());
    argv
}

/// Container-runner line: mount the project directory, run the verb inside.
fn container(image: &str, verb: Verb, args: &[String], config: &EngineConfig) -> Vec<String> {
    let project_dir = args.first().cloned().unwrap_or_else(|| ".".to_string());
    let mut argv = vec![
        "docker".to_string(),
        "run".to_string(),
        "--rm".to_string(),
        "-v".to_string(),
        format!("{project_dir}:/workspace"),
        "-w".to_string(),
        "/workspace".to_string(),
        format!("{image}:{tag}", tag = config.image_tag),
        verb.as_str().to_string(),
    ];
    argv.extend(args.iter().skip(1).cloned());
    argv
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
