//! Build identification for jbox-server
//!
//! Exposes `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` to the crate,
//! which `/health` and the startup log report.

use std::env;
use std::process::Command;

/// Packagers without a git checkout can pin the reported revision
const BUILD_ID_OVERRIDE: &str = "JBOX_BUILD_ID";

fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    (!described.is_empty()).then(|| described.to_string())
}

fn main() {
    // No rerun-if directives: the script runs on every build so the stamp stays fresh
    let revision = env::var(BUILD_ID_OVERRIDE)
        .ok()
        .filter(|id| !id.trim().is_empty())
        .or_else(git_describe)
        .unwrap_or_else(|| "unknown".into());
    let built_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".into());

    for (key, value) in [
        ("GIT_HASH", revision),
        ("BUILD_TIMESTAMP", built_at.to_string()),
        ("BUILD_PROFILE", profile),
    ] {
        println!("cargo:rustc-env={}={}", key, value);
    }
}
