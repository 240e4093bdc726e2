//! Git command construction and read-only repository probes.
//!
//! Every git invocation made by the update engine goes through the builders in
//! this module. They use `git -C <dir>` so that commands stay independent of
//! the process working directory, and they return [`CommandSpec`]s so the same
//! argv appears in logs, step results and test assertions.
//!
//! Probes ([`read_git_info`], [`read_head_sha`]) never fail: a missing branch,
//! tag or sha is simply `None`.

use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::channel::UpdateChannel;
use crate::process::{CommandRunner, CommandSpec};

/// Paths excluded from the clean check. Build output of the control UI is
/// regenerated by every update and must not make the tree look dirty.
const CLEAN_CHECK_EXCLUDES: &[&str] = &[":!dist/control-ui/"];

fn git_in(dir: &Path) -> CommandSpec {
    CommandSpec::new("git").args(["-C".to_string(), dir.display().to_string()])
}

/// `git status --porcelain` limited to tracked and untracked changes that matter.
pub fn status_porcelain(dir: &Path) -> CommandSpec {
    git_in(dir).args(["status", "--porcelain", "--"]).args(CLEAN_CHECK_EXCLUDES.iter().copied())
}

/// Resolve the upstream of the current branch.
pub fn upstream(dir: &Path) -> CommandSpec {
    git_in(dir).args(["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{upstream}"])
}

/// Fetch all remotes, pruning deleted refs and pulling tags.
pub fn fetch(dir: &Path) -> CommandSpec {
    git_in(dir).args(["fetch", "--all", "--prune", "--tags"])
}

/// Rebase the current branch onto its upstream.
pub fn rebase_upstream(dir: &Path) -> CommandSpec {
    git_in(dir).args(["rebase", "@{upstream}"])
}

/// Clone `url` into `target`.
pub fn clone(url: &str, target: &Path) -> CommandSpec {
    CommandSpec::new("git").args(["clone".to_string(), url.to_string(), target.display().to_string()])
}

/// Check out `tag` as a detached HEAD.
pub fn checkout_detached(dir: &Path, tag: &str) -> CommandSpec {
    git_in(dir).args(["checkout", "--detach", tag])
}

/// List release tags (`v*`).
pub fn list_release_tags(dir: &Path) -> CommandSpec {
    git_in(dir).args(["tag", "--list", "v*"])
}

/// Full sha of HEAD.
pub fn rev_parse_head(dir: &Path) -> CommandSpec {
    git_in(dir).args(["rev-parse", "HEAD"])
}

/// Current branch name (`HEAD` when detached).
pub fn current_branch(dir: &Path) -> CommandSpec {
    git_in(dir).args(["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Tag pointing exactly at HEAD, if any.
pub fn exact_tag(dir: &Path) -> CommandSpec {
    git_in(dir).args(["describe", "--tags", "--exact-match"])
}

/// True when `dir` contains a `.git` entry (directory or worktree file).
pub fn is_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Branch, tag and sha of a checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitInfo {
    /// Current branch; `None` when detached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Tag at HEAD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Full HEAD sha
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

impl GitInfo {
    /// Human summary: `main · v1.2.3 · @0123abcd`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        parts.push(self.branch.clone().unwrap_or_else(|| "detached".to_string()));
        if let Some(tag) = &self.tag {
            parts.push(tag.clone());
        }
        if let Some(sha) = &self.sha {
            parts.push(format!("@{}", short_sha(sha)));
        }
        parts.join(" · ")
    }
}

/// First eight characters of a sha.
pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(8) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

async fn probe<R: CommandRunner>(runner: &R, spec: CommandSpec) -> Option<String> {
    match runner.run(&spec).await {
        Ok(output) => output.stdout_trimmed().map(str::to_string),
        Err(e) => {
            tracing::debug!(target: "git", "Probe failed ({}): {}", spec, e);
            None
        }
    }
}

/// Read the HEAD sha of `dir`.
pub async fn read_head_sha<R: CommandRunner>(
    runner: &R,
    dir: &Path,
    timeout: Duration,
) -> Option<String> {
    probe(runner, rev_parse_head(dir).with_timeout(Some(timeout))).await
}

/// Collect branch, exact tag and sha for `dir`.
pub async fn read_git_info<R: CommandRunner>(
    runner: &R,
    dir: &Path,
    timeout: Duration,
) -> GitInfo {
    let branch = probe(runner, current_branch(dir).with_timeout(Some(timeout)))
        .await
        .filter(|b| b != "HEAD");
    let tag = probe(runner, exact_tag(dir).with_timeout(Some(timeout))).await;
    let sha = read_head_sha(runner, dir, timeout).await;

    GitInfo {
        branch,
        tag,
        sha,
    }
}

/// Pick the newest release tag for `channel` from `git tag --list v*` output.
///
/// Stable considers only `vX.Y.Z`; beta additionally accepts `vX.Y.Z-beta.N`.
/// Ordering uses full semver precedence so `v1.2.0` sorts above `v1.2.0-beta.3`.
pub fn latest_release_tag(tag_list: &str, channel: UpdateChannel) -> Option<String> {
    tag_list
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let version = semver::Version::parse(line.strip_prefix('v')?).ok()?;
            if !version.build.is_empty() {
                return None;
            }
            let accepted = version.pre.is_empty()
                || (channel == UpdateChannel::Beta && version.pre.as_str().starts_with("beta."));
            accepted.then(|| (version, line.to_string()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, tag)| tag)
}
