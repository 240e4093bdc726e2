//! Human and JSON rendering of update results.
//!
//! Renderers build strings instead of printing so the command decides where
//! output goes (stdout for results, stderr for progress).

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::constants::FAILED_STEP_STDERR_LINES;
use crate::git::short_sha;
use crate::update::plugins::{PluginUpdateStatus, format_plugin_list};
use crate::update::restart::RESTART_HINT;
use crate::update::types::{
    REASON_DIRTY, REASON_NO_RELEASE_TAG, REASON_NO_UPSTREAM, REASON_NOT_GIT_INSTALL,
};
use crate::update::{
    StatusReport, UpdateAvailability, UpdateMode, UpdateReport, UpdateRunResult, UpdateStatus,
    UpdateStepResult, VersionSnapshot,
};
use crate::utils::format_duration_ms;

/// Pretty-printed JSON.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize result")
}

fn describe_snapshot(snapshot: &VersionSnapshot) -> String {
    let version = snapshot.version.as_deref().unwrap_or("unknown");
    match &snapshot.sha {
        Some(sha) => format!("{version} ({})", short_sha(sha)),
        None => version.to_string(),
    }
}

/// What the user can do about a skip.
pub fn skip_hint(reason: &str) -> Option<&'static str> {
    match reason {
        REASON_DIRTY => Some("Commit or stash your local changes, then run the update again."),
        REASON_NO_UPSTREAM => {
            Some("The current branch has no upstream; run `git branch --set-upstream-to`.")
        }
        REASON_NO_RELEASE_TAG => {
            Some("No release tag matches this channel; try `--channel dev` or fetch tags.")
        }
        REASON_NOT_GIT_INSTALL => Some(
            "No OpenClaw installation found here; reinstall it with your package manager or switch to a checkout with --channel dev.",
        ),
        _ => None,
    }
}

/// How to apply an update that was not followed by a restart.
pub fn manual_restart_hint(mode: UpdateMode) -> String {
    match mode {
        UpdateMode::Npm | UpdateMode::Pnpm | UpdateMode::Bun => format!(
            "Tip: run `openclaw doctor`, then `{RESTART_HINT}` to apply the update to the running gateway."
        ),
        UpdateMode::Git | UpdateMode::Other => {
            format!("Tip: run `{RESTART_HINT}` to apply the update to the running gateway.")
        }
    }
}

fn render_step(out: &mut Vec<String>, step: &UpdateStepResult) {
    let marker = match step.exit_code {
        Some(0) => "✓".green(),
        Some(_) => "✗".red(),
        None => "?".yellow(),
    };
    out.push(format!(
        "  {} {} {}",
        marker,
        step.name,
        format!("({})", format_duration_ms(step.duration_ms)).dimmed()
    ));
    if !step.succeeded()
        && let Some(stderr) = &step.stderr_tail
    {
        for line in stderr.lines().filter(|l| !l.trim().is_empty()).take(FAILED_STEP_STDERR_LINES)
        {
            out.push(format!("      {}", line.dimmed()));
        }
    }
}

fn render_result(out: &mut Vec<String>, result: &UpdateRunResult) {
    let status = match result.status {
        UpdateStatus::Ok => "OK".green().bold(),
        UpdateStatus::Skipped => "SKIPPED".yellow().bold(),
        UpdateStatus::Error => "ERROR".red().bold(),
    };
    out.push(format!("Update Result: {status}"));
    out.push(format!("  Root: {}", result.root.display()));
    if let Some(reason) = &result.reason {
        out.push(format!("  Reason: {reason}"));
    }
    if result.before.version.is_some() || result.before.sha.is_some() {
        out.push(format!("  Before: {}", describe_snapshot(&result.before)));
    }
    if result.after.version.is_some() || result.after.sha.is_some() {
        out.push(format!("  After: {}", describe_snapshot(&result.after)));
    }

    if !result.steps.is_empty() {
        out.push(String::new());
        out.push("Steps:".bold().to_string());
        for step in &result.steps {
            render_step(out, step);
        }
    }
    out.push(String::new());
    out.push(format!("Total time: {}", format_duration_ms(result.duration_ms)));

    if result.status == UpdateStatus::Skipped
        && let Some(hint) = result.reason.as_deref().and_then(skip_hint)
    {
        out.push(hint.yellow().to_string());
    }
}

/// Full human report of a finished run.
pub fn render_update(report: &UpdateReport) -> String {
    let mut out = Vec::new();
    render_result(&mut out, &report.result);

    out.push(format!(
        "Channel: {} ({}){}",
        report.channel.channel,
        report.channel.source.label(),
        if report.channel_persisted { ", saved to config" } else { "" }
    ));
    if let Some(target) = &report.target {
        out.push(format!("Target: {}", target.label()));
    }

    for note in &report.notes {
        out.push(format!("Note: {note}"));
    }

    if let Some(plugins) = &report.plugins {
        if !plugins.sync.switched_to_bundled.is_empty() {
            out.push(format!(
                "Plugins switched to bundled: {}",
                format_plugin_list(&plugins.sync.switched_to_bundled)
            ));
        }
        if !plugins.sync.switched_to_npm.is_empty() {
            out.push(format!(
                "Plugins switched to npm: {}",
                format_plugin_list(&plugins.sync.switched_to_npm)
            ));
        }
        if !plugins.outcomes.is_empty() {
            let c = plugins.counts;
            out.push(format!(
                "Plugin updates: {} updated, {} unchanged, {} failed, {} skipped",
                c.updated, c.unchanged, c.failed, c.skipped
            ));
        }
        for outcome in &plugins.outcomes {
            if outcome.status == PluginUpdateStatus::Failed {
                out.push(format!(
                    "{} {}: {}",
                    "error:".red(),
                    outcome.id,
                    outcome.message.as_deref().unwrap_or("update failed")
                ));
            }
        }
        for warning in plugins
            .sync
            .warnings
            .iter()
            .chain(&plugins.sync.errors)
            .chain(&plugins.warnings)
        {
            out.push(format!("{} {}", "warning:".yellow(), warning));
        }
    }

    match &report.restart {
        Some(restart) => {
            if restart.restarted {
                out.push("Gateway restarted".to_string());
            }
            for warning in &restart.warnings {
                out.push(format!("{} {}", "warning:".yellow(), warning));
            }
        }
        None if report.result.status == UpdateStatus::Ok => {
            out.push(manual_restart_hint(report.result.mode).dimmed().to_string());
        }
        None => {}
    }

    out.join("\n")
}

/// Human report of a run the user interrupted.
pub fn render_interrupted(result: &UpdateRunResult) -> String {
    let mut out = Vec::new();
    render_result(&mut out, result);
    out.push("Update interrupted; the installation may be partially updated.".red().to_string());
    out.join("\n")
}

/// Human `status` output.
pub fn render_status(report: &StatusReport) -> String {
    let update = match &report.update {
        UpdateAvailability::Available { .. } => report.update.to_string().cyan(),
        UpdateAvailability::UpToDate => report.update.to_string().green(),
        UpdateAvailability::Unknown => report.update.to_string().dimmed(),
    };
    let mut out = vec![
        format!("Install: {} ({})", report.install.kind, report.install.root.display()),
        format!("Channel: {}", report.channel_label),
        format!("Version: {}", report.current_version.as_deref().unwrap_or("unknown")),
        format!("Update: {update}"),
    ];
    if let Some(manager) = report.install.package_manager {
        out.insert(1, format!("Package manager: {manager}"));
    }
    out.join("\n")
}
