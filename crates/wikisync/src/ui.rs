use colored::Colorize;

use wikisync_core::{StatusIcon, StatusSnapshot, SyncStatus};

fn glyph(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::SetupRequired => "⚙",
        SyncStatus::Syncing => "⟳",
        SyncStatus::FullySynced => "✓",
        SyncStatus::PushPending => "↑",
        SyncStatus::CommitAndPushPending => "●",
    }
}

/// The sync button as plain text: glyph, label and badge
pub fn button_text(snapshot: &StatusSnapshot) -> String {
    let mut text = format!("{} {}", glyph(snapshot.status), snapshot.label());
    if let Some(count) = snapshot.badge() {
        text.push_str(&format!(" [{}]", count));
    }
    if snapshot.status.is_enabled() {
        text.push_str("  (wikisync sync)");
    }
    text
}

/// The sync button for a terminal. The pull-request icon stands out, the
/// plain sync icon is dimmed.
pub fn render_button(snapshot: &StatusSnapshot) -> String {
    let text = button_text(snapshot);
    let text = match snapshot.status {
        SyncStatus::SetupRequired => text.red(),
        SyncStatus::Syncing => text.cyan(),
        SyncStatus::FullySynced => text.green(),
        SyncStatus::PushPending | SyncStatus::CommitAndPushPending => text.yellow(),
    };
    match snapshot.status.icon() {
        StatusIcon::GitSync => text.dimmed().to_string(),
        StatusIcon::GitPullRequest => text.bold().to_string(),
    }
}
