//! Terminal rendering for the pawnshop CLI
//!
//! Every printer formats through a pure `*_line` function so the layout can
//! be checked without a terminal.

use colored::*;
use pawnshop_core::SessionView;

const RULE_WIDTH: usize = 72;

/// Leading glyph of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Done,
    Failed,
    Note,
    Session,
}

impl Marker {
    fn glyph(self) -> ColoredString {
        match self {
            Self::Done => "✓".bright_green(),
            Self::Failed => "✗".bright_red(),
            Self::Note => "·".bright_blue(),
            Self::Session => "●".bright_magenta(),
        }
    }
}

pub fn status_line(marker: Marker, message: &str) -> String {
    let message = match marker {
        Marker::Failed => message.bright_red().to_string(),
        _ => message.to_string(),
    };
    format!("  {} {}", marker.glyph(), message)
}

/// Phase banner: a rule with the title set into it
pub fn banner_line(title: &str) -> String {
    let lead = "── ";
    let used = lead.chars().count() + title.chars().count() + 1;
    let tail = "─".repeat(RULE_WIDTH.saturating_sub(used).max(3));
    format!(
        "{}{} {}",
        lead.bright_black(),
        title.bright_white().bold(),
        tail.bright_black()
    )
}

pub fn field_line(key: &str, value: &str) -> String {
    format!("      {:<18} {}", key, value.bright_cyan())
}

/// One line for a role session, with the actions the user may take next
pub fn session_line(view: &SessionView) -> String {
    let actions = if view.actions.is_empty() {
        "none".to_string()
    } else {
        view.actions.join(" | ")
    };
    format!(
        "{} {:<20} next: {}",
        status_line(Marker::Session, &format!("{:<8}", view.role.to_string())),
        view.state.bright_cyan(),
        actions
    )
}

pub fn section(title: &str) {
    println!();
    println!("{}", banner_line(title));
}

pub fn success(message: &str) {
    println!("{}", status_line(Marker::Done, message));
}

/// Errors go to stderr
pub fn error(message: &str) {
    eprintln!("{}", status_line(Marker::Failed, message));
}

pub fn info(message: &str) {
    println!("{}", status_line(Marker::Note, message));
}

pub fn kv(key: &str, value: &str) {
    println!("{}", field_line(key, value));
}

/// Print a role's current state, payload and available actions
pub fn view(view: &SessionView) {
    println!("{}", session_line(view));
    if !view.payload.is_null() {
        println!("      {}", view.payload.to_string().bright_black());
    }
    if let Some(fault) = &view.fault {
        error(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawnshop_core::{Creator, LocalNetwork, MarketConfig};
    use std::sync::Arc;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_status_and_field_lines() {
        plain();
        assert_eq!(status_line(Marker::Done, "bought"), "  ✓ bought");
        assert_eq!(status_line(Marker::Failed, "rejected"), "  ✗ rejected");
        assert_eq!(field_line("buyer", "10 ALGO"), format!("      {:<18} 10 ALGO", "buyer"));
    }

    #[test]
    fn test_banner_fills_rule() {
        plain();
        let line = banner_line("Buyer redeems");
        assert!(line.starts_with("── Buyer redeems ─"));
        assert_eq!(line.chars().count(), RULE_WIDTH);

        let long = "x".repeat(RULE_WIDTH);
        assert!(banner_line(&long).ends_with(" ───"));
    }

    #[test]
    fn test_session_line_lists_next_actions() {
        plain();
        let config = MarketConfig::default();
        let creator = Creator::new(
            Arc::new(LocalNetwork::new(&config).wallet("creator")),
            &config,
        );
        let line = session_line(&creator.view());
        assert!(line.contains("SetInfo"));
        assert!(line.ends_with("next: set_info"));
    }
}
