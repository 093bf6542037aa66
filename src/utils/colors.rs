// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Terminal color utilities
//!
//! Consistent markers for step and validation output.

use colored::Colorize;

use crate::pipeline::StepOutcome;

/// Check if colors should be disabled
pub fn should_use_colors() -> bool {
    // Respect NO_COLOR environment variable
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    std::env::var_os("TERM").is_some_and(|t| t != "dumb")
}

/// Print a styled section
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

/// One line per step outcome, marker first
pub fn format_outcome(outcome: &StepOutcome) -> String {
    let millis = format!("{}ms", outcome.duration.as_millis());

    if outcome.skipped {
        format!(
            "{} {} {}",
            "○".dimmed(),
            outcome.name.dimmed(),
            format!("(skipped: {})", outcome.error.as_deref().unwrap_or("")).dimmed()
        )
    } else if !outcome.success {
        format!(
            "{} {} {} {}",
            "✗".red(),
            outcome.name,
            millis.dimmed(),
            outcome.error.as_deref().unwrap_or("").red()
        )
    } else if outcome.cache_hit {
        format!("{} {} {}", "✓".green(), outcome.name, "(cached)".cyan())
    } else {
        format!("{} {} {}", "✓".green(), outcome.name, millis.dimmed())
    }
}
