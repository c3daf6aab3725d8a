//! Spinner for long-running operations.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::context::UiContext;
use super::render::badge;
use super::theme::Badge;

const UNICODE_FRAMES: &[&str] = &[
    "\u{280B}", "\u{2819}", "\u{2839}", "\u{2838}", "\u{283C}", "\u{2834}", "\u{2826}",
    "\u{2827}", "\u{2807}", "\u{280F}", " ",
];
const ASCII_FRAMES: &[&str] = &["|", "/", "-", "\\", " "];

/// A spinner for indeterminate progress. Animates only on an interactive
/// pretty terminal; otherwise prints the message once.
pub struct Spinner {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl Spinner {
    pub fn start(ctx: &UiContext, message: &str, quiet: bool) -> Self {
        if quiet || ctx.mode.is_json() {
            return Self { bar: None, quiet: true };
        }
        if !ctx.allows_animation() {
            println!("{}...", message);
            return Self { bar: None, quiet };
        }

        let frames = if ctx.unicode { UNICODE_FRAMES } else { ASCII_FRAMES };
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}...")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(frames),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self {
            bar: Some(bar),
            quiet,
        }
    }

    /// Stop the spinner and print a badge line.
    pub fn finish(self, ctx: &UiContext, kind: Badge, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        if !self.quiet {
            println!("{}", badge(ctx, kind, message));
        }
    }

    /// Stop the spinner without printing anything.
    pub fn clear(self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
