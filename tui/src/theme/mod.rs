//! Theme and Colors
//!
//! A dark palette tuned for 256-color and truecolor terminals.

use ratatui::style::{Color, Modifier, Style};

use localchat_core::NotifyLevel;

// ============================================================================
// Conversation Colors
// ============================================================================

/// User messages
pub const USER_GREEN: Color = Color::Rgb(130, 220, 130);

/// Assistant messages
pub const ASSISTANT_MAGENTA: Color = Color::Magenta;

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Warning amber
pub const WARNING_AMBER: Color = Color::Rgb(255, 200, 90);

/// Informational blue
pub const INFO_BLUE: Color = Color::Rgb(150, 180, 255);

// ============================================================================
// Code Blocks
// ============================================================================

/// Code block text
pub const CODE_FG: Color = Color::Rgb(220, 220, 170);

/// Code block background
pub const CODE_BG: Color = Color::Rgb(40, 40, 48);

/// Code block language tag
pub const CODE_LANG: Color = Color::Rgb(120, 160, 200);

// ============================================================================
// Chrome
// ============================================================================

/// Scroll fade, outermost line
pub const FADE_FAR: Color = Color::Rgb(80, 80, 80);

/// Scroll fade, second line
pub const FADE_NEAR: Color = Color::Rgb(120, 120, 120);

/// Highlighted entry in the sidebar
pub const SELECTED: Color = Color::Rgb(255, 223, 128);

/// Style for code block lines
#[must_use]
pub fn code_style() -> Style {
    Style::default().fg(CODE_FG).bg(CODE_BG)
}

/// Style for a notice of the given level
#[must_use]
pub fn notify_style(level: NotifyLevel) -> Style {
    match level {
        NotifyLevel::Info => Style::default().fg(INFO_BLUE),
        NotifyLevel::Warning => Style::default().fg(WARNING_AMBER),
        NotifyLevel::Error => Style::default().fg(ERROR_RED).add_modifier(Modifier::BOLD),
    }
}
