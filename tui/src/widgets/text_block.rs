//! TextBlock Widget
//!
//! A borderless, scrollable region of pre-wrapped styled lines, anchored
//! to the bottom so the newest text stays visible.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::StatefulWidget;

use crate::theme::{FADE_FAR, FADE_NEAR};

/// One wrapped line and its style
pub type StyledLine = (String, Style);

/// State for a scrollable text block
#[derive(Debug, Default)]
pub struct TextBlockState {
    /// Scroll offset (lines from bottom, 0 = latest)
    pub scroll_offset: usize,
    /// Total content lines at last render
    pub total_lines: usize,
}

impl TextBlockState {
    /// Scroll towards older lines
    pub fn scroll_up(&mut self, lines: usize) {
        let max = self.total_lines.saturating_sub(1);
        self.scroll_offset = (self.scroll_offset + lines).min(max);
    }

    /// Scroll towards newer lines
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Jump to the newest line
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }
}

/// A borderless, scrollable text block
pub struct TextBlock<'a> {
    lines: &'a [StyledLine],
}

impl<'a> TextBlock<'a> {
    /// Render these lines
    #[must_use]
    pub fn new(lines: &'a [StyledLine]) -> Self {
        Self { lines }
    }
}

impl StatefulWidget for TextBlock<'_> {
    type State = TextBlockState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let height = area.height as usize;
        if height == 0 || area.width == 0 {
            return;
        }

        state.total_lines = self.lines.len();

        // Clamp scroll
        let max_scroll = state.total_lines.saturating_sub(height);
        state.scroll_offset = state.scroll_offset.min(max_scroll);

        let visible_end = state.total_lines.saturating_sub(state.scroll_offset);
        let visible_start = visible_end.saturating_sub(height);
        let has_content_above = visible_start > 0;
        let has_content_below = state.scroll_offset > 0;
        let shown = visible_end - visible_start;

        for (i, (line, style)) in self.lines[visible_start..visible_end].iter().enumerate() {
            // Fade the edges when more text is hidden beyond them
            let style = if has_content_above && i < 2 {
                Style::default().fg(if i == 0 { FADE_FAR } else { FADE_NEAR })
            } else if has_content_below && i + 2 >= shown {
                Style::default().fg(if i + 1 == shown { FADE_FAR } else { FADE_NEAR })
            } else {
                *style
            };

            let y = area.y + u16::try_from(i).unwrap_or(u16::MAX);
            let text: String = line.chars().take(area.width as usize).collect();
            buf.set_string(area.x, y, &text, style);
        }
    }
}
