//! UI module: View components for the TUI.

pub mod assessment;
pub mod daily_log;
pub mod dashboard;
pub mod history;
pub mod result;

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::tui::styles::Theme;

pub fn render_disclaimer(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(Span::styled(
            "DISCLAIMER: Indicative estimate only. It does not replace a medical evaluation.",
            Theme::text_muted(),
        )),
        Line::from(Span::styled(
            "The models were trained on self-reported survey data and favour sensitivity over precision.",
            Theme::text_muted(),
        )),
    ];

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Theme::border());

    let p = Paragraph::new(text).block(block).wrap(Wrap { trim: true });

    f.render_widget(p, area);
}
