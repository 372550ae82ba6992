//! History view: past assessments and the fitted risk trend.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Modifier,
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Row, Table},
    Frame,
};

use crate::domain::{HistoryRecord, TrendDirection, TrendSummary};
use crate::ports::HistoryPage;
use crate::tui::styles::Theme;

pub const HISTORY_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct HistoryState {
    pub page: Option<HistoryPage>,
    pub offset: usize,
    /// Row within the current page
    pub selected: usize,
    pub trend: Option<TrendSummary>,
    pub error: Option<String>,
}

impl HistoryState {
    #[must_use]
    pub fn selected_record(&self) -> Option<&HistoryRecord> {
        self.page.as_ref().and_then(|p| p.items.get(self.selected))
    }

    pub fn select_next(&mut self) {
        let len = self.page.as_ref().map_or(0, |p| p.items.len());
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }
}

pub fn render_history(f: &mut Frame, area: Rect, state: &HistoryState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(area);

    render_history_header(f, chunks[0]);

    if let Some(err) = &state.error {
        render_history_error(f, chunks[1], err);
    } else {
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);
        render_records(f, halves[0], state);
        render_trend(f, halves[1], state.trend.as_ref());
    }

    render_history_footer(f, chunks[2], state);
}

fn render_history_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", Theme::text()),
        Span::styled("History", Theme::title()),
        Span::styled(" │ Your past assessments", Theme::text_secondary()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Theme::border()),
    );

    f.render_widget(header, area);
}

fn render_history_error(f: &mut Frame, area: Rect, message: &str) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("! Cannot Load History", Theme::danger())),
        Line::from(""),
        Line::from(Span::styled(message, Theme::text())),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::danger()),
    );

    f.render_widget(content, area);
}

fn render_records(f: &mut Frame, area: Rect, state: &HistoryState) {
    let title = match &state.page {
        Some(page) if page.total_count > 0 => format!(
            " Records {}-{} of {} ",
            page.offset + 1,
            page.offset + page.items.len(),
            page.total_count
        ),
        _ => " Records ".to_string(),
    };
    let block = Block::default()
        .title(Span::styled(title, Theme::subtitle()))
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let items = state.page.as_ref().map(|p| p.items.as_slice()).unwrap_or(&[]);
    if items.is_empty() {
        let empty = Paragraph::new(Line::from(Span::styled(
            "No assessments stored yet.",
            Theme::text_muted(),
        )))
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = items
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let row = Row::new(vec![
                Span::raw(record.created_at.format("%Y-%m-%d %H:%M").to_string()),
                Span::styled(record.result.to_string(), Theme::risk_class(record.result)),
                Span::raw(format!("{:.1}%", record.risk_probability)),
                Span::raw(if record.advice.is_some() { "yes" } else { "" }),
            ]);
            if i == state.selected {
                row.style(Theme::selected())
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(17),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(["When", "Result", "Risk", "Advice"])
            .style(Theme::text_secondary().add_modifier(Modifier::BOLD)),
    )
    .style(Theme::text())
    .block(block);
    f.render_widget(table, area);
}

fn render_trend(f: &mut Frame, area: Rect, trend: Option<&TrendSummary>) {
    let block = Block::default()
        .title(Span::styled(" Risk Trend ", Theme::subtitle()))
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let Some(trend) = trend else {
        let msg = Paragraph::new(Line::from(Span::styled(
            "At least two assessments are needed for a trend.",
            Theme::text_muted(),
        )))
        .block(block);
        f.render_widget(msg, area);
        return;
    };

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let direction_style = match trend.direction {
        TrendDirection::Increasing => Theme::danger(),
        TrendDirection::Decreasing => Theme::success(),
        TrendDirection::Stable => Theme::info(),
    };
    let summary = Paragraph::new(Line::from(vec![
        Span::styled(trend.direction.to_string(), direction_style),
        Span::styled(
            format!(" {:+.2} pts/day", trend.slope),
            Theme::text_secondary(),
        ),
        Span::styled("  latest ", Theme::text_muted()),
        Span::styled(format!("{:.1}%", trend.latest_risk), Theme::text()),
        Span::styled("  in 30 days ", Theme::text_muted()),
        Span::styled(format!("{:.1}%", trend.projected_risk), Theme::text()),
    ]));
    f.render_widget(summary, chunks[0]);

    let observed: Vec<(f64, f64)> = trend.points.iter().map(|p| (p.day, p.observed)).collect();
    let fitted: Vec<(f64, f64)> = trend.points.iter().map(|p| (p.day, p.fitted)).collect();
    let max_day = trend
        .points
        .iter()
        .map(|p| p.day)
        .fold(1.0_f64, f64::max);

    let datasets = vec![
        Dataset::default()
            .name("observed")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Theme::text())
            .data(&observed),
        Dataset::default()
            .name("fitted")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(direction_style)
            .data(&fitted),
    ];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title(Span::styled("days", Theme::text_muted()))
                .style(Theme::border())
                .bounds([0.0, max_day])
                .labels(vec![
                    Span::raw("0"),
                    Span::raw(format!("{max_day:.0}")),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("risk %", Theme::text_muted()))
                .style(Theme::border())
                .bounds([0.0, 100.0])
                .labels(vec![Span::raw("0"), Span::raw("50"), Span::raw("100")]),
        );
    f.render_widget(chart, chunks[1]);
}

fn render_history_footer(f: &mut Frame, area: Rect, state: &HistoryState) {
    let mut spans = vec![
        Span::styled("[↑↓] ", Theme::key_hint()),
        Span::styled("Select ", Theme::key_desc()),
    ];
    if let Some(page) = &state.page {
        if page.prev_offset().is_some() {
            spans.push(Span::styled("[←] ", Theme::key_hint()));
            spans.push(Span::styled("Newer ", Theme::key_desc()));
        }
        if page.next_offset().is_some() {
            spans.push(Span::styled("[→] ", Theme::key_hint()));
            spans.push(Span::styled("Older ", Theme::key_desc()));
        }
    }
    spans.extend([
        Span::styled("[X] ", Theme::key_hint()),
        Span::styled("Delete ", Theme::key_desc()),
        Span::styled("[R] ", Theme::key_hint()),
        Span::styled("Refresh ", Theme::key_desc()),
        Span::styled("[Esc] ", Theme::key_hint()),
        Span::styled("Back", Theme::key_desc()),
    ]);

    let footer = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Theme::border()),
    );

    f.render_widget(footer, area);
}
