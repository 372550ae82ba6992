//! Dashboard view: Main overview screen.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::domain::{ModelId, RiskClass};
use crate::tui::styles::{Theme, LOGO_SMALL};

/// Class counts over the user's most recent records.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecentSummary {
    pub total: usize,
    pub healthy: u32,
    pub prediabetic: u32,
    pub diabetic: u32,
    /// Risk of the newest record, in percent
    pub latest_risk: Option<f64>,
}

/// Dashboard state for rendering.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub models_ready: bool,
    pub models_verified: bool,
    pub loaded_models: Vec<ModelId>,
    pub advisor_configured: bool,
    /// `None` for an anonymous session
    pub user_id: Option<String>,
    pub history_count: usize,
    pub log_count: usize,
}

pub fn render_dashboard(f: &mut Frame, area: Rect, state: &DashboardState, recent: RecentSummary) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Main content
        ])
        .split(area);

    render_header(f, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    render_status_panels(f, columns[0], state, recent);
    render_recent_summary(f, columns[1], state, recent);
}

fn render_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", Theme::text()),
        Span::styled(LOGO_SMALL, Theme::title()),
        Span::styled(" │ ", Theme::text_muted()),
        Span::styled(
            "Diabetes Risk Self-Assessment",
            Theme::text_secondary(),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Theme::border()),
    );

    f.render_widget(header, area);
}

fn render_status_panels(f: &mut Frame, area: Rect, state: &DashboardState, recent: RecentSummary) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // System status
            Constraint::Length(3), // Latest risk
            Constraint::Min(0),    // Quick actions
        ])
        .margin(1)
        .split(area);

    let models = if state.loaded_models.is_empty() {
        "none".to_string()
    } else {
        state
            .loaded_models
            .iter()
            .map(ModelId::key)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let user = state.user_id.as_deref().unwrap_or("anonymous");

    let status_items = vec![
        format_status_item("Models Ready", state.models_ready),
        format_status_item("Signed Artifacts", state.models_verified),
        format_status_item("Advice Service", state.advisor_configured),
        Line::from(vec![
            Span::styled("  Models: ", Theme::text_secondary()),
            Span::styled(models, Theme::text()),
        ]),
        Line::from(vec![
            Span::styled("  User: ", Theme::text_secondary()),
            Span::styled(user.to_string(), Theme::text()),
        ]),
        Line::from(vec![
            Span::styled("  Assessments: ", Theme::text_secondary()),
            Span::styled(state.history_count.to_string(), Theme::text()),
            Span::styled("  Daily logs: ", Theme::text_secondary()),
            Span::styled(state.log_count.to_string(), Theme::text()),
        ]),
    ];

    let status_block = Block::default()
        .title(Span::styled(" System Status ", Theme::subtitle()))
        .borders(Borders::ALL)
        .border_style(Theme::border());
    f.render_widget(Paragraph::new(status_items).block(status_block), chunks[0]);

    let risk = recent.latest_risk.unwrap_or(0.0);
    let risk_gauge = Gauge::default()
        .block(
            Block::default()
                .title(Span::styled(" Latest Risk ", Theme::subtitle()))
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        )
        .gauge_style(Theme::gauge(risk / 100.0))
        .percent(risk.clamp(0.0, 100.0) as u16)
        .label(match recent.latest_risk {
            Some(r) => format!("{r:.1}%"),
            None => "n/a".to_string(),
        });
    f.render_widget(risk_gauge, chunks[1]);

    let mut actions = vec![Line::from(vec![
        Span::styled("[N] ", Theme::key_hint()),
        Span::styled("New Assessment", Theme::key_desc()),
    ])];
    if state.user_id.is_some() {
        actions.push(Line::from(vec![
            Span::styled("[H] ", Theme::key_hint()),
            Span::styled("History & Trend", Theme::key_desc()),
        ]));
        actions.push(Line::from(vec![
            Span::styled("[D] ", Theme::key_hint()),
            Span::styled("Daily Log", Theme::key_desc()),
        ]));
    }
    actions.push(Line::from(vec![
        Span::styled("[Q] ", Theme::key_hint()),
        Span::styled("Quit", Theme::key_desc()),
    ]));

    let actions_block = Block::default()
        .title(Span::styled(" Quick Actions ", Theme::subtitle()))
        .borders(Borders::ALL)
        .border_style(Theme::border());
    f.render_widget(Paragraph::new(actions).block(actions_block), chunks[2]);
}

fn format_status_item(label: &str, ok: bool) -> Line<'static> {
    let (icon, style) = if ok {
        ("OK", Theme::success())
    } else {
        ("--", Theme::warning())
    };

    Line::from(vec![
        Span::styled(format!("  {icon} "), style),
        Span::styled(label.to_string(), Theme::text()),
    ])
}

fn render_recent_summary(f: &mut Frame, area: Rect, state: &DashboardState, recent: RecentSummary) {
    let block = Block::default()
        .title(Span::styled(" Recent Assessments ", Theme::subtitle()))
        .borders(Borders::ALL)
        .border_style(Theme::border());

    if state.user_id.is_none() {
        let msg = Paragraph::new(vec![
            Line::from(Span::styled(
                "Anonymous session: results are not stored.",
                Theme::text_muted(),
            )),
            Line::from(Span::styled(
                "Set GLYCORISK_USER to keep history and daily logs.",
                Theme::text_muted(),
            )),
        ])
        .block(block);
        f.render_widget(msg, area);
        return;
    }

    if recent.total == 0 {
        let empty_msg = Paragraph::new(Line::from(vec![Span::styled(
            "No assessments yet. Press [N] to start.",
            Theme::text_muted(),
        )]))
        .block(block);
        f.render_widget(empty_msg, area);
        return;
    }

    let lines = vec![
        Line::from(vec![
            Span::styled("Last ", Theme::text_secondary()),
            Span::styled(recent.total.to_string(), Theme::text()),
            Span::styled(" assessments", Theme::text_secondary()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Healthy: ", Theme::text_secondary()),
            Span::styled(
                recent.healthy.to_string(),
                Theme::risk_class(RiskClass::Healthy),
            ),
            Span::styled("  Prediabetic: ", Theme::text_secondary()),
            Span::styled(
                recent.prediabetic.to_string(),
                Theme::risk_class(RiskClass::Prediabetic),
            ),
            Span::styled("  Diabetic: ", Theme::text_secondary()),
            Span::styled(
                recent.diabetic.to_string(),
                Theme::risk_class(RiskClass::Diabetic),
            ),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press [H] for the full history and risk trend.",
            Theme::text_muted(),
        )]),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}
