//! Assessment progress and result view.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::application::PredictionPhase;
use crate::domain::{FeatureContribution, ModelId, PersistenceStatus, PredictionOutcome};
use crate::tui::styles::Theme;

#[derive(Debug, Clone, Default)]
pub enum ResultState {
    #[default]
    Idle,
    Running {
        phase: PredictionPhase,
        progress: f64,
    },
    Complete {
        outcome: Box<PredictionOutcome>,
    },
    Error {
        message: String,
    },
}

pub fn render_result(f: &mut Frame, area: Rect, state: &ResultState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(area);

    render_result_header(f, chunks[0]);
    match state {
        ResultState::Idle => render_idle(f, chunks[1]),
        ResultState::Running { phase, progress } => {
            render_progress(f, chunks[1], *phase, *progress);
        }
        ResultState::Complete { outcome } => render_outcome(f, chunks[1], outcome),
        ResultState::Error { message } => render_error(f, chunks[1], message),
    }
    render_result_footer(f, chunks[2], state);
}

fn render_result_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", Theme::text()),
        Span::styled("Risk Assessment", Theme::title()),
        Span::styled(" │ Local models", Theme::text_secondary()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Theme::border()),
    );

    f.render_widget(header, area);
}

fn render_idle(f: &mut Frame, area: Rect) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "Enter your details to begin",
            Theme::text_muted(),
        )),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border()),
    );

    f.render_widget(content, area);
}

fn render_progress(f: &mut Frame, area: Rect, phase: PredictionPhase, progress: f64) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .margin(2)
        .split(area);

    let stage_text = Paragraph::new(Line::from(vec![
        Span::styled("Stage: ", Theme::text_secondary()),
        Span::styled(phase.label(), Theme::focused()),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(stage_text, chunks[0]);

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        )
        .gauge_style(Theme::info())
        .percent((progress.clamp(0.0, 1.0) * 100.0) as u16)
        .label(format!("{:.0}%", progress * 100.0));
    f.render_widget(gauge, chunks[1]);
}

fn render_outcome(f: &mut Frame, area: Rect, outcome: &PredictionOutcome) {
    let block = Block::default()
        .title(Span::styled(" Result ", Theme::subtitle()))
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());

    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Class
            Constraint::Length(3), // Risk gauge
            Constraint::Length(6), // Per-model table
            Constraint::Min(4),    // Factors + advice
            Constraint::Length(1), // Saved flag
        ])
        .margin(1)
        .split(inner);

    let Some(primary) = outcome.primary_prediction() else {
        render_error(f, inner, "The primary model produced no result");
        return;
    };
    let class_style = Theme::risk_class(primary.class);

    let class_display = Paragraph::new(vec![
        Line::from(Span::styled(
            primary.class.to_string(),
            class_style.add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            primary.class.description(),
            Theme::text_secondary(),
        )),
    ])
    .alignment(Alignment::Center);
    f.render_widget(class_display, rows[0]);

    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(Span::styled(
                    format!(" Risk ({}) ", outcome.primary.display_name()),
                    Theme::text_secondary(),
                ))
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        )
        .gauge_style(class_style)
        .percent(primary.risk_score.clamp(0.0, 100.0) as u16)
        .label(format!(
            "{:.1}%  confidence {:.1}%",
            primary.risk_score, primary.confidence
        ));
    f.render_widget(gauge, rows[1]);

    render_model_table(f, rows[2], outcome);

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[3]);
    render_factors(f, lower[0], outcome);
    render_advice(f, lower[1], outcome.advice.as_deref());

    let saved = match &outcome.persistence {
        PersistenceStatus::Saved { .. } => Span::styled("Saved to history", Theme::success()),
        PersistenceStatus::Skipped => Span::styled(
            "Not saved (anonymous session)",
            Theme::text_muted(),
        ),
        PersistenceStatus::Failed { .. } => {
            Span::styled("Could not save to history", Theme::warning())
        }
    };
    f.render_widget(
        Paragraph::new(Line::from(saved)).alignment(Alignment::Center),
        rows[4],
    );
}

fn render_model_table(f: &mut Frame, area: Rect, outcome: &PredictionOutcome) {
    let header = Row::new(["Model", "Class", "Healthy", "Prediab.", "Diabetic", "Risk"])
        .style(Theme::text_secondary().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = ModelId::ALL
        .iter()
        .filter_map(|id| outcome.results.get(id).map(|r| (id, r)))
        .map(|(id, result)| {
            let marker = if *id == outcome.primary { "*" } else { " " };
            let name = Cell::from(format!("{marker}{}", id.display_name()));
            match result {
                Some(p) => Row::new(vec![
                    name,
                    Cell::from(p.class.to_string()).style(Theme::risk_class(p.class)),
                    Cell::from(format!("{:.1}", p.probabilities[0])),
                    Cell::from(format!("{:.1}", p.probabilities[1])),
                    Cell::from(format!("{:.1}", p.probabilities[2])),
                    Cell::from(format!("{:.1}%", p.risk_score)),
                ]),
                None => Row::new(vec![
                    name,
                    Cell::from("failed").style(Theme::danger()),
                ]),
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(22),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .style(Theme::text());
    f.render_widget(table, area);
}

fn factor_lines<'a>(factors: &'a [FeatureContribution], sign: &'a str) -> Vec<Line<'a>> {
    factors
        .iter()
        .map(|c| {
            Line::from(vec![
                Span::styled(format!(" {sign} "), Theme::text_muted()),
                Span::styled(c.label.as_str(), Theme::text()),
                Span::styled(format!(" ({:+.3})", c.contribution), Theme::text_muted()),
            ])
        })
        .collect()
}

fn render_factors(f: &mut Frame, area: Rect, outcome: &PredictionOutcome) {
    let explanation = &outcome.explanation;
    let mut lines = Vec::new();
    if explanation.is_empty() {
        lines.push(Line::from(Span::styled(
            "No explanation available",
            Theme::text_muted(),
        )));
    } else {
        lines.push(Line::from(Span::styled("Raising risk", Theme::danger())));
        lines.extend(factor_lines(&explanation.risk_factors, "+"));
        lines.push(Line::from(Span::styled("Lowering risk", Theme::success())));
        lines.extend(factor_lines(&explanation.protective_factors, "-"));
    }

    let block = Block::default()
        .title(Span::styled(" Factors ", Theme::text_secondary()))
        .borders(Borders::ALL)
        .border_style(Theme::border());
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_advice(f: &mut Frame, area: Rect, advice: Option<&str>) {
    let text = match advice {
        Some(text) => Line::from(Span::styled(text, Theme::text())),
        None => Line::from(Span::styled("No advice available", Theme::text_muted())),
    };

    let block = Block::default()
        .title(Span::styled(" Advice ", Theme::text_secondary()))
        .borders(Borders::ALL)
        .border_style(Theme::border());
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_error(f: &mut Frame, area: Rect, message: &str) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("! Error", Theme::danger())),
        Line::from(""),
        Line::from(Span::styled(message, Theme::text())),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::danger()),
    );

    f.render_widget(content, area);
}

fn render_result_footer(f: &mut Frame, area: Rect, state: &ResultState) {
    let content = match state {
        ResultState::Complete { .. } => Line::from(vec![
            Span::styled("[Enter] ", Theme::key_hint()),
            Span::styled("Dashboard ", Theme::key_desc()),
            Span::styled("[N] ", Theme::key_hint()),
            Span::styled("New Assessment", Theme::key_desc()),
        ]),
        ResultState::Error { .. } => Line::from(vec![
            Span::styled("[Enter] ", Theme::key_hint()),
            Span::styled("Edit Input ", Theme::key_desc()),
            Span::styled("[Esc] ", Theme::key_hint()),
            Span::styled("Cancel", Theme::key_desc()),
        ]),
        _ => Line::from(vec![Span::styled(
            "Processing...",
            Theme::text_muted(),
        )]),
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Theme::border()),
    );

    f.render_widget(footer, area);
}
