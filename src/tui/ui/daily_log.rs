//! Daily log entry form and recent logs.

use chrono::NaiveDate;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
    Frame,
};

use crate::domain::{DailyLog, DailyLogEntry};
use crate::tui::styles::Theme;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Date,
    Fruit,
    Veggie,
    Activity,
    Drinks,
    BadMental,
    BadPhysical,
    Weight,
    Height,
}

impl Field {
    const ALL: [Field; 9] = [
        Self::Date,
        Self::Fruit,
        Self::Veggie,
        Self::Activity,
        Self::Drinks,
        Self::BadMental,
        Self::BadPhysical,
        Self::Weight,
        Self::Height,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Fruit => "Ate fruit",
            Self::Veggie => "Ate vegetables",
            Self::Activity => "Physical activity",
            Self::Drinks => "Alcoholic drinks",
            Self::BadMental => "Bad mental day",
            Self::BadPhysical => "Bad physical day",
            Self::Weight => "Weight",
            Self::Height => "Height",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Self::Date => "YYYY-MM-DD",
            Self::Drinks => "count",
            Self::Weight => "kg, optional",
            Self::Height => "cm, optional",
            _ => "0=no, 1=yes",
        }
    }
}

pub struct DailyLogState {
    values: Vec<String>,
    pub selected_field: usize,
    pub message: Option<(bool, String)>,
    pub recent: Vec<DailyLog>,
}

impl DailyLogState {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        let mut values = vec![String::new(); Field::ALL.len()];
        values[0] = today.format(DATE_FORMAT).to_string();
        Self {
            values,
            selected_field: 0,
            message: None,
            recent: Vec::new(),
        }
    }

    pub fn next_field(&mut self) {
        self.selected_field = (self.selected_field + 1) % Field::ALL.len();
    }

    pub fn prev_field(&mut self) {
        if self.selected_field == 0 {
            self.selected_field = Field::ALL.len() - 1;
        } else {
            self.selected_field -= 1;
        }
    }

    pub fn input_char(&mut self, c: char) {
        if c.is_ascii_digit() || c == '.' || c == '-' {
            self.values[self.selected_field].push(c);
            self.message = None;
        }
    }

    pub fn delete_char(&mut self) {
        self.values[self.selected_field].pop();
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.message = Some((false, message.into()));
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.message = Some((true, message.into()));
    }

    fn value(&self, field: Field) -> &str {
        self.values[field as usize].trim()
    }

    fn flag(&self, field: Field) -> Result<bool, String> {
        match self.value(field) {
            "" | "0" => Ok(false),
            "1" => Ok(true),
            other => Err(format!("{}: expected 0 or 1 (got {other})", field.label())),
        }
    }

    fn optional(&self, field: Field) -> Result<Option<f64>, String> {
        let raw = self.value(field);
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse()
            .map(Some)
            .map_err(|_| format!("{}: Invalid number", field.label()))
    }

    /// Parse the form into a date and entry. Range checks happen on save.
    ///
    /// # Errors
    /// Names the first field that cannot be parsed.
    pub fn to_entry(&self) -> Result<(NaiveDate, DailyLogEntry), String> {
        let date = NaiveDate::parse_from_str(self.value(Field::Date), DATE_FORMAT)
            .map_err(|_| "Date: expected YYYY-MM-DD".to_string())?;
        let drinks = match self.value(Field::Drinks) {
            "" => 0,
            raw => raw
                .parse::<u32>()
                .map_err(|_| "Alcoholic drinks: expected a whole number".to_string())?,
        };

        let entry = DailyLogEntry {
            ate_fruit: self.flag(Field::Fruit)?,
            ate_veggie: self.flag(Field::Veggie)?,
            physical_activity: self.flag(Field::Activity)?,
            alcohol_drinks: drinks,
            bad_mental_day: self.flag(Field::BadMental)?,
            bad_physical_day: self.flag(Field::BadPhysical)?,
            weight: self.optional(Field::Weight)?,
            height: self.optional(Field::Height)?,
        };
        Ok((date, entry))
    }
}

pub fn render_daily_log(f: &mut Frame, area: Rect, state: &DailyLogState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Form + recent
            Constraint::Length(3), // Footer
        ])
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", Theme::text()),
        Span::styled("Daily Log", Theme::title()),
        Span::styled(" │ One entry per day", Theme::text_secondary()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Theme::border()),
    );
    f.render_widget(header, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);
    render_fields(f, columns[0], state);
    render_recent_logs(f, columns[1], &state.recent);
    render_footer(f, chunks[2], state);
}

fn render_fields(f: &mut Frame, area: Rect, state: &DailyLogState) {
    let lines: Vec<Line> = Field::ALL
        .iter()
        .zip(&state.values)
        .enumerate()
        .map(|(i, (field, value))| {
            let is_selected = i == state.selected_field;
            let label_style = if is_selected {
                Theme::focused()
            } else {
                Theme::text_secondary()
            };
            let shown = if value.is_empty() {
                Span::styled(field.hint(), Theme::text_muted())
            } else {
                Span::styled(value.as_str(), Theme::text())
            };
            Line::from(vec![
                Span::styled(if is_selected { "▸ " } else { "  " }, label_style),
                Span::styled(format!("{:<18}", field.label()), label_style),
                shown,
            ])
        })
        .collect();

    let block = Block::default()
        .title(Span::styled(" Today ", Theme::subtitle()))
        .borders(Borders::ALL)
        .border_style(Theme::border_focused());
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn yes(flag: bool) -> &'static str {
    if flag {
        "✓"
    } else {
        "·"
    }
}

fn render_recent_logs(f: &mut Frame, area: Rect, logs: &[DailyLog]) {
    let block = Block::default()
        .title(Span::styled(" Recent Logs ", Theme::subtitle()))
        .borders(Borders::ALL)
        .border_style(Theme::border());

    if logs.is_empty() {
        let empty = Paragraph::new(Line::from(Span::styled(
            "No logs yet.",
            Theme::text_muted(),
        )))
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = logs
        .iter()
        .map(|log| {
            let e = &log.entry;
            Row::new(vec![
                log.log_date.format(DATE_FORMAT).to_string(),
                yes(e.ate_fruit).to_string(),
                yes(e.ate_veggie).to_string(),
                yes(e.physical_activity).to_string(),
                e.alcohol_drinks.to_string(),
                e.weight.map(|w| format!("{w:.1}")).unwrap_or_default(),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(11),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(7),
        ],
    )
    .header(
        Row::new(["Date", "Fruit", "Veg", "Active", "Drinks", "Weight"])
            .style(Theme::text_secondary().add_modifier(Modifier::BOLD)),
    )
    .style(Theme::text())
    .block(block);
    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect, state: &DailyLogState) {
    let content = match &state.message {
        Some((true, notice)) => Line::from(Span::styled(notice.clone(), Theme::success())),
        Some((false, err)) => Line::from(vec![
            Span::styled("! ", Theme::danger()),
            Span::styled(err.clone(), Theme::danger()),
        ]),
        None => Line::from(vec![
            Span::styled("[↑↓] ", Theme::key_hint()),
            Span::styled("Navigate ", Theme::key_desc()),
            Span::styled("[Enter] ", Theme::key_hint()),
            Span::styled("Save ", Theme::key_desc()),
            Span::styled("[Esc] ", Theme::key_hint()),
            Span::styled("Back", Theme::key_desc()),
        ]),
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Theme::border()),
    );

    f.render_widget(footer, area);
}
