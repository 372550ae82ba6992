//! Assessment input form.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use serde_json::{Map, Value};
use zeroize::Zeroize;

use crate::tui::styles::Theme;

/// One raw attribute in the form. Empty values are left out of the request.
#[derive(Debug, Clone)]
pub struct FormField {
    /// Input key understood by the feature mapper
    pub key: &'static str,
    pub label: &'static str,
    pub hint: &'static str,
    pub value: String,
}

impl FormField {
    fn new(key: &'static str, label: &'static str, hint: &'static str) -> Self {
        Self {
            key,
            label,
            hint,
            value: String::new(),
        }
    }
}

pub struct AssessmentFormState {
    pub fields: Vec<FormField>,
    pub selected_field: usize,
    pub error_message: Option<String>,
    /// Set when values came from the daily log summary
    pub prefilled_from_logs: bool,
}

impl Default for AssessmentFormState {
    fn default() -> Self {
        Self {
            fields: vec![
                FormField::new("age", "Age", "years (0-120)"),
                FormField::new("sex", "Sex", "0=female, 1=male"),
                FormField::new("weight", "Weight", "kg"),
                FormField::new("height", "Height", "cm"),
                FormField::new("high_bp", "High BP", "0=no, 1=yes"),
                FormField::new("high_chol", "High cholesterol", "0=no, 1=yes"),
                FormField::new("chol_check", "Chol. check", "last 5 years, 0/1"),
                FormField::new("smoker", "Smoker", "100+ cigarettes ever, 0/1"),
                FormField::new("stroke", "Stroke", "ever, 0/1"),
                FormField::new("heart_disease", "Heart disease", "0=no, 1=yes"),
                FormField::new("physical_activity", "Activity", "last 30 days, 0/1"),
                FormField::new("ate_fruit", "Fruit", "daily, 0/1"),
                FormField::new("ate_veggie", "Vegetables", "daily, 0/1"),
                FormField::new("alcohol_drinks", "Drinks", "per week"),
                FormField::new("any_healthcare", "Coverage", "0=no, 1=yes"),
                FormField::new("no_doc_bc_cost", "Skipped doctor", "due to cost, 0/1"),
                FormField::new("gen_hlth", "General health", "1=excellent .. 5=poor"),
                FormField::new("bad_mental_day", "Bad mental days", "of last 30"),
                FormField::new("bad_physical_day", "Bad physical days", "of last 30"),
                FormField::new("diff_walk", "Difficulty walking", "0=no, 1=yes"),
            ],
            selected_field: 0,
            error_message: None,
            prefilled_from_logs: false,
        }
    }
}

impl AssessmentFormState {
    pub fn next_field(&mut self) {
        self.selected_field = (self.selected_field + 1) % self.fields.len();
    }

    pub fn prev_field(&mut self) {
        if self.selected_field == 0 {
            self.selected_field = self.fields.len() - 1;
        } else {
            self.selected_field -= 1;
        }
    }

    pub fn input_char(&mut self, c: char) {
        if c.is_ascii_digit() || c == '.' || c == '-' {
            self.fields[self.selected_field].value.push(c);
            self.error_message = None;
        }
    }

    pub fn delete_char(&mut self) {
        self.fields[self.selected_field].value.pop();
    }

    pub fn clear_field(&mut self) {
        self.fields[self.selected_field].value.clear();
    }

    /// Wipe all field buffers once the request has been handed off.
    pub fn clear_sensitive(&mut self) {
        for field in &mut self.fields {
            field.value.zeroize();
        }
        self.error_message = None;
        self.selected_field = 0;
        self.prefilled_from_logs = false;
    }

    /// Raw attribute map for the filled-in fields.
    ///
    /// # Errors
    /// Names the first field that is not a number.
    pub fn to_input(&self) -> Result<Map<String, Value>, String> {
        let mut input = Map::new();
        for field in &self.fields {
            let raw = field.value.trim();
            if raw.is_empty() {
                continue;
            }
            let value: f64 = raw
                .parse()
                .map_err(|_| format!("{}: Invalid number", field.label))?;
            input.insert(field.key.to_string(), Value::from(value));
        }
        Ok(input)
    }

    /// Copy matching values from a summarized daily log.
    ///
    /// Returns how many fields were filled.
    pub fn prefill(&mut self, values: &Map<String, Value>) -> usize {
        let mut filled = 0;
        for field in &mut self.fields {
            if let Some(n) = values.get(field.key).and_then(Value::as_f64) {
                field.value = format_number(n);
                filled += 1;
            }
        }
        self.prefilled_from_logs = filled > 0;
        filled
    }

    /// Sample: 58-year-old man, overweight, high BP and cholesterol.
    pub fn load_sample_data(&mut self) {
        let sample = [
            "58", "1", "96", "178", "1", "1", "1", "1", "0", "0", "0", "1", "1", "4", "1", "0",
            "3", "5", "2", "0",
        ];
        for (field, val) in self.fields.iter_mut().zip(sample) {
            field.value = val.to_string();
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n:.1}")
    }
}

pub fn render_assessment_form(f: &mut Frame, area: Rect, state: &AssessmentFormState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Form
            Constraint::Length(3), // Footer/error
        ])
        .split(area);

    render_form_header(f, chunks[0], state);
    render_form_fields(f, chunks[1], state);
    render_form_footer(f, chunks[2], state);
}

fn render_form_header(f: &mut Frame, area: Rect, state: &AssessmentFormState) {
    let mut spans = vec![
        Span::styled(" ", Theme::text()),
        Span::styled("New Assessment", Theme::title()),
        Span::styled(
            " │ Empty fields use neutral defaults",
            Theme::text_secondary(),
        ),
    ];
    if state.prefilled_from_logs {
        spans.push(Span::styled(
            " │ prefilled from daily logs",
            Theme::info(),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Theme::border()),
    );

    f.render_widget(header, area);
}

fn render_form_fields(f: &mut Frame, area: Rect, state: &AssessmentFormState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .margin(1)
        .split(area);

    let mid = (state.fields.len() + 1) / 2;

    render_field_column(f, columns[0], &state.fields[..mid], 0, state.selected_field);
    render_field_column(
        f,
        columns[1],
        &state.fields[mid..],
        mid,
        state.selected_field,
    );
}

fn render_field_column(
    f: &mut Frame,
    area: Rect,
    fields: &[FormField],
    offset: usize,
    selected: usize,
) {
    let lines: Vec<Line> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let is_selected = offset + i == selected;
            let label_style = if is_selected {
                Theme::focused()
            } else {
                Theme::text_secondary()
            };
            let value = if field.value.is_empty() {
                Span::styled(field.hint, Theme::text_muted())
            } else {
                Span::styled(field.value.as_str(), Theme::text())
            };
            Line::from(vec![
                Span::styled(if is_selected { "▸ " } else { "  " }, label_style),
                Span::styled(format!("{:<19}", field.label), label_style),
                value,
                if is_selected {
                    Span::styled("▌", Theme::focused())
                } else {
                    Span::raw("")
                },
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Theme::border());
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_form_footer(f: &mut Frame, area: Rect, state: &AssessmentFormState) {
    let content = if let Some(err) = &state.error_message {
        Line::from(vec![
            Span::styled("! ", Theme::danger()),
            Span::styled(err.clone(), Theme::danger()),
        ])
    } else {
        Line::from(vec![
            Span::styled("[↑↓] ", Theme::key_hint()),
            Span::styled("Navigate ", Theme::key_desc()),
            Span::styled("[Enter] ", Theme::key_hint()),
            Span::styled("Assess ", Theme::key_desc()),
            Span::styled("[S] ", Theme::key_hint()),
            Span::styled("Sample ", Theme::key_desc()),
            Span::styled("[L] ", Theme::key_hint()),
            Span::styled("From Logs ", Theme::key_desc()),
            Span::styled("[Esc] ", Theme::key_hint()),
            Span::styled("Cancel", Theme::key_desc()),
        ])
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Theme::border()),
    );

    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_omitted() {
        let mut state = AssessmentFormState::default();
        state.fields[0].value = "42".into();
        let input = state.to_input().expect("Should parse");
        assert_eq!(input.len(), 1);
        assert_eq!(input["age"], Value::from(42.0));
    }

    #[test]
    fn test_invalid_number_names_field() {
        let mut state = AssessmentFormState::default();
        state.fields[2].value = "8.8.8".into();
        let err = state.to_input().expect_err("Should reject");
        assert!(err.starts_with("Weight"));
    }

    #[test]
    fn test_prefill_from_log_summary() {
        let mut state = AssessmentFormState::default();
        let mut summary = Map::new();
        summary.insert("weight".into(), Value::from(81.5));
        summary.insert("ate_fruit".into(), Value::from(1u8));
        summary.insert("unrelated".into(), Value::from(3));

        assert_eq!(state.prefill(&summary), 2);
        assert!(state.prefilled_from_logs);
        let weight = state.fields.iter().find(|f| f.key == "weight").expect("field");
        assert_eq!(weight.value, "81.5");
    }

    #[test]
    fn test_sample_fills_every_field() {
        let mut state = AssessmentFormState::default();
        state.load_sample_data();
        assert!(state.fields.iter().all(|f| !f.value.is_empty()));
        assert_eq!(state.to_input().expect("Should parse").len(), state.fields.len());

        state.clear_sensitive();
        assert!(state.to_input().expect("Should parse").is_empty());
    }
}
