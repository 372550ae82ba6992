//! Main TUI application state machine.
//!
//! Handles:
//! - Screen navigation
//! - Input event handling
//! - Service integration
//! - Background assessments via the worker

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use crate::adapters::gemini::GeminiAdvice;
use crate::adapters::sqlite::SqliteStorage;
use crate::application::{
    HealthLogService, HistoryService, ModelRegistry, PredictionPhase, PredictionService,
    DEFAULT_LOG_WINDOW,
};
use crate::config::AppConfig;
use crate::domain::{Caller, RiskClass};
use crate::ports::AdviceGenerator;

use super::ui::{
    assessment::{render_assessment_form, AssessmentFormState},
    daily_log::{render_daily_log, DailyLogState},
    dashboard::{render_dashboard, DashboardState, RecentSummary},
    history::{render_history, HistoryState, HISTORY_PAGE_SIZE},
    render_disclaimer,
    result::{render_result, ResultState},
};
use super::worker::{AssessmentProgress, AssessmentWorker, AssessmentWorkerHandle};

/// Records summarized on the dashboard.
const DASHBOARD_RECENT: usize = 10;
/// Logs listed next to the daily log form.
const DAILY_LOG_LIST: usize = 14;

/// Current screen/view in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Assessment,
    Result,
    History,
    DailyLog,
}

/// Main application state
pub struct App {
    screen: Screen,
    should_quit: bool,
    caller: Caller,

    prediction_service: Arc<PredictionService<SqliteStorage>>,
    history_service: HistoryService<SqliteStorage>,
    health_log_service: HealthLogService<SqliteStorage>,

    dashboard_state: DashboardState,
    recent_summary: RecentSummary,
    form_state: AssessmentFormState,
    result_state: ResultState,
    history_state: HistoryState,
    daily_log_state: DailyLogState,

    /// Pending assessment worker (if running)
    pending_worker: Option<AssessmentWorkerHandle>,

    /// When the current phase started (for the progress animation)
    phase_started_at: Option<Instant>,
}

impl App {
    /// Build every adapter and service from configuration.
    ///
    /// Missing models or advice credentials do not fail startup; the
    /// dashboard reports them instead.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let storage = Arc::new(
            SqliteStorage::new(&config.db_path)
                .with_context(|| format!("Failed to open database {:?}", config.db_path))?,
        );

        let registry = Arc::new(ModelRegistry::load(config));

        let advisor: Option<Arc<dyn AdviceGenerator>> = match GeminiAdvice::from_config(&config.advice)
        {
            Ok(advice) => Some(Arc::new(advice)),
            Err(e) => {
                tracing::info!("Advice disabled: {e}");
                None
            }
        };

        let caller = match &config.user_id {
            Some(user) => Caller::identified(user.clone()),
            None => Caller::Anonymous,
        };

        let prediction_service = Arc::new(PredictionService::new(
            registry,
            Arc::clone(&storage),
            advisor,
        ));

        Ok(Self::with_dependencies(
            caller,
            prediction_service,
            HistoryService::new(Arc::clone(&storage)),
            HealthLogService::new(storage),
        ))
    }

    /// Create application with injected services.
    #[must_use]
    pub fn with_dependencies(
        caller: Caller,
        prediction_service: Arc<PredictionService<SqliteStorage>>,
        history_service: HistoryService<SqliteStorage>,
        health_log_service: HealthLogService<SqliteStorage>,
    ) -> Self {
        Self {
            screen: Screen::Dashboard,
            should_quit: false,
            caller,
            prediction_service,
            history_service,
            health_log_service,
            dashboard_state: DashboardState::default(),
            recent_summary: RecentSummary::default(),
            form_state: AssessmentFormState::default(),
            result_state: ResultState::default(),
            history_state: HistoryState::default(),
            daily_log_state: DailyLogState::new(Local::now().date_naive()),
            pending_worker: None,
            phase_started_at: None,
        }
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.update_dashboard_state();

        let result = self.main_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            self.poll_worker();
            self.tick_progress();

            terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(3)])
                    .split(f.area());

                let content_area = chunks[0];
                match self.screen {
                    Screen::Dashboard => render_dashboard(
                        f,
                        content_area,
                        &self.dashboard_state,
                        self.recent_summary,
                    ),
                    Screen::Assessment => {
                        render_assessment_form(f, content_area, &self.form_state);
                    }
                    Screen::Result => render_result(f, content_area, &self.result_state),
                    Screen::History => render_history(f, content_area, &self.history_state),
                    Screen::DailyLog => render_daily_log(f, content_area, &self.daily_log_state),
                }

                render_disclaimer(f, chunks[1]);
            })?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key.code, key.modifiers);
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Drain progress messages from the background worker.
    fn poll_worker(&mut self) {
        loop {
            // Take the message first so `pending_worker` is not borrowed below.
            let Some(progress) = self.pending_worker.as_ref().and_then(|w| w.try_recv()) else {
                break;
            };

            match progress {
                AssessmentProgress::Phase(phase) => self.set_phase(phase),
                AssessmentProgress::Complete(outcome) => {
                    self.result_state = ResultState::Complete { outcome };
                    self.finish_worker();
                    break;
                }
                AssessmentProgress::Error(message) => {
                    self.result_state = ResultState::Error { message };
                    self.finish_worker();
                    break;
                }
            }
        }
    }

    fn finish_worker(&mut self) {
        self.pending_worker = None;
        self.phase_started_at = None;
        self.update_dashboard_state();
    }

    fn set_phase(&mut self, phase: PredictionPhase) {
        let current = match self.result_state {
            ResultState::Running { progress, .. } => progress,
            _ => 0.0,
        };
        let (floor, _, _) = phase_window(phase);
        self.result_state = ResultState::Running {
            phase,
            progress: current.max(floor),
        };
        self.phase_started_at = Some(Instant::now());
    }

    fn tick_progress(&mut self) {
        if self.pending_worker.is_none() {
            return;
        }
        let ResultState::Running { phase, progress } = self.result_state else {
            return;
        };
        let Some(started_at) = self.phase_started_at else {
            return;
        };

        let elapsed = Instant::now()
            .saturating_duration_since(started_at)
            .as_secs_f64();
        let (floor, target, tau) = phase_window(phase);

        // Asymptotic approach to the phase target; never moves backwards.
        let k = 1.0 - (-elapsed / tau).exp();
        let desired = floor + (target - floor) * k;
        self.result_state = ResultState::Running {
            phase,
            progress: desired.max(progress).min(target),
        };
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        if key == KeyCode::Char('q') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::Dashboard => self.handle_dashboard_key(key),
            Screen::Assessment => self.handle_assessment_key(key),
            Screen::Result => self.handle_result_key(key),
            Screen::History => self.handle_history_key(key),
            Screen::DailyLog => self.handle_daily_log_key(key),
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyCode) {
        let identified = self.caller.user_id().is_some();
        match key {
            KeyCode::Char('n' | 'N') => self.open_assessment(),
            KeyCode::Char('h' | 'H') if identified => {
                self.history_state = HistoryState::default();
                self.load_history();
                self.screen = Screen::History;
            }
            KeyCode::Char('d' | 'D') if identified => {
                self.daily_log_state = DailyLogState::new(Local::now().date_naive());
                self.load_daily_logs();
                self.screen = Screen::DailyLog;
            }
            KeyCode::Char('q' | 'Q') => self.should_quit = true,
            _ => {}
        }
    }

    fn open_assessment(&mut self) {
        self.form_state = AssessmentFormState::default();
        self.screen = Screen::Assessment;
    }

    fn handle_assessment_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.screen = Screen::Dashboard,
            KeyCode::Up => self.form_state.prev_field(),
            KeyCode::Down | KeyCode::Tab => self.form_state.next_field(),
            KeyCode::Char('s' | 'S') => self.form_state.load_sample_data(),
            KeyCode::Char('l' | 'L') => self.prefill_from_logs(),
            KeyCode::Char(c) => self.form_state.input_char(c),
            KeyCode::Backspace => self.form_state.delete_char(),
            KeyCode::Delete => self.form_state.clear_field(),
            KeyCode::Enter => self.submit_assessment(),
            _ => {}
        }
    }

    fn handle_result_key(&mut self, key: KeyCode) {
        match self.result_state {
            ResultState::Complete { .. } => match key {
                KeyCode::Enter | KeyCode::Esc => self.screen = Screen::Dashboard,
                KeyCode::Char('n' | 'N') => self.open_assessment(),
                _ => {}
            },
            ResultState::Error { .. } => match key {
                KeyCode::Enter => self.screen = Screen::Assessment,
                KeyCode::Esc => self.screen = Screen::Dashboard,
                _ => {}
            },
            _ => {}
        }
    }

    fn handle_history_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.update_dashboard_state();
                self.screen = Screen::Dashboard;
            }
            KeyCode::Up => self.history_state.select_prev(),
            KeyCode::Down => self.history_state.select_next(),
            KeyCode::Left => {
                let prev = self.history_state.page.as_ref().and_then(|p| p.prev_offset());
                self.go_to_history_page(prev);
            }
            KeyCode::Right => {
                let next = self.history_state.page.as_ref().and_then(|p| p.next_offset());
                self.go_to_history_page(next);
            }
            KeyCode::Char('x' | 'X') => self.delete_selected_record(),
            KeyCode::Char('r' | 'R') => self.load_history(),
            _ => {}
        }
    }

    fn handle_daily_log_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.update_dashboard_state();
                self.screen = Screen::Dashboard;
            }
            KeyCode::Up => self.daily_log_state.prev_field(),
            KeyCode::Down | KeyCode::Tab => self.daily_log_state.next_field(),
            KeyCode::Char(c) => self.daily_log_state.input_char(c),
            KeyCode::Backspace => self.daily_log_state.delete_char(),
            KeyCode::Enter => self.submit_daily_log(),
            _ => {}
        }
    }

    fn submit_assessment(&mut self) {
        let input = match self.form_state.to_input() {
            Ok(input) => input,
            Err(e) => {
                self.form_state.error_message = Some(e);
                return;
            }
        };

        if !self.prediction_service.registry().is_ready() {
            self.form_state.error_message =
                Some("No prediction model is loaded. Check the model directory.".to_string());
            return;
        }

        self.screen = Screen::Result;
        self.result_state = ResultState::Running {
            phase: PredictionPhase::Mapping,
            progress: 0.0,
        };
        self.phase_started_at = Some(Instant::now());

        let worker = AssessmentWorker::spawn(
            Arc::clone(&self.prediction_service),
            self.caller.clone(),
            input,
        );
        self.pending_worker = Some(worker);

        self.form_state.clear_sensitive();
    }

    fn prefill_from_logs(&mut self) {
        let Some(user_id) = self.caller.user_id() else {
            self.form_state.error_message =
                Some("Daily logs need an identified session".to_string());
            return;
        };
        match self
            .health_log_service
            .input_from_recent_logs(user_id, DEFAULT_LOG_WINDOW)
        {
            Ok(summary) if summary.is_empty() => {
                self.form_state.error_message = Some("No daily logs recorded yet".to_string());
            }
            Ok(summary) => {
                self.form_state.prefill(&summary);
            }
            Err(e) => {
                tracing::error!("Failed to summarize daily logs: {e}");
                self.form_state.error_message = Some("Could not read daily logs".to_string());
            }
        }
    }

    fn submit_daily_log(&mut self) {
        let Some(user_id) = self.caller.user_id().map(str::to_string) else {
            return;
        };
        let (date, entry) = match self.daily_log_state.to_entry() {
            Ok(parsed) => parsed,
            Err(e) => {
                self.daily_log_state.set_error(e);
                return;
            }
        };

        match self.health_log_service.add(&user_id, date, entry) {
            Ok(_) => {
                self.daily_log_state = DailyLogState::new(Local::now().date_naive());
                self.daily_log_state.set_notice(format!("Saved log for {date}"));
                self.load_daily_logs();
            }
            Err(e) if e.is_user_facing() => self.daily_log_state.set_error(e.to_string()),
            Err(e) => {
                tracing::error!("Failed to save daily log: {e}");
                self.daily_log_state.set_error("Could not save the log");
            }
        }
    }

    fn load_daily_logs(&mut self) {
        let Some(user_id) = self.caller.user_id() else {
            return;
        };
        match self.health_log_service.recent(user_id, DAILY_LOG_LIST) {
            Ok(logs) => self.daily_log_state.recent = logs,
            Err(e) => {
                tracing::error!("Failed to load daily logs: {e}");
                self.daily_log_state.set_error("Could not load recent logs");
            }
        }
    }

    fn load_history(&mut self) {
        let Some(user_id) = self.caller.user_id() else {
            return;
        };
        let state = &mut self.history_state;
        state.error = None;

        match self
            .history_service
            .page(user_id, state.offset, HISTORY_PAGE_SIZE)
        {
            Ok(page) => {
                state.selected = state.selected.min(page.items.len().saturating_sub(1));
                state.page = Some(page);
            }
            Err(e) => {
                tracing::error!("Failed to load history: {e}");
                state.error = Some("Could not load history".to_string());
                return;
            }
        }

        match self.history_service.trend(user_id) {
            Ok(trend) => state.trend = trend,
            Err(e) => {
                tracing::error!("Failed to compute trend: {e}");
                state.trend = None;
            }
        }
    }

    fn go_to_history_page(&mut self, offset: Option<usize>) {
        if let Some(offset) = offset {
            self.history_state.offset = offset;
            self.history_state.selected = 0;
            self.load_history();
        }
    }

    fn delete_selected_record(&mut self) {
        let Some(user_id) = self.caller.user_id().map(str::to_string) else {
            return;
        };
        let Some(id) = self.history_state.selected_record().map(|r| r.id.clone()) else {
            return;
        };

        match self.history_service.delete(&user_id, &id) {
            Ok(true) => {
                tracing::info!("Deleted one history record");
                let remaining = self
                    .history_state
                    .page
                    .as_ref()
                    .map_or(0, |p| p.items.len().saturating_sub(1));
                if remaining == 0 {
                    self.history_state.offset =
                        self.history_state.offset.saturating_sub(HISTORY_PAGE_SIZE);
                }
            }
            Ok(false) => tracing::warn!("History record to delete was not found"),
            Err(e) => {
                tracing::error!("Failed to delete history record: {e}");
                self.history_state.error = Some("Could not delete the record".to_string());
                return;
            }
        }
        self.load_history();
    }

    fn update_dashboard_state(&mut self) {
        let registry = self.prediction_service.registry();
        let state = &mut self.dashboard_state;
        state.models_ready = registry.is_ready();
        state.models_verified = registry.is_verified();
        state.loaded_models = registry.model_ids();
        state.advisor_configured = self.prediction_service.has_advisor();
        state.user_id = self.caller.user_id().map(str::to_string);

        let Some(user_id) = self.caller.user_id() else {
            self.recent_summary = RecentSummary::default();
            return;
        };

        match self.history_service.count(user_id) {
            Ok(count) => state.history_count = count,
            Err(e) => tracing::error!("Failed to count history: {e}"),
        }
        match self.health_log_service.recent(user_id, DEFAULT_LOG_WINDOW) {
            Ok(logs) => state.log_count = logs.len(),
            Err(e) => tracing::error!("Failed to load daily logs: {e}"),
        }

        self.recent_summary = match self.history_service.recent(user_id, DASHBOARD_RECENT) {
            Ok(records) => {
                let mut summary = RecentSummary {
                    total: records.len(),
                    latest_risk: records.first().map(|r| r.risk_probability),
                    ..RecentSummary::default()
                };
                for record in &records {
                    match record.result {
                        RiskClass::Healthy => summary.healthy += 1,
                        RiskClass::Prediabetic => summary.prediabetic += 1,
                        RiskClass::Diabetic => summary.diabetic += 1,
                    }
                }
                summary
            }
            Err(e) => {
                tracing::error!("Failed to load recent history: {e}");
                RecentSummary::default()
            }
        };
    }
}

/// `(floor, target, time constant)` of the progress bar for each phase.
fn phase_window(phase: PredictionPhase) -> (f64, f64, f64) {
    match phase {
        PredictionPhase::Mapping => (0.0, 0.10, 0.3),
        PredictionPhase::Predicting => (0.10, 0.45, 0.8),
        PredictionPhase::Explaining => (0.45, 0.55, 0.8),
        PredictionPhase::Advising => (0.55, 0.90, 5.0),
        PredictionPhase::Saving => (0.90, 0.98, 0.5),
    }
}
