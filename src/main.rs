mod ui;

use kasongo::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    exercise::{Exercise, ExerciseManager},
    logging,
    metrics::Metrics,
    profile::SqliteProfileStore,
    runtime::{ChannelEventSource, Input, Runner, TrainerEvent},
    session::KeystrokeResult,
    store::InMemorySessionStore,
    trainer::{ExerciseSelection, StartedSession, Trainer},
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tracing::{info, warn};

pub const TICK_RATE_MS: u64 = 100;
const CUSTOM_EXERCISE_ID: &str = "custom";

/// cyberpunk typing trainer with per-keystroke scoring and progress tracking
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A typing trainer that scores every keystroke against practice texts from a leveled exercise catalog and keeps a per-user history of speed and accuracy."
)]
pub struct Cli {
    /// profile to record results under
    #[clap(short = 'u', long = "user")]
    owner_id: Option<String>,

    /// only practice exercises from this level
    #[clap(short = 'l', long)]
    level: Option<String>,

    /// practice one exercise by id (requires --level)
    #[clap(short = 'e', long = "exercise", requires = "level")]
    exercise_id: Option<String>,

    /// custom text to practice instead of the catalog
    #[clap(short = 'p', long, conflicts_with = "exercise_id")]
    prompt: Option<String>,

    /// exercise catalog file (created with the default exercises if missing)
    #[clap(long)]
    catalog: Option<PathBuf>,

    /// profile database file
    #[clap(long = "db")]
    database: Option<PathBuf>,

    /// print the exercise catalog and exit
    #[clap(long)]
    list: bool,

    /// print profile statistics and recent sessions and exit
    #[clap(long)]
    stats: bool,

    /// write the profile's session history as csv and exit
    #[clap(long, value_name = "CSV")]
    export: Option<PathBuf>,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Layer command-line flags over the stored config
    fn merge_into(&self, mut config: Config) -> Config {
        if let Some(ref owner) = self.owner_id {
            config.owner_id = owner.clone();
        }
        if self.level.is_some() {
            config.level = self.level.clone();
            config.exercise_id = self.exercise_id.clone();
        }
        if self.catalog.is_some() {
            config.catalog_path = self.catalog.clone();
        }
        if self.database.is_some() {
            config.database_path = self.database.clone();
        }
        config
    }

    fn is_command(&self) -> bool {
        self.list || self.stats || self.export.is_some()
    }
}

/// Exercise choice resolved from config and flags
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub owner_id: String,
    pub selection: ExerciseSelection,
    pub custom_prompt: Option<String>,
    pub recent_limit: usize,
}

impl Settings {
    fn new(config: &Config, custom_prompt: Option<String>) -> Self {
        let selection = match (&config.level, &config.exercise_id) {
            (Some(level), Some(id)) => ExerciseSelection::Exact {
                level: level.clone(),
                id: id.clone(),
            },
            (Some(level), None) => ExerciseSelection::Level(level.clone()),
            _ => ExerciseSelection::Random,
        };

        Self {
            owner_id: config.owner_id.clone(),
            selection,
            custom_prompt,
            recent_limit: config.recent_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
    Profile,
}

pub struct App {
    pub trainer: Trainer,
    pub settings: Settings,
    pub state: AppState,
    pub current: StartedSession,
    pub last_result: Option<KeystrokeResult>,
    pub final_metrics: Option<Metrics>,
    pub recorded: bool,
}

impl App {
    pub fn new(trainer: Trainer, settings: Settings) -> Self {
        let current = Self::pick(&trainer, &settings);
        Self {
            trainer,
            settings,
            state: AppState::Typing,
            current,
            last_result: None,
            final_metrics: None,
            recorded: false,
        }
    }

    fn pick(trainer: &Trainer, settings: &Settings) -> StartedSession {
        match settings.custom_prompt {
            Some(ref text) => trainer.start_with_exercise(
                &settings.owner_id,
                Exercise::new(CUSTOM_EXERCISE_ID, "Custom Text", text.as_str()),
                None,
            ),
            None => trainer.start_session(&settings.owner_id, &settings.selection),
        }
    }

    /// Start over; `same_exercise` retries the current text
    pub fn reset(&mut self, same_exercise: bool) {
        self.trainer.abandon(&self.current.session_id);
        self.current = if same_exercise {
            self.trainer.start_with_exercise(
                &self.settings.owner_id,
                self.current.exercise.clone(),
                self.current.level.clone(),
            )
        } else {
            Self::pick(&self.trainer, &self.settings)
        };
        self.state = AppState::Typing;
        self.last_result = None;
        self.final_metrics = None;
        self.recorded = false;
    }

    pub fn has_started(&self) -> bool {
        self.trainer
            .with_session(&self.current.session_id, |s| s.has_started())
            .unwrap_or(true)
    }

    pub fn cursor(&self) -> usize {
        self.last_result.map_or(0, |r| r.cursor)
    }

    pub fn last_was_error(&self) -> bool {
        self.last_result.is_some_and(|r| r.error)
    }

    /// Live metrics and advisory seconds left, while the session is running
    pub fn live(&self) -> Option<(Metrics, f64)> {
        self.trainer
            .with_session(&self.current.session_id, |s| (s.metrics(), s.time_remaining()))
            .ok()
    }

    pub fn type_char(&mut self, c: char) {
        if self.state != AppState::Typing {
            return;
        }
        let id = self.current.session_id.clone();

        if !self.has_started() {
            match self.trainer.begin(&id) {
                Ok(None) => {}
                // nothing to type: empty texts finish as soon as they start
                Ok(Some(completion)) => {
                    self.final_metrics = Some(completion.metrics);
                    self.recorded = completion.recorded;
                    self.state = AppState::Results;
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "could not start session");
                    return;
                }
            }
        }

        match self.trainer.keystroke(&id, c) {
            Ok(outcome) => {
                self.last_result = Some(outcome.result);
                if let Some(metrics) = outcome.metrics {
                    self.final_metrics = Some(metrics);
                    self.recorded = outcome.recorded;
                    self.state = AppState::Results;
                }
            }
            Err(e) => warn!(error = %e, "keystroke rejected"),
        }
    }

    /// Retry persisting a finished session that the profile store refused
    pub fn retry_record(&mut self) {
        if self.final_metrics.is_some() && !self.recorded {
            self.recorded = self
                .trainer
                .record_pending(&self.current.session_id)
                .unwrap_or(false);
        }
    }

    /// Apply one decoded key to the current screen
    pub fn handle(&mut self, input: Input) {
        match (self.state, input) {
            (AppState::Typing, Input::Char(c)) => self.type_char(c),
            (AppState::Typing, Input::Left) => self.reset(true),
            (AppState::Typing, Input::Right) => self.reset(false),
            (AppState::Results | AppState::Profile, Input::Char('r')) => self.reset(true),
            (AppState::Results | AppState::Profile, Input::Char('n')) => self.reset(false),
            (AppState::Results, Input::Char('p')) => self.state = AppState::Profile,
            (AppState::Results, Input::Char('s')) => self.retry_record(),
            (AppState::Profile, Input::Char('b') | Input::Back) => self.state = AppState::Results,
            _ => {}
        }
    }
}

fn build_trainer(config: &Config) -> Result<Trainer, Box<dyn Error>> {
    let catalog = ExerciseManager::load(config.resolved_catalog_path());
    let profiles = SqliteProfileStore::open(config.resolved_database_path())?;
    let sessions = InMemorySessionStore::new(Duration::from_secs(config.session_ttl_secs));

    Ok(Trainer::new(catalog, Arc::new(sessions), Box::new(profiles)))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_store = FileConfigStore::new();
    let config = cli.merge_into(config_store.load());

    if cli.save_config {
        config_store.save(&config)?;
    }

    if cli.is_command() {
        logging::init_stderr();
        let trainer = build_trainer(&config)?;
        return run_command(&cli, &config, &trainer, &mut io::stdout());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(log_path) = AppDirs::log_path() {
        logging::init_file(&log_path)?;
    }
    info!(owner = %config.owner_id, "starting trainer");

    let trainer = build_trainer(&config)?;
    let mut app = App::new(trainer, Settings::new(&config, cli.prompt.clone()));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Non-interactive modes: list, stats, export
fn run_command<W: Write>(
    cli: &Cli,
    config: &Config,
    trainer: &Trainer,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    if cli.list {
        for level in trainer.catalog().levels() {
            writeln!(out, "{level}")?;
            for exercise in trainer.catalog().exercises_by_level(level) {
                writeln!(out, "  {:<6} {}", exercise.id, exercise.title)?;
            }
        }
    }

    if cli.stats {
        let profiles = trainer.profiles();
        let stats = profiles.stats(&config.owner_id)?;
        writeln!(out, "profile: {}", config.owner_id)?;
        writeln!(
            out,
            "best {:.1} wpm   avg {:.2} wpm   acc {:.2}%   {} completed   {:.0}s practiced",
            stats.best_wpm,
            stats.average_wpm,
            stats.accuracy,
            stats.exercises_completed,
            stats.total_time
        )?;
        for session in profiles.recent_sessions(&config.owner_id, config.recent_limit)? {
            writeln!(
                out,
                "  {}  {:<8} {:>6.1} wpm {:>6.1}% {:>7.1}s",
                session.timestamp.format("%Y-%m-%d %H:%M"),
                session.exercise_id,
                session.wpm,
                session.accuracy,
                session.time_elapsed
            )?;
        }
    }

    if let Some(ref path) = cli.export {
        let written = trainer.profiles().export_csv(&config.owner_id, path)?;
        writeln!(out, "exported {written} sessions to {}", path.display())?;
    }

    Ok(())
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        ChannelEventSource::terminal(),
        Duration::from_millis(TICK_RATE_MS),
    );

    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        match runner.step() {
            TrainerEvent::Tick => {
                if app.state == AppState::Typing && app.has_started() {
                    terminal.draw(|f| ui::draw(app, f))?;
                }
            }
            TrainerEvent::Resize => {
                terminal.draw(|f| ui::draw(app, f))?;
            }
            TrainerEvent::Input(Input::Quit) => break,
            TrainerEvent::Input(input) => {
                app.handle(input);
                terminal.draw(|f| ui::draw(app, f))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasongo::profile::MemoryProfileStore;

    fn test_app(prompt: Option<&str>) -> App {
        let trainer = Trainer::new(
            ExerciseManager::builtin(),
            Arc::new(InMemorySessionStore::default()),
            Box::new(MemoryProfileStore::new()),
        );
        let config = Config {
            owner_id: "tester".into(),
            ..Config::default()
        };
        App::new(trainer, Settings::new(&config, prompt.map(str::to_string)))
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["kasongo"]);

        assert_eq!(cli.owner_id, None);
        assert_eq!(cli.level, None);
        assert!(!cli.list);
        assert!(!cli.is_command());
    }

    #[test]
    fn test_cli_exercise_requires_level() {
        let result = Cli::try_parse_from(["kasongo", "-e", "b1"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["kasongo", "-l", "beginner", "-e", "b1"]).unwrap();
        assert_eq!(cli.exercise_id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["kasongo", "-u", "ada", "-l", "advanced", "--db", "/tmp/x.db"]);
        let stored = Config {
            owner_id: "bob".into(),
            level: Some("beginner".into()),
            exercise_id: Some("b1".into()),
            ..Config::default()
        };

        let merged = cli.merge_into(stored);
        assert_eq!(merged.owner_id, "ada");
        assert_eq!(merged.level.as_deref(), Some("advanced"));
        assert_eq!(merged.exercise_id, None);
        assert_eq!(merged.database_path, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_settings_selection_from_config() {
        let mut config = Config::default();
        assert_eq!(Settings::new(&config, None).selection, ExerciseSelection::Random);

        config.level = Some("beginner".into());
        assert_eq!(
            Settings::new(&config, None).selection,
            ExerciseSelection::Level("beginner".into())
        );

        config.exercise_id = Some("b3".into());
        assert_eq!(
            Settings::new(&config, None).selection,
            ExerciseSelection::Exact {
                level: "beginner".into(),
                id: "b3".into()
            }
        );
    }

    #[test]
    fn test_app_custom_prompt_flow() {
        let mut app = test_app(Some("hi"));

        assert_eq!(app.current.exercise.id, CUSTOM_EXERCISE_ID);
        assert!(!app.has_started());

        app.type_char('x');
        assert!(app.last_was_error());
        assert_eq!(app.cursor(), 0);

        app.type_char('h');
        app.type_char('i');
        assert_eq!(app.state, AppState::Results);
        assert!(app.recorded);

        let metrics = app.final_metrics.unwrap();
        assert_eq!(metrics.characters_typed, 2);
        assert_eq!(metrics.total_keystrokes, 3);

        let history = app.trainer.profiles().sessions("tester").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].exercise_id, CUSTOM_EXERCISE_ID);
    }

    #[test]
    fn test_app_ignores_typing_on_results() {
        let mut app = test_app(Some("a"));
        app.type_char('a');
        assert_eq!(app.state, AppState::Results);

        app.type_char('b');
        assert_eq!(app.final_metrics.unwrap().total_keystrokes, 1);
    }

    #[test]
    fn test_app_handle_screen_keys() {
        let mut app = test_app(Some("r"));
        app.handle(Input::Char('r'));
        assert_eq!(app.state, AppState::Results);

        app.handle(Input::Char('p'));
        assert_eq!(app.state, AppState::Profile);
        app.handle(Input::Back);
        assert_eq!(app.state, AppState::Results);

        app.handle(Input::Char('n'));
        assert_eq!(app.state, AppState::Typing);
        assert!(app.final_metrics.is_none());
    }

    #[test]
    fn test_app_empty_prompt_goes_to_results() {
        let mut app = test_app(Some(""));
        app.type_char('a');

        assert_eq!(app.state, AppState::Results);
        assert_eq!(app.final_metrics.unwrap().total_keystrokes, 0);
        assert!(app.recorded);
        assert_eq!(app.trainer.profiles().sessions("tester").unwrap().len(), 1);
    }

    #[test]
    fn test_app_reset_same_exercise() {
        let mut app = test_app(None);
        let exercise = app.current.exercise.clone();
        let first_id = app.current.session_id.clone();
        app.type_char('?');

        app.reset(true);

        assert_eq!(app.current.exercise, exercise);
        assert_ne!(app.current.session_id, first_id);
        assert_eq!(app.state, AppState::Typing);
        assert!(app.last_result.is_none());
        assert_eq!(app.trainer.sessions().len(), 1);
    }

    #[test]
    fn test_run_command_list() {
        let app = test_app(None);
        let cli = Cli::parse_from(["kasongo", "--list"]);
        let mut out = Vec::new();

        run_command(&cli, &Config::default(), &app.trainer, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("beginner\n"));
        assert!(text.contains("a3"));
        assert!(text.contains("Speed Challenge"));
    }

    #[test]
    fn test_run_command_stats() {
        let mut app = test_app(Some("ok"));
        app.type_char('o');
        app.type_char('k');

        let cli = Cli::parse_from(["kasongo", "--stats"]);
        let config = Config {
            owner_id: "tester".into(),
            ..Config::default()
        };
        let mut out = Vec::new();
        run_command(&cli, &config, &app.trainer, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("profile: tester"));
        assert!(text.contains("1 completed"));
        assert!(text.contains(CUSTOM_EXERCISE_ID));
    }
}
