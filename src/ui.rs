pub mod charting;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(app.state).render(app, f);
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

pub struct TypingView<'a>(pub &'a App);

impl Widget for TypingView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let app = self.0;
        let exercise = &app.current.exercise;
        let chars: Vec<char> = exercise.text.chars().collect();
        let cursor = app.cursor().min(chars.len());

        let green_bold_style = bold().fg(Color::Green);
        let red_bold_style = bold().fg(Color::Red).add_modifier(Modifier::UNDERLINED);
        let underlined_dim_bold_style = dim_bold().add_modifier(Modifier::UNDERLINED);

        let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let prompt_width = exercise.text.width();
        let prompt_occupied_lines = if prompt_width <= max_chars_per_line as usize {
            1
        } else {
            ((prompt_width as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
        };
        let padding = area.height.saturating_sub(prompt_occupied_lines + 4) / 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(padding),
                Constraint::Length(1), // title
                Constraint::Length(1), // timer and live stats
                Constraint::Length(1),
                Constraint::Length(prompt_occupied_lines),
                Constraint::Min(0),
                Constraint::Length(1), // legend
            ])
            .split(area);

        let title = match app.current.level {
            Some(ref level) => format!("{level} / {}", exercise.title),
            None => exercise.title.clone(),
        };
        Paragraph::new(Span::styled(title, bold().fg(Color::Magenta)))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        let status = match app.live() {
            Some((metrics, remaining)) if app.has_started() => format!(
                "{remaining:.1}s   {} wpm   {}% acc",
                metrics.wpm, metrics.accuracy
            ),
            _ => String::from("start typing to begin"),
        };
        Paragraph::new(Span::styled(status, dim_bold()))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        let mut spans = vec![Span::styled(
            chars[..cursor].iter().collect::<String>(),
            green_bold_style,
        )];

        if let Some(&next) = chars.get(cursor) {
            let (shown, style) = if app.last_was_error() {
                (if next == ' ' { '·' } else { next }, red_bold_style)
            } else {
                (next, underlined_dim_bold_style)
            };
            spans.push(Span::styled(shown.to_string(), style));
            spans.push(Span::styled(
                chars[cursor + 1..].iter().collect::<String>(),
                dim_bold(),
            ));
        }

        Paragraph::new(Line::from(spans))
            .alignment(if prompt_occupied_lines == 1 {
                // when the prompt is small enough to fit on one line
                // centering the text gives a nice zen feeling
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: true })
            .render(chunks[4], buf);

        Paragraph::new(Span::styled("(←) retry / (→) new / (esc)ape", italic()))
            .render(chunks[6], buf);
    }
}

pub struct ResultsView<'a>(pub &'a App);

impl Widget for ResultsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let app = self.0;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(1),    // chart
                Constraint::Length(1), // stats
                Constraint::Length(1), // save status
                Constraint::Length(1), // padding
                Constraint::Length(1), // legend
            ])
            .split(area);

        let progress = app
            .trainer
            .profiles()
            .progress(&app.settings.owner_id)
            .unwrap_or_default();
        let points = charting::indexed(progress.wpm.iter().map(|p| p.value));
        let (sessions, highest_wpm) = charting::compute_chart_params(&points);

        let datasets = vec![Dataset::default()
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Line)
            .data(&points)];

        Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("session")
                    .bounds([1.0, sessions])
                    .labels(vec![
                        Span::styled("1", bold()),
                        Span::styled(charting::format_label(sessions), bold()),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("wpm")
                    .bounds([0.0, highest_wpm])
                    .labels(vec![
                        Span::styled("0", bold()),
                        Span::styled(charting::format_label(highest_wpm), bold()),
                    ]),
            )
            .render(chunks[0], buf);

        if let Some(metrics) = app.final_metrics {
            Paragraph::new(Span::styled(
                format!(
                    "{} wpm   {}% acc   {:.1}s   {} errors",
                    metrics.wpm, metrics.accuracy, metrics.elapsed, metrics.errors
                ),
                bold(),
            ))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
        }

        let (saved, saved_style) = if app.recorded {
            ("saved to profile", Style::default().fg(Color::Cyan))
        } else if app.current.exercise.is_sentinel() {
            ("nothing to save", Style::default().add_modifier(Modifier::DIM))
        } else {
            ("not saved - (s) to retry", Style::default().fg(Color::Red))
        };
        Paragraph::new(Span::styled(saved, saved_style.add_modifier(Modifier::ITALIC)))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        Paragraph::new(Span::styled(
            "(r)etry / (n)ew / (p)rofile / (esc)ape",
            italic(),
        ))
        .render(chunks[4], buf);
    }
}

pub struct ProfileView<'a>(pub &'a App);

impl Widget for ProfileView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let app = self.0;
        let owner = &app.settings.owner_id;
        let profiles = app.trainer.profiles();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(4), // aggregates
                Constraint::Min(1),    // recent sessions
                Constraint::Length(1), // legend
            ])
            .split(area);

        let stats = profiles.stats(owner).unwrap_or_default();
        let header = Text::from(vec![
            Line::from(Span::styled(format!("profile: {owner}"), bold().fg(Color::Magenta))),
            Line::from(format!(
                "best {:.1} wpm   average {:.2} wpm   accuracy {:.2}%",
                stats.best_wpm, stats.average_wpm, stats.accuracy
            )),
            Line::from(format!(
                "{} exercises completed   {:.0}s practiced",
                stats.exercises_completed, stats.total_time
            )),
        ]);
        Paragraph::new(header).render(chunks[0], buf);

        let recent = profiles
            .recent_sessions(owner, app.settings.recent_limit)
            .unwrap_or_default();
        let lines: Vec<Line> = if recent.is_empty() {
            vec![Line::from(Span::styled("no sessions yet", italic()))]
        } else {
            recent
                .iter()
                .map(|s| {
                    Line::from(format!(
                        "{}  {:<8} {:>6.1} wpm {:>6.1}% {:>7.1}s",
                        s.timestamp.format("%Y-%m-%d %H:%M"),
                        s.exercise_id,
                        s.wpm,
                        s.accuracy,
                        s.time_elapsed
                    ))
                })
                .collect()
        };
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(chunks[1], buf);

        Paragraph::new(Span::styled("(b)ack / (r)etry / (n)ew / (esc)ape", italic()))
            .render(chunks[2], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppState, Settings};
    use kasongo::{
        config::Config, exercise::ExerciseManager, profile::MemoryProfileStore,
        store::InMemorySessionStore, trainer::Trainer,
    };
    use std::sync::Arc;

    fn create_test_app(prompt: &str) -> App {
        let trainer = Trainer::new(
            ExerciseManager::builtin(),
            Arc::new(InMemorySessionStore::default()),
            Box::new(MemoryProfileStore::new()),
        );
        let config = Config {
            owner_id: "tester".into(),
            ..Config::default()
        };
        App::new(trainer, Settings::new(&config, Some(prompt.to_string())))
    }

    fn rendered<W: Widget>(widget: W, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        widget.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_typing_view_before_start() {
        let app = create_test_app("hello world");
        let screen = rendered(TypingView(&app), 80, 24);

        assert!(screen.contains("hello world"));
        assert!(screen.contains("start typing to begin"));
        assert!(screen.contains("Custom Text"));
    }

    #[test]
    fn test_typing_view_mid_session() {
        let mut app = create_test_app("hello world");
        app.type_char('h');
        app.type_char('x');

        let screen = rendered(TypingView(&app), 80, 24);
        assert!(screen.contains("hello world"));
        assert!(screen.contains("wpm"));
    }

    #[test]
    fn test_typing_view_wraps_long_prompt() {
        let app = create_test_app(&"lorem ipsum ".repeat(20));
        let screen = rendered(TypingView(&app), 40, 24);
        assert!(screen.contains("lorem"));
    }

    #[test]
    fn test_results_view_shows_metrics() {
        let mut app = create_test_app("hi");
        app.type_char('h');
        app.type_char('i');
        assert_eq!(app.state, AppState::Results);

        let screen = rendered(ResultsView(&app), 80, 24);
        assert!(screen.contains("100% acc"));
        assert!(screen.contains("saved to profile"));
        assert!(screen.contains("(p)rofile"));
    }

    #[test]
    fn test_results_view_sentinel_has_nothing_to_save() {
        let trainer = Trainer::new(
            ExerciseManager::new(Default::default()),
            Arc::new(InMemorySessionStore::default()),
            Box::new(MemoryProfileStore::new()),
        );
        let mut app = App::new(trainer, Settings::new(&Config::default(), None));
        assert!(app.current.exercise.is_sentinel());

        app.type_char('a');
        assert_eq!(app.state, AppState::Results);

        let screen = rendered(ResultsView(&app), 80, 24);
        assert!(screen.contains("nothing to save"));
        assert!(!screen.contains("(s) to retry"));
    }

    #[test]
    fn test_profile_view_lists_sessions() {
        let mut app = create_test_app("ok");
        app.type_char('o');
        app.type_char('k');

        let screen = rendered(ProfileView(&app), 100, 24);
        assert!(screen.contains("profile: tester"));
        assert!(screen.contains("1 exercises completed"));
        assert!(screen.contains("custom"));
    }

    #[test]
    fn test_profile_view_empty() {
        let app = create_test_app("ok");
        let screen = rendered(ProfileView(&app), 80, 24);
        assert!(screen.contains("no sessions yet"));
    }

    #[test]
    fn test_small_area_does_not_panic() {
        let app = create_test_app("hello");
        let _ = rendered(TypingView(&app), 20, 5);
        let _ = rendered(ResultsView(&app), 20, 5);
        let _ = rendered(ProfileView(&app), 20, 5);
    }
}
