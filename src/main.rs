use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph};

use form_forecast::dashboard::{DashboardState, Focus};
use form_forecast::forecast_context::{FileSource, ForecastContext, ForecastSource, average};
use form_forecast::observation::{Metric, Target};
use form_forecast::predictor::PredictionRecord;
use form_forecast::settings::Settings;
use form_forecast::synthetic::SyntheticSource;

const TREND_MATCHES: usize = 20;
const COMPARE_MATCHES: usize = 10;

type Forecast = form_forecast::Result<Option<PredictionRecord>>;

/// Terminal dashboard for next-match player forecasts.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Run on a generated season with freshly trained models.
    #[arg(long)]
    demo: bool,
    /// Seed for --demo.
    #[arg(long, default_value_t = 2024)]
    seed: u64,
    /// Observation CSV (overrides FF_DATA_PATH).
    #[arg(long)]
    data: Option<PathBuf>,
    /// Model artifact directory (overrides FF_MODELS_DIR).
    #[arg(long)]
    models: Option<PathBuf>,
}

struct App<S: ForecastSource + Clone> {
    state: DashboardState,
    source: S,
    ctx: Option<ForecastContext<S>>,
    should_quit: bool,
    help_overlay: bool,
}

impl<S: ForecastSource + Clone> App<S> {
    fn new(source: S) -> Self {
        let mut app = Self {
            state: DashboardState::new(),
            source,
            ctx: None,
            should_quit: false,
            help_overlay: false,
        };
        app.reload();
        app
    }

    fn reload(&mut self) {
        let result = if let Some(ctx) = self.ctx.as_mut() {
            ctx.refresh()
        } else {
            match ForecastContext::load(self.source.clone()) {
                Ok(ctx) => {
                    self.ctx = Some(ctx);
                    Ok(())
                }
                Err(err) => Err(err),
            }
        };
        match (result, &self.ctx) {
            (Ok(()), Some(ctx)) => {
                self.state
                    .set_roster(DashboardState::roster_from_store(ctx.store()));
                let msg = format!(
                    "loaded {} rows at {}",
                    ctx.store().len(),
                    ctx.loaded_at().format("%H:%M:%S")
                );
                self.state.push_log(format!("[INFO] {msg}"));
                self.state.set_status(msg);
            }
            (Ok(()), None) => {}
            (Err(err), _) => {
                self.state.push_log(format!("[WARN] {err}"));
                self.state.set_status(format!("load failed: {err}"));
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                if self.help_overlay {
                    self.help_overlay = false;
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => self.state.cycle_focus(),
            KeyCode::Char('c') | KeyCode::Char('C') => self.state.toggle_compare(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.reload(),
            KeyCode::Char('?') => self.help_overlay = !self.help_overlay,
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    settings.override_sources(args.data, None);
    if let Some(models) = args.models {
        settings.models_dir = models;
    }
    settings.configure_threads();

    if args.demo {
        let mut source = SyntheticSource::new(args.seed);
        source.spec = settings.feature_spec.clone();
        source.trainer = settings.trainer_config();
        run_terminal(source)
    } else {
        run_terminal(FileSource::from_settings(&settings))
    }
}

fn run_terminal<S: ForecastSource + Clone>(source: S) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(source);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend, S: ForecastSource + Clone>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui<S: ForecastSource + Clone>(frame: &mut Frame, app: &App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_body(frame, chunks[1], app);

    let footer = Paragraph::new(footer_text(&app.state))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.help_overlay {
        let area = frame.size();
        render_help_overlay(frame, area);
    }
}

fn header_text<S: ForecastSource + Clone>(app: &App<S>) -> String {
    let compare = if app.state.compare { "compare" } else { "single" };
    format!(
        "FORM FORECAST | {} | {} | {}",
        app.source.describe(),
        compare,
        app.state.status
    )
}

fn footer_text(state: &DashboardState) -> String {
    let focus = match state.focus {
        Focus::Teams => "teams",
        Focus::Players => "players",
        Focus::Rival => "rival",
    };
    format!("j/k Move | Tab Focus ({focus}) | c Compare | r Reload | ? Help | q Quit")
}

fn render_body<S: ForecastSource + Clone>(frame: &mut Frame, area: Rect, app: &App<S>) {
    let mut constraints = vec![Constraint::Length(22), Constraint::Length(26), Constraint::Min(30)];
    if app.state.compare {
        constraints.push(Constraint::Length(26));
    }
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let state = &app.state;
    let teams: Vec<String> = state.teams().iter().map(|t| t.to_string()).collect();
    render_picker(
        frame,
        columns[0],
        "Teams",
        &teams,
        state.team_index(),
        state.focus == Focus::Teams,
    );
    render_picker(
        frame,
        columns[1],
        "Players",
        state.players(),
        state.player_index(),
        state.focus == Focus::Players,
    );

    let middle = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(6)])
        .split(columns[2]);

    let Some(ctx) = app.ctx.as_ref() else {
        let empty = Paragraph::new("No data loaded. Press r to retry.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title("Forecast").borders(Borders::ALL));
        frame.render_widget(empty, columns[2]);
        return;
    };

    let player = state.selected_player();
    let record = player.map(|p| ctx.predict_player(p));
    let forecast = Paragraph::new(forecast_text(player, record.as_ref()))
        .block(Block::default().title("Next match").borders(Borders::ALL));
    frame.render_widget(forecast, middle[0]);
    let predicted_xg = record
        .as_ref()
        .and_then(|res| res.as_ref().ok())
        .and_then(Option::as_ref)
        .map(|rec| rec.get(Target::Xg));
    render_trend(frame, middle[1], ctx, player, predicted_xg);

    if state.compare {
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(45), Constraint::Min(8)])
            .split(columns[3]);
        render_picker(
            frame,
            right[0],
            "Rival",
            state.rivals(),
            state.rival_index(),
            state.focus == Focus::Rival,
        );
        let table = Paragraph::new(compare_text(ctx, player, state.selected_rival()))
            .block(Block::default().title("Head to head").borders(Borders::ALL));
        frame.render_widget(table, right[1]);
    }
}

fn render_picker(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    items: &[String],
    selected: usize,
    focused: bool,
) {
    let visible = area.height.saturating_sub(2) as usize;
    let (start, end) = visible_range(selected, items.len(), visible);
    let lines: Vec<Line> = items[start..end]
        .iter()
        .enumerate()
        .map(|(offset, name)| {
            let style = if start + offset == selected {
                let base = Style::default().add_modifier(Modifier::REVERSED);
                if focused { base.fg(Color::Yellow) } else { base }
            } else {
                Style::default()
            };
            Line::from(Span::styled(name.clone(), style))
        })
        .collect();
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let widget = Paragraph::new(lines).block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(border),
    );
    frame.render_widget(widget, area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn forecast_text(player: Option<&str>, record: Option<&Forecast>) -> String {
    let (Some(player), Some(record)) = (player, record) else {
        return "Select a player".to_string();
    };
    match record {
        Ok(Some(record)) => {
            let mut lines = vec![format!(
                "{} (as of {}, {} matches)",
                record.player_id, record.as_of, record.history_used
            )];
            for target in Target::ALL {
                lines.push(format!("  {:<9} {:>7.2}", target.name(), record.get(target)));
            }
            lines.join("\n")
        }
        Ok(None) => format!("{player}: not enough played matches"),
        Err(err) => format!("{player}: {err}"),
    }
}

fn render_trend<S: ForecastSource>(
    frame: &mut Frame,
    area: Rect,
    ctx: &ForecastContext<S>,
    player: Option<&str>,
    predicted: Option<f64>,
) {
    let block = Block::default().title("xG trend").borders(Borders::ALL);
    let Some(player) = player else {
        frame.render_widget(block, area);
        return;
    };
    let recent = ctx.recent_history(player, TREND_MATCHES);
    if recent.is_empty() {
        frame.render_widget(Paragraph::new("No played matches").block(block), area);
        return;
    }

    let points: Vec<(f64, f64)> = recent
        .iter()
        .enumerate()
        .map(|(i, obs)| (i as f64, obs.xg))
        .collect();
    let next_x = recent.len() as f64;
    let prediction_line: Vec<(f64, f64)> = predicted
        .map(|y| vec![(0.0, y), (next_x, y)])
        .unwrap_or_default();

    let y_max = points
        .iter()
        .map(|(_, y)| *y)
        .chain(predicted)
        .fold(0.1_f64, f64::max)
        * 1.2;

    let mut datasets = vec![
        Dataset::default()
            .name("xG")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&points),
    ];
    if !prediction_line.is_empty() {
        datasets.push(
            Dataset::default()
                .name("next")
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Red))
                .data(&prediction_line),
        );
    }

    let first = recent.first().map(|o| o.match_date.to_string()).unwrap_or_default();
    let last = recent.last().map(|o| o.match_date.to_string()).unwrap_or_default();
    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, next_x])
                .labels(vec![Span::raw(first), Span::raw(last)]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max])
                .labels(vec![Span::raw("0"), Span::raw(format!("{y_max:.2}"))]),
        );
    frame.render_widget(chart, area);
}

fn compare_text<S: ForecastSource>(
    ctx: &ForecastContext<S>,
    player: Option<&str>,
    rival: Option<&str>,
) -> String {
    let (Some(player), Some(rival)) = (player, rival) else {
        return "Pick a player and a rival".to_string();
    };
    let h2h = match ctx.compare(player, rival) {
        Ok(h2h) => h2h,
        Err(err) => return err.to_string(),
    };
    let mine = ctx.recent_history(player, COMPARE_MATCHES);
    let theirs = ctx.recent_history(rival, COMPARE_MATCHES);

    let mut lines = vec![format!("vs {rival}"), format!("last {COMPARE_MATCHES} avg / next delta")];
    for metric in [Metric::Xg, Metric::Xa, Metric::Passes, Metric::Dribbles] {
        let avg = match (average(&mine, metric), average(&theirs, metric)) {
            (Some(a), Some(b)) => format!("{:+.2}", b - a),
            _ => "-".to_string(),
        };
        let next = metric_target(metric)
            .and_then(|t| h2h.delta(t))
            .map(|d| format!("{d:+.2}"))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!("{:<9}{avg:>7} {next:>7}", metric.label()));
    }
    lines.join("\n")
}

fn metric_target(metric: Metric) -> Option<Target> {
    Target::ALL.into_iter().find(|t| t.metric() == metric)
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(50, 50, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Form Forecast - Help",
        "",
        "  j/k or ↑/↓   Move selection",
        "  Tab / l      Cycle focus (teams, players, rival)",
        "  c            Toggle head-to-head",
        "  r            Reload data and models",
        "  ?            Toggle help",
        "  q / Esc      Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
