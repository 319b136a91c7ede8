//! Full-screen control panel.
//!
//! Terminal rendition of the rig control panel: status indicators, motor
//! configuration fields, E-stop latch and release, encoder and HLFB
//! capture controls, a scrolling event log, and a fit chart of the last
//! capture.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction as LayoutDirection, Layout},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, Paragraph},
    Frame, Terminal,
};

use pitch_analysis::export::{self, RunRecord};
use pitch_analysis::sinefit::{self, FitReport};
use pitch_proto::{Direction, MotorCommand, Waveform};
use pitch_rig::Rig;

const PANEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Enter the alternate screen and run the panel until the user quits.
pub async fn run_panel(rig: Rig) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(rig);
    let res = run_app(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

/// Editable panel fields; Tab cycles through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    MaxSpeed,
    OpSpeed,
    Ramp,
    Direction,
    Waveform,
    ArmSamples,
    HlfbSamples,
    FileName,
}

impl Field {
    const ORDER: [Field; 8] = [
        Field::MaxSpeed,
        Field::OpSpeed,
        Field::Ramp,
        Field::Direction,
        Field::Waveform,
        Field::ArmSamples,
        Field::HlfbSamples,
        Field::FileName,
    ];

    fn next(self) -> Self {
        let i = Self::ORDER.iter().position(|&f| f == self).unwrap_or(0);
        Self::ORDER[(i + 1) % Self::ORDER.len()]
    }

    fn previous(self) -> Self {
        let i = Self::ORDER.iter().position(|&f| f == self).unwrap_or(0);
        Self::ORDER[(i + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// Indicator lamp states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lamp {
    Grey,
    Green,
    Orange,
    Red,
}

impl Lamp {
    fn color(self) -> Color {
        match self {
            Lamp::Grey => Color::DarkGray,
            Lamp::Green => Color::Green,
            Lamp::Orange => Color::Yellow,
            Lamp::Red => Color::Red,
        }
    }
}

enum View {
    Panel,
    Chart,
}

struct ChartData {
    points: Vec<(f64, f64)>,
    fitted: Vec<(f64, f64)>,
    report: FitReport,
}

struct App {
    rig: Rig,
    view: View,
    focus: Field,

    max_speed: String,
    op_speed: String,
    ramp: String,
    direction: Direction,
    waveform: Waveform,
    arm_samples: String,
    hlfb_samples: String,
    file_name: String,

    lamp_bus: Lamp,
    lamp_motor: Lamp,
    lamp_hlfb: Lamp,
    lamp_encoder: Lamp,

    log: Vec<String>,
    chart: Option<ChartData>,
}

impl App {
    fn new(rig: Rig) -> App {
        let config = rig.config();
        let max_speed = format!("{:.0}", config.max_rpm);
        let arm_samples = config.encoder_samples.to_string();
        let hlfb_samples = config.hlfb_samples.to_string();

        let mut app = App {
            rig,
            view: View::Panel,
            focus: Field::OpSpeed,
            max_speed,
            op_speed: String::new(),
            ramp: "50".to_string(),
            direction: Direction::Cw,
            waveform: Waveform::Sine,
            arm_samples,
            hlfb_samples,
            file_name: "run.csv".to_string(),
            lamp_bus: Lamp::Green,
            lamp_motor: Lamp::Grey,
            lamp_hlfb: Lamp::Grey,
            lamp_encoder: Lamp::Grey,
            log: Vec::new(),
            chart: None,
        };
        app.log(format!(
            "Panel ready (DEV_MODE {})",
            if app.rig.config().dev_mode { "on" } else { "off" }
        ));
        app
    }

    fn log(&mut self, message: impl Into<String>) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.log.push(format!("[{stamp}] {}", message.into()));
    }

    fn speed_limit_hz(&self) -> Option<f64> {
        self.max_speed.trim().parse::<f64>().ok().map(|rpm| rpm / 60.0)
    }

    fn focused_text(&mut self) -> Option<&mut String> {
        match self.focus {
            Field::MaxSpeed => Some(&mut self.max_speed),
            Field::OpSpeed => Some(&mut self.op_speed),
            Field::Ramp => Some(&mut self.ramp),
            Field::ArmSamples => Some(&mut self.arm_samples),
            Field::HlfbSamples => Some(&mut self.hlfb_samples),
            Field::FileName => Some(&mut self.file_name),
            Field::Direction | Field::Waveform => None,
        }
    }

    fn adjust_focused(&mut self, up: bool) {
        match self.focus {
            Field::Direction => {
                self.direction = match self.direction {
                    Direction::Cw => Direction::Ccw,
                    Direction::Ccw => Direction::Cw,
                };
            }
            Field::Waveform => {
                self.waveform = match (self.waveform, up) {
                    (Waveform::Sine, true) => Waveform::Square,
                    (Waveform::Square, true) => Waveform::Triangle,
                    (Waveform::Triangle, true) => Waveform::Sine,
                    (Waveform::Sine, false) => Waveform::Triangle,
                    (Waveform::Square, false) => Waveform::Sine,
                    (Waveform::Triangle, false) => Waveform::Square,
                };
            }
            Field::MaxSpeed => adjust_number(&mut self.max_speed, if up { 50.0 } else { -50.0 }),
            Field::OpSpeed => adjust_number(&mut self.op_speed, if up { 0.5 } else { -0.5 }),
            Field::Ramp => adjust_number(&mut self.ramp, if up { 1.0 } else { -1.0 }),
            Field::ArmSamples => adjust_number(&mut self.arm_samples, if up { 10.0 } else { -10.0 }),
            Field::HlfbSamples => {
                adjust_number(&mut self.hlfb_samples, if up { 10.0 } else { -10.0 })
            }
            Field::FileName => {}
        }
    }

    fn parse_motor_command(&mut self) -> Option<MotorCommand> {
        let Some(max_rpm) = self.max_speed.trim().parse::<f64>().ok().filter(|v| *v > 0.0)
        else {
            self.log("Set Max Speed first");
            return None;
        };
        self.rig.set_max_rpm(max_rpm);

        let Ok(speed_hz) = self.op_speed.trim().parse::<f64>() else {
            self.log("Set Op Speed first");
            return None;
        };
        let limit = max_rpm / 60.0;
        if speed_hz > limit {
            self.log(format!("Operating speed too high. Max allowed: {limit:.3} Hz"));
            return None;
        }

        let Ok(ramp) = self.ramp.trim().parse::<u8>() else {
            self.log("Ramp multiplier must be between 0 and 255");
            return None;
        };

        Some(MotorCommand {
            waveform: self.waveform,
            speed_hz,
            ramp,
            direction: self.direction,
        })
    }

    async fn do_start(&mut self) {
        let Some(cmd) = self.parse_motor_command() else {
            return;
        };
        self.log(format!(
            "Starting motor: {} Hz {} ramp {} {}",
            cmd.speed_hz, cmd.waveform, cmd.ramp, cmd.direction
        ));
        match self.rig.start(&cmd).await {
            Ok(speed) => {
                self.lamp_motor = Lamp::Green;
                self.log(format!("Motor started at {speed} Hz"));
            }
            Err(e) => self.log(format!("Start failed: {e}")),
        }
    }

    async fn do_stop(&mut self) {
        match self.rig.stop().await {
            Ok(()) => {
                self.lamp_motor = Lamp::Grey;
                self.log("Stop command sent");
            }
            Err(e) => self.log(format!("Stop failed: {e}")),
        }
    }

    async fn do_estop(&mut self) {
        match self.rig.emergency_stop().await {
            Ok(()) => {
                self.lamp_motor = Lamp::Red;
                self.log("E-STOP ENGAGED: motor power cut");
            }
            Err(e) => self.log(format!("E-stop failed: {e}")),
        }
    }

    fn do_release(&mut self) {
        if !self.rig.session().estop_engaged() {
            self.log("E-stop is not engaged");
            return;
        }
        match self.rig.release_estop() {
            Ok(()) => {
                self.lamp_motor = Lamp::Grey;
                self.log("E-stop released: panel re-enabled (motor remains stopped)");
            }
            Err(e) => self.log(format!("Release failed: {e}")),
        }
    }

    async fn do_read_position(&mut self) {
        match self.rig.read_position().await {
            Ok(position) => self.log(format!("Current position: {position}")),
            Err(e) => self.log(format!("Read position error: {e}")),
        }
    }

    async fn do_arm(&mut self) {
        let samples = match self.arm_samples.trim().parse::<usize>() {
            Ok(v) => v,
            Err(_) => {
                self.log("Arm samples must be a number");
                return;
            }
        };
        match self.rig.arm_encoder(samples).await {
            Ok(()) => {
                self.lamp_encoder = Lamp::Green;
                self.log(format!("Armed encoder for {samples} samples"));
            }
            Err(e) => self.log(format!("Arm encoder failed: {e}")),
        }
    }

    async fn do_download(&mut self) {
        self.log("Attempting to read encoder data...");
        match self.rig.download_encoder().await {
            Ok(count) => {
                self.lamp_encoder = Lamp::Green;
                self.log(format!("Retrieved {count} encoder samples"));
            }
            Err(e) => {
                self.log(format!("Read encoder failed: {e}"));
            }
        }
    }

    async fn do_capture_hlfb(&mut self) {
        let samples = match self.hlfb_samples.trim().parse::<usize>() {
            Ok(v) => v,
            Err(_) => {
                self.log("HLFB samples must be a number");
                return;
            }
        };
        self.lamp_hlfb = Lamp::Orange;
        self.log(format!("Capturing HLFB ({samples} samples)"));
        match self.rig.capture_hlfb(samples).await {
            Ok(count) => {
                self.lamp_hlfb = Lamp::Green;
                self.log(format!("Captured {count} HLFB samples"));
            }
            Err(e) => {
                self.lamp_hlfb = Lamp::Grey;
                self.log(format!("HLFB capture failed: {e}"));
            }
        }
    }

    fn do_save(&mut self) {
        let name = self.file_name.trim().to_string();
        if name.is_empty() {
            self.log("Set a file name first");
            return;
        }
        let path = if name.ends_with(".csv") {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("{name}.csv"))
        };

        let session = self.rig.session();
        if session.hlfb.is_empty() {
            self.log("Nothing to save; capture HLFB data first");
            return;
        }
        let encoder = (!session.encoder.is_empty()).then(|| session.encoder.clone());
        let record = RunRecord::new(session.last_speed_hz, session.hlfb.clone(), encoder);

        match export::save(&path, &record) {
            Ok(()) => self.log(format!("Saved CSV to {}", path.display())),
            Err(e) => self.log(format!("Save failed: {e}")),
        }
    }

    fn do_reset(&mut self) {
        self.rig.reset();
        let config = self.rig.config();
        self.max_speed = format!("{:.0}", config.max_rpm);
        self.op_speed.clear();
        self.ramp = "50".to_string();
        self.direction = Direction::Cw;
        self.waveform = Waveform::Sine;
        self.arm_samples = config.encoder_samples.to_string();
        self.hlfb_samples = config.hlfb_samples.to_string();
        self.lamp_hlfb = Lamp::Grey;
        self.lamp_encoder = Lamp::Grey;
        if !self.rig.session().estop_engaged() {
            self.lamp_motor = Lamp::Grey;
        }
        self.chart = None;
        self.log("State reset to defaults");
    }

    fn do_chart(&mut self) {
        let session = self.rig.session();
        let (series, label, scale) = if !session.hlfb.is_empty() {
            (&session.hlfb, "HLFB duty (%)", 0.01)
        } else if !session.encoder.is_empty() {
            (&session.encoder, "Encoder counts", 1.0)
        } else {
            self.log("Capture data first, then fit");
            return;
        };

        let sample_rate = self.rig.config().sample_rate_hz;
        let t: Vec<f64> = (0..series.len()).map(|i| i as f64 / sample_rate).collect();
        let y: Vec<f64> = series.iter().map(|&v| f64::from(v) * scale).collect();

        match sinefit::fit(&t, &y) {
            Ok(report) => {
                let points: Vec<(f64, f64)> = t.iter().copied().zip(y.iter().copied()).collect();
                let t_max = t.last().copied().unwrap_or(1.0);
                let fitted: Vec<(f64, f64)> = (0..200)
                    .map(|i| {
                        let ti = t_max * i as f64 / 199.0;
                        (ti, report.params.eval(ti))
                    })
                    .collect();

                self.log(format!(
                    "Fit ({label}): amp {:.4}, freq {:.4} rad/s, phase {:.4}, mean {:.4}",
                    report.params.amplitude,
                    report.params.frequency,
                    report.params.phase,
                    report.params.mean
                ));
                self.chart = Some(ChartData {
                    points,
                    fitted,
                    report,
                });
                self.view = View::Chart;
            }
            Err(e) => self.log(format!("Fit failed: {e}")),
        }
    }
}

fn adjust_number(text: &mut String, delta: f64) {
    let current: f64 = text.trim().parse().unwrap_or(0.0);
    let next = (current + delta).max(0.0);
    *text = if next.fract() == 0.0 {
        format!("{next:.0}")
    } else {
        format!("{next:.3}")
    };
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, &mut app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match app.view {
                    View::Chart => match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Esc | KeyCode::Char('g') => app.view = View::Panel,
                        _ => {}
                    },
                    View::Panel => {
                        if !handle_panel_key(&mut app, key.code).await {
                            return Ok(());
                        }
                    }
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

/// Returns false when the user quits.
async fn handle_panel_key(app: &mut App, code: KeyCode) -> bool {
    // The file name field takes every printable character while focused.
    if app.focus == Field::FileName {
        match code {
            KeyCode::Char(c) => {
                app.file_name.push(c);
                return true;
            }
            KeyCode::Backspace => {
                app.file_name.pop();
                return true;
            }
            KeyCode::Esc | KeyCode::Enter => {
                app.focus = Field::OpSpeed;
                return true;
            }
            KeyCode::Tab => {
                app.focus = app.focus.next();
                return true;
            }
            _ => return true,
        }
    }

    match code {
        KeyCode::Char('q') => return false,
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::BackTab => app.focus = app.focus.previous(),
        KeyCode::Up => app.adjust_focused(true),
        KeyCode::Down => app.adjust_focused(false),
        KeyCode::Left => app.adjust_focused(false),
        KeyCode::Right => app.adjust_focused(true),
        KeyCode::Backspace => {
            if let Some(text) = app.focused_text() {
                text.pop();
            }
        }
        KeyCode::Char(c @ ('0'..='9' | '.')) => {
            if let Some(text) = app.focused_text() {
                text.push(c);
            }
        }
        KeyCode::Char('s') => app.do_start().await,
        KeyCode::Char('x') => app.do_stop().await,
        KeyCode::Char('e') => app.do_estop().await,
        KeyCode::Char('r') => app.do_release(),
        KeyCode::Char('p') => app.do_read_position().await,
        KeyCode::Char('a') => app.do_arm().await,
        KeyCode::Char('d') => app.do_download().await,
        KeyCode::Char('c') => app.do_capture_hlfb().await,
        KeyCode::Char('v') => app.do_save(),
        KeyCode::Char('R') => app.do_reset(),
        KeyCode::Char('g') => app.do_chart(),
        _ => {}
    }
    true
}

fn ui(f: &mut Frame, app: &mut App) {
    match app.view {
        View::Panel => ui_panel(f, app),
        View::Chart => ui_chart(f, app),
    }
}

fn ui_panel(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(4),
            ]
            .as_ref(),
        )
        .split(f.size());

    let title = format!(
        "Pitch Master {PANEL_VERSION}{}",
        if app.rig.config().dev_mode {
            "  [DEV MODE]"
        } else {
            ""
        }
    );
    let header = Paragraph::new(title)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Control Panel"));
    f.render_widget(header, chunks[0]);

    f.render_widget(indicators(app), chunks[1]);

    let body = Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([Constraint::Length(46), Constraint::Min(0)].as_ref())
        .split(chunks[2]);

    let controls = Paragraph::new(control_lines(app)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Motor Configuration"),
    );
    f.render_widget(controls, body[0]);

    let log_height = body[1].height.saturating_sub(2) as usize;
    let start = app.log.len().saturating_sub(log_height);
    let items: Vec<ListItem> = app.log[start..]
        .iter()
        .map(|line| ListItem::new(line.as_str()))
        .collect();
    let log = List::new(items).block(Block::default().borders(Borders::ALL).title("Logs / Data"));
    f.render_widget(log, body[1]);

    let footer = Paragraph::new(
        "s: Start | x: Stop | e: E-STOP | r: Release | p: Position | a: Arm | d: Download\n\
         c: Capture HLFB | v: Save CSV | g: Fit Chart | R: Reset | Tab: Fields | q: Quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(footer, chunks[3]);
}

fn indicators(app: &App) -> Paragraph<'_> {
    let lamp = |name: &'static str, state: Lamp| {
        vec![
            Span::styled("● ", Style::default().fg(state.color())),
            Span::raw(name),
            Span::raw("   "),
        ]
    };

    let mut spans = Vec::new();
    spans.extend(lamp("Bus", app.lamp_bus));
    spans.extend(lamp("Motor", app.lamp_motor));
    spans.extend(lamp("HLFB", app.lamp_hlfb));
    spans.extend(lamp("Encoder", app.lamp_encoder));
    if app.rig.session().estop_engaged() {
        spans.push(Span::styled(
            " E-STOP ENGAGED ",
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
    }

    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Status Indicators"),
    )
}

fn control_lines(app: &App) -> Vec<Line<'_>> {
    let limit = app
        .speed_limit_hz()
        .map(|hz| format!("(Range: 0 - {hz:.3} Hz)"))
        .unwrap_or_else(|| "(Range: 0 - 0.000 Hz)".to_string());

    let row = |field: Field, label: &str, value: String, hint: String| {
        let value_style = if app.focus == field {
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        Line::from(vec![
            Span::raw(format!("{label:<17}")),
            Span::styled(format!("{value:<10}"), value_style),
            Span::styled(hint, Style::default().fg(Color::DarkGray)),
        ])
    };

    vec![
        row(
            Field::MaxSpeed,
            "Max Speed (rpm):",
            app.max_speed.clone(),
            "(Range: 0 - 4000 rpm)".to_string(),
        ),
        row(Field::OpSpeed, "Op Speed (Hz):", app.op_speed.clone(), limit),
        row(
            Field::Ramp,
            "Ramp Mult:",
            app.ramp.clone(),
            "(Range: 0 - 255)".to_string(),
        ),
        row(
            Field::Direction,
            "Direction:",
            app.direction.to_string().to_uppercase(),
            "(arrows toggle)".to_string(),
        ),
        row(
            Field::Waveform,
            "Waveform:",
            app.waveform.to_string(),
            "(arrows cycle)".to_string(),
        ),
        row(
            Field::ArmSamples,
            "Arm samples:",
            app.arm_samples.clone(),
            String::new(),
        ),
        row(
            Field::HlfbSamples,
            "HLFB samples:",
            app.hlfb_samples.clone(),
            String::new(),
        ),
        row(
            Field::FileName,
            "File name:",
            app.file_name.clone(),
            "(Enter to leave)".to_string(),
        ),
    ]
}

fn ui_chart(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.size());

    let Some(chart_data) = &app.chart else {
        let empty = Paragraph::new("No fit data").block(Block::default().borders(Borders::ALL));
        f.render_widget(empty, chunks[0]);
        return;
    };

    let (x_min, x_max, y_min, y_max) = bounds(&chart_data.points, &chart_data.fitted);

    let datasets = vec![
        Dataset::default()
            .name("captured")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Yellow))
            .data(&chart_data.points),
        Dataset::default()
            .name("fitted")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&chart_data.fitted),
    ];

    let params = &chart_data.report.params;
    let title = format!(
        "Sinusoidal Fit - amp {:.3}, freq {:.3} rad/s, mean {:.3}",
        params.amplitude, params.frequency, params.mean
    );

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .title("t (s)")
                .bounds([x_min, x_max])
                .labels(vec![
                    Span::raw(format!("{x_min:.2}")),
                    Span::raw(format!("{:.2}", (x_min + x_max) / 2.0)),
                    Span::raw(format!("{x_max:.2}")),
                ]),
        )
        .y_axis(
            Axis::default()
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::raw(format!("{y_min:.2}")),
                    Span::raw(format!("{:.2}", (y_min + y_max) / 2.0)),
                    Span::raw(format!("{y_max:.2}")),
                ]),
        );
    f.render_widget(chart, chunks[0]);

    let footer = Paragraph::new("g/Esc: Back | q: Quit")
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(footer, chunks[1]);
}

fn bounds(points: &[(f64, f64)], fitted: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for &(x, y) in points.iter().chain(fitted) {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    let margin = ((y_max - y_min) * 0.1).max(0.1);
    (x_min, x_max, y_min - margin, y_max + margin)
}
