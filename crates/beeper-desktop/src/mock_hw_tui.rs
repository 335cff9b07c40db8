use std::io;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Duration;

use beeper_core::{Binding, OutputKind, TonePacket, themes};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{Level, LevelFilter, Metadata, Record};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
};

use crate::sim::{MockPredicates, Simulator};

/// One record shown in the log panel.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

trait LevelExt {
    fn color(&self) -> Color;
    fn prefix(&self) -> &str;
}

impl LevelExt for Level {
    fn color(&self) -> Color {
        match *self {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Cyan,
            Level::Debug => Color::Gray,
            Level::Trace => Color::DarkGray,
        }
    }

    fn prefix(&self) -> &str {
        match *self {
            Level::Error => "[ERROR]",
            Level::Warn => "[WARN] ",
            Level::Info => "[INFO] ",
            Level::Debug => "[DEBUG]",
            Level::Trace => "[TRACE]",
        }
    }
}

pub enum TuiMessage {
    Log(LogEntry),
}

/// Forwards log records into the panel.
pub struct TuiLogger {
    tx: Sender<TuiMessage>,
}

impl log::Log for TuiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // trace stays out of the panel, the buzzer worker logs commands at debug
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let entry = LogEntry {
                level: record.level(),
                message: format!("{}", record.args()),
            };
            // Ignore send errors (TUI might have shut down)
            let _ = self.tx.send(TuiMessage::Log(entry));
        }
    }

    fn flush(&self) {}
}

struct TuiState {
    sim: Arc<Simulator>,
    bindings: Vec<Binding>,
    logs: Vec<LogEntry>,
    rx: Receiver<TuiMessage>,
    max_logs: usize,
}

impl TuiState {
    fn collect_messages(&mut self) {
        while let Ok(TuiMessage::Log(entry)) = self.rx.try_recv() {
            self.logs.push(entry);
            if self.logs.len() > self.max_logs {
                self.logs.remove(0);
            }
        }
    }

    fn predicates(&self) -> &MockPredicates {
        &self.sim.predicates
    }
}

/// Install the panel logger. Call before anything logs.
pub fn init_logger() -> Receiver<TuiMessage> {
    let (tx, rx) = channel();
    if log::set_boxed_logger(Box::new(TuiLogger { tx })).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
    rx
}

/// Run the panel on the calling thread until the user quits.
pub fn run(
    sim: Arc<Simulator>,
    bindings: Vec<Binding>,
    rx: Receiver<TuiMessage>,
) -> Result<(), io::Error> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = TuiState {
        sim,
        bindings,
        logs: Vec::new(),
        rx,
        max_logs: 200,
    };
    log::info!("mock buzzer panel started");

    loop {
        state.collect_messages();
        terminal.draw(|f| ui(f, &state))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Char(c @ '1'..='9') => {
                        let index = c as usize - '1' as usize;
                        if let Some(binding) = state.bindings.get(index) {
                            let level = state.predicates().toggle(binding.name);
                            log::info!("{} -> {}", binding.name, level);
                        }
                    }
                    KeyCode::Char(' ') => {
                        if let Err(e) = state.sim.engine.play_theme(&themes::BUTTON_OK) {
                            log::warn!("ok beep: {}", e);
                        }
                    }
                    KeyCode::Char('n') => {
                        if let Err(e) = state.sim.engine.play_theme(&themes::BUTTON_NEXT_PREV) {
                            log::warn!("next beep: {}", e);
                        }
                    }
                    KeyCode::Char('t') => {
                        // single tone with a rest after it
                        let engine = &state.sim.engine;
                        let result = engine
                            .push_tone(TonePacket::new(440, 250))
                            .and_then(|_| engine.push_tone(TonePacket::rest(250)));
                        if let Err(e) = result {
                            log::warn!("tone: {}", e);
                        }
                    }
                    KeyCode::Char('r') => spawn_blocking_reset(Arc::clone(&state.sim)),
                    KeyCode::Char('m') => {
                        let muted = state.sim.engine.mute(!state.sim.engine.is_muted());
                        log::info!("muted: {}", muted);
                    }
                    _ => {}
                }
            }
        }
    }

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}

fn spawn_blocking_reset(sim: Arc<Simulator>) {
    thread::spawn(move || {
        let result = sim
            .engine
            .play_theme_blocking(&themes::BUTTON_RESET, || thread::sleep(Duration::from_millis(2)));
        match result {
            Ok(()) => log::info!("reset chime finished"),
            Err(e) => log::warn!("reset chime: {}", e),
        }
    });
}

fn ui(f: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(8), // Engine
            Constraint::Length(state.bindings.len() as u16 + 2),
            Constraint::Min(6), // Logs
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    let title = Paragraph::new("Mock Buzzer Control Panel")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    render_engine(f, chunks[1], state);
    render_conditions(f, chunks[2], state);
    render_logs(f, chunks[3], state);

    let help = Paragraph::new(
        "1-9: toggle predicate | space/n: ok/next beep | t: tone | r: blocking reset | m: mute | q: quit",
    )
    .style(Style::default().fg(Color::Gray))
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[4]);
}

fn flag(name: &str, on: bool) -> Span<'_> {
    let style = if on {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!(" {} ", name), style)
}

fn render_engine(f: &mut Frame, area: Rect, state: &TuiState) {
    let engine = &state.sim.engine;
    let kind = match engine.output_kind() {
        OutputKind::SquareWave => "square wave",
        OutputKind::Pwm => "pwm",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Engine ({})", kind));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(inner);

    let flags = Line::from(vec![
        flag("PLAYING", engine.is_playing()),
        flag("HALTED", engine.is_halted()),
        flag("MUTED", engine.is_muted()),
        flag("BLOCKING", engine.is_blocking()),
    ]);
    f.render_widget(Paragraph::new(flags), rows[0]);

    let freq = Paragraph::new(format!(
        "frequency: {} Hz   divisor: {}",
        engine.current_frequency(),
        engine.freq_divisor()
    ));
    f.render_widget(freq, rows[1]);

    let pin = Paragraph::new(format!(
        "pin: {}   edges: {}",
        if state.sim.pin.is_high() { "high" } else { "low" },
        state.sim.pin.edges()
    ));
    f.render_widget(pin, rows[2]);

    let queued = engine.head_dist();
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(queued as f64 / engine.capacity() as f64)
        .label(format!("queue {}/{}", queued, engine.capacity()));
    f.render_widget(gauge, rows[3]);
}

fn render_conditions(f: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default().borders(Borders::ALL).title("Conditions");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let items: Vec<ListItem> = state
        .bindings
        .iter()
        .enumerate()
        .map(|(i, binding)| {
            let level = state.predicates().get(binding.name);
            let detail = match state.sim.engine.condition(binding.id) {
                Some(c) if c.looping => format!("plays {} (loop)", c.plays),
                Some(c) => format!("plays {}/{}", c.plays, c.play_count),
                None => "unbound".to_string(),
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{} ", i + 1)),
                flag(binding.name, level),
                Span::raw(detail),
            ]))
        })
        .collect();

    f.render_widget(List::new(items), inner);
}

fn render_logs(f: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Logs (scrolls automatically)");

    let inner = block.inner(area);
    f.render_widget(block, area);

    let max_logs = inner.height as usize;
    let start_idx = state.logs.len().saturating_sub(max_logs);

    let log_items: Vec<ListItem> = state.logs[start_idx..]
        .iter()
        .map(|log| {
            ListItem::new(Line::from(vec![
                Span::styled(log.level.prefix(), Style::default().fg(log.level.color())),
                Span::raw(" "),
                Span::raw(&log.message),
            ]))
        })
        .collect();

    f.render_widget(List::new(log_items), inner);
}

#[cfg(test)]
mod tests {
    use log::Log;

    use super::*;

    #[test]
    fn test_logger_forwards_buzzer_commands() {
        let (tx, rx) = channel();
        let logger = TuiLogger { tx };

        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("buzzer: Start(3000)"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Trace)
                .args(format_args!("dropped"))
                .build(),
        );

        let TuiMessage::Log(entry) = rx.try_recv().unwrap();
        assert_eq!(entry.level, Level::Debug);
        assert_eq!(entry.message, "buzzer: Start(3000)");
        assert!(rx.try_recv().is_err());
    }
}
