use crate::state::CrawlState;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use parking_lot::Mutex;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Sparkline},
};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const MAX_ERRORS: usize = 10;
const RATE_WINDOW: usize = 60;
const TOP_SUBDOMAINS: usize = 8;

/// Live counters shared between the scheduler and the dashboard.
pub struct CrawlStats {
    pub pages_fetched: AtomicUsize,
    pub pages_processed: AtomicUsize,
    pub pages_skipped: AtomicUsize,
    pub queue_size: AtomicUsize,
    pub active_workers: AtomicUsize,
    errors: Mutex<VecDeque<String>>,
    rate_history: Mutex<VecDeque<u64>>,
    start_time: Instant,
    should_stop: AtomicBool,
    finished: AtomicBool,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            pages_fetched: AtomicUsize::new(0),
            pages_processed: AtomicUsize::new(0),
            pages_skipped: AtomicUsize::new(0),
            queue_size: AtomicUsize::new(0),
            active_workers: AtomicUsize::new(0),
            errors: Mutex::new(VecDeque::with_capacity(MAX_ERRORS)),
            rate_history: Mutex::new(VecDeque::with_capacity(RATE_WINDOW)),
            start_time: Instant::now(),
            should_stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub fn add_error(&self, error: String) {
        let mut errors = self.errors.lock();
        if errors.len() >= MAX_ERRORS {
            errors.pop_front();
        }
        errors.push_back(error);
    }

    pub fn recent_errors(&self) -> Vec<String> {
        self.errors.lock().iter().cloned().collect()
    }

    fn add_rate(&self, rate: u64) {
        let mut history = self.rate_history.lock();
        if history.len() >= RATE_WINDOW {
            history.pop_front();
        }
        history.push_back(rate);
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.should_stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

pub async fn run_dashboard(
    stats: Arc<CrawlStats>,
    state: Arc<CrawlState>,
    max_pages: Option<usize>,
) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_dashboard_loop(&mut terminal, stats, state, max_pages).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_dashboard_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    stats: Arc<CrawlStats>,
    state: Arc<CrawlState>,
    max_pages: Option<usize>,
) -> io::Result<()> {
    let mut animation_frame = 0u8;
    let spinner_frames = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
    let mut last_rate_update = Instant::now();
    let mut last_pages = 0usize;

    loop {
        let pages_fetched = stats.pages_fetched.load(Ordering::Relaxed);
        let pages_processed = stats.pages_processed.load(Ordering::Relaxed);
        let pages_skipped = stats.pages_skipped.load(Ordering::Relaxed);
        let queue_size = stats.queue_size.load(Ordering::Relaxed);
        let active_workers = stats.active_workers.load(Ordering::Relaxed);
        let unique_links = state.unique_links();
        let elapsed = stats.start_time.elapsed();

        if last_rate_update.elapsed() >= Duration::from_secs(1) {
            stats.add_rate(pages_fetched.saturating_sub(last_pages) as u64);
            last_pages = pages_fetched;
            last_rate_update = Instant::now();
        }

        animation_frame = (animation_frame + 1) % (spinner_frames.len() as u8);
        let spinner = spinner_frames[animation_frame as usize];

        let mut subdomains = state.subdomain_counts();
        subdomains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        subdomains.truncate(TOP_SUBDOMAINS);

        terminal.draw(|f| {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(f.area());

            let top = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(rows[0]);

            let bottom = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(rows[1]);

            let elapsed_secs = elapsed.as_secs();
            let rate = if elapsed_secs > 0 {
                pages_fetched as f64 / elapsed_secs as f64
            } else {
                0.0
            };
            let label = Style::default().fg(Color::Cyan);
            let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
            let progress = match max_pages {
                Some(max) => format!("{pages_fetched} / {max}"),
                None => pages_fetched.to_string(),
            };

            let overview = vec![
                Line::from(""),
                Line::from(vec![
                    Span::styled(format!("  {spinner} "), label.add_modifier(Modifier::BOLD)),
                    Span::styled("scoped-crawler", label.add_modifier(Modifier::BOLD)),
                ]),
                Line::from("  ─────────────────"),
                Line::from(vec![
                    Span::styled("  Uptime    : ", label),
                    Span::styled(
                        format!(
                            "{:02}:{:02}:{:02}",
                            elapsed_secs / 3600,
                            (elapsed_secs % 3600) / 60,
                            elapsed_secs % 60
                        ),
                        value,
                    ),
                ]),
                Line::from(vec![
                    Span::styled("  Rate      : ", label),
                    Span::styled(format!("{rate:.2} p/s"), value),
                ]),
                Line::from(vec![
                    Span::styled("  Workers   : ", label),
                    Span::styled(active_workers.to_string(), value),
                ]),
                Line::from(vec![
                    Span::styled("  Queue     : ", label),
                    Span::styled(queue_size.to_string(), value),
                ]),
                Line::from(vec![
                    Span::styled("  Fetched   : ", label),
                    Span::styled(progress, value),
                ]),
                Line::from(vec![
                    Span::styled("  Processed : ", label),
                    Span::styled(pages_processed.to_string(), value),
                    Span::styled(format!("  ({pages_skipped} skipped)"), label),
                ]),
                Line::from(vec![
                    Span::styled("  Unique    : ", label),
                    Span::styled(unique_links.to_string(), value),
                ]),
            ];
            f.render_widget(
                Paragraph::new(overview).block(Block::default().borders(Borders::ALL).title("Crawl")),
                top[0],
            );

            let mut error_lines: Vec<Line> = stats
                .recent_errors()
                .into_iter()
                .map(|msg| Line::from(Span::styled(msg, Style::default().fg(Color::Red))))
                .collect();
            if error_lines.is_empty() {
                error_lines.push(Line::from(Span::styled(
                    "No errors",
                    Style::default().fg(Color::Green),
                )));
            }
            f.render_widget(
                Paragraph::new(error_lines).block(Block::default().borders(Borders::ALL).title("Errors")),
                top[1],
            );

            let bars: Vec<Bar> = subdomains
                .iter()
                .map(|(host, count)| Bar::default().value(*count).label(Line::from(host.clone())))
                .collect();
            let chart = BarChart::default()
                .block(Block::default().borders(Borders::ALL).title("Subdomains"))
                .direction(Direction::Horizontal)
                .bar_width(1)
                .bar_gap(0)
                .bar_style(Style::default().fg(Color::Cyan))
                .data(BarGroup::default().bars(&bars));
            f.render_widget(chart, bottom[0]);

            let rate_history: Vec<u64> = stats.rate_history.lock().iter().copied().collect();
            let max_rate = rate_history.iter().max().copied().unwrap_or(1).max(1);
            let sparkline = Sparkline::default()
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title("Rate (pages/sec, 60s)"),
                )
                .data(&rate_history)
                .style(Style::default().fg(Color::Cyan))
                .max(max_rate);
            f.render_widget(sparkline, bottom[1]);
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q') {
                    stats.stop();
                    break;
                }
            }
        }

        if stats.is_finished() {
            tokio::time::sleep(Duration::from_secs(2)).await;
            break;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_keeps_only_recent_entries() {
        let stats = CrawlStats::new();
        for i in 0..15 {
            stats.add_error(format!("error {i}"));
        }
        let errors = stats.recent_errors();
        assert_eq!(errors.len(), MAX_ERRORS);
        assert_eq!(errors.first().map(String::as_str), Some("error 5"));
    }

    #[test]
    fn stop_flag_is_sticky() {
        let stats = CrawlStats::new();
        assert!(!stats.should_stop());
        stats.stop();
        assert!(stats.should_stop());
    }
}
