mod app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

use app::{
    format_amount, format_expiry, format_flags, format_price, row_flags, truncate, AppState,
    LoadStatus,
};
use fut_price_tracker::config::Config;

const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();

    let (cfg, watchlist) = match Config::from_env().and_then(|c| c.watchlist().map(|w| (c, w))) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    let mut app = AppState::new(&cfg, &watchlist);
    app.refresh();

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();

    let result = run_loop(&mut terminal, &mut app, &mut table_state);

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    table_state: &mut TableState,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render(f, app, table_state))?;

        let timeout = REFRESH_INTERVAL
            .checked_sub(app.last_refresh.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => app.refresh(),
                        KeyCode::Tab => {
                            app.next_group();
                            table_state.select(None);
                        }
                        KeyCode::BackTab => {
                            app.prev_group();
                            table_state.select(None);
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let len = app.current().map_or(0, |g| g.records.len());
                            let max = len.saturating_sub(1);
                            let next = table_state.selected().map_or(0, |i| (i + 1).min(max));
                            table_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = table_state.selected().map_or(0, |i| i.saturating_sub(1));
                            table_state.select(Some(prev));
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.last_refresh.elapsed() >= REFRESH_INTERVAL {
            app.refresh();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // records
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_records(f, app, table_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let mut spans = vec![Span::styled(
        " FUT Price Tracker  ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];

    for (i, group) in app.groups.iter().enumerate() {
        let style = if i == app.selected {
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(format!(" {} ({}) ", group.name, group.records.len()), style));
        spans.push(Span::raw(" "));
    }

    spans.push(Span::raw(" │  "));
    spans.push(Span::styled(
        format!("{} flagged", app.flagged_count()),
        Style::default().fg(Color::Yellow),
    ));

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_records(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let Some(group) = app.current() else {
        return;
    };

    let (status_text, status_color) = match &group.status {
        LoadStatus::Loaded => (
            records_title(group.records.first().map(|r| r.fetch_time())),
            Color::Cyan,
        ),
        LoadStatus::Error(e) => (format!(" {} ", truncate(e, 60)), Color::Red),
        LoadStatus::NotLoaded => (" not loaded ".to_string(), Color::DarkGray),
    };

    let header_cells = ["Player", "BIN", "Avg BIN", "Last BIN", "Lowest bid", "Expires", "Flags"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        });
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = group
        .records
        .iter()
        .map(|r| {
            let flags = row_flags(r);
            let row_style = if flags.crash {
                Style::default().fg(Color::Green)
            } else if flags.bid {
                Style::default().fg(Color::Yellow)
            } else if r.is_extinct() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(truncate(&r.name, 22)),
                Cell::from(format_price(Some(r.current_price))),
                Cell::from(format_amount(r.average_bin)),
                Cell::from(format_price(r.last_bin)),
                Cell::from(format_amount(r.lowest_bid.as_ref().map(|b| b.amount))),
                Cell::from(format_expiry(r)),
                Cell::from(format_flags(flags))
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            ])
            .style(row_style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(9),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                format!(" {} ", group.path.display()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ))
            .title_bottom(Span::styled(status_text, Style::default().fg(status_color))),
    )
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, state);
}

fn records_title(fetch_time: Option<String>) -> String {
    match fetch_time {
        Some(t) => format!(" fetched {t} "),
        None => " empty ".to_string(),
    }
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("reload  "),
        Span::styled("[Tab / S-Tab] ", Style::default().fg(Color::Yellow)),
        Span::raw("group  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll  "),
        Span::styled("auto-reload: 5s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
