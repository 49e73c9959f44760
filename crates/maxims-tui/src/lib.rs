// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use maxims_app::{
    BOOK_AUTHOR, BOOK_TITLE, Catalog, DetailView, ExplorerCommand, ExplorerEvent, ExplorerState,
    FetchOutcome, FetchRequest, IgnoreReason, Maxim, MaximContent,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
const DETAIL_PAGE_LINES: u16 = 10;
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);

pub trait ExplorerRuntime {
    fn fetch_content(&mut self, maxim: &Maxim) -> Result<MaximContent>;

    /// Runs the fetch and reports its outcome on `tx`. The default blocks the
    /// caller; runtimes backed by a network service should move the work off
    /// the UI thread.
    fn spawn_fetch(&mut self, request: FetchRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let outcome = match self.fetch_content(&request.maxim) {
            Ok(content) => FetchOutcome::Succeeded {
                token: request.token,
                content,
            },
            Err(error) => FetchOutcome::Failed {
                token: request.token,
                message: error.to_string(),
            },
        };
        tx.send(InternalEvent::Fetch(outcome))
            .map_err(|_| anyhow::anyhow!("fetch event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Fetch(FetchOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewData {
    catalog: Catalog,
    cursor: usize,
    detail_scroll: u16,
    help_visible: bool,
    spinner_tick: usize,
    status_line: Option<String>,
    status_token: u64,
}

impl ViewData {
    fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            cursor: 0,
            detail_scroll: 0,
            help_visible: false,
            spinner_tick: 0,
            status_line: None,
            status_token: 0,
        }
    }

    fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_tick % SPINNER_FRAMES.len()]
    }
}

pub fn run_app<R: ExplorerRuntime>(
    state: &mut ExplorerState,
    catalog: &Catalog,
    runtime: &mut R,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(catalog.clone());
    if let Some(index) = state
        .selected()
        .and_then(|maxim| view_data.catalog.position(maxim))
    {
        view_data.cursor = index;
    }
    let (internal_tx, internal_rx) = mpsc::channel();

    let result = event_loop(
        &mut terminal,
        state,
        runtime,
        &mut view_data,
        &internal_tx,
        &internal_rx,
    );

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn event_loop<R: ExplorerRuntime>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut ExplorerState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    internal_rx: &Receiver<InternalEvent>,
) -> Result<()> {
    loop {
        process_internal_events(state, view_data, internal_tx, internal_rx);
        if state.is_loading() {
            view_data.spinner_tick = view_data.spinner_tick.wrapping_add(1);
        }

        terminal
            .draw(|frame| render(frame, state, view_data))
            .context("draw frame")?;

        if !event::poll(Duration::from_millis(120)).context("poll event")? {
            continue;
        }
        if let Event::Key(key) = event::read().context("read event")?
            && handle_key_event(state, runtime, view_data, internal_tx, key)
        {
            return Ok(());
        }
    }
}

fn process_internal_events(
    state: &mut ExplorerState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status_line = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Fetch(outcome) => {
                let events = state.dispatch(ExplorerCommand::Settle(outcome));
                apply_explorer_events(state, view_data, tx, events);
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status_line = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: ExplorerRuntime>(
    state: &mut ExplorerState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
    {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('j') | KeyCode::Down => move_cursor(view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(view_data, -1),
        KeyCode::Char('g') | KeyCode::Home => view_data.cursor = 0,
        KeyCode::Char('G') | KeyCode::End => {
            view_data.cursor = view_data.catalog.len().saturating_sub(1);
        }
        KeyCode::PageDown | KeyCode::Char('d') => {
            view_data.detail_scroll = view_data.detail_scroll.saturating_add(DETAIL_PAGE_LINES);
        }
        KeyCode::PageUp | KeyCode::Char('u') => {
            view_data.detail_scroll = view_data.detail_scroll.saturating_sub(DETAIL_PAGE_LINES);
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            select_cursor(state, runtime, view_data, internal_tx);
        }
        _ => {}
    }
    false
}

fn move_cursor(view_data: &mut ViewData, delta: isize) {
    let len = view_data.catalog.len();
    if len == 0 {
        return;
    }
    let next = view_data.cursor.saturating_add_signed(delta);
    view_data.cursor = next.min(len - 1);
}

fn select_cursor<R: ExplorerRuntime>(
    state: &mut ExplorerState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(maxim) = view_data.catalog.get(view_data.cursor).cloned() else {
        return;
    };

    let events = state.dispatch(ExplorerCommand::Select(maxim));
    let requests = events
        .iter()
        .filter_map(|event| match event {
            ExplorerEvent::FetchStarted(request) => Some(request.clone()),
            _ => None,
        })
        .collect::<Vec<_>>();
    apply_explorer_events(state, view_data, internal_tx, events);

    for request in requests {
        let token = request.token;
        if let Err(error) = runtime.spawn_fetch(request, internal_tx.clone()) {
            warn!(%error, token = %token, "could not start fetch");
            let settled = state.dispatch(ExplorerCommand::Settle(FetchOutcome::Failed {
                token,
                message: format!("could not start request: {error}"),
            }));
            apply_explorer_events(state, view_data, internal_tx, settled);
        }
    }
}

fn apply_explorer_events(
    state: &ExplorerState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    events: Vec<ExplorerEvent>,
) {
    for event in events {
        match event {
            ExplorerEvent::Ignored { reason, .. } => {
                let message = match reason {
                    IgnoreReason::AlreadyLoading => "already loading",
                    IgnoreReason::AlreadyLoaded => "already loaded",
                };
                emit_status(view_data, internal_tx, message);
            }
            ExplorerEvent::SelectionChanged(_) => {
                view_data.detail_scroll = 0;
            }
            ExplorerEvent::RetryRequested { attempt, .. } => {
                emit_status(view_data, internal_tx, format!("retrying (attempt {attempt})"));
            }
            ExplorerEvent::FetchStarted(_) => {}
            ExplorerEvent::ContentLoaded { .. } => {
                view_data.detail_scroll = 0;
                if let Some(selected) = state.selected() {
                    emit_status(view_data, internal_tx, format!("loaded: {selected}"));
                }
            }
            ExplorerEvent::FetchFailed { .. } => {
                emit_status(
                    view_data,
                    internal_tx,
                    "request failed; press enter on the same maxim to retry",
                );
            }
            ExplorerEvent::StaleOutcomeDiscarded { token } => {
                debug!(token = %token, "superseded fetch settled");
            }
        }
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &ExplorerState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(format!("{BOOK_TITLE}\nMaxim Explorer"))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(34), Constraint::Percentage(66)])
        .split(layout[1]);

    render_maxim_list(frame, body[0], state, view_data);

    let detail = Paragraph::new(render_detail_text(state, view_data.spinner()))
        .wrap(Wrap { trim: false })
        .scroll((view_data.detail_scroll, 0))
        .style(detail_style(state))
        .block(
            Block::default()
                .title(detail_title(state))
                .borders(Borders::ALL),
        );
    frame.render_widget(detail, body[1]);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title_bottom(attribution_text()),
        );
    frame.render_widget(status, layout[2]);

    if view_data.help_visible {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_maxim_list(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &ExplorerState,
    view_data: &ViewData,
) {
    let items = view_data
        .catalog
        .maxims()
        .iter()
        .map(|maxim| {
            let style = if state.is_selected(maxim) {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(maxim_row_label(state, maxim, view_data.spinner())).style(style)
        })
        .collect::<Vec<_>>();

    let list = List::new(items)
        .block(
            Block::default()
                .title("Choose a Maxim")
                .borders(Borders::ALL),
        )
        .highlight_symbol("> ")
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut list_state = ListState::default().with_selected(Some(view_data.cursor));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn maxim_row_label(state: &ExplorerState, maxim: &Maxim, spinner: &str) -> String {
    if state.is_item_loading(maxim) {
        format!("{maxim} {spinner}")
    } else {
        maxim.to_string()
    }
}

fn detail_title(state: &ExplorerState) -> &'static str {
    match state.detail() {
        DetailView::Loading => "loading",
        DetailView::Failed(_) => "error",
        DetailView::Welcome => "welcome",
        DetailView::Content(_) => "explanation",
    }
}

fn detail_style(state: &ExplorerState) -> Style {
    match state.detail() {
        DetailView::Failed(_) => Style::default().fg(Color::LightRed),
        DetailView::Loading => Style::default().fg(Color::Cyan),
        DetailView::Welcome | DetailView::Content(_) => Style::default().fg(Color::White),
    }
}

fn render_detail_text(state: &ExplorerState, spinner: &str) -> String {
    match state.detail() {
        DetailView::Loading => format!("{spinner} Analyzing the code..."),
        DetailView::Failed(message) => format!(
            "An Error Occurred\n\n{message}\n\nPress enter on the same maxim to try again."
        ),
        DetailView::Welcome => format!(
            "Welcome\n\nSelect a maxim from the list to explore its meaning and see examples from \"{BOOK_TITLE}\"."
        ),
        DetailView::Content(content) => render_content_text(content),
    }
}

fn render_content_text(content: &MaximContent) -> String {
    let mut out = String::new();
    out.push_str(&content.maxim);
    out.push_str("\n\nWhat It Means\n\n");
    out.push_str(&content.meaning);
    out.push_str("\n\nStories from the Code\n");
    for story in &content.stories {
        out.push('\n');
        out.push_str(&story.title);
        out.push('\n');
        out.push_str(&story.narrative);
        out.push_str("\n  \"");
        out.push_str(&story.quote);
        out.push_str("\"\n");
    }
    out
}

fn status_text(state: &ExplorerState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }

    let default = "j/k move | enter select/retry | pgup/pgdn scroll | ? help | q quit";
    let position = format!("{}/{}", view_data.cursor + 1, view_data.catalog.len());
    let busy = if state.is_loading() { " | loading" } else { "" };
    match &view_data.status_line {
        Some(status) => format!("{position}{busy} | {status} | {default}"),
        None => format!("{position}{busy} | {default}"),
    }
}

fn attribution_text() -> String {
    format!(" Powered by Google Gemini. Content inspired by \"{BOOK_TITLE}\" by {BOOK_AUTHOR}. ")
}

fn help_overlay_text() -> &'static str {
    "list: j/k or up/down move | g/G or home/end first/last\n\
select: enter or space loads the maxim under the cursor\n\
retry: enter on a maxim whose request failed asks again\n\
detail: pgup/pgdn or u/d scroll\n\
global: ? help | q or esc quit | ctrl+c quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
