use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::App;
use crate::backend::UploadBackend;
use crate::browser::Listing;
use crate::domain::{LocalFile, RepositoryName};
use crate::error::RepodropError;
use crate::github::HostingApi;
use crate::output::render_screen;
use crate::view::{Screen, Toast, ToastLevel};
use crate::workflow::{ProgressEvent, ProgressSink, Step, Workflow};

const TOAST_TTL: Duration = Duration::from_secs(4);
const EVENTS_MAX: usize = 6;
const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

type Term = Terminal<CrosstermBackend<Stdout>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Move(isize),
    AddFiles,
    Start,
    Pick(RepositoryName),
    Enter(String),
    Parent,
    Root,
    SelectFolder,
    Toggle(String),
    Confirm,
    Skip,
    AcceptBootstrap,
    DeclineBootstrap,
    Dismiss,
    Logout,
}

/// Key binding for the screen currently shown. `cursor` indexes the
/// selectable rows of that screen.
pub fn action_for(screen: &Screen, key: KeyCode, cursor: usize) -> Action {
    match (screen, key) {
        (_, KeyCode::Up) => Action::Move(-1),
        (_, KeyCode::Down) => Action::Move(1),
        (Screen::Login, KeyCode::Char('q') | KeyCode::Esc) => Action::Quit,
        (Screen::Dashboard { .. }, KeyCode::Char('q')) => Action::Quit,
        (Screen::Dashboard { .. }, KeyCode::Char('a')) => Action::AddFiles,
        (Screen::Dashboard { files }, KeyCode::Enter) if !files.is_empty() => Action::Start,
        (Screen::Dashboard { .. }, KeyCode::Char('o')) => Action::Logout,
        (Screen::RepoPicker(picker), KeyCode::Enter) => picker
            .repositories
            .get(cursor)
            .and_then(|repo| repo.full_name.parse().ok())
            .map(Action::Pick)
            .unwrap_or(Action::None),
        (Screen::Browser(view), KeyCode::Enter | KeyCode::Right) => view
            .entries()
            .get(cursor)
            .filter(|entry| entry.is_dir())
            .map(|entry| Action::Enter(entry.name.clone()))
            .unwrap_or(Action::None),
        (Screen::Browser(_), KeyCode::Backspace | KeyCode::Left) => Action::Parent,
        (Screen::Browser(_), KeyCode::Char('r')) => Action::Root,
        (Screen::Browser(_), KeyCode::Char('s')) => Action::SelectFolder,
        (Screen::Extraction(view), KeyCode::Char(' ')) => view
            .items
            .get(cursor)
            .map(|item| Action::Toggle(item.name.clone()))
            .unwrap_or(Action::None),
        (Screen::Extraction(view), KeyCode::Enter | KeyCode::Char('c'))
            if view.can_confirm || view.items.is_empty() =>
        {
            Action::Confirm
        }
        (Screen::Extraction(_), KeyCode::Char('s')) => Action::Skip,
        (Screen::CachePrompt { .. }, KeyCode::Char('y')) => Action::AcceptBootstrap,
        (Screen::CachePrompt { .. }, KeyCode::Char('n')) => Action::DeclineBootstrap,
        (Screen::BootstrapFailed { .. }, KeyCode::Enter) => Action::Dismiss,
        (
            Screen::RepoPicker(_)
            | Screen::Browser(_)
            | Screen::Extraction(_)
            | Screen::CachePrompt { .. }
            | Screen::BootstrapFailed { .. },
            KeyCode::Esc,
        ) => Action::Dismiss,
        _ => Action::None,
    }
}

pub fn selectable_rows(screen: &Screen) -> usize {
    match screen {
        Screen::RepoPicker(picker) => picker.repositories.len(),
        Screen::Browser(view) => view.entries().len(),
        Screen::Extraction(view) => view.items.len(),
        _ => 0,
    }
}

/// Splits typed input into paths. Whitespace separates paths unless it is
/// inside double quotes.
pub fn parse_path_list(input: &str) -> Vec<Utf8PathBuf> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in input.chars() {
        match ch {
            '"' => quoted = !quoted,
            ch if ch.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    paths.push(Utf8PathBuf::from(std::mem::take(&mut current)));
                }
            }
            ch => current.push(ch),
        }
    }
    if !current.is_empty() {
        paths.push(Utf8PathBuf::from(current));
    }
    paths
}

/// Replaces the file selection with the paths typed at the prompt.
pub fn select_from_input<H: HostingApi, B: UploadBackend>(
    workflow: &mut Workflow<H, B>,
    input: &str,
) -> Result<Step, RepodropError> {
    let paths = parse_path_list(input);
    if paths.is_empty() {
        return Err(RepodropError::NoFilesSelected);
    }
    let files = LocalFile::load_all(&paths)?;
    tracing::info!(count = files.len(), "files selected");
    workflow.select_files(files)
}

fn hints(screen: &Screen) -> &'static str {
    match screen {
        Screen::Login => "q quit",
        Screen::Dashboard { .. } => "a select files · Enter choose destination · o log out · q quit",
        Screen::RepoPicker(_) => "↑↓ move · Enter pick · Esc close",
        Screen::Browser(_) => {
            "↑↓ move · Enter open · Backspace up · r root · s select this folder · Esc close"
        }
        Screen::Extraction(_) => "↑↓ move · Space toggle · Enter continue · s skip · Esc close",
        Screen::CachePrompt { .. } => "y create cache file · n upload without it · Esc close",
        Screen::Uploading { .. } => "please wait",
        Screen::BootstrapFailed { .. } => "Enter/Esc close",
    }
}

#[derive(Debug, Default)]
struct BusyState {
    status: String,
    uploading: bool,
    events: VecDeque<String>,
}

struct TuiProgress {
    state: Arc<Mutex<BusyState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            if let Some((phase, payload)) = message.split_once("; ") {
                state.uploading = phase == "phase=Upload";
                state.status = payload.to_string();
            }
            state.events.push_back(message);
            while state.events.len() > EVENTS_MAX {
                state.events.pop_front();
            }
        }
    }
}

pub struct Tui {
    busy: Arc<Mutex<BusyState>>,
    cursor: usize,
    toasts: VecDeque<(Toast, Instant)>,
    login_url: String,
    input: Option<String>,
}

impl Tui {
    pub fn new(login_url: String) -> Self {
        Self {
            busy: Arc::new(Mutex::new(BusyState::default())),
            cursor: 0,
            toasts: VecDeque::new(),
            login_url,
            input: None,
        }
    }

    pub fn run<H: HostingApi, B: UploadBackend>(&mut self, app: &mut App<H, B>) -> miette::Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let result = self.event_loop(&mut terminal, app);

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        result
    }

    fn event_loop<H: HostingApi, B: UploadBackend>(
        &mut self,
        terminal: &mut Term,
        app: &mut App<H, B>,
    ) -> miette::Result<()> {
        loop {
            self.expire_toasts();
            let screen = app.screen();
            let rows = selectable_rows(&screen);
            self.cursor = self.cursor.min(rows.saturating_sub(1));
            let user = app.user().map(|user| user.login.clone());
            terminal
                .draw(|frame| self.draw_screen(frame, &screen, user.as_deref()))
                .into_diagnostic()?;

            if !event::poll(Duration::from_millis(120)).into_diagnostic()? {
                continue;
            }
            let Event::Key(key) = event::read().into_diagnostic()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if self.input.is_some() {
                self.handle_input(app, key);
                continue;
            }
            if self.handle_key(terminal, app, &screen, key)? {
                return Ok(());
            }
        }
    }

    fn handle_key<H: HostingApi, B: UploadBackend>(
        &mut self,
        terminal: &mut Term,
        app: &mut App<H, B>,
        screen: &Screen,
        key: KeyEvent,
    ) -> miette::Result<bool> {
        let action = action_for(screen, key.code, self.cursor);
        let keep_cursor = matches!(action, Action::Toggle(_));
        let result = match action {
            Action::None => return Ok(false),
            Action::Quit => return Ok(true),
            Action::Move(delta) => {
                let rows = selectable_rows(screen);
                if rows > 0 {
                    self.cursor = self.cursor.saturating_add_signed(delta).min(rows - 1);
                }
                return Ok(false);
            }
            Action::AddFiles => {
                self.input = Some(String::new());
                return Ok(false);
            }
            Action::Logout => Ok(app.logout()),
            Action::Dismiss => app.workflow_mut().dismiss(),
            Action::SelectFolder => app.workflow_mut().select_folder(),
            Action::Toggle(name) => app.workflow_mut().toggle_extraction(&name),
            other => self.run_busy(terminal, app.workflow_mut(), move |workflow, sink| {
                match other {
                    Action::Start => workflow.start(sink),
                    Action::Pick(repo) => workflow.pick_repository(repo, sink),
                    Action::Enter(name) => workflow.enter(&name),
                    Action::Parent => workflow.parent(),
                    Action::Root => workflow.open_folder(""),
                    Action::Confirm => workflow.confirm_extraction(sink),
                    Action::Skip => workflow.skip_extraction(sink),
                    Action::AcceptBootstrap => workflow.accept_bootstrap(sink),
                    Action::DeclineBootstrap => workflow.decline_bootstrap(sink),
                    _ => Ok(workflow_step(workflow)),
                }
            })?,
        };

        match result {
            Ok(step) => {
                if !keep_cursor {
                    self.cursor = 0;
                }
                for toast in step.toasts {
                    self.push_toast(toast);
                }
            }
            Err(err) => self.push_toast(Toast::error(err.to_string())),
        }
        Ok(false)
    }

    /// Runs a transition on a worker thread and keeps drawing progress until
    /// it settles. Input is drained but ignored: nothing can be cancelled.
    fn run_busy<H, B, F>(
        &mut self,
        terminal: &mut Term,
        workflow: &mut Workflow<H, B>,
        task: F,
    ) -> miette::Result<Result<Step, RepodropError>>
    where
        H: HostingApi,
        B: UploadBackend,
        F: FnOnce(&mut Workflow<H, B>, &dyn ProgressSink) -> Result<Step, RepodropError> + Send,
    {
        if let Ok(mut state) = self.busy.lock() {
            *state = BusyState {
                status: "Loading...".to_string(),
                ..BusyState::default()
            };
        }
        let sink = TuiProgress {
            state: self.busy.clone(),
        };

        thread::scope(|scope| {
            let handle = scope.spawn(|| task(workflow, &sink));
            let mut tick = 0usize;
            while !handle.is_finished() {
                let (status, uploading, events) = match self.busy.lock() {
                    Ok(state) => (
                        state.status.clone(),
                        state.uploading,
                        state.events.iter().cloned().collect::<Vec<_>>(),
                    ),
                    Err(_) => ("Loading...".to_string(), false, Vec::new()),
                };
                terminal
                    .draw(|frame| draw_busy(frame, &status, uploading, &events, tick))
                    .into_diagnostic()?;
                if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                    let _ = event::read().into_diagnostic()?;
                }
                tick = tick.wrapping_add(1);
            }
            handle
                .join()
                .map_err(|_| miette::Report::msg("workflow worker panicked"))
        })
    }

    fn handle_input<H: HostingApi, B: UploadBackend>(&mut self, app: &mut App<H, B>, key: KeyEvent) {
        let Some(input) = self.input.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char(ch) => input.push(ch),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Esc => self.input = None,
            KeyCode::Enter => {
                let typed = std::mem::take(input);
                self.input = None;
                match select_from_input(app.workflow_mut(), &typed) {
                    Ok(_) => self.cursor = 0,
                    Err(err) => self.push_toast(Toast::error(err.to_string())),
                }
            }
            _ => {}
        }
    }

    fn push_toast(&mut self, toast: Toast) {
        self.toasts.push_back((toast, Instant::now()));
    }

    fn expire_toasts(&mut self) {
        self.toasts
            .retain(|(_, shown_at)| shown_at.elapsed() < TOAST_TTL);
    }

    fn draw_screen(&self, frame: &mut ratatui::Frame, screen: &Screen, user: Option<&str>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(self.toasts.len() as u16 + 3),
            ])
            .split(frame.area());

        let mut header = vec![Span::styled(
            format!("REPODROP :: {}", screen.title().to_uppercase()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )];
        if let Some(user) = user {
            header.push(Span::styled(
                format!("   signed in as {user}"),
                Style::default().fg(Color::Gray),
            ));
        }
        frame.render_widget(
            Paragraph::new(Line::from(header)).block(Block::default().borders(Borders::BOTTOM)),
            chunks[0],
        );

        self.draw_body(frame, screen, chunks[1]);

        let mut footer = match &self.input {
            Some(input) => vec![
                Line::from(vec![
                    Span::styled("Files: ", Style::default().fg(Color::Yellow)),
                    Span::raw(format!("{input}_")),
                ]),
                Line::from(Span::styled(
                    "space-separated paths, quote paths with spaces · Enter select · Esc cancel",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
            None => vec![Line::from(Span::styled(
                hints(screen),
                Style::default().fg(Color::DarkGray),
            ))],
        };
        for (toast, _) in &self.toasts {
            let color = match toast.level {
                ToastLevel::Success => Color::Green,
                ToastLevel::Error => Color::Red,
            };
            footer.push(Line::from(Span::styled(
                toast.message.clone(),
                Style::default().fg(color),
            )));
        }
        frame.render_widget(
            Paragraph::new(footer).block(Block::default().borders(Borders::TOP)),
            chunks[2],
        );
    }

    fn draw_body(&self, frame: &mut ratatui::Frame, screen: &Screen, area: ratatui::layout::Rect) {
        let block = Block::default().borders(Borders::ALL).title(screen.title());
        let items = match screen {
            Screen::RepoPicker(picker) if !picker.repositories.is_empty() => picker
                .repositories
                .iter()
                .map(|repo| {
                    let badge = if repo.private { " (private)" } else { "" };
                    ListItem::new(format!("{}{badge}", repo.full_name))
                })
                .collect::<Vec<_>>(),
            Screen::Browser(view) if matches!(view.listing, Listing::Entries(_)) => view
                .entries()
                .iter()
                .map(|entry| {
                    if entry.is_dir() {
                        ListItem::new(Line::from(vec![
                            Span::styled("▸ ", Style::default().fg(Color::Yellow)),
                            Span::raw(entry.name.clone()),
                        ]))
                    } else {
                        ListItem::new(format!("  {}", entry.name))
                    }
                })
                .collect::<Vec<_>>(),
            Screen::Extraction(view) if !view.items.is_empty() => view
                .items
                .iter()
                .map(|item| {
                    let mark = if item.selected { "[x]" } else { "[ ]" };
                    ListItem::new(format!("{mark} {}", item.name))
                })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };

        if items.is_empty() {
            let mut lines = render_screen(screen)
                .into_iter()
                .skip(1)
                .map(Line::from)
                .collect::<Vec<_>>();
            if screen.is_login() {
                lines.push(Line::from(""));
                lines.push(Line::from("Open this URL to authorize:"));
                lines.push(Line::from(Span::styled(
                    self.login_url.clone(),
                    Style::default().fg(Color::Cyan),
                )));
            }
            frame.render_widget(
                Paragraph::new(lines)
                    .block(block)
                    .alignment(Alignment::Left)
                    .wrap(Wrap { trim: false }),
                area,
            );
            return;
        }

        let block = match screen {
            Screen::Browser(view) => block.title(
                view.breadcrumbs
                    .iter()
                    .map(|crumb| crumb.label.as_str())
                    .collect::<Vec<_>>()
                    .join(" / "),
            ),
            _ => block,
        };
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::Indexed(54))
                .add_modifier(Modifier::BOLD),
        );
        let mut state = ListState::default().with_selected(Some(self.cursor));
        frame.render_stateful_widget(list, area, &mut state);
    }
}

fn workflow_step<H: HostingApi, B: UploadBackend>(workflow: &Workflow<H, B>) -> Step {
    Step {
        stage: workflow.stage(),
        screen: workflow.screen(),
        toasts: Vec::new(),
        outcome: None,
    }
}

fn draw_busy(
    frame: &mut ratatui::Frame,
    status: &str,
    uploading: bool,
    events: &[String],
    tick: usize,
) {
    let title = if uploading { "Uploading" } else { "Working" };
    let spinner = SPINNER[tick % SPINNER.len()];
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("{spinner} {status}"),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(events.iter().map(|event| {
        Line::from(Span::styled(
            event.clone(),
            Style::default().fg(Color::DarkGray),
        ))
    }));
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title)),
        frame.area(),
    );
}
