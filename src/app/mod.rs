use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use strum::{Display, EnumString};

use crate::config::AppConfig;
use crate::remote::{BlobWorker, Completion, Job, RemoteBlobClient, SaveFailure, Ticket};
use crate::timefmt::{Clock, TimeFormatter};
use crate::ui;

pub mod admin;
pub mod feed;

pub use admin::{AdminInput, AdminPhase, AdminView, SaveState};
pub use feed::{FeedCard, FeedPhase, FeedView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Route {
    Feed,
    Admin,
}

impl Route {
    pub fn other(self) -> Self {
        match self {
            Route::Feed => Route::Admin,
            Route::Admin => Route::Feed,
        }
    }
}

#[derive(Debug)]
pub enum Screen {
    Feed(FeedView),
    Admin(AdminView),
}

impl Screen {
    pub fn route(&self) -> Route {
        match self {
            Screen::Feed(_) => Route::Feed,
            Screen::Admin(_) => Route::Admin,
        }
    }
}

enum Action {
    Quit,
    Navigate,
    SelectNext,
    SelectPrevious,
    Compose,
    EditSelected,
    DeleteSelected,
    Save,
}

pub struct App {
    config: Arc<AppConfig>,
    clock: Arc<dyn Clock>,
    formatter: TimeFormatter,
    worker: BlobWorker,
    screen: Screen,
    list_state: ListState,
    mount: u64,
    seq: u64,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        client: RemoteBlobClient,
        clock: Arc<dyn Clock>,
        route: Route,
    ) -> Result<Self> {
        let worker = BlobWorker::spawn(client).context("starting blob worker")?;
        let formatter = TimeFormatter::new(config.display.zone());
        let placeholder = Screen::Feed(FeedView::mount(
            clock.as_ref(),
            config.display.refresh_interval(),
        ));
        let mut app = Self {
            config,
            clock,
            formatter,
            worker,
            screen: placeholder,
            list_state: ListState::default(),
            mount: 0,
            seq: 0,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        };
        app.navigate(route)?;
        Ok(app)
    }

    pub fn route(&self) -> Route {
        self.screen.route()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Mounts a fresh view for `route` and kicks off its load. Whatever was
    /// mounted before is dropped along with its refresh ticker, and any of its
    /// outstanding completions will be ignored.
    pub fn navigate(&mut self, route: Route) -> Result<()> {
        self.mount += 1;
        self.seq = 0;
        self.screen = match route {
            Route::Feed => Screen::Feed(FeedView::mount(
                self.clock.as_ref(),
                self.config.display.refresh_interval(),
            )),
            Route::Admin => Screen::Admin(AdminView::mount()),
        };
        self.list_state = ListState::default();
        tracing::info!(%route, mount = self.mount, "mounted view");
        let ticket = self.next_ticket();
        self.worker
            .submit(Job::Load { ticket })
            .with_context(|| format!("requesting statuses for the {route} view"))
    }

    fn next_ticket(&mut self) -> Ticket {
        self.seq += 1;
        Ticket {
            mount: self.mount,
            seq: self.seq,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            self.pump_completions();
            terminal
                .draw(|frame| {
                    if let Screen::Admin(view) = &self.screen {
                        if view.store().is_empty() {
                            self.list_state.select(None);
                        } else {
                            self.list_state.select(Some(view.selected()));
                        }
                    }
                    ui::draw_app(
                        frame,
                        &self.screen,
                        &self.formatter,
                        &self.config.display,
                        &mut self.list_state,
                    );
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // next draw picks up the new size
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    /// Applies every completion that has arrived without blocking.
    pub fn pump_completions(&mut self) {
        while let Some(completion) = self.worker.try_recv() {
            self.apply_completion(completion);
        }
    }

    fn apply_completion(&mut self, completion: Completion) {
        let ticket = completion.ticket();
        if ticket.mount != self.mount {
            tracing::debug!(?ticket, mount = self.mount, "dropping completion for an unmounted view");
            return;
        }
        match (completion, &mut self.screen) {
            (Completion::Loaded { result, .. }, Screen::Feed(view)) => view.apply_load(result),
            (Completion::Loaded { result, .. }, Screen::Admin(view)) => view.apply_load(result),
            (Completion::Saved { result, .. }, Screen::Admin(view)) => view.apply_save(result),
            (Completion::Saved { .. }, Screen::Feed(_)) => {
                tracing::warn!(?ticket, "save completion delivered to the feed view");
            }
        }
    }

    fn on_tick(&mut self) {
        if let Screen::Feed(view) = &mut self.screen {
            if view.tick(self.clock.as_ref()) {
                tracing::trace!("refreshed feed clock");
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_input_key(key) {
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Tab => Some(Action::Navigate),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('n') | KeyCode::Char('a') if plain => Some(Action::Compose),
            KeyCode::Char('e') | KeyCode::Enter if plain => Some(Action::EditSelected),
            KeyCode::Char('d') | KeyCode::Delete if plain => Some(Action::DeleteSelected),
            KeyCode::Char('s') => Some(Action::Save),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    /// Keys typed into the admin input field. Returns true when consumed.
    fn handle_input_key(&mut self, key: KeyEvent) -> bool {
        let Screen::Admin(view) = &mut self.screen else {
            return false;
        };
        if matches!(view.input(), AdminInput::Browse) {
            return false;
        }
        match key.code {
            KeyCode::Esc => view.cancel_input(),
            KeyCode::Enter => {
                view.commit_input(self.clock.now());
            }
            KeyCode::Backspace => view.pop_char(),
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.handle_action(Action::Save);
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER) =>
            {
                view.push_char(ch);
            }
            _ => {}
        }
        true
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::Navigate => {
                let route = self.route().other();
                if let Err(err) = self.navigate(route) {
                    tracing::error!(?err, "failed to switch view");
                }
            }
            Action::SelectNext => self.move_selection(1),
            Action::SelectPrevious => self.move_selection(-1),
            Action::Compose => {
                if let Screen::Admin(view) = &mut self.screen {
                    view.begin_compose();
                }
            }
            Action::EditSelected => {
                if let Screen::Admin(view) = &mut self.screen {
                    view.begin_edit_selected();
                }
            }
            Action::DeleteSelected => {
                if let Screen::Admin(view) = &mut self.screen {
                    view.remove_selected();
                }
            }
            Action::Save => self.request_save(),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        match &mut self.screen {
            Screen::Feed(view) => view.scroll_by(delta),
            Screen::Admin(view) => view.move_selection(delta),
        }
    }

    fn request_save(&mut self) {
        let Screen::Admin(view) = &mut self.screen else {
            return;
        };
        let Some(request) = view.begin_save() else {
            return;
        };
        let ticket = self.next_ticket();
        let job = Job::Save {
            ticket,
            entries: request.entries,
            etag: request.etag,
        };
        if let Err(err) = self.worker.submit(job) {
            tracing::error!(?err, "failed to queue save");
            if let Screen::Admin(view) = &mut self.screen {
                view.apply_save(Err(SaveFailure::Transport(err.to_string())));
            }
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal")?;
    terminal.clear().context("clearing terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leaving alternate screen")?;
    terminal.show_cursor().context("showing cursor")?;
    Ok(())
}
