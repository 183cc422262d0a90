use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use chat::{ChatComponent, Output};
use crossbeam::channel::{Receiver, Sender};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use persona::PersonaComponent;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};

use crate::sys::{CompletionService, Outcome, PersonaRegistry, Session};

pub mod chat;
pub mod persona;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// A session travelling to the completion worker together with the user text.
pub struct Request {
    pub session: Session,
    pub text: String,
}

/// The session coming back from the worker after one exchange.
pub struct Reply {
    pub session: Session,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// Runs submissions one at a time on a dedicated thread so the screen keeps
/// redrawing while the blocking call is in flight.
pub fn spawn_completion_worker<S>(
    service: S,
    rx: Receiver<Request>,
    tx: Sender<Reply>,
) -> std::thread::JoinHandle<()>
where
    S: CompletionService + Send + 'static,
{
    std::thread::spawn(move || {
        while let Ok(Request { session, text }) = rx.recv() {
            let start = Instant::now();
            let (session, outcome) = session.submit(&text, &service);
            let elapsed = start.elapsed();
            log::debug!("exchange finished in {elapsed:?}");
            if tx
                .send(Reply {
                    session,
                    outcome,
                    elapsed,
                })
                .is_err()
            {
                break;
            }
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingReply { text: String, since: Instant },
}

pub struct App {
    pub chat: ChatComponent,
    pub personas: PersonaComponent,
    registry: PersonaRegistry,
    session: Session,
    phase: Phase,
    status: String,
    export_dir: PathBuf,
    ticks: usize,
}

impl App {
    pub fn new(registry: PersonaRegistry, session: Session, export_dir: PathBuf) -> Self {
        Self {
            chat: ChatComponent::new(),
            personas: PersonaComponent::new(),
            registry,
            session,
            phase: Phase::Idle,
            status: String::new(),
            export_dir,
            ticks: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::AwaitingReply { .. })
    }

    pub fn render(&mut self, f: &mut Frame) {
        let vertical = Layout::vertical([
            Constraint::Length(2),
            Constraint::Min(8),
            Constraint::Length(1),
            Constraint::Length(1),
        ]);
        let [title_area, body_area, help_area, status_area] = vertical.areas(f.size());

        let title = Paragraph::new(vec![
            Line::from(vec![
                Span::raw("TimeTuah").bold(),
                Span::raw(" - Chat with Historical Figures"),
            ]),
            Line::from(vec![
                Span::raw("You are now chatting with "),
                Span::raw(self.session.active_persona().id.clone()).bold(),
                Span::raw("."),
            ]),
        ]);
        f.render_widget(title, title_area);

        let horizontal = Layout::horizontal([Constraint::Length(32), Constraint::Min(20)]);
        let [side_area, main_area] = horizontal.areas(body_area);

        self.personas
            .render(&self.registry, self.session.active_persona(), f, side_area);

        let pending = match &self.phase {
            Phase::AwaitingReply { text, .. } => Some(text.as_str()),
            Phase::Idle => None,
        };
        self.chat
            .render(self.session.transcript(), pending, f, main_area);

        let help_message = Paragraph::new(
            "help: [Enter send] [Ctrl+N/Ctrl+P persona] [Ctrl+S save] [PgUp/PgDn scroll] [Esc+Esc quit]",
        )
        .gray();
        f.render_widget(help_message, help_area);

        let status = match &self.phase {
            Phase::AwaitingReply { since, .. } => Line::raw(format!(
                "{} {} is thinking... {}s",
                SPINNER[self.ticks % SPINNER.len()],
                self.session.active_persona().id,
                since.elapsed().as_secs()
            ))
            .fg(Color::Cyan),
            Phase::Idle if self.status.starts_with("An error occurred") => {
                Line::styled(self.status.clone(), Style::new().fg(Color::Red))
            }
            Phase::Idle => Line::raw(self.status.clone()),
        };
        f.render_widget(Paragraph::new(status), status_area);
    }

    /// Starts an exchange unless the text is blank or a reply is pending.
    /// Returns the request to hand to the worker.
    pub fn begin_submit(&mut self, text: String) -> Option<Request> {
        if self.is_busy() || !Session::accepts(&text) {
            return None;
        }
        self.status.clear();
        self.phase = Phase::AwaitingReply {
            text: text.clone(),
            since: Instant::now(),
        };
        Some(Request {
            session: self.session.clone(),
            text,
        })
    }

    pub fn finish_submit(&mut self, reply: Reply) {
        self.session = reply.session;
        self.phase = Phase::Idle;
        match reply.outcome {
            Outcome::Failed(err) => {
                self.status = format!("An error occurred: {err}");
            }
            Outcome::Replied(_) => {
                self.status = format!("replied in {:.1}s", reply.elapsed.as_secs_f32());
            }
            Outcome::Ignored => {}
        }
    }

    pub fn switch_persona(&mut self, step: isize) {
        if self.is_busy() {
            return;
        }
        let current = self.session.active_persona().id.clone();
        if let Some(next) = self.registry.cycle(&current, step) {
            self.session.select_persona(next.clone());
            self.status = format!("You are now chatting with {}.", next.id);
        }
    }

    pub fn export(&mut self) {
        if self.is_busy() {
            self.status = "wait for the reply before saving".to_string();
            return;
        }
        self.status = match self.session.export_to(&self.export_dir) {
            Ok(path) => format!("transcript saved to {}", path.display()),
            Err(err) => format!("An error occurred: {err}"),
        };
    }

    pub fn run_loop<S>(mut self, service: S) -> anyhow::Result<()>
    where
        S: CompletionService + Send + 'static,
    {
        let (request_tx, request_rx) = crossbeam::channel::unbounded();
        let (reply_tx, reply_rx) = crossbeam::channel::unbounded();
        let _worker = spawn_completion_worker(service, request_rx, reply_tx);

        let (event_tx, event_rx) = crossbeam::channel::unbounded();
        std::thread::spawn(move || -> anyhow::Result<()> {
            loop {
                let event = event::read()?;
                if event_tx.send(event).is_err() {
                    break Ok(());
                }
            }
        });

        // setup terminal
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let mut main_loop = || -> anyhow::Result<()> {
            let mut quit = false;
            while !quit {
                terminal.draw(|f| self.render(f))?;

                crossbeam::select! {
                    recv(event_rx) -> event => {
                        let event: Event = event?;
                        let busy = self.is_busy();
                        match self.chat.handler_input(event, busy) {
                            Output::Exit => quit = true,
                            Output::Submit(text) => {
                                if let Some(request) = self.begin_submit(text) {
                                    request_tx.send(request)?;
                                }
                            }
                            Output::SwitchPersona(step) => self.switch_persona(step),
                            Output::Export => self.export(),
                            Output::Normal => {}
                        }
                    }
                    recv(reply_rx) -> reply => {
                        self.finish_submit(reply?);
                    }
                    default(Duration::from_millis(200)) => {
                        self.ticks = self.ticks.wrapping_add(1);
                    }
                }
            }
            Ok(())
        };

        let r = main_loop();

        // restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        r
    }
}
