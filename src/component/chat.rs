use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;
use ratatui::style::{Color, Style, Stylize};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Text},
    widgets::{Block, Paragraph},
    Frame,
};
use tui_textarea::TextArea;
use unicode_width::UnicodeWidthChar;

use crate::sys::{Speaker, Turn};

pub struct MessagesComponent {
    cursor: (u16, u16),
    last_mouse_event: MouseEvent,
    pub lock_on_bottom: bool,
    area: Rect,
    active: bool,
}

impl MessagesComponent {
    pub fn new() -> Self {
        Self {
            cursor: (0, 0),
            lock_on_bottom: true,
            active: true,
            area: Rect::default(),
            last_mouse_event: MouseEvent {
                row: 0,
                column: 0,
                kind: MouseEventKind::Moved,
                modifiers: KeyModifiers::empty(),
            },
        }
    }

    fn update_active(&mut self, event: MouseEvent) {
        if event.kind == MouseEventKind::Down(MouseButton::Left) {
            self.active = self.area.contains(Position::new(event.column, event.row))
        }
        if event.kind == MouseEventKind::Drag(MouseButton::Left) && self.active {
            self.move_scroll(event);
        }
        self.last_mouse_event = event;
    }

    fn push_wrapped(text: &mut Text<'static>, message: &str, width: u16, style: Style) {
        let max_len = (width.max(3) - 2) as usize;
        let mut s = String::with_capacity(max_len);
        let mut len = 0;
        for c in message.chars() {
            if c == '\n' {
                text.extend([Line::raw(std::mem::take(&mut s)).style(style)]);
                len = 0;
                continue;
            }
            let w = c.width().unwrap_or(0);
            if len + w > max_len && !s.is_empty() {
                text.extend([Line::raw(std::mem::take(&mut s)).style(style)]);
                len = 0;
            }
            s.push(c);
            len += w;
        }
        if !s.is_empty() || message.is_empty() {
            text.extend([Line::raw(s).style(style)]);
        }
    }

    pub fn render(&mut self, turns: &[Turn], pending: Option<&str>, frame: &mut Frame, area: Rect) {
        self.area = area;
        let mut text = Text::default();
        let pending_turn = pending.map(Turn::user);
        for turn in turns.iter().chain(pending_turn.iter()) {
            let style = match turn.speaker {
                Speaker::Persona(_) => Style::new().fg(Color::Cyan),
                Speaker::User => Style::new().fg(Color::Yellow),
            };
            text.extend([Line::styled(format!("{}:", turn.speaker.label()), style.bold())]);
            Self::push_wrapped(&mut text, &turn.text, area.width, style);
            text.extend([Line::raw("")]);
        }

        let line_n = text.lines.len();

        let max_line = area.height.saturating_sub(2) as usize;
        if line_n > max_line {
            let max_cursor = line_n - max_line;
            if self.cursor.0 >= max_cursor as u16 {
                self.lock_on_bottom = true;
            }

            if self.lock_on_bottom {
                self.cursor.0 = max_cursor as u16;
            }
        } else {
            self.cursor.0 = 0;
        }

        let paragraph = Paragraph::new(text)
            .block(Block::bordered().title("Conversation").gray())
            .scroll(self.cursor);
        frame.render_widget(paragraph, area);
    }

    pub fn move_scroll(&mut self, event: MouseEvent) {
        let (delta_y, delta_x) = (
            event.row as i16 - self.last_mouse_event.row as i16,
            event.column as i16 - self.last_mouse_event.column as i16,
        );
        if delta_x != 0 {
            self.cursor.1 = (self.cursor.1 as i16 - delta_x).max(0) as u16;
        }
        if delta_y != 0 {
            self.cursor.0 = (self.cursor.0 as i16 - delta_y).max(0) as u16;
            self.lock_on_bottom = false;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.cursor.0 = self.cursor.0.saturating_sub(lines);
        self.lock_on_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.cursor.0 = self.cursor.0.saturating_add(lines);
    }

    pub fn handler_input(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::ScrollDown => {
                if event.modifiers.contains(KeyModifiers::CONTROL) {
                    self.cursor.1 += 6;
                } else {
                    self.scroll_down(3);
                }
            }
            MouseEventKind::ScrollUp => {
                if event.modifiers.contains(KeyModifiers::CONTROL) {
                    self.cursor.1 = self.cursor.1.saturating_sub(6);
                } else {
                    self.scroll_up(3);
                }
            }
            _ => {}
        }
        self.update_active(event);
    }
}

pub struct ChatComponent {
    pub messages: MessagesComponent,
    input: TextArea<'static>,
    area: Rect,
    exit_n: u8,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Output {
    Exit,
    Submit(String),
    SwitchPersona(isize),
    Export,
    Normal,
}

impl ChatComponent {
    pub fn new() -> Self {
        Self {
            messages: MessagesComponent::new(),
            input: Self::new_textarea(),
            exit_n: 0,
            area: Rect::default(),
        }
    }

    pub fn render(
        &mut self,
        turns: &[Turn],
        pending: Option<&str>,
        frame: &mut Frame,
        area: Rect,
    ) {
        let vertical = Layout::vertical([Constraint::Min(5), Constraint::Length(3)]);
        let [messages_area, input_area] = vertical.areas(area);

        self.area = input_area;

        self.messages.render(turns, pending, frame, messages_area);
        let title = if pending.is_some() {
            "Ask a question: (waiting for reply)"
        } else {
            "Ask a question:"
        };
        self.input.set_block(Block::bordered().title(title).gray());
        frame.render_widget(self.input.widget(), input_area);
    }

    fn new_textarea() -> TextArea<'static> {
        TextArea::default()
    }

    pub fn input_text(&self) -> String {
        self.input.lines().join("\n")
    }

    fn take_message(&mut self) -> String {
        let mut new_textarea = Self::new_textarea();
        std::mem::swap(&mut self.input, &mut new_textarea);
        self.messages.lock_on_bottom = true;
        new_textarea.into_lines().join("\n")
    }

    /// Maps one terminal event to an action. `busy` blocks submission and
    /// persona switching while a reply is pending.
    pub fn handler_input(&mut self, event: Event, busy: bool) -> Output {
        let output = match event {
            Event::Key(key) if key.kind != KeyEventKind::Press => Output::Normal,
            Event::Key(key)
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                return Output::Exit;
            }
            Event::Key(key) if key.code == KeyCode::Esc => {
                self.exit_n += 2;
                if self.exit_n >= 3 {
                    return Output::Exit;
                }
                Output::Normal
            }
            Event::Key(key) if key.code == KeyCode::Enter => {
                if busy {
                    Output::Normal
                } else {
                    Output::Submit(self.take_message())
                }
            }
            Event::Key(key) if key.modifiers.contains(KeyModifiers::CONTROL) => match key.code {
                KeyCode::Char('n') if !busy => Output::SwitchPersona(1),
                KeyCode::Char('p') if !busy => Output::SwitchPersona(-1),
                KeyCode::Char('s') => Output::Export,
                _ => {
                    self.input.input(key);
                    Output::Normal
                }
            },
            Event::Key(key) if key.code == KeyCode::PageUp => {
                self.messages.scroll_up(10);
                Output::Normal
            }
            Event::Key(key) if key.code == KeyCode::PageDown => {
                self.messages.scroll_down(10);
                Output::Normal
            }
            Event::Key(key) => {
                self.input.input(key);
                Output::Normal
            }
            Event::Mouse(event) => {
                if !self.area.contains(Position::new(event.column, event.row)) {
                    self.messages.handler_input(event);
                }
                Output::Normal
            }
            Event::Paste(text) => {
                self.input.insert_str(text.replace('\n', " "));
                Output::Normal
            }
            _ => Output::Normal,
        };

        self.exit_n = self.exit_n.saturating_sub(1);
        output
    }
}
