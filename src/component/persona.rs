use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{Block, List, ListState, Paragraph, Wrap},
    Frame,
};

use crate::sys::{Persona, PersonaRegistry};

/// Sidebar: persona list on top, resource link for the active persona below.
pub struct PersonaComponent {
    state: ListState,
}

impl PersonaComponent {
    pub fn new() -> Self {
        Self {
            state: ListState::default(),
        }
    }

    pub fn render(
        &mut self,
        registry: &PersonaRegistry,
        active: &Persona,
        frame: &mut Frame,
        area: Rect,
    ) {
        let vertical = Layout::vertical([Constraint::Min(3), Constraint::Length(7)]);
        let [list_area, resource_area] = vertical.areas(area);

        self.state.select(registry.position(&active.id));
        let list = List::new(registry.ids())
            .block(Block::bordered().title("Select a Historical Figure").gray())
            .highlight_style(Style::new().fg(Color::Black).bg(Color::Cyan))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, list_area, &mut self.state);

        frame.render_widget(
            Paragraph::new(resource_lines(active))
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title("Resources").gray()),
            resource_area,
        );
    }
}

fn resource_lines(persona: &Persona) -> Vec<Line<'static>> {
    match persona.resource_url() {
        Some(url) => vec![
            Line::raw(format!("Learn more about {}:", persona.id)),
            Line::raw(url.to_string()).underlined().fg(Color::Blue),
        ],
        None => vec![Line::raw(format!("No resources for {}.", persona.id))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_lines_show_link_or_placeholder() {
        let registry = PersonaRegistry::builtin();
        let lines = resource_lines(&registry.lookup("Cleopatra"));
        assert_eq!(lines[0].to_string(), "Learn more about Cleopatra:");
        assert_eq!(lines[1].to_string(), "https://www.worldhistory.org/Cleopatra_VII/");

        let lines = resource_lines(&registry.lookup("Napoleon"));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].to_string(), "No resources for Napoleon.");
    }
}
