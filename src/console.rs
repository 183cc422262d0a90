use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use crate::sys::{CompletionService, Outcome, PersonaRegistry, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    ListPersonas,
    Persona(String),
    /// `/persona` without a name.
    PersonaUsage,
    Save,
    Say(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let trimmed = line.trim();
        match trimmed.split_once(char::is_whitespace) {
            _ if trimmed == "/quit" || trimmed == "exit!" => Command::Quit,
            _ if trimmed == "/personas" => Command::ListPersonas,
            _ if trimmed == "/save" => Command::Save,
            _ if trimmed == "/persona" => Command::PersonaUsage,
            Some(("/persona", id)) => Command::Persona(id.trim().to_string()),
            _ => Command::Say(line.to_string()),
        }
    }
}

/// Line-oriented front end: one line in, one reply out.
pub struct ConsoleApp {
    registry: PersonaRegistry,
    session: Session,
    export_dir: PathBuf,
}

impl ConsoleApp {
    pub fn new(registry: PersonaRegistry, session: Session, export_dir: PathBuf) -> Self {
        Self {
            registry,
            session,
            export_dir,
        }
    }

    fn banner<W: Write>(&self, output: &mut W) -> std::io::Result<()> {
        let persona = self.session.active_persona();
        writeln!(output, "You are now chatting with {}.", persona.id)?;
        if let Some(url) = persona.resource_url() {
            writeln!(output, "Learn more about {}: {}", persona.id, url)?;
        }
        Ok(())
    }

    fn list_personas<W: Write>(&self, output: &mut W) -> std::io::Result<()> {
        for id in self.registry.ids() {
            let marker = if id == self.session.active_persona().id { "*" } else { " " };
            writeln!(output, "{marker} {id}")?;
        }
        Ok(())
    }

    pub fn run_loop<S, R, W>(mut self, service: &S, input: R, mut output: W) -> anyhow::Result<Session>
    where
        S: CompletionService + ?Sized,
        R: BufRead,
        W: Write,
    {
        writeln!(output, "TimeTuah - Chat with Historical Figures")?;
        writeln!(output, "commands: /personas, /persona <name>, /save, /quit")?;
        self.banner(&mut output)?;

        for line in input.lines() {
            match Command::parse(&line?) {
                Command::Quit => break,
                Command::ListPersonas => self.list_personas(&mut output)?,
                Command::PersonaUsage => {
                    writeln!(output, "usage: /persona <name>")?;
                    self.list_personas(&mut output)?;
                }
                Command::Persona(id) => {
                    self.session.select_persona(self.registry.lookup(&id));
                    self.banner(&mut output)?;
                }
                Command::Save => match self.session.export_to(&self.export_dir) {
                    Ok(path) => writeln!(output, "transcript saved to {}", path.display())?,
                    Err(err) => writeln!(output, "An error occurred: {err}")?,
                },
                Command::Say(text) => {
                    let (session, outcome) = self.session.submit(&text, service);
                    self.session = session;
                    match outcome {
                        Outcome::Ignored => {}
                        Outcome::Replied(reply) => {
                            writeln!(output, "{}: {}", self.session.active_persona().id, reply)?
                        }
                        Outcome::Failed(err) => writeln!(output, "An error occurred: {err}")?,
                    }
                }
            }
            output.flush()?;
        }

        Ok(self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("/quit\n"), Command::Quit);
        assert_eq!(Command::parse("exit!"), Command::Quit);
        assert_eq!(Command::parse(" /personas "), Command::ListPersonas);
        assert_eq!(
            Command::parse("/persona Leonardo da Vinci"),
            Command::Persona("Leonardo da Vinci".to_string())
        );
        assert_eq!(Command::parse("/save"), Command::Save);
        assert_eq!(Command::parse("/persona"), Command::PersonaUsage);
        assert_eq!(Command::parse("  /persona   \n"), Command::PersonaUsage);
        assert_eq!(
            Command::parse("What is time?\r\n"),
            Command::Say("What is time?".to_string())
        );
        assert_eq!(Command::parse(""), Command::Say(String::new()));
    }
}
