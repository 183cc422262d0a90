use std::path::{Path, PathBuf};

use anyhow::anyhow;
use chrono::{DateTime, Local};

use super::llm::{CompletionError, CompletionRequest, CompletionService, Content, Role};
use super::persona::Persona;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Speaker {
    User,
    /// Carries the id of the persona that produced the reply.
    Persona(String),
}

impl Speaker {
    pub fn label(&self) -> &str {
        match self {
            Speaker::User => "You",
            Speaker::Persona(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn persona(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Persona(id.into()),
            text: text.into(),
        }
    }

    fn as_content(&self) -> Content {
        let role = match self.speaker {
            Speaker::User => Role::User,
            Speaker::Persona(_) => Role::Assistant,
        };
        Content::new(role, self.text.clone())
    }
}

/// What happens to the user turn when the completion call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the user turn, the transcript grows by one.
    #[default]
    Retain,
    /// Drop the user turn so turns always come in pairs.
    Rollback,
}

/// How the completion request is framed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextPolicy {
    /// Persona prompt and the new message only.
    #[default]
    Stateless,
    /// Persona prompt, every prior turn, then the new message.
    Transcript,
}

impl ContextPolicy {
    pub fn build(&self, persona: &Persona, prior: &[Turn], user_text: &str) -> CompletionRequest {
        let history = match self {
            ContextPolicy::Stateless => Vec::new(),
            ContextPolicy::Transcript => prior.iter().map(Turn::as_content).collect(),
        };
        CompletionRequest {
            system_prompt: persona.system_prompt.clone(),
            history,
            user_message: user_text.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// Blank input, nothing recorded and nothing sent.
    Ignored,
    Replied(String),
    Failed(CompletionError),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// The live state of one conversation.
#[derive(Debug, Clone)]
pub struct Session {
    active_persona: Persona,
    transcript: Vec<Turn>,
    context: ContextPolicy,
    on_failure: FailurePolicy,
}

impl Session {
    pub fn new(persona: Persona) -> Self {
        Self {
            active_persona: persona,
            transcript: Vec::new(),
            context: ContextPolicy::default(),
            on_failure: FailurePolicy::default(),
        }
    }

    pub fn with_context(mut self, context: ContextPolicy) -> Self {
        self.context = context;
        self
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn active_persona(&self) -> &Persona {
        &self.active_persona
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Switches persona. The transcript is left as it is.
    pub fn select_persona(&mut self, persona: Persona) {
        if persona.id != self.active_persona.id {
            log::info!("persona: {} -> {}", self.active_persona.id, persona.id);
        }
        self.active_persona = persona;
    }

    pub fn accepts(user_text: &str) -> bool {
        !user_text.trim().is_empty()
    }

    /// Runs one exchange: record the user turn, ask the service, record the reply.
    ///
    /// Blank input is ignored. On failure the session keeps or drops the user
    /// turn according to its [`FailurePolicy`]; no retry happens here.
    pub fn submit<S: CompletionService + ?Sized>(
        mut self,
        user_text: &str,
        service: &S,
    ) -> (Session, Outcome) {
        if !Self::accepts(user_text) {
            return (self, Outcome::Ignored);
        }

        self.transcript.push(Turn::user(user_text));
        let prior = &self.transcript[..self.transcript.len() - 1];
        let request = self.context.build(&self.active_persona, prior, user_text);
        log::info!(
            "submit to `{}`: {} chars, {} history messages",
            self.active_persona.id,
            user_text.len(),
            request.history.len()
        );

        match service.complete(&request) {
            Ok(reply) => {
                self.transcript
                    .push(Turn::persona(self.active_persona.id.clone(), reply.clone()));
                (self, Outcome::Replied(reply))
            }
            Err(err) => {
                log::error!("completion failed: {err}");
                if self.on_failure == FailurePolicy::Rollback {
                    self.transcript.pop();
                }
                (self, Outcome::Failed(err))
            }
        }
    }

    pub fn to_toml(&self, exported_at: DateTime<Local>) -> anyhow::Result<String> {
        let file = TranscriptFile {
            persona: &self.active_persona.id,
            resource_url: self.active_persona.resource_url(),
            exported_at: exported_at.to_rfc3339(),
            turns: self
                .transcript
                .iter()
                .map(|turn| ExportedTurn {
                    speaker: turn.speaker.label(),
                    text: &turn.text,
                })
                .collect(),
        };
        toml::to_string_pretty(&file).map_err(|e| anyhow!("toml::to_string_pretty err:{e}"))
    }

    /// Writes the transcript into `dir` and returns the file path.
    pub fn export_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let now = Local::now();
        let contents = self.to_toml(now)?;
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow!("create dir `{}` err:{e}", dir.display()))?;
        let path = dir.join(format!(
            "transcript-{}-{}.toml",
            file_stem(&self.active_persona.id),
            now.format("%Y%m%d-%H%M%S")
        ));
        std::fs::write(&path, contents).map_err(|e| anyhow!("save to file err:{e}"))?;
        log::info!("transcript saved to {}", path.display());
        Ok(path)
    }
}

#[derive(serde::Serialize)]
struct TranscriptFile<'a> {
    persona: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_url: Option<&'a str>,
    exported_at: String,
    turns: Vec<ExportedTurn<'a>>,
}

#[derive(serde::Serialize)]
struct ExportedTurn<'a> {
    speaker: &'a str,
    text: &'a str,
}

fn file_stem(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "persona".to_string()
    } else {
        stem.to_string()
    }
}
