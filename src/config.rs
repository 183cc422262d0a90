use std::path::{Path, PathBuf};

use crate::sys::{ContextPolicy, FailurePolicy, ModelConfig, Persona, PersonaRegistry, Session};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file `{}` could not be read: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Contents of the optional TOML config file. Every section may be left out.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct Project {
    pub model: ModelConfig,
    pub session: SessionOptions,
    pub personas: Vec<Persona>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub on_failure: FailurePolicy,
    pub context: ContextPolicy,
    pub initial_persona: Option<String>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let project = Self::from_toml(&text)?;
        log::info!("config loaded from {}", path.display());
        Ok(project)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut project: Project = toml::from_str(text)?;
        project.fill_default_value();
        project.validate()?;
        Ok(project)
    }

    pub fn fill_default_value(&mut self) {
        self.model.fill_default_value();
        for persona in &mut self.personas {
            persona.id = persona.id.trim().to_string();
            if persona
                .resource_url
                .as_deref()
                .is_some_and(|url| url.trim().is_empty())
            {
                persona.resource_url = None;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be within 0.0..=2.0, got {}",
                self.model.temperature
            )));
        }
        if self.model.max_tokens == Some(0) {
            return Err(ConfigError::Invalid("model.max_tokens must be positive".into()));
        }
        for persona in &self.personas {
            if persona.id.is_empty() {
                return Err(ConfigError::Invalid("persona with an empty id".into()));
            }
            if persona.system_prompt.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "persona `{}` has an empty system_prompt",
                    persona.id
                )));
            }
        }
        Ok(())
    }

    /// Built-in personas followed by the ones from the config file.
    pub fn registry(&self) -> PersonaRegistry {
        let mut registry = PersonaRegistry::builtin();
        for persona in &self.personas {
            registry.insert(persona.clone());
        }
        registry
    }

    /// A fresh session on `persona`, the configured initial persona, or the
    /// first registered one.
    pub fn new_session(&self, registry: &PersonaRegistry, persona: Option<&str>) -> Session {
        let persona = persona
            .or(self.session.initial_persona.as_deref())
            .map(|id| registry.lookup(id))
            .or_else(|| registry.at(0).cloned())
            .unwrap_or_else(|| Persona::fallback("Yourself"));
        Session::new(persona)
            .with_context(self.session.context)
            .with_failure_policy(self.session.on_failure)
    }
}
