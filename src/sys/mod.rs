pub mod llm;
pub mod persona;
pub mod session;

pub use llm::{CompletionError, CompletionRequest, CompletionService, GroqClient, ModelConfig};
pub use persona::{Persona, PersonaRegistry};
pub use session::{ContextPolicy, FailurePolicy, Outcome, Session, Speaker, Turn};
