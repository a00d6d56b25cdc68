//! Prompt rendering via `minijinja`.
//!
//! The two templates are compiled into the binary; an agent pool needs no
//! filesystem access at runtime. The turn template receives a flattened
//! JSON view of everything the seat is entitled to know plus a task line
//! describing the decision it must make.

use minijinja::Environment;

use crate::error::AgentError;

/// The system prompt establishing the table and the response contract.
const SYSTEM_TEMPLATE: &str = include_str!("../templates/system.j2");

/// The per-decision prompt: identity, knowledge, situation, task.
const TURN_TEMPLATE: &str = include_str!("../templates/turn.j2");

/// Renders decision prompts from a seat's view of the game.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// A rendered prompt ready to send to a model.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the game and the output contract.
    pub system: String,
    /// User message carrying the seat's view and its task.
    pub user: String,
}

impl PromptEngine {
    /// Compile the embedded templates.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Template`] if a template fails to compile,
    /// which would indicate a build defect rather than a runtime condition.
    pub fn new() -> Result<Self, AgentError> {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .map_err(|e| AgentError::Template(format!("failed to add system template: {e}")))?;
        env.add_template("turn", TURN_TEMPLATE)
            .map_err(|e| AgentError::Template(format!("failed to add turn template: {e}")))?;
        Ok(Self { env })
    }

    /// Render both messages from the seat's view context.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Template`] when rendering fails, usually a
    /// missing context field.
    pub fn render(&self, context: &serde_json::Value) -> Result<RenderedPrompt, AgentError> {
        let system = self
            .env
            .get_template("system")
            .map_err(|e| AgentError::Template(format!("missing system template: {e}")))?
            .render(context)
            .map_err(|e| AgentError::Template(format!("system render failed: {e}")))?;

        let user = self
            .env
            .get_template("turn")
            .map_err(|e| AgentError::Template(format!("missing turn template: {e}")))?
            .render(context)
            .map_err(|e| AgentError::Template(format!("turn render failed: {e}")))?;

        Ok(RenderedPrompt { system, user })
    }
}
