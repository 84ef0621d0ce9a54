use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::providers::ModelRegistry;
use crate::state::{PersonaConfig, SessionContext, StateSnapshot};
use crate::tools::ToolRegistry;

/// One model invocation: resolve the back-end, bind the persona's tool set,
/// build the system directive, and append the reply.
///
/// Invocation failures are fatal for the turn — no automatic retry; the
/// caller renders the error as a visible reply instead of failing silently.
pub struct AgentThinkNode {
    models: Arc<ModelRegistry>,
    tools: Arc<ToolRegistry>,
}

impl AgentThinkNode {
    #[must_use]
    pub fn new(models: Arc<ModelRegistry>, tools: Arc<ToolRegistry>) -> Self {
        Self { models, tools }
    }
}

/// System directive combining persona prompt, session identifiers, and the
/// current date/time.
pub(crate) fn build_directive(
    persona: &PersonaConfig,
    session: &SessionContext,
    now: DateTime<Utc>,
) -> String {
    format!(
        "{}\n\nAttendance context: protocol {}, attendance {}, contact {}.\nCurrent date and time: {}.",
        persona.system_prompt,
        session.protocol_number,
        session.attendance_id,
        session.contact_id,
        now.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

#[async_trait]
impl Node for AgentThinkNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let params = snapshot.model.as_ref().ok_or(NodeError::MissingInput {
            what: "model parameters",
        })?;

        let model = self.models.resolve(params)?;
        let specs = self.tools.resolve_specs(&snapshot.persona.available_tools);
        let model = if specs.is_empty() {
            model
        } else {
            model.bind_tools(specs)
        };

        let directive = build_directive(&snapshot.persona, &snapshot.session, Utc::now());
        ctx.emit("think", format!("invoking {}", params.provider));
        let reply = model.invoke(&snapshot.messages, &directive).await?;

        Ok(NodePartial::new().with_messages(vec![reply]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_carries_prompt_identifiers_and_clock() {
        use chrono::TimeZone;

        let persona = PersonaConfig {
            persona_id: "support".into(),
            system_prompt: "You are the support assistant.".into(),
            available_tools: vec![],
        };
        let session = SessionContext {
            protocol_number: "P42".into(),
            attendance_id: "A7".into(),
            contact_id: "C9".into(),
            base_url: "https://console.example".into(),
        };
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap();

        let directive = build_directive(&persona, &session, now);
        assert!(directive.starts_with("You are the support assistant."));
        assert!(directive.contains("protocol P42"));
        assert!(directive.contains("attendance A7"));
        assert!(directive.contains("contact C9"));
        assert!(directive.contains("2025-06-01 12:30:00 UTC"));
    }
}
