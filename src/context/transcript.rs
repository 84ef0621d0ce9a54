//! Transcript assembly: sorting, speaker classification, and rendering.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::state::SessionContext;

use super::directory::{RawMessage, SessionDirectory};

/// Sentinel transcript returned when no prior sessions match the protocol.
pub const NO_HISTORY: &str =
    "No previous conversation history was found for this protocol.";

/// A rendered transcript block plus the newest timestamp it covers.
///
/// `newest` is what the context node advances the thread watermark to;
/// it stays `None` for sentinel and error blocks so the watermark is
/// untouched when nothing real was fetched. `failed` marks blocks whose
/// text is a transport-error report rather than a transcript.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryBlock {
    pub text: String,
    pub newest: Option<DateTime<Utc>>,
    pub failed: bool,
}

/// Outcome of an incremental fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncrementalContext {
    /// New messages were found (or the fetch failed and the block carries
    /// the error text).
    Context(HistoryBlock),
    /// Nothing strictly newer than the watermark; inject nothing.
    NothingNew,
}

/// Who authored a raw message, derived from its flags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Speaker {
    Customer,
    Agent,
    System,
}

impl Speaker {
    fn classify(message: &RawMessage) -> Self {
        if message.automated {
            Speaker::System
        } else if message.from_contact {
            Speaker::Customer
        } else {
            Speaker::Agent
        }
    }

    fn label(self) -> &'static str {
        match self {
            Speaker::Customer => "Customer",
            Speaker::Agent => "Agent",
            Speaker::System => "System",
        }
    }
}

/// Stable chronological sort: ties keep their original record order.
pub fn sort_chronological(messages: &mut [RawMessage]) {
    messages.sort_by_key(|m| m.sent_at);
}

/// Render already-sorted messages under a header line.
#[must_use]
pub fn render_transcript(header: &str, messages: &[RawMessage]) -> String {
    let mut out = String::with_capacity(header.len() + messages.len() * 48);
    out.push_str(header);
    for message in messages {
        out.push('\n');
        out.push_str(&format!(
            "[{}] {}: {}",
            message.sent_at.format("%Y-%m-%d %H:%M"),
            Speaker::classify(message).label(),
            message.text
        ));
    }
    out
}

/// The two read-only context operations, over any [`SessionDirectory`].
#[derive(Clone)]
pub struct ContextProvider {
    directory: Arc<dyn SessionDirectory>,
}

impl ContextProvider {
    #[must_use]
    pub fn new(directory: Arc<dyn SessionDirectory>) -> Self {
        Self { directory }
    }

    /// Full transcript of every prior session matching the thread's
    /// protocol, flattened and chronologically sorted.
    ///
    /// Never fails: transport errors come back as the block's text, and a
    /// protocol with no history yields the [`NO_HISTORY`] sentinel.
    #[instrument(skip(self, session), fields(contact = %session.contact_id))]
    pub async fn full_history(&self, session: &SessionContext) -> HistoryBlock {
        let records = match self
            .directory
            .sessions_for_contact(&session.base_url, &session.contact_id)
            .await
        {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "full history fetch failed; injecting error text");
                return HistoryBlock {
                    text: format!(
                        "[context unavailable] The conversation history could not be retrieved: {err}"
                    ),
                    newest: None,
                    failed: true,
                };
            }
        };

        let mut messages: Vec<RawMessage> = records
            .into_iter()
            .filter(|record| record.protocol_number == session.protocol_number)
            .flat_map(|record| record.messages)
            .collect();

        if messages.is_empty() {
            return HistoryBlock {
                text: NO_HISTORY.to_string(),
                newest: None,
                failed: false,
            };
        }

        sort_chronological(&mut messages);
        let newest = messages.last().map(|m| m.sent_at);
        let header = format!(
            "Previous conversation history for protocol {}:",
            session.protocol_number
        );
        HistoryBlock {
            text: render_transcript(&header, &messages),
            newest,
            failed: false,
        }
    }

    /// Messages of the active session strictly newer than `since`.
    ///
    /// Returns [`IncrementalContext::NothingNew`] when the filtered set is
    /// empty, so the caller can skip injecting an empty context block.
    /// Transport errors come back as a context block carrying error text.
    #[instrument(skip(self, session), fields(attendance = %session.attendance_id))]
    pub async fn incremental(
        &self,
        session: &SessionContext,
        since: Option<DateTime<Utc>>,
    ) -> IncrementalContext {
        let mut messages = match self
            .directory
            .messages_for_session(&session.base_url, &session.attendance_id)
            .await
        {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(error = %err, "incremental fetch failed; injecting error text");
                return IncrementalContext::Context(HistoryBlock {
                    text: format!(
                        "[context unavailable] New messages could not be retrieved: {err}"
                    ),
                    newest: None,
                    failed: true,
                });
            }
        };

        if let Some(watermark) = since {
            messages.retain(|m| m.sent_at > watermark);
        }
        if messages.is_empty() {
            return IncrementalContext::NothingNew;
        }

        sort_chronological(&mut messages);
        let newest = messages.last().map(|m| m.sent_at);
        IncrementalContext::Context(HistoryBlock {
            text: render_transcript("New messages in the current session:", &messages),
            newest,
            failed: false,
        })
    }
}
