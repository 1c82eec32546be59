//! Response aggregation
//!
//! Builds the labelled part list sent to the synthesis agent and the
//! outward-facing response returned to the caller.

use sdk::{Message, Part, Rejected, Task, TaskResponse};

/// Text of the single agent message in a rejection response
pub const INVALID_REQUEST_TEXT: &str = "Error: Invalid request format";

/// Labelled fragment in the synthesis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FragmentKind {
    UserQuery,
    Context,
    Search,
}

impl FragmentKind {
    pub fn label(&self) -> &'static str {
        match self {
            FragmentKind::UserQuery => "User query: ",
            FragmentKind::Context => "Context: ",
            FragmentKind::Search => "Search results: ",
        }
    }

    fn part(&self, text: &str) -> Part {
        Part::text(format!("{}{}", self.label(), text))
    }

    /// Recover the kind of a labelled part
    pub fn of(part: &Part) -> Option<FragmentKind> {
        [FragmentKind::UserQuery, FragmentKind::Context, FragmentKind::Search]
            .into_iter()
            .find(|kind| part.text.starts_with(kind.label()))
    }
}

pub struct ResponseAggregator;

impl ResponseAggregator {
    /// Build `[UserQuery, Context?, Search?]`
    ///
    /// Context always precedes Search, whichever finished first.
    pub fn synthesis_parts(query: &str, context: Option<&str>, search: Option<&str>) -> Vec<Part> {
        let mut parts = vec![FragmentKind::UserQuery.part(query)];
        if let Some(context) = context {
            parts.push(FragmentKind::Context.part(context));
        }
        if let Some(search) = search {
            parts.push(FragmentKind::Search.part(search));
        }
        parts
    }

    /// Build the completed response: the inbound message followed by one
    /// agent message holding the final text
    pub fn assemble(task: &Task, final_text: &str) -> TaskResponse {
        TaskResponse::completed(
            task.id.clone(),
            vec![task.message.clone(), Message::agent_text(final_text)],
        )
    }

    /// Build the response for a structurally invalid task
    pub fn reject(rejected: &Rejected) -> TaskResponse {
        TaskResponse::error(
            rejected.id.clone(),
            rejected.error.to_string(),
            INVALID_REQUEST_TEXT,
        )
    }
}
