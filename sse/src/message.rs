use serde::Serialize;

/// Event name used when the upstream record carries no `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One record received from upstream and relayed verbatim to every downstream client.
///
/// Serializes with the field order `event`, `id`, `data`; `id` is `null` when the
/// upstream record had no `id:` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayEvent {
    pub event: String,
    pub id: Option<String>,
    pub data: String,
}

impl RelayEvent {
    pub fn new(event: impl Into<String>, id: Option<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            id,
            data: data.into(),
        }
    }

    /// The id this record moves the relay cursor to, if any.
    ///
    /// An empty `id:` line is relayed as-is but never becomes the cursor.
    pub fn cursor_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}
