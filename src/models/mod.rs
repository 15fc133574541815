//! Domain model: agents, templates, items, triggers and check results

pub mod agent;
pub mod ids;
pub mod item;
pub mod result;
pub mod template;
pub mod trigger;

pub use agent::{Agent, AgentOs, AgentState, ScraperLock, UnsupportedOs};
pub use ids::ObjectId;
pub use item::{Item, ReturnType};
pub use result::{CheckResult, ResultSet};
pub use template::Template;
pub use trigger::{Severity, Trigger, TriggerAssignment, TriggerHistoryEntry};

/// Decode helpers shared by the document types.
///
/// Array fields may be absent or explicitly `null` in stored documents; both
/// decode to an empty `Vec` so consumers never distinguish "missing" from "empty".
pub(crate) mod nullable {
    use serde::{Deserialize, Deserializer};

    pub fn vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
    }
}
