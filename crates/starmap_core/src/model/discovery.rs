//! Discovery log record.
//!
//! Discoveries come from the second export shape: independent timestamped
//! entries that reference a system (and optionally a planet or moon) by name
//! instead of carrying system-level fields.

use serde::{Deserialize, Serialize};

/// Default `discovery_type` when an entry does not provide one.
pub const DEFAULT_DISCOVERY_TYPE: &str = "Unknown";

/// Canonical discovery entry ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    /// Name of the referenced system, if any.
    pub system_name: Option<String>,
    pub planet_name: Option<String>,
    pub moon_name: Option<String>,
    /// Title of the discovery itself.
    pub discovery_name: Option<String>,
    pub discovery_type: String,
    pub description: String,
    pub discovered_by: Option<String>,
    /// Source timestamp as given by the export; not reparsed.
    pub discovered_at: Option<String>,
    /// Evidence/photo references serialized as text.
    pub evidence: Option<String>,
    /// Remaining unmapped fields serialized as a JSON object.
    pub extra: Option<String>,
}

impl Discovery {
    /// Returns whether the entry identifies anything worth storing.
    pub fn has_identity(&self) -> bool {
        non_blank(self.system_name.as_deref()) || non_blank(self.discovery_name.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|value| !value.trim().is_empty())
}

/// Storage result for one discovery, including resolved references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDiscovery {
    pub id: i64,
    /// Id of the system resolved by name, when the lookup matched.
    pub system_id: Option<String>,
    /// Row id of the planet resolved by name within that system.
    pub planet_id: Option<i64>,
}
