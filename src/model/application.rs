use std::fmt;

use serde::{Deserialize, Serialize};

/// Durable build status of an application, owned by the external state store.
///
/// The worker writes only `Building` and `Failed`; success is reported through
/// the response queue. Values it does not know about are preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationState {
    NotBuilding,
    Building,
    Failed,
    Deleting,
    Other(String),
}

impl ApplicationState {
    pub fn as_str(&self) -> &str {
        match self {
            ApplicationState::NotBuilding => "not-building",
            ApplicationState::Building => "building",
            ApplicationState::Failed => "failed",
            ApplicationState::Deleting => "deleting",
            ApplicationState::Other(s) => s,
        }
    }

    pub fn is_deleting(&self) -> bool {
        matches!(self, ApplicationState::Deleting)
    }
}

impl From<String> for ApplicationState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "not-building" => ApplicationState::NotBuilding,
            "building" => ApplicationState::Building,
            "failed" => ApplicationState::Failed,
            "deleting" => ApplicationState::Deleting,
            _ => ApplicationState::Other(s),
        }
    }
}

impl From<ApplicationState> for String {
    fn from(s: ApplicationState) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
