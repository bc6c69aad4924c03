//! # Build response (response queue body).
//!
//! ```text
//! { applicationID, repo, status: "success"|"failed", imageID, imageName,
//!   buildCommit, isError, fault: "service"|"user", message, planUsed, buildOutput }
//! ```
//!
//! One response is produced per request. `fault` is `null` on success.

use serde::{Deserialize, Serialize};

use super::request::BuildConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Who is to blame for a failed stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fault {
    /// The caller's input or repository is at fault; redelivery cannot help.
    User,
    /// The worker or its infrastructure failed; redelivery may succeed.
    Service,
}

impl Fault {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fault::User => "user",
            Fault::Service => "service",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResponse {
    #[serde(rename = "applicationID")]
    pub application_id: String,
    pub repo: String,
    pub status: ResponseStatus,
    #[serde(rename = "imageID")]
    pub image_id: String,
    #[serde(rename = "imageName")]
    pub image_name: String,
    #[serde(rename = "buildCommit")]
    pub build_commit: String,
    #[serde(rename = "isError")]
    pub is_error: bool,
    pub fault: Option<Fault>,
    pub message: String,
    #[serde(rename = "planUsed")]
    pub plan_used: Option<BuildConfig>,
    #[serde(rename = "buildOutput")]
    pub build_output: String,
}

impl BuildResponse {
    /// Starts a response for the given application; status is `failed` until
    /// [`BuildResponse::succeed`] is called.
    pub fn new(application_id: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            repo: repo.into(),
            status: ResponseStatus::Failed,
            image_id: String::new(),
            image_name: String::new(),
            build_commit: String::new(),
            is_error: false,
            fault: None,
            message: String::new(),
            plan_used: None,
            build_output: String::new(),
        }
    }

    pub fn succeed(mut self) -> Self {
        self.status = ResponseStatus::Success;
        self.is_error = false;
        self.fault = None;
        self
    }

    pub fn fail(mut self, fault: Fault, message: impl Into<String>) -> Self {
        self.status = ResponseStatus::Failed;
        self.is_error = true;
        self.fault = Some(fault);
        self.message = message.into();
        self
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
