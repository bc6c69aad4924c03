//! # Wire and domain model.
//!
//! Everything that crosses a boundary of the worker lives here:
//! - [`BuildRequest`] the JSON body taken off the request queue;
//! - [`BuildResponse`] the JSON body published on the response queue;
//! - [`ApplicationState`] the durable status owned by the state store;
//! - [`PulledRepoInfo`] / [`RepoAnalysis`] / [`DetectedInfo`] collaborator results.
//!
//! Request and response types are plain serde structs; they carry no behavior
//! beyond decoding helpers.

mod application;
mod repo;
mod request;
mod response;

pub use application::ApplicationState;
pub use repo::{DetectedInfo, DockerInfo, NixpacksInfo, PulledRepoInfo, RepoAnalysis};
pub use request::{BuildConfig, BuildRequest, BuilderKind, KeyValue, PullInfo};
pub use response::{BuildResponse, Fault, ResponseStatus};
