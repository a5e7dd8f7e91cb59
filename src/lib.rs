//! Choreo RCA - remediation and evidence layer
//!
//! Post-processing for an incident root-cause-analysis service:
//! - Evidence digests built from raw logs, metrics and traces
//! - Remediation patch runs against release bindings, streamed as events
//! - Configuration loading and shared models

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::remediation::{ActionStatus, PatchRequest, RemediationAction, ResourceChange};
pub use models::settings::RcaConfig;
pub use services::evidence::{EvidenceKind, EvidenceTransformer};
pub use services::remediation::{PatchRunEnd, PatchSummary, RemediationApplier};
pub use storage::config::ConfigService;
pub use utils::error::{AppError, AppResult};
