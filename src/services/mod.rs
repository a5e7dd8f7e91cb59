//! Services
//!
//! Evidence digests for observability tool results, and the remediation
//! patch run.

pub mod evidence;
pub mod remediation;

pub use evidence::{EvidenceKind, EvidenceTransformer};
pub use remediation::RemediationApplier;
