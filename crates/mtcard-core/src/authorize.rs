//! Whether a decoded job should be materialized for the viewer.
//!
//! Failing jobs stay in the registry; only materialization is skipped.

use crate::types::{DecodedJob, IneligibleReason, JobRecord, Viewer};

/// Return the decoded payload if `viewer` may materialize `record`.
///
/// Conditions are checked in order: decoded, card mode, viewer uid listed in
/// `mtu`, viewer is not the submitter. The first failure is reported.
pub fn check_eligibility<'a>(
    record: &'a JobRecord,
    viewer: &Viewer,
) -> Result<&'a DecodedJob, IneligibleReason> {
    let decoded = record.decoded.as_ref().ok_or(IneligibleReason::NotDecoded)?;
    let accounting = &decoded.accounting;

    if !accounting.is_card_mode() {
        return Err(IneligibleReason::NotCardMode);
    }
    if !accounting.permits_uid(viewer.uid) {
        return Err(IneligibleReason::ViewerNotListed);
    }
    if viewer.name == record.submitter {
        return Err(IneligibleReason::ViewerIsSubmitter);
    }
    Ok(decoded)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
