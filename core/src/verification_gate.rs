//! Verification gate.
//!
//! Per complaint: Created(unverified) -> CodeIssued -> Verified
//!                                                  -> Rejected (attempts or expiry)
//!
//! RULE: A rejected complaint does not linger as "failed". It is deleted
//! together with its verification record and any children linked under
//! it, and the reporter starts over.

use crate::{
    complaint::ComplaintRecord,
    error::{IntakeError, IntakeResult},
    event::{DiscardReason, IntakeEvent},
    rng::CodeRng,
    store::IntakeStore,
    types::{ComplaintId, Timestamp},
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

const SOURCE: &str = "verification_gate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Verified,
    WrongCode { attempts: u32, remaining: u32 },
    AttemptsExceeded,
    Expired,
}

#[derive(Debug, Clone, Copy)]
pub struct VerificationGate {
    code_length: usize,
    max_attempts: u32,
    ttl: Option<Duration>,
}

impl VerificationGate {
    pub fn new(code_length: usize, max_attempts: u32, ttl: Option<Duration>) -> Self {
        Self {
            code_length,
            max_attempts,
            ttl,
        }
    }

    /// Generate and store a fresh code for `complaint_id`.
    pub fn issue(
        &self,
        store: &IntakeStore,
        rng: &mut CodeRng,
        complaint_id: ComplaintId,
        now: Timestamp,
    ) -> IntakeResult<String> {
        let code = rng.numeric_code(self.code_length);
        store.insert_verification(complaint_id, &code, now)?;
        store.append_event(SOURCE, &IntakeEvent::VerificationIssued { complaint_id }, now)?;
        Ok(code)
    }

    pub fn check(
        &self,
        store: &IntakeStore,
        complaint: &ComplaintRecord,
        submitted: &str,
        now: Timestamp,
    ) -> IntakeResult<VerifyOutcome> {
        let complaint_id = complaint.complaint_id;
        let record = store
            .get_verification(complaint_id)?
            .ok_or_else(|| IntakeError::not_found("verification", complaint_id))?;

        if record.verified {
            return Ok(VerifyOutcome::Verified);
        }

        if let Some(ttl) = self.ttl {
            if now - record.created_at > ttl {
                self.discard(store, complaint, DiscardReason::CodeExpired, now)?;
                return Ok(VerifyOutcome::Expired);
            }
        }

        if submitted.trim() == record.code {
            store.mark_verification_verified(complaint_id, now)?;
            store.mark_complaint_verified(complaint_id, now)?;
            store.append_event(SOURCE, &IntakeEvent::ComplaintVerified { complaint_id }, now)?;
            log::debug!("complaint {} verified", complaint.reference);
            return Ok(VerifyOutcome::Verified);
        }

        let attempts = store.increment_verification_attempts(complaint_id)?;
        store.append_event(
            SOURCE,
            &IntakeEvent::VerificationFailed {
                complaint_id,
                attempts,
            },
            now,
        )?;
        if attempts >= self.max_attempts {
            self.discard(store, complaint, DiscardReason::AttemptsExceeded, now)?;
            return Ok(VerifyOutcome::AttemptsExceeded);
        }
        Ok(VerifyOutcome::WrongCode {
            attempts,
            remaining: self.max_attempts - attempts,
        })
    }

    fn discard(
        &self,
        store: &IntakeStore,
        complaint: &ComplaintRecord,
        reason: DiscardReason,
        now: Timestamp,
    ) -> IntakeResult<()> {
        let children = store.delete_children(complaint.complaint_id)?;
        store.delete_complaint(complaint.complaint_id)?;
        store.append_event(
            SOURCE,
            &IntakeEvent::ComplaintDiscarded {
                complaint_id: complaint.complaint_id,
                reference: complaint.reference.clone(),
                reason,
                discarded_children: children.clone(),
            },
            now,
        )?;
        log::debug!(
            "discarded unverified complaint {} ({reason:?}, {} children)",
            complaint.reference,
            children.len()
        );
        Ok(())
    }
}
