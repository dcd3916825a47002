//! Self-asserted sign-offs on finalized revisions.

use tlg_types::{
    Actor, AttestationId, EventType, GovernanceAttestation, RecordId, RevisionId, SignatureType,
};
use tracing::info;

use crate::audit::{event, WithMeta};
use crate::error::{LedgerError, LedgerResult};
use crate::lifecycle::{self, Action};
use crate::revisions::facts;
use crate::service::Ledger;

/// A signer's statement about one revision. The signer is the acting user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAttestation {
    pub revision_id: RevisionId,
    pub signer_name: String,
    pub role: String,
    pub signature_type: SignatureType,
    pub text: String,
}

impl Ledger {
    pub fn attest(
        &self,
        actor: &Actor,
        new: NewAttestation,
    ) -> LedgerResult<GovernanceAttestation> {
        let revision = self.revision(&new.revision_id)?;
        let record = self.record(&revision.record_id)?;
        lifecycle::check(Action::Attest, &facts(&record, &revision)).map_err(|code| {
            LedgerError::transition(code, format!("cannot attest revision {}", revision.id))
        })?;

        let signer_name = new.signer_name.trim();
        let text = new.text.trim();
        if signer_name.is_empty() || text.is_empty() {
            return Err(LedgerError::validation(
                "attestation needs a signer name and a statement",
            ));
        }

        let signed_at = self.clock.now();
        let attestation = GovernanceAttestation {
            id: AttestationId::new(),
            record_id: record.id,
            revision_id: revision.id,
            signer_id: actor.user_id.clone(),
            signer_name: signer_name.to_string(),
            role: new.role.trim().to_string(),
            signature_type: new.signature_type,
            text: text.to_string(),
            ip_address: actor.ip_address.clone(),
            signed_at,
        };
        self.records.insert_attestation(&attestation)?;

        info!(
            record_id = %record.id,
            version = revision.version,
            signer = %attestation.signer_id,
            "revision attested"
        );
        self.audit.record(
            event(actor, &record, Some(revision.id), EventType::Attested, signed_at)
                .with_meta("signatureType", attestation.signature_type.to_string())
                .with_meta("role", attestation.role.clone()),
        );
        Ok(attestation)
    }

    pub fn attestations(&self, record_id: &RecordId) -> LedgerResult<Vec<GovernanceAttestation>> {
        self.record(record_id)?;
        Ok(self.records.list_attestations(record_id)?)
    }
}
