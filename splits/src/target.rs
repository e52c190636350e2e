//! Payout destinations.
//!
//! A target is either an LNURL-pay destination (Lightning address, LNURL) or
//! a Nostr identity whose kind-0 profile names one. Both end up at an
//! LNURL-pay endpoint; they differ in how the endpoint is found and in that
//! Nostr targets can be paid with a signed zap request.

use prism_crypto::{decode_identity, encode_npub, PublicKey, SigningKey, ZapRequest};
use prism_fees::FeeTracker;
use prism_lnurl::{fetch_invoice, normalize_lnurlp, InvoiceParams, LnurlError, PayRequest};
use prism_store::TargetRecord;
use prism_types::{MilliSats, PayoutSchedule, TargetId, TargetKind};

use crate::{Services, SplitError};

/// User-editable target settings.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSettings {
    /// Relative weight, or a percentage when `fixed`.
    pub weight: u32,
    pub fixed: bool,
    /// Pass payer comments and identities on to the destination.
    pub forward_comment: bool,
    /// Minimum share of a batch (percent) that must survive the routing fee.
    pub payout_threshold: f64,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            weight: 1,
            fixed: false,
            forward_comment: true,
            payout_threshold: 0.0,
        }
    }
}

impl TargetSettings {
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.fixed && self.weight > 100 {
            return Err(SplitError::Validation(format!(
                "fixed share of {}% exceeds 100%",
                self.weight
            )));
        }
        if !(0.0..=100.0).contains(&self.payout_threshold) {
            return Err(SplitError::Validation(format!(
                "payout threshold {} is not a percentage",
                self.payout_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub id: TargetId,
    pub kind: TargetKind,
    pub input: String,
    pub weight: u32,
    pub fixed: bool,
    pub forward_comment: bool,
    pub payout_threshold: f64,
    pub schedule: PayoutSchedule,
    /// Resolved LNURL-pay URL.
    endpoint: Option<String>,
}

fn invalid(e: impl std::fmt::Display) -> SplitError {
    SplitError::Validation(e.to_string())
}

fn lnurl_error(e: LnurlError) -> SplitError {
    match e {
        LnurlError::Unreachable { .. } => SplitError::Unavailable(e.to_string()),
        other => SplitError::Payment(other.to_string()),
    }
}

impl Target {
    /// A target for `input`, checked for syntax only. Call
    /// [`Target::resolve`] to check that it can actually be paid.
    pub fn new(input: &str, settings: &TargetSettings) -> Result<Self, SplitError> {
        settings.validate()?;
        let input = input.trim().to_string();
        let kind = TargetKind::detect(&input);
        match kind {
            TargetKind::Lnurl => {
                normalize_lnurlp(&input).map_err(invalid)?;
            }
            TargetKind::Nostr => {
                decode_identity(&input).map_err(invalid)?;
            }
        }
        Ok(Self {
            id: TargetId::generate(),
            kind,
            input,
            weight: settings.weight,
            fixed: settings.fixed,
            forward_comment: settings.forward_comment,
            payout_threshold: settings.payout_threshold,
            schedule: PayoutSchedule::Ready,
            endpoint: None,
        })
    }

    pub fn settings(&self) -> TargetSettings {
        TargetSettings {
            weight: self.weight,
            fixed: self.fixed,
            forward_comment: self.forward_comment,
            payout_threshold: self.payout_threshold,
        }
    }

    pub fn apply(&mut self, settings: &TargetSettings) -> Result<(), SplitError> {
        settings.validate()?;
        self.weight = settings.weight;
        self.fixed = settings.fixed;
        self.forward_comment = settings.forward_comment;
        self.payout_threshold = settings.payout_threshold;
        Ok(())
    }

    /// Point this target at `other`'s destination, keeping id, settings and
    /// schedule.
    pub(crate) fn replace_destination(&mut self, other: Target) {
        self.kind = other.kind;
        self.input = other.input;
        self.endpoint = other.endpoint;
    }

    /// The Nostr identity and relay hints of a Nostr target.
    pub fn identity(&self) -> Option<(PublicKey, Vec<String>)> {
        match self.kind {
            TargetKind::Nostr => decode_identity(&self.input).ok(),
            TargetKind::Lnurl => None,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Forget the resolved endpoint so the next payout looks it up again.
    pub fn forget_endpoint(&mut self) {
        if self.kind == TargetKind::Nostr {
            self.endpoint = None;
        }
    }

    /// Key under which this destination's fees are tracked.
    pub fn fee_key(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.input)
    }

    pub fn estimated_fee(&self, fees: &FeeTracker) -> MilliSats {
        fees.estimate(self.fee_key())
    }

    pub fn average_fee(&self, fees: &FeeTracker) -> Option<MilliSats> {
        fees.average(self.fee_key())
    }

    /// Human-facing link to the destination.
    pub fn link(&self) -> String {
        match self.identity() {
            Some((pubkey, _)) => match encode_npub(&pubkey) {
                Ok(npub) => format!("nostr:{npub}"),
                Err(_) => format!("nostr:{}", pubkey.to_hex()),
            },
            None => format!("lightning:{}", self.input),
        }
    }

    /// Find the LNURL-pay endpoint and check that it answers.
    pub async fn resolve(&mut self, services: &Services) -> Result<String, SplitError> {
        let url = match self.kind {
            TargetKind::Lnurl => normalize_lnurlp(&self.input).map_err(invalid)?,
            TargetKind::Nostr => {
                let (pubkey, hints) = decode_identity(&self.input).map_err(invalid)?;
                let profile = services
                    .identity
                    .resolve_profile(&pubkey, &hints)
                    .await
                    .map_err(|e| SplitError::Unavailable(format!("{}: {e}", self.input)))?;
                let address = profile.payment_address().ok_or_else(|| {
                    SplitError::Validation(format!(
                        "{} has no lightning address (lud16 or lud06)",
                        self.input
                    ))
                })?;
                normalize_lnurlp(address).map_err(invalid)?
            }
        };

        services
            .lnurl
            .fetch_pay_request(&url)
            .await
            .map_err(|e| SplitError::Unavailable(format!("unreachable LNURL-pay {url}: {e}")))?;
        tracing::debug!(target_id = %self.id, input = %self.input, endpoint = %url, "resolved target");
        self.endpoint = Some(url.clone());
        Ok(url)
    }

    /// The resolved endpoint, resolving it first if needed.
    pub async fn ensure_endpoint(&mut self, services: &Services) -> Result<String, SplitError> {
        match &self.endpoint {
            Some(url) => Ok(url.clone()),
            None => self.resolve(services).await,
        }
    }

    /// Current pay-request metadata (min/max sendable, comment limit).
    pub async fn pay_request(&mut self, services: &Services) -> Result<PayRequest, SplitError> {
        let url = self.ensure_endpoint(services).await?;
        services
            .lnurl
            .fetch_pay_request(&url)
            .await
            .map_err(lnurl_error)
    }

    /// Ask the destination for an invoice.
    ///
    /// A Nostr target paid on behalf of a known payer pubkey gets a zap
    /// request signed by `signer` when `zaps` is on, crediting the payer in its
    /// content. Everything else gets a plain comment.
    pub async fn get_invoice(
        &mut self,
        services: &Services,
        request: InvoiceRequest<'_>,
    ) -> Result<String, SplitError> {
        let url = self.ensure_endpoint(services).await?;

        let payer = request
            .identifier
            .and_then(|id| PublicKey::from_hex(id).ok());
        let zap_request = match (self.identity(), payer, request.zaps) {
            (Some((recipient, hints)), Some(payer), true) => {
                let relays = if hints.is_empty() {
                    services.relays.clone()
                } else {
                    hints
                };
                let link = encode_npub(&payer).unwrap_or_else(|_| payer.to_hex());
                let content = format!(
                    "Zap from nostr:{link} {}",
                    request.comment.unwrap_or_default()
                );
                let event = ZapRequest::build(
                    request.signer,
                    &recipient,
                    request.amount,
                    &relays,
                    content.trim(),
                    services.now(),
                );
                tracing::debug!(target_id = %self.id, "paying with zap request");
                Some(event.to_json())
            }
            _ => None,
        };

        fetch_invoice(
            services.lnurl.as_ref(),
            &url,
            InvoiceParams {
                amount: request.amount,
                comment: request.comment.map(str::to_string),
                zap_request,
            },
        )
        .await
        .map_err(lnurl_error)
    }

    pub fn to_record(&self) -> TargetRecord {
        TargetRecord {
            id: self.id.clone(),
            kind: self.kind,
            input: self.input.clone(),
            weight: self.weight,
            fixed: self.fixed,
            forward_comment: self.forward_comment,
            payout_threshold: self.payout_threshold,
            schedule: self.schedule,
            endpoint: self.endpoint.clone(),
        }
    }

    pub fn from_record(record: TargetRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            input: record.input,
            weight: record.weight,
            fixed: record.fixed,
            forward_comment: record.forward_comment,
            payout_threshold: record.payout_threshold,
            schedule: record.schedule,
            endpoint: record.endpoint,
        }
    }
}

/// What to ask a target's endpoint for.
pub struct InvoiceRequest<'a> {
    pub amount: MilliSats,
    pub comment: Option<&'a str>,
    /// Payer identity; a hex pubkey enables zap requests.
    pub identifier: Option<&'a str>,
    pub signer: &'a SigningKey,
    pub zaps: bool,
}
