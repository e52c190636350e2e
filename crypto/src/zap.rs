//! Zap requests and receipts (NIP-57), plus the profile events a split
//! publishes about itself.

use prism_types::{MilliSats, Timestamp};

use crate::event::kind;
use crate::{CryptoError, Event, EventTemplate, PublicKey, SigningKey};

/// A verified kind-9734 zap request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZapRequest {
    pub event: Event,
    /// The zapped pubkey (`p` tag).
    pub recipient: PublicKey,
    /// Amount the payer committed to, if the request names one.
    pub amount: Option<MilliSats>,
    /// Relays the receipt should be published to.
    pub relays: Vec<String>,
    /// The zapped event (`e` tag), if any.
    pub event_ref: Option<String>,
}

impl ZapRequest {
    /// Build and sign a zap request.
    pub fn build(
        key: &SigningKey,
        recipient: &PublicKey,
        amount: MilliSats,
        relays: &[String],
        content: &str,
        created_at: Timestamp,
    ) -> Event {
        let relay_tag = std::iter::once("relays".to_string()).chain(relays.iter().cloned());
        EventTemplate::new(kind::ZAP_REQUEST, content)
            .tag(["p".to_string(), recipient.to_hex()])
            .tag(["amount".to_string(), amount.raw().to_string()])
            .tag(relay_tag)
            .sign(key, created_at)
    }

    /// Parse and validate a zap request as an LNURL server must before
    /// issuing an invoice for it.
    pub fn parse(json: &str) -> Result<Self, CryptoError> {
        let event = Event::from_json(json)?;
        if event.kind != kind::ZAP_REQUEST {
            return Err(CryptoError::InvalidEvent(format!(
                "expected kind {}, got {}",
                kind::ZAP_REQUEST,
                event.kind
            )));
        }
        event.verify()?;

        let recipient = {
            let mut p_tags = event.tags_named("p");
            match (p_tags.next(), p_tags.next()) {
                (Some(values), None) => values
                    .first()
                    .ok_or_else(|| CryptoError::InvalidEvent("empty p tag".into()))
                    .and_then(|hex| PublicKey::from_hex(hex))?,
                _ => {
                    return Err(CryptoError::InvalidEvent(
                        "zap request must have exactly one p tag".into(),
                    ))
                }
            }
        };
        if event.tags_named("e").count() > 1 {
            return Err(CryptoError::InvalidEvent(
                "zap request has multiple e tags".into(),
            ));
        }
        let amount = event
            .tag_value("amount")
            .map(|a| {
                a.parse::<MilliSats>()
                    .map_err(|_| CryptoError::InvalidEvent(format!("bad amount tag {a}")))
            })
            .transpose()?;
        let relays = event
            .tags_named("relays")
            .next()
            .map(|r| r.to_vec())
            .unwrap_or_default();
        let event_ref = event.tag_value("e").map(str::to_string);

        Ok(Self {
            recipient,
            amount,
            relays,
            event_ref,
            event,
        })
    }

    /// The request's `amount` tag, when present, must equal the invoice amount.
    pub fn check_amount(&self, amount: MilliSats) -> Result<(), CryptoError> {
        match self.amount {
            Some(committed) if committed != amount => Err(CryptoError::InvalidEvent(format!(
                "zap request amount {committed} does not match {amount}"
            ))),
            _ => Ok(()),
        }
    }

    pub fn payer(&self) -> PublicKey {
        self.event.pubkey
    }

    pub fn comment(&self) -> &str {
        &self.event.content
    }
}

/// Build the kind-9735 receipt for a paid zap request.
pub fn zap_receipt(
    key: &SigningKey,
    request: &ZapRequest,
    bolt11: &str,
    paid_at: Timestamp,
) -> Event {
    let mut template = EventTemplate::new(kind::ZAP_RECEIPT, "")
        .tag(["p".to_string(), request.recipient.to_hex()]);
    if let Some(e) = &request.event_ref {
        template = template.tag(["e", e.as_str()]);
    }
    template
        .tag(["P".to_string(), request.payer().to_hex()])
        .tag(["bolt11", bolt11])
        .tag(["description".to_string(), request.event.to_json()])
        .sign(key, paid_at)
}

/// Kind-0 profile for a split.
pub fn metadata_event(
    key: &SigningKey,
    name: &str,
    lud16: &str,
    about: &str,
    created_at: Timestamp,
) -> Event {
    let content = serde_json::json!({
        "name": name,
        "lud16": lud16,
        "about": about,
    });
    EventTemplate::new(kind::METADATA, content.to_string()).sign(key, created_at)
}

/// Kind-10002 relay list.
pub fn relay_list_event(key: &SigningKey, relays: &[String], created_at: Timestamp) -> Event {
    relays
        .iter()
        .fold(EventTemplate::new(kind::RELAY_LIST, ""), |t, r| {
            t.tag(["r", r.as_str()])
        })
        .sign(key, created_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relays() -> Vec<String> {
        vec!["wss://relay.damus.io".into(), "wss://nos.lol".into()]
    }

    #[test]
    fn build_then_parse() {
        let payer = SigningKey::generate();
        let recipient = SigningKey::generate().public_key();
        let event = ZapRequest::build(
            &payer,
            &recipient,
            MilliSats::new(21_000),
            &relays(),
            "great post",
            Timestamp::new(1_700_000_000),
        );
        let request = ZapRequest::parse(&event.to_json()).unwrap();
        assert_eq!(request.recipient, recipient);
        assert_eq!(request.payer(), payer.public_key());
        assert_eq!(request.amount, Some(MilliSats::new(21_000)));
        assert_eq!(request.relays, relays());
        assert_eq!(request.comment(), "great post");
        assert!(request.check_amount(MilliSats::new(21_000)).is_ok());
        assert!(request.check_amount(MilliSats::new(20_000)).is_err());
    }

    #[test]
    fn rejects_wrong_kind_and_bad_signature() {
        let key = SigningKey::generate();
        let note = EventTemplate::new(1, "hi").sign(&key, Timestamp::new(1));
        assert!(ZapRequest::parse(&note.to_json()).is_err());

        let mut event = ZapRequest::build(
            &key,
            &key.public_key(),
            MilliSats::new(1_000),
            &relays(),
            "",
            Timestamp::new(1),
        );
        event.content = "tampered".into();
        assert!(ZapRequest::parse(&event.to_json()).is_err());
    }

    #[test]
    fn rejects_missing_p_tag() {
        let key = SigningKey::generate();
        let event = EventTemplate::new(kind::ZAP_REQUEST, "")
            .tag(["amount", "1000"])
            .sign(&key, Timestamp::new(1));
        assert!(matches!(
            ZapRequest::parse(&event.to_json()),
            Err(CryptoError::InvalidEvent(_))
        ));
    }

    #[test]
    fn rejects_two_p_tags_and_keeps_event() {
        let key = SigningKey::generate();
        let other = SigningKey::generate().public_key();
        let event = EventTemplate::new(kind::ZAP_REQUEST, "")
            .tag(["p".to_string(), key.public_key().to_hex()])
            .tag(["p".to_string(), other.to_hex()])
            .sign(&key, Timestamp::new(1));
        assert!(ZapRequest::parse(&event.to_json()).is_err());

        let single = EventTemplate::new(kind::ZAP_REQUEST, "hello")
            .tag(["p".to_string(), other.to_hex()])
            .sign(&key, Timestamp::new(1));
        let parsed = ZapRequest::parse(&single.to_json()).unwrap();
        assert_eq!(parsed.recipient, other);
        assert_eq!(parsed.event, single);
    }

    #[test]
    fn receipt_references_request() {
        let payer = SigningKey::generate();
        let split = SigningKey::generate();
        let event = ZapRequest::build(
            &payer,
            &split.public_key(),
            MilliSats::new(5_000),
            &relays(),
            "",
            Timestamp::new(10),
        );
        let request = ZapRequest::parse(&event.to_json()).unwrap();
        let receipt = zap_receipt(&split, &request, "lnbc50n1...", Timestamp::new(20));
        assert_eq!(receipt.kind, kind::ZAP_RECEIPT);
        assert!(receipt.verify().is_ok());
        assert_eq!(receipt.tag_value("p"), Some(split.public_key().to_hex().as_str()));
        assert_eq!(receipt.tag_value("P"), Some(payer.public_key().to_hex().as_str()));
        assert_eq!(receipt.tag_value("bolt11"), Some("lnbc50n1..."));
        let description = receipt.tag_value("description").unwrap();
        assert_eq!(Event::from_json(description).unwrap(), request.event);
    }

    #[test]
    fn profile_events() {
        let key = SigningKey::generate();
        let meta = metadata_event(&key, "tips@example.com", "tips@example.com", "a 50%", Timestamp::new(5));
        let content: serde_json::Value = serde_json::from_str(&meta.content).unwrap();
        assert_eq!(content["lud16"], "tips@example.com");
        assert!(meta.verify().is_ok());

        let list = relay_list_event(&key, &relays(), Timestamp::new(5));
        assert_eq!(list.kind, kind::RELAY_LIST);
        assert_eq!(list.tags_named("r").count(), 2);
    }
}
