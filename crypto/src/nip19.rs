//! NIP-19 bech32 entities: `npub`, `nsec`, `nprofile`.

use bech32::{Bech32, Hrp};

use crate::{CryptoError, PublicKey, SigningKey};

const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;

/// A decoded NIP-19 entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nip19 {
    Npub(PublicKey),
    Nsec(SigningKey),
    Nprofile {
        pubkey: PublicKey,
        relays: Vec<String>,
    },
}

fn encode(hrp: &str, data: &[u8]) -> Result<String, CryptoError> {
    let hrp = Hrp::parse(hrp).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))
}

pub fn encode_npub(pubkey: &PublicKey) -> Result<String, CryptoError> {
    encode("npub", &pubkey.to_bytes())
}

pub fn encode_nsec(key: &SigningKey) -> Result<String, CryptoError> {
    encode("nsec", &key.secret_bytes())
}

pub fn encode_nprofile(pubkey: &PublicKey, relays: &[String]) -> Result<String, CryptoError> {
    let mut data = Vec::with_capacity(34 + relays.iter().map(|r| r.len() + 2).sum::<usize>());
    data.push(TLV_SPECIAL);
    data.push(32);
    data.extend_from_slice(&pubkey.to_bytes());
    for relay in relays {
        let len = u8::try_from(relay.len())
            .map_err(|_| CryptoError::InvalidEncoding(format!("relay url too long: {relay}")))?;
        data.push(TLV_RELAY);
        data.push(len);
        data.extend_from_slice(relay.as_bytes());
    }
    encode("nprofile", &data)
}

fn decode_nprofile(data: &[u8]) -> Result<Nip19, CryptoError> {
    let mut pubkey = None;
    let mut relays = Vec::new();
    let mut rest = data;
    while rest.len() >= 2 {
        let (kind, len) = (rest[0], rest[1] as usize);
        let value = rest
            .get(2..2 + len)
            .ok_or_else(|| CryptoError::InvalidEncoding("truncated nprofile TLV".into()))?;
        match kind {
            TLV_SPECIAL => pubkey = Some(PublicKey::from_bytes(value)?),
            TLV_RELAY => relays.push(String::from_utf8_lossy(value).into_owned()),
            _ => {}
        }
        rest = &rest[2 + len..];
    }
    let pubkey =
        pubkey.ok_or_else(|| CryptoError::InvalidEncoding("nprofile without pubkey".into()))?;
    Ok(Nip19::Nprofile { pubkey, relays })
}

/// Decode an `npub`, `nsec` or `nprofile` string (an optional `nostr:` URI
/// prefix is accepted).
pub fn decode(s: &str) -> Result<Nip19, CryptoError> {
    let s = s.trim();
    let s = s.strip_prefix("nostr:").unwrap_or(s);
    let (hrp, data) =
        bech32::decode(s).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    match hrp.as_str() {
        "npub" => Ok(Nip19::Npub(PublicKey::from_bytes(&data)?)),
        "nsec" => Ok(Nip19::Nsec(SigningKey::from_bytes(&data)?)),
        "nprofile" => decode_nprofile(&data),
        other => Err(CryptoError::InvalidEncoding(format!(
            "unsupported NIP-19 type {other}"
        ))),
    }
}

/// Resolve a user-supplied identity reference (`npub`, `nprofile` or hex
/// pubkey) to a public key and any relay hints it carries.
pub fn decode_identity(input: &str) -> Result<(PublicKey, Vec<String>), CryptoError> {
    if let Ok(pubkey) = PublicKey::from_hex(input) {
        return Ok((pubkey, Vec::new()));
    }
    match decode(input)? {
        Nip19::Npub(pubkey) => Ok((pubkey, Vec::new())),
        Nip19::Nprofile { pubkey, relays } => Ok((pubkey, relays)),
        Nip19::Nsec(_) => Err(CryptoError::InvalidEncoding(
            "expected a public identity, got nsec".into(),
        )),
    }
}
