use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypeError;

/// How a payout destination is reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A Lightning address or LNURL-pay URL.
    #[default]
    #[serde(alias = "lnurlp")]
    Lnurl,
    /// A Nostr identity whose profile names the Lightning address.
    Nostr,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lnurl => "lnurl",
            Self::Nostr => "nostr",
        }
    }

    /// Guess the kind from user input: NIP-19 identities and 64-char hex
    /// pubkeys are Nostr, everything else LNURL.
    pub fn detect(input: &str) -> Self {
        let input = input.trim();
        let input = input.strip_prefix("nostr:").unwrap_or(input);
        let is_hex_key = input.len() == 64 && input.bytes().all(|b| b.is_ascii_hexdigit());
        if input.starts_with("npub1") || input.starts_with("nprofile1") || is_hex_key {
            Self::Nostr
        } else {
            Self::Lnurl
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lnurl" | "lnurlp" => Ok(Self::Lnurl),
            "nostr" => Ok(Self::Nostr),
            other => Err(TypeError::InvalidStatus(format!("unknown target kind {other}"))),
        }
    }
}
