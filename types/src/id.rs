//! Opaque entity identifiers.
//!
//! Ids are short random url-safe strings. They appear in webhook URLs, so the
//! alphabet is restricted to characters that never need percent-encoding.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypeError;

const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_-";
const ID_LEN: usize = 21;

fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

fn is_valid_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && s.bytes().all(|b| ID_ALPHABET.contains(&b))
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(random_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if is_valid_id(s) {
                    Ok(Self(s.to_string()))
                } else {
                    Err(TypeError::InvalidId(s.to_string()))
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(
    /// Identifies a split.
    SplitId
);
define_id!(
    /// Identifies a payout target within its split.
    TargetId
);
define_id!(
    /// Identifies an invoice issued to a payer.
    IncomingId
);
define_id!(
    /// Identifies one obligation owed to one target.
    OutgoingId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let a = SplitId::generate();
        let b = SplitId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), ID_LEN);
        assert_eq!(a.as_str().parse::<SplitId>().unwrap(), a);
    }

    #[test]
    fn parse_rejects_path_characters() {
        assert!("abc/def".parse::<IncomingId>().is_err());
        assert!("".parse::<TargetId>().is_err());
        assert!("with space".parse::<OutgoingId>().is_err());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id: TargetId = "target_1".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"target_1\"");
    }
}
