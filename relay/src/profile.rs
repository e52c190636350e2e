//! Kind-0 profile content.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        rename = "display_name",
        alias = "displayName",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Lightning address (LUD-16).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud16: Option<String>,
    /// Bech32 LNURL (LUD-06).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud06: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Profile {
    /// Parse kind-0 content, tolerating unknown fields.
    pub fn from_content(content: &str) -> Option<Self> {
        serde_json::from_str(content).ok()
    }

    /// Where the profile wants to be paid: `lud16`, else `lud06`.
    pub fn payment_address(&self) -> Option<&str> {
        non_empty(&self.lud16).or_else(|| non_empty(&self.lud06))
    }

    pub fn display(&self) -> Option<&str> {
        non_empty(&self.name).or_else(|| non_empty(&self.display_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lud16_preferred_over_lud06() {
        let p = Profile::from_content(
            r#"{"name":"alice","lud16":"alice@example.com","lud06":"lnurl1xyz","about":"hi"}"#,
        )
        .unwrap();
        assert_eq!(p.payment_address(), Some("alice@example.com"));
        assert_eq!(p.display(), Some("alice"));
    }

    #[test]
    fn blank_fields_ignored() {
        let p = Profile::from_content(r#"{"displayName":"Bob","lud16":" ","lud06":"lnurl1abc"}"#)
            .unwrap();
        assert_eq!(p.payment_address(), Some("lnurl1abc"));
        assert_eq!(p.display(), Some("Bob"));
        assert!(Profile::from_content("not json").is_none());
    }
}
