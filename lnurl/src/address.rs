//! Lightning addresses and LNURL-pay URL normalization.

use crate::LnurlError;

/// `name@domain` with a plausible domain.
pub fn is_lightning_address(input: &str) -> bool {
    let mut parts = input.trim().split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(domain), None) => {
            !name.is_empty() && domain.contains('.') && !domain.contains('/')
        }
        _ => false,
    }
}

fn scheme_for(host: &str) -> &'static str {
    let host = host.split(&['/', ':'][..]).next().unwrap_or(host);
    if host.ends_with(".onion") {
        "http"
    } else {
        "https"
    }
}

/// LUD-16: `name@domain` → `https://domain/.well-known/lnurlp/name`
/// (`http://` for onion services).
pub fn address_to_url(address: &str) -> Result<String, LnurlError> {
    if !is_lightning_address(address) {
        return Err(LnurlError::InvalidInput(format!(
            "not a lightning address: {address}"
        )));
    }
    let (name, domain) = address
        .trim()
        .split_once('@')
        .ok_or_else(|| LnurlError::InvalidInput(address.to_string()))?;
    Ok(format!(
        "{}://{}/.well-known/lnurlp/{}",
        scheme_for(domain),
        domain.to_lowercase(),
        name.to_lowercase()
    ))
}

/// Turn anything a user may enter for an LNURL-pay destination into the
/// fetchable URL: Lightning address, `lnurlp://` (LUD-17), bech32 `lnurl1...`
/// (LUD-06, optional `lightning:` prefix) or a plain `https://` URL.
pub fn normalize_lnurlp(input: &str) -> Result<String, LnurlError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LnurlError::InvalidInput("empty input".into()));
    }
    if let Some(rest) = input.strip_prefix("lnurlp://") {
        return Ok(format!("{}://{}", scheme_for(rest), rest));
    }
    if input.starts_with("https://") || input.starts_with("http://") {
        return Ok(input.to_string());
    }
    if is_lightning_address(input) {
        return address_to_url(input);
    }
    let lower = input.to_lowercase();
    if lower.starts_with("lnurl1") || lower.starts_with("lightning:lnurl1") {
        return prism_crypto::decode_lnurl(input)
            .map_err(|e| LnurlError::InvalidInput(e.to_string()));
    }
    Err(LnurlError::InvalidInput(format!(
        "unrecognized LNURL-pay destination: {input}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_detection() {
        assert!(is_lightning_address("alice@example.com"));
        assert!(!is_lightning_address("alice@localhost"));
        assert!(!is_lightning_address("@example.com"));
        assert!(!is_lightning_address("a@b@example.com"));
        assert!(!is_lightning_address("https://example.com"));
    }

    #[test]
    fn address_urls() {
        assert_eq!(
            address_to_url("Alice@Example.com").unwrap(),
            "https://example.com/.well-known/lnurlp/alice"
        );
        assert_eq!(
            address_to_url("bob@abcdef.onion").unwrap(),
            "http://abcdef.onion/.well-known/lnurlp/bob"
        );
    }

    #[test]
    fn normalizes_every_form() {
        assert_eq!(
            normalize_lnurlp("lnurlp://pay.example.com/lnurlp/tips").unwrap(),
            "https://pay.example.com/lnurlp/tips"
        );
        assert_eq!(
            normalize_lnurlp("lnurlp://xyz.onion/lnurlp/tips").unwrap(),
            "http://xyz.onion/lnurlp/tips"
        );
        assert_eq!(
            normalize_lnurlp("https://pay.example.com/x").unwrap(),
            "https://pay.example.com/x"
        );
        assert_eq!(
            normalize_lnurlp("alice@example.com").unwrap(),
            "https://example.com/.well-known/lnurlp/alice"
        );
        let bech = prism_crypto::encode_lnurl("https://pay.example.com/lnurlp/tips").unwrap();
        assert_eq!(
            normalize_lnurlp(&bech).unwrap(),
            "https://pay.example.com/lnurlp/tips"
        );
        assert!(normalize_lnurlp("npub1xyz").is_err());
        assert!(normalize_lnurlp("").is_err());
    }
}
