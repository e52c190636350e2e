//! LUD-06 bech32 LNURL strings (`lnurl1...`).

use bech32::{Bech32, Hrp};

use crate::CryptoError;

/// Encode a URL as an uppercase `LNURL1...` string, as wallets expect in QR codes.
pub fn encode_lnurl(url: &str) -> Result<String, CryptoError> {
    let hrp = Hrp::parse("lnurl").map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, url.as_bytes())
        .map(|s| s.to_uppercase())
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))
}

/// Decode a bech32 LNURL (either case, optional `lightning:` prefix) to its URL.
pub fn decode_lnurl(s: &str) -> Result<String, CryptoError> {
    let lower = s.trim().to_lowercase();
    let lower = lower.strip_prefix("lightning:").unwrap_or(&lower);
    let (hrp, data) =
        bech32::decode(lower).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    if hrp.as_str() != "lnurl" {
        return Err(CryptoError::InvalidEncoding(format!(
            "expected lnurl prefix, got {}",
            hrp.as_str()
        )));
    }
    String::from_utf8(data).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lud06_vector_decodes() {
        // LUD-01 example
        let lnurl = "LNURL1DP68GURN8GHJ7UM9WFMXJCM99E3K7MF0V9CXJ0M385EKVCENXC6R2C35XVUKXEFCV5MKVV34X5EKZD3EV56NYD3HXQURZEPEXEJXXEPNXSCRVWFNV9NXZCN9XQ6XYEFHVGCXXCMYXYMNSERXFQ5FNS";
        assert_eq!(
            decode_lnurl(lnurl).unwrap(),
            "https://service.com/api?q=3fc3645b439ce8e7f2553a69e5267081d96dcd340693afabe04be7b0ccd178df"
        );
    }

    #[test]
    fn encode_then_decode() {
        let url = "https://example.com/lnurlp/alice";
        let encoded = encode_lnurl(url).unwrap();
        assert!(encoded.starts_with("LNURL1"));
        assert_eq!(decode_lnurl(&encoded).unwrap(), url);
        assert_eq!(
            decode_lnurl(&format!("lightning:{}", encoded.to_lowercase())).unwrap(),
            url
        );
    }

    #[test]
    fn rejects_other_prefixes() {
        let npub = "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6";
        assert!(decode_lnurl(npub).is_err());
        assert!(decode_lnurl("not bech32").is_err());
    }
}
