use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Requests older (or newer) than this are treated as replays.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

const VERSION: &str = "v0";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("request timestamp `{0}` is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("request timestamp is {skew_secs}s away from server time")]
    StaleTimestamp { skew_secs: i64 },
    #[error("signature is not a `v0=` hex digest")]
    MalformedSignature,
    #[error("signature does not match request body")]
    Mismatch,
    #[error("signing secret cannot key the mac")]
    InvalidKey,
}

/// Checks Slack's `v0` request signature against the shared signing secret.
pub struct SignatureVerifier {
    secret: SecretString,
    max_skew_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret, max_skew_secs: MAX_CLOCK_SKEW_SECS }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(timestamp, signature, body, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?.trim();
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?.trim();

        let sent_at = timestamp
            .parse::<i64>()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_owned()))?;
        let skew_secs = now.saturating_sub(sent_at).saturating_abs();
        if skew_secs > self.max_skew_secs {
            return Err(SignatureError::StaleTimestamp { skew_secs });
        }

        let digest = signature
            .strip_prefix("v0=")
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or(SignatureError::MalformedSignature)?;

        self.mac(timestamp, body)?.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)
    }

    /// Signature Slack would send for `body` at `timestamp`.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{VERSION}={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{SignatureError, SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};

    const NOW: i64 = 1_730_000_000;
    const BODY: &[u8] = b"command=%2Fpoll&user_id=U1&trigger_id=trig-1";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from("8f742231b10e8888abcd99yyyzzz85a5"))
    }

    #[test]
    fn accepts_matching_signature() {
        let verifier = verifier();
        let timestamp = NOW.to_string();
        let signature = verifier.sign(&timestamp, BODY).expect("sign");

        assert!(signature.starts_with("v0="));
        assert_eq!(verifier.verify_at(Some(&timestamp), Some(&signature), BODY, NOW), Ok(()));
    }

    #[test]
    fn matches_slack_documented_example() {
        let verifier = verifier();
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";

        assert_eq!(
            verifier.sign("1531420618", body).expect("sign"),
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503"
        );
    }

    #[test]
    fn tampered_body_fails_with_well_formed_headers() {
        let verifier = verifier();
        let timestamp = NOW.to_string();
        let signature = verifier.sign(&timestamp, BODY).expect("sign");

        let result = verifier.verify_at(
            Some(&timestamp),
            Some(&signature),
            b"command=%2Fpoll&user_id=U2&trigger_id=trig-1",
            NOW,
        );

        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn different_secret_fails() {
        let timestamp = NOW.to_string();
        let signature = SignatureVerifier::new(SecretString::from("other"))
            .sign(&timestamp, BODY)
            .expect("sign");

        assert_eq!(
            verifier().verify_at(Some(&timestamp), Some(&signature), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn missing_headers_fail() {
        let verifier = verifier();
        assert_eq!(
            verifier.verify_at(None, Some("v0=00"), BODY, NOW),
            Err(SignatureError::MissingHeader(TIMESTAMP_HEADER))
        );
        assert_eq!(
            verifier.verify_at(Some("1"), None, BODY, NOW),
            Err(SignatureError::MissingHeader(SIGNATURE_HEADER))
        );
    }

    #[test]
    fn stale_and_future_timestamps_fail() {
        let verifier = verifier();
        let old = (NOW - 301).to_string();
        let signature = verifier.sign(&old, BODY).expect("sign");
        assert_eq!(
            verifier.verify_at(Some(&old), Some(&signature), BODY, NOW),
            Err(SignatureError::StaleTimestamp { skew_secs: 301 })
        );

        let future = (NOW + 400).to_string();
        let signature = verifier.sign(&future, BODY).expect("sign");
        assert!(matches!(
            verifier.verify_at(Some(&future), Some(&signature), BODY, NOW),
            Err(SignatureError::StaleTimestamp { .. })
        ));

        let edge = (NOW - 300).to_string();
        let signature = verifier.sign(&edge, BODY).expect("sign");
        assert_eq!(verifier.verify_at(Some(&edge), Some(&signature), BODY, NOW), Ok(()));
    }

    #[test]
    fn malformed_values_fail() {
        let verifier = verifier();
        assert_eq!(
            verifier.verify_at(Some("yesterday"), Some("v0=00"), BODY, NOW),
            Err(SignatureError::InvalidTimestamp("yesterday".to_owned()))
        );

        let timestamp = NOW.to_string();
        assert_eq!(
            verifier.verify_at(Some(&timestamp), Some("v1=abcd"), BODY, NOW),
            Err(SignatureError::MalformedSignature)
        );
        assert_eq!(
            verifier.verify_at(Some(&timestamp), Some("v0=not-hex"), BODY, NOW),
            Err(SignatureError::MalformedSignature)
        );
    }
}
