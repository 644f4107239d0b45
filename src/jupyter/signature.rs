//! HMAC signing for wire messages.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::jupyter::errors::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    HmacSha1,
    HmacSha256,
    HmacSha512,
}

impl SignatureScheme {
    /// Accepts both `hmac-sha256` and the bare digest name `sha256`.
    pub fn parse(scheme: &str) -> Result<Self, WireError> {
        let digest = scheme.strip_prefix("hmac-").unwrap_or(scheme);
        match digest {
            "sha1" => Ok(SignatureScheme::HmacSha1),
            "sha256" => Ok(SignatureScheme::HmacSha256),
            "sha512" => Ok(SignatureScheme::HmacSha512),
            _ => Err(WireError::BadScheme(scheme.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureScheme::HmacSha1 => "hmac-sha1",
            SignatureScheme::HmacSha256 => "hmac-sha256",
            SignatureScheme::HmacSha512 => "hmac-sha512",
        }
    }
}

/// Signs and verifies the four dict frames of a wire message.
#[derive(Debug, Clone)]
pub struct MessageSigner {
    key: Vec<u8>,
    scheme: SignatureScheme,
}

impl MessageSigner {
    pub fn new(scheme: &str, key: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            key: key.to_vec(),
            scheme: SignatureScheme::parse(scheme)?,
        })
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Lowercase hex HMAC over the concatenated parts. An empty key yields
    /// an empty signature, mirroring a key-less debug session.
    pub fn sign(&self, parts: &[&[u8]]) -> String {
        if self.key.is_empty() {
            return String::new();
        }
        macro_rules! hmac_hex {
            ($digest:ty) => {{
                let mut mac = Hmac::<$digest>::new_from_slice(&self.key)
                    .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
                for part in parts {
                    mac.update(part);
                }
                hex::encode(mac.finalize().into_bytes())
            }};
        }
        match self.scheme {
            SignatureScheme::HmacSha1 => hmac_hex!(Sha1),
            SignatureScheme::HmacSha256 => hmac_hex!(Sha256),
            SignatureScheme::HmacSha512 => hmac_hex!(Sha512),
        }
    }

    /// Case-insensitive comparison against an incoming hex signature.
    /// Verification is skipped entirely for key-less sessions.
    pub fn verify(&self, signature: &str, parts: &[&[u8]]) -> bool {
        if self.key.is_empty() {
            return true;
        }
        let expected = self.sign(parts);
        expected.eq_ignore_ascii_case(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let signer = MessageSigner::new("hmac-sha256", b"test-key").unwrap();
        let parts: Vec<&[u8]> = vec![b"header", b"parent", b"meta", b"content"];
        let signature = signer.sign(&parts);
        assert!(signer.verify(&signature, &parts));
        assert!(signer.verify(&signature.to_uppercase(), &parts));
    }

    #[test]
    fn verify_rejects_tampered_parts() {
        let signer = MessageSigner::new("hmac-sha256", b"test-key").unwrap();
        let parts: Vec<&[u8]> = vec![b"header", b"content"];
        let signature = signer.sign(&parts);
        let tampered: Vec<&[u8]> = vec![b"header", b"c0ntent"];
        assert!(!signer.verify(&signature, &tampered));
    }

    #[test]
    fn scheme_names_parse_with_and_without_prefix() {
        assert_eq!(
            SignatureScheme::parse("hmac-sha256").unwrap(),
            SignatureScheme::HmacSha256
        );
        assert_eq!(
            SignatureScheme::parse("sha512").unwrap(),
            SignatureScheme::HmacSha512
        );
        assert!(SignatureScheme::parse("md5").is_err());
    }

    #[test]
    fn schemes_produce_distinct_signatures() {
        let parts: Vec<&[u8]> = vec![b"payload"];
        let sha1 = MessageSigner::new("hmac-sha1", b"k").unwrap().sign(&parts);
        let sha256 = MessageSigner::new("hmac-sha256", b"k").unwrap().sign(&parts);
        let sha512 = MessageSigner::new("hmac-sha512", b"k").unwrap().sign(&parts);
        assert_eq!(sha1.len(), 40);
        assert_eq!(sha256.len(), 64);
        assert_eq!(sha512.len(), 128);
    }

    #[test]
    fn empty_key_skips_signing() {
        let signer = MessageSigner::new("hmac-sha256", b"").unwrap();
        assert_eq!(signer.sign(&[b"x"]), "");
        assert!(signer.verify("anything", &[b"x"]));
    }
}
