//! HTTP Message Signatures (RFC 9421) over Ed25519, as required by Open
//! Payments auth and resource servers.
//!
//! Covered components: `@method`, `@target-uri`, `authorization` when a token
//! is sent, and `content-digest`, `content-length`, `content-type` when the
//! request has a body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, Verifier};
use sha2::{Digest, Sha512};

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

/// Label used for the single signature attached to each request.
pub const SIGNATURE_LABEL: &str = "sig1";

/// Media type of every JSON body the client sends.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// The parts of an outgoing request that get signed.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    pub method: &'a str,
    pub target_uri: &'a str,
    pub authorization: Option<&'a str>,
    pub body: Option<&'a [u8]>,
}

/// Header values to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature: String,
    pub signature_input: String,
    /// Present when the request has a body.
    pub content_digest: Option<String>,
    pub content_length: Option<String>,
}

/// `Content-Digest` header value for a body.
pub fn content_digest(body: &[u8]) -> String {
    format!("sha-512=:{}:", STANDARD.encode(Sha512::digest(body)))
}

/// Ordered (component, value) pairs covered by the signature.
fn covered_components(parts: &RequestParts<'_>) -> Vec<(&'static str, String)> {
    let mut components = vec![
        ("@method", parts.method.to_uppercase()),
        ("@target-uri", parts.target_uri.to_string()),
    ];
    if let Some(auth) = parts.authorization {
        components.push(("authorization", auth.to_string()));
    }
    if let Some(body) = parts.body {
        components.push(("content-digest", content_digest(body)));
        components.push(("content-length", body.len().to_string()));
        components.push(("content-type", JSON_CONTENT_TYPE.to_string()));
    }
    components
}

fn signature_params(components: &[(&'static str, String)], key_id: &str, created: i64) -> String {
    let names: Vec<String> = components
        .iter()
        .map(|(name, _)| format!("\"{}\"", name))
        .collect();
    format!("({});keyid=\"{}\";created={}", names.join(" "), key_id, created)
}

/// Canonical signature base: one `"name": value` line per component followed
/// by the `@signature-params` line.
fn signature_base(components: &[(&'static str, String)], params: &str) -> String {
    let mut base = String::new();
    for (name, value) in components {
        base.push_str(&format!("\"{}\": {}\n", name, value));
    }
    base.push_str(&format!("\"@signature-params\": {}", params));
    base
}

/// Sign a request with the wallet's key, `created` being Unix seconds.
pub fn sign_request(
    parts: &RequestParts<'_>,
    key_id: &str,
    keypair: &KeyPair,
    created: i64,
) -> SignatureHeaders {
    let components = covered_components(parts);
    let params = signature_params(&components, key_id, created);
    let base = signature_base(&components, &params);
    let signature = keypair.signing_key().sign(base.as_bytes());

    SignatureHeaders {
        signature: format!("{}=:{}:", SIGNATURE_LABEL, STANDARD.encode(signature.to_bytes())),
        signature_input: format!("{}={}", SIGNATURE_LABEL, params),
        content_digest: parts.body.map(content_digest),
        content_length: parts.body.map(|b| b.len().to_string()),
    }
}

/// Verify the headers produced by [`sign_request`] against the request parts.
pub fn verify_request(
    parts: &RequestParts<'_>,
    headers: &SignatureHeaders,
    public_key: &PublicKey,
) -> Result<(), CryptoError> {
    let label_prefix = format!("{}=", SIGNATURE_LABEL);
    let params = headers
        .signature_input
        .strip_prefix(&label_prefix)
        .ok_or_else(|| CryptoError::MalformedSignature("missing signature label".into()))?;
    let encoded = headers
        .signature
        .strip_prefix(&label_prefix)
        .and_then(|s| s.strip_prefix(':'))
        .and_then(|s| s.strip_suffix(':'))
        .ok_or_else(|| CryptoError::MalformedSignature("expected sig1=:<base64>:".into()))?;

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    let bytes: [u8; 64] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::MalformedSignature("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&bytes);

    let base = signature_base(&covered_components(parts), params);
    public_key
        .verifying_key()
        .verify(base.as_bytes(), &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}
