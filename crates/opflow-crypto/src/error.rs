/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("key encoding failed: {0}")]
    EncodingError(String),

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("malformed signature header: {0}")]
    MalformedSignature(String),
}
