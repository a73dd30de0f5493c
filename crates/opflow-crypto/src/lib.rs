pub mod error;
pub mod keys;
pub mod signing;

pub use error::CryptoError;
pub use keys::{generate_key_material, Jwk, KeyMaterial, KeyPair, PublicKey};
pub use signing::{
    content_digest, sign_request, verify_request, RequestParts, SignatureHeaders, JSON_CONTENT_TYPE,
};
