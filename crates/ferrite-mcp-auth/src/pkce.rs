//! RFC 7636 Proof Key for Code Exchange.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A generated PKCE pair: the verifier kept by the client, and the
/// `S256` challenge sent in the authorization request.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// Generates a PKCE verifier/challenge pair. The verifier is 32 CSPRNG
/// bytes, base64url-encoded without padding — 43 characters, all drawn
/// from RFC 7636's unreserved alphabet, at the low end of its 43-128 char
/// allowance. The challenge is `base64url(sha256(verifier))` (`S256`).
pub fn generate() -> PkcePair {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = challenge_for(&verifier);
    PkcePair { verifier, challenge }
}

fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
