//! Message signing is an external collaborator per scope, but the voter
//! needs something concrete to call. `MessageSigner` is the trait
//! boundary; `Secp256k1Signer` is a real implementation built on the
//! `bitcoin` crate's bundled `secp256k1`, used by default and by tests.

use bitcoin::hashes::{sha256d, Hash};
use bitcoin::secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};

pub trait MessageSigner: Send + Sync {
    fn sign(&self, message: &str) -> Vec<u8>;
    fn verify(&self, message: &str, signature: &[u8], public_key: &PublicKey) -> bool;
    fn public_key(&self) -> PublicKey;
}

pub struct Secp256k1Signer {
    secp: Secp256k1<bitcoin::secp256k1::All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Secp256k1Signer {
    pub fn new(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self { secp, secret_key, public_key }
    }

    fn message_digest(message: &str) -> Message {
        let hash = sha256d::Hash::hash(message.as_bytes());
        Message::from_digest(hash.to_byte_array())
    }
}

impl MessageSigner for Secp256k1Signer {
    fn sign(&self, message: &str) -> Vec<u8> {
        let digest = Self::message_digest(message);
        let sig: ecdsa::Signature = self.secp.sign_ecdsa(&digest, &self.secret_key);
        sig.serialize_der().to_vec()
    }

    fn verify(&self, message: &str, signature: &[u8], public_key: &PublicKey) -> bool {
        let digest = Self::message_digest(message);
        let Ok(sig) = ecdsa::Signature::from_der(signature) else {
            return false;
        };
        self.secp.verify_ecdsa(&digest, &sig, public_key).is_ok()
    }

    fn public_key(&self) -> PublicKey {
        self.public_key
    }
}

/// Builds the canonical message a payment vote is signed over:
/// `outpoint_short || height || script_asm(payee)`.
pub fn vote_message(operator_outpoint: &bitcoin::OutPoint, height: u32, payee: &bitcoin::Script) -> String {
    format!("{}-{}{}{}", operator_outpoint.txid, operator_outpoint.vout, height, payee)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signer() -> Secp256k1Signer {
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        Secp256k1Signer::new(secret_key)
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = test_signer();
        let message = "hello masternode";
        let signature = signer.sign(message);
        assert!(signer.verify(message, &signature, &signer.public_key()));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let signer = test_signer();
        let signature = signer.sign("original");
        assert!(!signer.verify("tampered", &signature, &signer.public_key()));
    }
}
