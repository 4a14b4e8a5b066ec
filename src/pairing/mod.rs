//! Pairing: key generation (X25519, Ed25519), pairing codes, device identity
//! verification (HMAC) and signing, and the operator prompt for the phone number.

mod prompt;

pub use prompt::{PhonePrompt, PresetPrompt, StdinPrompt};

use crate::error::PairingError;
use crate::store::KeyPair;
use crate::Result;
use ed25519_dalek::{
    Signature, Signer, SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH,
};
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

type HmacSha256 = Hmac<Sha256>;

const TAG_LEN: usize = 32;
const SIGNED_HEADER_LEN: usize = PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH;

/// Pairing codes avoid 0, O, I and U so they survive being read aloud.
const PAIRING_CODE_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTVWXYZ";

pub const PAIRING_CODE_LEN: usize = 8;

/// Device identity payload whose HMAC tag checked out.
#[derive(Clone, Debug)]
pub struct VerifiedIdentity {
    pub payload: Vec<u8>,
}

/// Key material of a new linked device.
#[derive(Clone, Debug)]
pub struct DeviceKeys {
    /// X25519, for the Noise handshake.
    pub noise: KeyPair,
    /// Ed25519, signs the device identity.
    pub identity: KeyPair,
    pub adv_secret: [u8; 32],
    /// Signal registration id, 14 bits.
    pub registration_id: u16,
}

impl DeviceKeys {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let (public, private) = x25519_key_pair();
        let signing = SigningKey::generate(&mut rng);
        let mut adv_secret = [0u8; 32];
        rng.fill_bytes(&mut adv_secret);
        Self {
            noise: KeyPair { public, private },
            identity: KeyPair {
                public: signing.verifying_key().to_bytes(),
                private: signing.to_bytes(),
            },
            adv_secret,
            registration_id: rng.gen_range(1..=0x3fff),
        }
    }
}

/// Fresh X25519 key pair as (public, private).
pub fn x25519_key_pair() -> ([u8; 32], [u8; 32]) {
    let mut private = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut private);
    let public = PublicKey::from(&StaticSecret::from(private)).to_bytes();
    (public, private)
}

/// Random pairing code, shown to the operator and typed into the phone.
pub fn generate_pairing_code() -> String {
    let mut rng = rand::thread_rng();
    (0..PAIRING_CODE_LEN)
        .map(|_| PAIRING_CODE_ALPHABET[rng.gen_range(0..PAIRING_CODE_ALPHABET.len())] as char)
        .collect()
}

/// `ABCD1234` -> `ABCD-1234`.
pub fn format_pairing_code(code: &str) -> String {
    if code.len() == PAIRING_CODE_LEN && code.is_ascii() {
        format!("{}-{}", &code[..4], &code[4..])
    } else {
        code.to_string()
    }
}

/// Check a `payload || HMAC-SHA256(adv_secret, payload)` blob from the server.
pub fn verify_device_identity(blob: &[u8], adv_secret: &[u8]) -> Result<VerifiedIdentity> {
    let split = blob
        .len()
        .checked_sub(TAG_LEN)
        .ok_or(PairingError::InvalidDeviceIdentityHmac)?;
    let (payload, tag) = blob.split_at(split);

    let mut mac = HmacSha256::new_from_slice(adv_secret)
        .map_err(|e| PairingError::Protocol(e.to_string()))?;
    mac.update(payload);
    mac.verify_slice(tag)
        .map_err(|_| PairingError::InvalidDeviceIdentityHmac)?;
    Ok(VerifiedIdentity {
        payload: payload.to_vec(),
    })
}

/// Sign a verified identity for storage as `account`:
/// `verifying key || signature || payload`.
pub fn sign_device_identity(payload: &[u8], identity_private: &[u8; 32]) -> Vec<u8> {
    let key = SigningKey::from_bytes(identity_private);
    let signature = key.sign(payload);
    [
        key.verifying_key().as_bytes().as_slice(),
        signature.to_bytes().as_slice(),
        payload,
    ]
    .concat()
}

/// Check a stored `account` blob and return the payload it signs.
pub fn verify_signed_identity(account: &[u8]) -> Result<Vec<u8>> {
    if account.len() < SIGNED_HEADER_LEN {
        return Err(PairingError::InvalidDeviceSignature.into());
    }
    let (key, rest) = account.split_at(PUBLIC_KEY_LENGTH);
    let (signature, payload) = rest.split_at(SIGNATURE_LENGTH);

    let key = <[u8; PUBLIC_KEY_LENGTH]>::try_from(key)
        .ok()
        .and_then(|k| VerifyingKey::from_bytes(&k).ok())
        .ok_or(PairingError::InvalidDeviceSignature)?;
    let signature =
        Signature::from_slice(signature).map_err(|_| PairingError::InvalidDeviceSignature)?;
    key.verify_strict(payload, &signature)
        .map_err(|_| PairingError::InvalidDeviceSignature)?;
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(payload: &[u8], key: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key).unwrap();
        mac.update(payload);
        [payload, mac.finalize().into_bytes().as_slice()].concat()
    }

    #[test]
    fn pairing_code_uses_alphabet() {
        for _ in 0..32 {
            let code = generate_pairing_code();
            assert_eq!(code.len(), PAIRING_CODE_LEN);
            assert!(code.bytes().all(|b| PAIRING_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn pairing_code_display() {
        assert_eq!(format_pairing_code("ABCD1234"), "ABCD-1234");
        assert_eq!(format_pairing_code("short"), "short");
    }

    #[test]
    fn device_keys_are_distinct() {
        let keys = DeviceKeys::generate();
        assert!((1..=0x3fff).contains(&keys.registration_id));
        assert_ne!(keys.noise.public, keys.identity.public);
        assert_ne!(keys.adv_secret, [0u8; 32]);
    }

    #[test]
    fn hmac_accepts_valid_tag() {
        let key = [7u8; 32];
        let verified = verify_device_identity(&tagged(b"identity", &key), &key).unwrap();
        assert_eq!(verified.payload, b"identity");
    }

    #[test]
    fn hmac_rejects_tampered() {
        let key = [7u8; 32];
        let mut with_tag = tagged(b"identity", &key);
        with_tag[0] ^= 1;
        assert!(verify_device_identity(&with_tag, &key).is_err());
        assert!(verify_device_identity(b"short", &key).is_err());
    }

    #[test]
    fn signed_identity_verifies() {
        let keys = DeviceKeys::generate();
        let signed = sign_device_identity(b"account", &keys.identity.private);
        assert_eq!(verify_signed_identity(&signed).unwrap(), b"account");

        let mut forged = signed.clone();
        let last = forged.len() - 1;
        forged[last] ^= 0xff;
        assert!(verify_signed_identity(&forged).is_err());
        assert!(verify_signed_identity(&signed[..64]).is_err());
    }
}
