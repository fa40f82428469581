//! Integration tests for the credvault crypto module.

use credvault::crypto::kdf::{KdfParams, MIN_ITERATIONS, MIN_MEMORY_KIB, SALT_LEN};
use credvault::crypto::{decrypt, derive_master_key, encrypt, generate_salt, VaultKey};
use credvault::VaultError;

/// Helper: derive a vault key with the cheapest allowed parameters.
fn key_for(secret: &[u8], salt: &[u8]) -> VaultKey {
    derive_master_key(secret, salt, &KdfParams::minimum())
        .expect("derive master key")
        .derive_vault_key()
        .expect("derive vault key")
}

// ---------------------------------------------------------------------------
// Encryption round-trip
// ---------------------------------------------------------------------------

#[test]
fn encrypt_decrypt_roundtrip() {
    let key = VaultKey::new(&[0xABu8; 32]);
    let plaintext = br#"{"credentials":[{"website":"example.com"}]}"#;

    let sealed = encrypt(&key, plaintext, b"aad").expect("encrypt should succeed");

    assert_eq!(sealed.nonce.len(), 12);
    assert_eq!(sealed.tag.len(), 16);
    assert_eq!(sealed.ciphertext.len(), plaintext.len());
    assert_ne!(sealed.ciphertext.as_slice(), plaintext.as_slice());

    let recovered = decrypt(&key, &sealed, b"aad").expect("decrypt should succeed");
    assert_eq!(recovered, plaintext);
}

#[test]
fn empty_payload_roundtrips() {
    let key = VaultKey::new(&[0x01u8; 32]);

    let sealed = encrypt(&key, b"", b"").expect("encrypt empty");
    assert!(sealed.ciphertext.is_empty());

    let recovered = decrypt(&key, &sealed, b"").expect("decrypt empty");
    assert!(recovered.is_empty());
}

#[test]
fn encrypt_uses_a_fresh_nonce_each_time() {
    let key = VaultKey::new(&[0xCDu8; 32]);
    let plaintext = b"same plaintext";

    let first = encrypt(&key, plaintext, b"").expect("encrypt 1");
    let second = encrypt(&key, plaintext, b"").expect("encrypt 2");

    assert_ne!(first.nonce, second.nonce, "nonces must never repeat");
    assert_ne!(first.ciphertext, second.ciphertext);
}

// ---------------------------------------------------------------------------
// Authentication failures
// ---------------------------------------------------------------------------

#[test]
fn decrypt_with_wrong_key_fails() {
    let key = VaultKey::new(&[0x11u8; 32]);
    let wrong_key = VaultKey::new(&[0x22u8; 32]);

    let sealed = encrypt(&key, b"top secret", b"").expect("encrypt");
    let result = decrypt(&wrong_key, &sealed, b"");

    assert!(matches!(result, Err(VaultError::Authentication)));
}

#[test]
fn decrypt_with_corrupted_ciphertext_fails() {
    let key = VaultKey::new(&[0xBBu8; 32]);

    let mut sealed = encrypt(&key, b"value=abc", b"").expect("encrypt");
    sealed.ciphertext[0] ^= 0xFF;

    assert!(matches!(
        decrypt(&key, &sealed, b""),
        Err(VaultError::Authentication)
    ));
}

#[test]
fn decrypt_with_corrupted_tag_fails() {
    let key = VaultKey::new(&[0xBCu8; 32]);

    let mut sealed = encrypt(&key, b"value=abc", b"").expect("encrypt");
    sealed.tag[15] ^= 0x01;

    assert!(matches!(
        decrypt(&key, &sealed, b""),
        Err(VaultError::Authentication)
    ));
}

#[test]
fn decrypt_with_different_associated_data_fails() {
    let key = VaultKey::new(&[0x33u8; 32]);

    let sealed = encrypt(&key, b"bound", b"vault:alice").expect("encrypt");

    assert!(matches!(
        decrypt(&key, &sealed, b"vault:bob"),
        Err(VaultError::Authentication)
    ));
}

#[test]
fn wrongly_sized_nonce_or_tag_is_an_authentication_error() {
    let key = VaultKey::new(&[0x44u8; 32]);
    let sealed = encrypt(&key, b"data", b"").expect("encrypt");

    let mut short_nonce = sealed.clone();
    short_nonce.nonce.truncate(5);
    assert!(matches!(
        decrypt(&key, &short_nonce, b""),
        Err(VaultError::Authentication)
    ));

    let mut long_tag = sealed;
    long_tag.tag.push(0);
    assert!(matches!(
        decrypt(&key, &long_tag, b""),
        Err(VaultError::Authentication)
    ));
}

// ---------------------------------------------------------------------------
// Key derivation (Argon2id + HKDF)
// ---------------------------------------------------------------------------

#[test]
fn derive_same_inputs_same_key() {
    let salt = [0x42u8; SALT_LEN];
    assert_eq!(key_for(b"hunter2", &salt), key_for(b"hunter2", &salt));
}

#[test]
fn derive_different_secret_different_key() {
    let salt = [0x42u8; SALT_LEN];
    assert_ne!(key_for(b"hunter2", &salt), key_for(b"hunter3", &salt));
}

#[test]
fn derive_different_salt_different_key() {
    assert_ne!(
        key_for(b"hunter2", &[0x01u8; SALT_LEN]),
        key_for(b"hunter2", &[0x02u8; SALT_LEN])
    );
}

#[test]
fn empty_secret_still_derives_a_key() {
    let salt = generate_salt();
    let master =
        derive_master_key(b"", &salt, &KdfParams::minimum()).expect("empty secret");
    assert_ne!(master.as_bytes(), &[0u8; 32]);
}

#[test]
fn vault_key_differs_from_master_key() {
    let salt = generate_salt();
    let master = derive_master_key(b"pw", &salt, &KdfParams::minimum()).unwrap();
    let vault_key = master.derive_vault_key().unwrap();
    assert_ne!(master.as_bytes(), vault_key.as_bytes());
}

#[test]
fn kdf_params_below_floor_are_rejected() {
    assert!(KdfParams::new(MIN_MEMORY_KIB - 1, 3, 1).is_err());
    assert!(KdfParams::new(65_536, MIN_ITERATIONS - 1, 1).is_err());
    assert!(KdfParams::new(65_536, 3, 0).is_err());
    assert!(KdfParams::new(MIN_MEMORY_KIB, MIN_ITERATIONS, 1).is_ok());
}

#[test]
fn generate_salt_is_random() {
    let a = generate_salt();
    let b = generate_salt();
    assert_eq!(a.len(), SALT_LEN);
    assert_ne!(a, b);
}

#[test]
fn vault_key_debug_is_redacted() {
    let key = VaultKey::new(&[0x99u8; 32]);
    assert_eq!(format!("{key:?}"), "VaultKey(<redacted>)");
}
