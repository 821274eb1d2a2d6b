//! Tenant scoping and request fingerprinting.
//!
//! Both functions here are pure: same input bytes in, same hex digest out,
//! always. That purity is what makes [`fingerprint`] usable as cache entry
//! identity and what makes property 6 in the spec ("fingerprint is a pure
//! function of its inputs") trivially true rather than merely tested.

pub mod canonical_json;

use crate::constants::TENANT_SCOPE_HEX_LEN;
use canonical_json::canonical_json;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Derives a tenant's cache-partition key from its opaque `tenant_id`.
///
/// A 16-hex-char prefix of `SHA-256(tenant_id)`. The core never stores or
/// reasons about `tenant_id` itself past this call.
pub fn tenant_scope(tenant_id: &str) -> String {
    let digest = Sha256::digest(tenant_id.as_bytes());
    hex::encode(digest)[..TENANT_SCOPE_HEX_LEN].to_string()
}

/// Computes the exact-match cache identity for a request.
///
/// `SHA-256(canonical_json({tenant_scope, text, model, temperature}))`,
/// lowercase hex. Canonicalization (sorted keys, no insignificant
/// whitespace, shortest round-trip numbers) lives in [`canonical_json`].
pub fn fingerprint(tenant_scope: &str, text: &str, model: &str, temperature: f32) -> String {
    let value = json!({
        "tenant_scope": tenant_scope,
        "text": text,
        "model": model,
        "temperature": temperature,
    });
    let canonical = canonical_json(&value);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_scope_is_deterministic() {
        assert_eq!(tenant_scope("acme-corp"), tenant_scope("acme-corp"));
    }

    #[test]
    fn tenant_scope_is_sixteen_hex_chars() {
        let scope = tenant_scope("acme-corp");
        assert_eq!(scope.len(), 16);
        assert!(scope.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tenant_scope_distinguishes_tenants() {
        assert_ne!(tenant_scope("tenant-a"), tenant_scope("tenant-b"));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint("scope123", "hello world", "gpt-4o", 0.7);
        let b = fingerprint("scope123", "hello world", "gpt-4o", 0.7);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_is_sixty_four_hex_chars() {
        let fp = fingerprint("scope123", "hello", "gpt-4o", 0.7);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn fingerprint_is_sensitive_to_each_field() {
        let base = fingerprint("scope-a", "text", "gpt-4o", 0.7);
        assert_ne!(base, fingerprint("scope-b", "text", "gpt-4o", 0.7));
        assert_ne!(base, fingerprint("scope-a", "other", "gpt-4o", 0.7));
        assert_ne!(base, fingerprint("scope-a", "text", "gpt-4", 0.7));
        assert_ne!(base, fingerprint("scope-a", "text", "gpt-4o", 0.9));
    }
}
