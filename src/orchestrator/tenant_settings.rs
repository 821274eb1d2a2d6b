//! Per-tenant TTL and similarity-threshold settings (spec §3
//! "TenantSettings").
//!
//! Read on every cache operation, writable via an admin interface. Backed
//! by a read-mostly map guarded by a short exclusive lock on write (spec §5
//! "Resource ownership").

use parking_lot::RwLock;
use std::collections::HashMap;

/// A tenant's cache-tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct TenantSettings {
    /// Seconds a cache entry survives before expiry.
    pub ttl_seconds: u64,
    /// Minimum cosine similarity a candidate must meet to count as a hit.
    pub similarity_threshold: f32,
}

/// Process-wide registry of [`TenantSettings`], one entry per
/// `tenant_scope`, created on first touch with the configured defaults.
pub struct TenantSettingsRegistry {
    settings: RwLock<HashMap<String, TenantSettings>>,
    default_ttl_seconds: u64,
    default_similarity_threshold: f32,
}

impl TenantSettingsRegistry {
    /// Builds a registry that seeds new tenants with `default_ttl_seconds`
    /// and `default_similarity_threshold`.
    pub fn new(default_ttl_seconds: u64, default_similarity_threshold: f32) -> Self {
        Self {
            settings: RwLock::new(HashMap::new()),
            default_ttl_seconds,
            default_similarity_threshold,
        }
    }

    /// Returns `tenant_scope`'s settings, seeding defaults on first touch.
    pub fn get_or_default(&self, tenant_scope: &str) -> TenantSettings {
        if let Some(existing) = self.settings.read().get(tenant_scope) {
            return *existing;
        }
        let defaults = TenantSettings {
            ttl_seconds: self.default_ttl_seconds,
            similarity_threshold: self.default_similarity_threshold,
        };
        self.settings
            .write()
            .entry(tenant_scope.to_string())
            .or_insert(defaults);
        defaults
    }

    /// Overwrites `ttl_seconds` for `tenant_scope`, seeding defaults for the
    /// other field if the tenant is new.
    pub fn set_ttl(&self, tenant_scope: &str, ttl_seconds: u64) {
        let mut settings = self.settings.write();
        let entry = settings
            .entry(tenant_scope.to_string())
            .or_insert(TenantSettings {
                ttl_seconds: self.default_ttl_seconds,
                similarity_threshold: self.default_similarity_threshold,
            });
        entry.ttl_seconds = ttl_seconds;
    }

    /// Overwrites `similarity_threshold` for `tenant_scope`, seeding
    /// defaults for the other field if the tenant is new.
    pub fn set_similarity_threshold(&self, tenant_scope: &str, similarity_threshold: f32) {
        let mut settings = self.settings.write();
        let entry = settings
            .entry(tenant_scope.to_string())
            .or_insert(TenantSettings {
                ttl_seconds: self.default_ttl_seconds,
                similarity_threshold: self.default_similarity_threshold,
            });
        entry.similarity_threshold = similarity_threshold;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tenant_gets_defaults() {
        let registry = TenantSettingsRegistry::new(86400, 0.89);
        let settings = registry.get_or_default("tenant-a");
        assert_eq!(settings.ttl_seconds, 86400);
        assert_eq!(settings.similarity_threshold, 0.89);
    }

    #[test]
    fn set_ttl_is_read_back_exactly() {
        let registry = TenantSettingsRegistry::new(86400, 0.89);
        registry.set_ttl("tenant-a", 3600);
        assert_eq!(registry.get_or_default("tenant-a").ttl_seconds, 3600);
    }

    #[test]
    fn set_similarity_threshold_is_read_back_exactly() {
        let registry = TenantSettingsRegistry::new(86400, 0.89);
        registry.set_similarity_threshold("tenant-a", 0.95);
        assert_eq!(
            registry.get_or_default("tenant-a").similarity_threshold,
            0.95
        );
    }
}
