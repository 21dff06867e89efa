//! Cache key schema
//!
//! Key format: {entity}:{identifier}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Product snapshot
    /// Format: product:{id}
    pub fn product(product_id: i64) -> String {
        format!("product:{}", product_id)
    }

    /// Extract entity type from key
    pub fn entity_type(key: &str) -> Option<&str> {
        match key.split_once(':') {
            Some((entity, rest)) if !entity.is_empty() && !rest.is_empty() => Some(entity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_key() {
        assert_eq!(CacheKey::product(42), "product:42");
    }

    #[test]
    fn test_entity_type() {
        assert_eq!(CacheKey::entity_type("product:42"), Some("product"));
        assert_eq!(CacheKey::entity_type("product:"), None);
        assert_eq!(CacheKey::entity_type("invalid"), None);
    }
}
