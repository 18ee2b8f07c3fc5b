pub mod traffic;
pub mod transform;

use std::sync::Arc;

use baker_middleware::{MiddlewareError, MiddlewareRegistry};

/// Registers baker's built-in middleware kinds, grounded on
/// `ando_plugins::register_all`'s startup-time registration shape.
pub fn register_all(registry: &mut MiddlewareRegistry) -> Result<(), MiddlewareError> {
    registry.register("ReplacePath", Arc::new(|args: &serde_json::Value| {
        transform::ReplacePath::build(args).map_err(|e| MiddlewareError::InvalidArgs("ReplacePath".into(), e.to_string()))
    }))?;
    registry.register("AppendPath", Arc::new(|args: &serde_json::Value| {
        transform::AppendPath::build(args).map_err(|e| MiddlewareError::InvalidArgs("AppendPath".into(), e.to_string()))
    }))?;
    registry.register("RateLimiter", Arc::new(|args: &serde_json::Value| {
        traffic::RateLimiter::build(args).map_err(|e| MiddlewareError::InvalidArgs("RateLimiter".into(), e.to_string()))
    }))?;
    Ok(())
}

pub fn default_registry() -> Result<MiddlewareRegistry, MiddlewareError> {
    let mut registry = MiddlewareRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_every_built_in_kind() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 3);
    }
}
