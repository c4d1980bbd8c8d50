//! Cache key derivation.

use serde::Serialize;

/// Builds the storage key for a query: the name followed by its serialized
/// parameters. Not hashed; distinct name/params splits may collide.
pub fn cache_key(name: &str, serialized_params: &str) -> String {
    let mut key = String::with_capacity(name.len() + serialized_params.len());
    key.push_str(name);
    key.push_str(serialized_params);
    key
}

/// Serializes query parameters to canonical JSON.
///
/// Parameters pass through `serde_json::Value` first, whose object maps
/// are key-sorted, so two parameter sets with the same fields produce the
/// same string regardless of field order.
pub fn canonical_params<P>(params: &P) -> serde_json::Result<String>
where
    P: Serialize + ?Sized,
{
    let value = serde_json::to_value(params)?;
    serde_json::to_string(&value)
}
