//! Composite keys.
//!
//! Existing consumers expect every derived key to embed the same logical
//! identifier twice: `<Prefix>-<value>__<Prefix>-<value>`.

pub const IDENTITY_MAPPING_PREFIX: &str = "IdentityToUserMapping";
pub const FILE_PREFIX: &str = "File";

/// `<prefix>-<value>__<prefix>-<value>`.
pub fn composite_key(prefix: &str, value: &str) -> String {
    format!("{prefix}-{value}__{prefix}-{value}")
}

/// Key of the identity-to-user mapping for an identity reference.
pub fn identity_mapping_key(identity_id: &str) -> String {
    composite_key(IDENTITY_MAPPING_PREFIX, identity_id)
}

/// Key of a file model, from its bucket and path.
pub fn file_key(bucket: &str, path: &str) -> String {
    composite_key(FILE_PREFIX, &format!("{bucket}#{path}"))
}
