//! Type aliases for domain concepts.

/// An environment variable name (e.g., DATABASE_URL).
///
/// Case is preserved exactly as declared in the secrets document.
pub type SecretKey = String;

/// A provider-specific secret identifier, or the literal value itself
/// for secrets that never reach the provider.
pub type SecretPath = String;

/// A resolved secret value.
///
/// Raw bytes as produced by the provider; wiped from memory on drop.
pub type SecretValue = zeroize::Zeroizing<Vec<u8>>;
