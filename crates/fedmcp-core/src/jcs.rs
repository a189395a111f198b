// JCS (JSON Canonicalization Scheme) - RFC 8785

use serde::Serialize;

/// Canonicalizes a serializable value according to RFC 8785 (JCS) and returns the UTF-8 bytes.
///
/// Object keys are sorted, insignificant whitespace is dropped and numbers
/// are printed in their shortest form, so two implementations serializing the
/// same logical artifact produce identical payload bytes.
pub fn jcs_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let canonical = serde_jcs::to_string(value)?;
    Ok(canonical.into_bytes())
}
