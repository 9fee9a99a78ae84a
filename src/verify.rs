//! Digest comparison policy.

/// Exact, case-insensitive equality over complete digest hex strings.
///
/// Deliberately not a containment check: a truncated or misaligned digest
/// that happens to share a fragment with the expected value must fail.
pub(crate) fn digests_match(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected)
}
