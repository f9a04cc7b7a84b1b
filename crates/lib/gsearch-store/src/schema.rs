use sha2::{Digest, Sha256};

pub const MIN_NUM_RESULTS: u32 = 1;
pub const MAX_NUM_RESULTS: u32 = 20;
pub const DEFAULT_NUM_RESULTS: u32 = 5;

/// Bumped whenever the key material layout changes so stale files miss cleanly.
pub const CACHE_KEY_VERSION: &str = "v1";

pub const NO_TITLE: &str = "No title";

/// Derives the hex digest used to address a cached result list.
///
/// Fields are newline separated so that no two parameter sets share the same
/// material string.
#[must_use]
pub fn make_cache_key(query: &str, num_results: u32, include_descriptions: bool) -> String {
    let material =
        format!("{CACHE_KEY_VERSION}\n{query}\n{num_results}\n{include_descriptions}");
    format!("{:x}", Sha256::digest(material.as_bytes()))
}

#[must_use]
pub const fn num_results_in_range(num_results: u32) -> bool {
    num_results >= MIN_NUM_RESULTS && num_results <= MAX_NUM_RESULTS
}
