/// Maps a key onto one of `buckets` buckets.
///
/// Uses SeaHash, which has no per-process seed, so the same key maps to the
/// same bucket in every process for a fixed bucket count. An absent key always
/// maps to bucket 0. `buckets` must be non-zero.
pub fn bucket_for(key: Option<&str>, buckets: u32) -> u32 {
    match key {
        None => 0,
        Some(key) => (seahash::hash(key.as_bytes()) % u64::from(buckets)) as u32,
    }
}
