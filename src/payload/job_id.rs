//! Sub-job id format.
//!
//! A sub-payload's id is `<original>-p<partition>`. The status side recovers
//! the original id by stripping the last such suffix, so an original id that
//! itself ends in `-p<digits>` is indistinguishable from a sub-job id.

pub const PARTITION_MARKER: &str = "-p";

pub fn sub_job_id(original: &str, partition_id: u32) -> String {
    format!("{}{}{}", original, PARTITION_MARKER, partition_id)
}

/// Returns the original job id for a sub-job id, or `id` unchanged when it
/// carries no partition suffix.
pub fn original_job_id(id: &str) -> &str {
    match split_suffix(id) {
        Some((original, _)) => original,
        None => id,
    }
}

/// Returns the partition encoded in a sub-job id suffix.
pub fn partition_suffix(id: &str) -> Option<u32> {
    split_suffix(id).and_then(|(_, token)| token.parse().ok())
}

fn split_suffix(id: &str) -> Option<(&str, &str)> {
    let idx = id.rfind(PARTITION_MARKER)?;
    if idx == 0 {
        return None;
    }
    let token = &id[idx + PARTITION_MARKER.len()..];
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((&id[..idx], token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_job_id_format() {
        assert_eq!(sub_job_id("job-42", 0), "job-42-p0");
        assert_eq!(sub_job_id("job", 17), "job-p17");
    }

    #[test]
    fn test_original_job_id_strips_last_suffix() {
        assert_eq!(original_job_id("job-42-p2"), "job-42");
        assert_eq!(original_job_id("a-p1-p3"), "a-p1");
    }

    #[test]
    fn test_original_job_id_without_suffix() {
        assert_eq!(original_job_id("job-42"), "job-42");
        assert_eq!(original_job_id("my-payload"), "my-payload");
        assert_eq!(original_job_id("job-p"), "job-p");
        assert_eq!(original_job_id("-p3"), "-p3");
    }

    #[test]
    fn test_partition_suffix() {
        assert_eq!(partition_suffix("job-p2"), Some(2));
        assert_eq!(partition_suffix("job"), None);
        assert_eq!(partition_suffix("job-pX"), None);
    }
}
