use crate::payload::Record;
use std::collections::HashMap;
use std::fmt;

/// Identifies a batch within one job. The record key itself is the id, so it
/// does not depend on grouping iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(Option<String>);

impl BatchId {
    pub fn new(key: Option<&str>) -> Self {
        Self(key.map(str::to_string))
    }

    pub fn key(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(key) => f.write_str(key),
            None => f.write_str("<unkeyed>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Success,
    Failure,
}

impl BatchOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, BatchOutcome::Success)
    }
}

/// All records of one job sharing one key.
#[derive(Debug, Clone)]
pub struct Batch {
    pub job_id: String,
    pub batch_id: BatchId,
    pub records: Vec<Record>,
}

/// Groups records by key, keeping the relative order of records per key.
pub fn group_by_key(job_id: &str, records: Vec<Record>) -> Vec<Batch> {
    let mut groups: HashMap<BatchId, Vec<Record>> = HashMap::new();
    for record in records {
        groups
            .entry(BatchId::new(record.key()))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|(batch_id, records)| Batch {
            job_id: job_id.to_string(),
            batch_id,
            records,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Datapoint;

    fn rec(key: Option<&str>, seq: u64) -> Record {
        Record {
            tsid: key.map(str::to_string),
            datapoints: vec![Datapoint(serde_json::json!(seq))],
        }
    }

    #[test]
    fn test_group_by_key_counts_distinct_keys() {
        let records = vec![
            rec(Some("a"), 0),
            rec(Some("b"), 1),
            rec(Some("a"), 2),
            rec(None, 3),
            rec(None, 4),
        ];

        let mut batches = group_by_key("job", records);
        batches.sort_by(|x, y| x.batch_id.cmp(&y.batch_id));

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].batch_id, BatchId::new(None));
        assert_eq!(batches[0].records.len(), 2);
        assert_eq!(batches[1].batch_id, BatchId::new(Some("a")));
        let seqs: Vec<_> = batches[1].records.iter().map(|r| r.datapoints[0].0.clone()).collect();
        assert_eq!(seqs, vec![serde_json::json!(0), serde_json::json!(2)]);
        assert!(batches.iter().all(|b| b.job_id == "job"));
    }

    #[test]
    fn test_batch_id_display() {
        assert_eq!(BatchId::new(Some("tsid1")).to_string(), "tsid1");
        assert_eq!(BatchId::new(None).to_string(), "<unkeyed>");
    }
}
