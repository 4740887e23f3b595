use super::types::*;
use crate::config::{expand_env_vars, ENV_VAR_PATTERN};
use regex::Regex;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    load_config_from_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parses and validates config from YAML text. Environment variables are
/// expanded first; an empty document yields the defaults.
pub fn load_config_from_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let config: Config = if yaml_string.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&yaml_string)?
    };

    validate_config(&config)?;
    Ok(config)
}

/// Fails with a readable message naming every `$env{VAR}` left unset.
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.partitioning.num_partitions == 0 {
        errors.push("partitioning.num_partitions must be greater than 0".to_string());
    }

    let workers = &config.workers;
    if workers.num_workers == 0 {
        errors.push("workers.num_workers must be greater than 0".to_string());
    }
    if workers.queue_capacity == 0 {
        errors.push("workers.queue_capacity must be greater than 0".to_string());
    }
    if workers.poll_interval.is_zero() {
        errors.push("workers.poll_interval must be greater than 0".to_string());
    }

    if config.cluster.expected_replicas == 0 {
        errors.push("cluster.expected_replicas must be greater than 0".to_string());
    }
    if let Some(id) = &config.cluster.id {
        if id.trim().is_empty() {
            errors.push("cluster.id must not be blank (omit it to use the host name)".to_string());
        }
    }

    let topics = &config.topics;
    if topics.payload.trim().is_empty() {
        errors.push("topics.payload must not be empty".to_string());
    }
    if topics.status.trim().is_empty() {
        errors.push("topics.status must not be empty".to_string());
    }
    if topics.payload == topics.status {
        errors.push(format!(
            "topics.payload and topics.status must differ (both are '{}')",
            topics.payload
        ));
    }

    if let Some(idle) = config.aggregation.idle_eviction {
        if idle.is_zero() {
            errors.push("aggregation.idle_eviction must be greater than 0 when set".to_string());
        }
    }

    let probability = config.failure_injection.random_failure_probability;
    if !(0.0..=1.0).contains(&probability) {
        errors.push(format!(
            "failure_injection.random_failure_probability must be within [0, 1], got {}",
            probability
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.partitioning.num_partitions, 3);
        assert_eq!(config.workers.num_workers, 4);
        assert_eq!(config.workers.queue_capacity, 100);
        assert_eq!(config.workers.poll_interval, Duration::from_millis(500));
        assert_eq!(config.workers.settle_delay, Duration::from_millis(100));
        assert_eq!(config.workers.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.cluster.expected_replicas, 3);
        assert_eq!(config.topics.payload, "payload-topic");
        assert_eq!(config.topics.status, "payload-status");
        assert!(config.aggregation.idle_eviction.is_none());
        assert!(config.failure_injection.fail_key.is_none());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = load_config_from_str(
            r#"
workers:
  num_workers: 8
  poll_interval: 250ms
aggregation:
  idle_eviction: 10m
"#,
        )
        .unwrap();
        assert_eq!(config.workers.num_workers, 8);
        assert_eq!(config.workers.queue_capacity, 100);
        assert_eq!(config.workers.poll_interval, Duration::from_millis(250));
        assert_eq!(config.aggregation.idle_eviction, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let result = load_config_from_str(
            r#"
partitioning:
  num_partitions: 0
workers:
  num_workers: 0
topics:
  payload: same
  status: same
failure_injection:
  random_failure_probability: 1.5
"#,
        );
        match result {
            Err(ConfigError::ValidationList(errors)) => {
                assert_eq!(errors.len(), 4, "{:?}", errors);
                assert!(errors.iter().any(|e| e.contains("num_partitions")));
                assert!(errors.iter().any(|e| e.contains("num_workers")));
                assert!(errors.iter().any(|e| e.contains("must differ")));
                assert!(errors.iter().any(|e| e.contains("random_failure_probability")));
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(matches!(
            load_config_from_str("bogus: 1\n"),
            Err(ConfigError::YamlParse(_))
        ));
    }

    #[test]
    fn test_unset_env_var_reported() {
        let result = load_config_from_str("cluster:\n  id: $env{SHARDPIPE_SURELY_UNSET_VAR}\n");
        match result {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("SHARDPIPE_SURELY_UNSET_VAR")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_var_expanded() {
        std::env::set_var("SHARDPIPE_TEST_CLUSTER_ID", "from-env");
        let config = load_config_from_str("cluster:\n  id: $env{SHARDPIPE_TEST_CLUSTER_ID}\n").unwrap();
        assert_eq!(config.cluster_id(), "from-env");
        std::env::remove_var("SHARDPIPE_TEST_CLUSTER_ID");
    }

    #[test]
    fn test_worker_pool_config_carries_settings() {
        let config = load_config_from_str("workers:\n  settle_delay: 20ms\n").unwrap();
        let pool = config.worker_pool_config("c-1");
        assert_eq!(pool.cluster_id, "c-1");
        assert_eq!(pool.settle_delay, Duration::from_millis(20));
        assert_eq!(pool.num_workers, 4);
    }

    #[test]
    fn test_cluster_id_falls_back_when_unset() {
        let config = Config::default();
        assert!(!config.cluster_id().is_empty());
    }
}
