pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# SHARDPIPE CONFIGURATION
# =============================================================================
# Every section is optional; omitted settings fall back to the values shown.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/shardpipe/config.yml
#   3. /etc/shardpipe/config.yml
#
# Values may reference environment variables with $env{VAR_NAME}.

# =============================================================================
# PARTITIONING
# =============================================================================
# Records are routed to a partition by a stable hash of their key. Records
# without a key always go to partition 0.

partitioning:
  num_partitions: 3

# =============================================================================
# WORKERS
# =============================================================================
# Each replica runs a fixed pool of workers. Every worker drains its own
# bounded queue; submitting to a full queue waits for space.

workers:
  num_workers: 4
  queue_capacity: 100
  # How often an idle worker re-checks for shutdown
  poll_interval: 500ms
  # Pause between a job's last batch finishing and its status report
  settle_delay: 100ms
  # How long in-flight work may run after shutdown starts
  shutdown_grace: 5s

# =============================================================================
# CLUSTER
# =============================================================================
# id is stamped on every status report. When omitted the host name is used.
# expected_replicas is how many replicas process every sub-payload.

cluster:
  # id: cluster-1
  expected_replicas: 3

# =============================================================================
# TOPICS
# =============================================================================

topics:
  payload: payload-topic
  status: payload-status

# =============================================================================
# AGGREGATION
# =============================================================================
# Drop a job's collected reports when nothing new arrived for this long.
# Leave unset to keep them until removed explicitly, e.g.
#
#   aggregation:
#     idle_eviction: 10m

aggregation: {}

# =============================================================================
# FAILURE INJECTION (testing only)
# =============================================================================
# Batches whose key equals fail_key always fail. Any batch fails with
# probability random_failure_probability.

failure_injection:
  # fail_key: tsid-broken
  random_failure_probability: 0.0
"#
    .to_string()
}
