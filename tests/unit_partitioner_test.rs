use citrinedb::core::CitrineDBError;
use citrinedb::core::cluster::config::{ClusterLayout, DistributedDatabaseConfig};
use citrinedb::core::cluster::partitioner::{
    AllNodesStrategy, PartitionerRegistry, PartitioningStrategy, RoundRobinStrategy,
};
use std::collections::BTreeMap;

fn config_with(clusters: Vec<(&str, Vec<Vec<&str>>)>) -> DistributedDatabaseConfig {
    let mut map = BTreeMap::new();
    for (name, partitions) in clusters {
        map.insert(
            name.to_string(),
            ClusterLayout {
                strategy: "all".to_string(),
                write_quorum: None,
                partitions: partitions
                    .into_iter()
                    .map(|partition| partition.into_iter().map(str::to_string).collect())
                    .collect(),
            },
        );
    }
    DistributedDatabaseConfig {
        write_quorum: 2,
        clusters: map,
    }
}

#[test]
fn test_all_nodes_unions_partitions_in_order() {
    let config = config_with(vec![("*", vec![vec!["a", "b"], vec!["b", "c"]])]);
    let partition = AllNodesStrategy
        .partition(&config, "db", None)
        .unwrap();
    assert_eq!(partition.nodes, vec!["a", "b", "c"]);
}

#[test]
fn test_all_nodes_skips_new_node_placeholders() {
    let config = config_with(vec![("cl0", vec![vec!["a", "$newNode", "b"]])]);
    let partition = AllNodesStrategy
        .partition(&config, "db", Some("cl0"))
        .unwrap();
    assert_eq!(partition.nodes, vec!["a", "b"]);
}

#[test]
fn test_named_cluster_falls_back_to_default_layout() {
    let config = config_with(vec![("*", vec![vec!["a", "b"]])]);
    let partition = AllNodesStrategy
        .partition(&config, "db", Some("unknown-cluster"))
        .unwrap();
    assert_eq!(partition.nodes, vec!["a", "b"]);
}

#[test]
fn test_database_wide_request_spans_every_cluster() {
    let config = config_with(vec![
        ("cl0", vec![vec!["a", "b"]]),
        ("cl1", vec![vec!["c"]]),
    ]);
    let partition = AllNodesStrategy.partition(&config, "db", None).unwrap();
    assert_eq!(partition.nodes, vec!["a", "b", "c"]);
}

#[test]
fn test_empty_node_set_is_a_config_error() {
    let config = config_with(vec![]);
    let err = AllNodesStrategy
        .partition(&config, "db", None)
        .unwrap_err();
    assert!(matches!(err, CitrineDBError::Config(_)));

    let only_placeholders = config_with(vec![("*", vec![vec!["$newNode"]])]);
    let err = AllNodesStrategy
        .partition(&only_placeholders, "db", None)
        .unwrap_err();
    assert!(matches!(err, CitrineDBError::Config(_)));
}

#[test]
fn test_round_robin_rotates_through_partitions() {
    let config = config_with(vec![("*", vec![vec!["a"], vec!["b"], vec!["c"]])]);
    let strategy = RoundRobinStrategy::new();

    let picks: Vec<Vec<String>> = (0..4)
        .map(|_| strategy.partition(&config, "db", None).unwrap().nodes)
        .collect();
    assert_eq!(picks[0], vec!["a"]);
    assert_eq!(picks[1], vec!["b"]);
    assert_eq!(picks[2], vec!["c"]);
    assert_eq!(picks[3], vec!["a"]);
}

#[test]
fn test_registry_resolves_builtins_and_rejects_unknown_names() {
    let registry = PartitionerRegistry::with_builtins();
    assert!(registry.get("all").is_some());
    assert!(registry.get("round-robin").is_some());

    let err = registry.resolve("lightning").unwrap_err();
    assert!(matches!(err, CitrineDBError::Config(_)));
}

#[test]
fn test_write_quorum_falls_back_from_cluster_to_database() {
    let mut config = config_with(vec![("cl0", vec![vec!["a", "b", "c"]])]);
    assert_eq!(config.write_quorum(Some("cl0")), 2);

    config.clusters.get_mut("cl0").unwrap().write_quorum = Some(3);
    assert_eq!(config.write_quorum(Some("cl0")), 3);
    assert_eq!(config.write_quorum(None), 2);
}
