use citrinedb::core::cluster::admin::{ClusterAdmin, StaticClusterAdmin};
use citrinedb::core::cluster::config::{ClusterLayout, DistributedDatabaseConfig, NEW_NODE_TAG};
use citrinedb::core::cluster::reconciler::MembershipReconciler;
use citrinedb::core::cluster::substrate::QueueSubstrate;
use citrinedb::core::cluster::MemorySubstrate;
use citrinedb::core::replication::messages::{CONFIG_MAP, config_map_key};
use std::collections::BTreeMap;
use std::sync::Arc;

fn layout(partitions: Vec<Vec<&str>>) -> DistributedDatabaseConfig {
    let mut clusters = BTreeMap::new();
    clusters.insert(
        "cl0".to_string(),
        ClusterLayout {
            strategy: "all".to_string(),
            write_quorum: None,
            partitions: partitions
                .into_iter()
                .map(|partition| partition.into_iter().map(str::to_string).collect())
                .collect(),
        },
    );
    DistributedDatabaseConfig {
        write_quorum: 2,
        clusters,
    }
}

fn reconciler(
    local: &str,
    config: DistributedDatabaseConfig,
) -> (
    MembershipReconciler,
    Arc<StaticClusterAdmin>,
    Arc<MemorySubstrate>,
) {
    let admin = Arc::new(StaticClusterAdmin::new(local, &["a", "b"]));
    admin.register_database("db", config);
    let substrate = Arc::new(MemorySubstrate::new());
    (
        MembershipReconciler::new(admin.clone(), substrate.clone()),
        admin,
        substrate,
    )
}

#[tokio::test]
async fn test_new_node_fills_placeholder_and_republishes() {
    let (reconciler, admin, substrate) =
        reconciler("d", layout(vec![vec!["a", "b", NEW_NODE_TAG]]));

    assert!(reconciler.reconcile("db").await.unwrap());

    let updated = admin.database_configuration("db").unwrap();
    assert_eq!(
        updated.partitions(Some("cl0")),
        vec![vec!["a".to_string(), "b".to_string(), "d".to_string()]]
    );

    // The updated layout was published to the cluster-visible map.
    let published = substrate
        .map(CONFIG_MAP)
        .get(&config_map_key("db"))
        .await
        .expect("configuration was published");
    let document = published.as_document().unwrap();
    let round_trip = DistributedDatabaseConfig::from_document(document).unwrap();
    assert!(round_trip.contains_node("d"));
}

#[tokio::test]
async fn test_placeholder_matching_is_case_insensitive() {
    let (reconciler, admin, _substrate) = reconciler("d", layout(vec![vec!["a", "$NEWNODE"]]));

    assert!(reconciler.reconcile("db").await.unwrap());
    assert!(admin.database_configuration("db").unwrap().contains_node("d"));
}

#[tokio::test]
async fn test_member_node_is_left_alone() {
    let (reconciler, admin, substrate) =
        reconciler("a", layout(vec![vec!["a", "b", NEW_NODE_TAG]]));

    assert!(!reconciler.reconcile("db").await.unwrap());

    // Untouched: the placeholder survives and nothing was published.
    let config = admin.database_configuration("db").unwrap();
    assert!(config.partitions(Some("cl0"))[0].contains(&NEW_NODE_TAG.to_string()));
    assert!(
        substrate
            .map(CONFIG_MAP)
            .get(&config_map_key("db"))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_full_layout_without_placeholder_stays_dirty_free() {
    let (reconciler, admin, substrate) = reconciler("d", layout(vec![vec!["a", "b"]]));

    assert!(!reconciler.reconcile("db").await.unwrap());
    assert!(!admin.database_configuration("db").unwrap().contains_node("d"));
    assert!(
        substrate
            .map(CONFIG_MAP)
            .get(&config_map_key("db"))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_missing_configuration_is_not_an_error() {
    let admin = Arc::new(StaticClusterAdmin::new("d", &[]));
    let substrate = Arc::new(MemorySubstrate::new());
    let reconciler = MembershipReconciler::new(admin, substrate);

    assert!(!reconciler.reconcile("db").await.unwrap());
}
