//! Integration tests for building a store from a configuration file

use std::io::Write;
use unistore::prelude::*;

#[tokio::test]
async fn memory_store_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[database]
provider = "memory"

[tracking]
timestamp_precision = 3
index_soft_delete_columns = false
"#
    )
    .unwrap();

    let config = AppConfig::from_file(file.path()).unwrap();
    assert_eq!(config.tracking.timestamp_precision, 3);

    let store = UniStore::new(&config).await.unwrap();
    assert_eq!(store.provider(), DbProvider::Memory);
    store.ensure_created().await.unwrap();

    let mut context = store.context();
    let jane = context.add(Student::new("Jane", 19)).unwrap();
    context.save_changes().await.unwrap();

    // System clock truncated to milliseconds
    let stamped = context.entry::<Student>(jane).unwrap();
    assert_eq!(stamped.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    assert_eq!(stamped.created_at, stamped.updated_at);
}

#[tokio::test]
async fn postgres_provider_requires_connection_settings() {
    let config = AppConfig::from_toml_str(
        r#"
[database]
provider = "postgres"
"#,
    );

    assert!(config.is_err());
}
