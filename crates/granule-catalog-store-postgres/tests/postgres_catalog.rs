// crates/granule-catalog-store-postgres/tests/postgres_catalog.rs
// ============================================================================
// Module: Postgres Catalog Integration Tests
// Description: Catalog upserts and rollback against a live Postgres.
// Purpose: Verify conflict policies in SQL match the catalog contract.
// Dependencies: testcontainers, postgres
// ============================================================================

//! ## Overview
//! Runs the catalog writer and batch driver against Postgres. Set
//! `GRANULE_CATALOG_TEST_POSTGRES_URL` to reuse an existing database;
//! otherwise a `postgres` container is started per test (requires Docker).
//! Every test uses its own identifiers so a shared database stays usable.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use granule_catalog_core::BatchDriver;
use granule_catalog_core::BatchDriverConfig;
use granule_catalog_core::CatalogFile;
use granule_catalog_core::CatalogMessage;
use granule_catalog_core::CatalogStatement;
use granule_catalog_core::CatalogStoreError;
use granule_catalog_core::CatalogValidator;
use granule_catalog_core::CatalogWriter;
use granule_catalog_core::Collection;
use granule_catalog_core::CollectionId;
use granule_catalog_core::CumulusGranuleId;
use granule_catalog_core::Granule;
use granule_catalog_core::InMemoryAuditSink;
use granule_catalog_core::IsoTimestamp;
use granule_catalog_core::Provider;
use granule_catalog_core::ProviderId;
use granule_catalog_core::QueueRecord;
use granule_catalog_store_postgres::PostgresCatalogConfig;
use granule_catalog_store_postgres::PostgresCatalogStore;
use granule_catalog_store_postgres::migrate;
use postgres::NoTls;
use postgres::config::Host;
use testcontainers::Container;
use testcontainers::GenericImage;
use testcontainers::ImageExt;
use testcontainers::core::IntoContainerPort;
use testcontainers::core::WaitFor;
use testcontainers::runners::SyncRunner;

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// Timestamp used by every message.
const TIMESTAMP: &str = "2024-05-01T12:00:00+00:00";

/// Migrated catalog database.
struct PostgresFixture {
    /// Connection settings for the catalog.
    config: PostgresCatalogConfig,
    /// Container kept alive for the fixture's lifetime.
    _container: Option<Container<GenericImage>>,
}

impl PostgresFixture {
    /// Connects to the configured database or starts a container.
    fn start() -> Self {
        if let Ok(url) = env::var("GRANULE_CATALOG_TEST_POSTGRES_URL") {
            let config = config_from_url(&url);
            migrate_with_retry(&config);
            return Self {
                config,
                _container: None,
            };
        }
        let container = GenericImage::new("postgres", "16-alpine")
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_PASSWORD", "postgres")
            .start()
            .expect("start postgres container");
        let port = container.get_host_port_ipv4(5432.tcp()).expect("postgres port");
        let config = PostgresCatalogConfig {
            host: "127.0.0.1".to_string(),
            port,
            user_database: "granule_catalog".to_string(),
            user_username: "postgres".to_string(),
            user_password: "postgres".to_string(),
            admin_database: "postgres".to_string(),
            admin_username: "postgres".to_string(),
            admin_password: "postgres".to_string(),
            ..PostgresCatalogConfig::default()
        };
        migrate_with_retry(&config);
        Self {
            config,
            _container: Some(container),
        }
    }

    /// Opens a catalog store.
    fn store(&self) -> PostgresCatalogStore {
        PostgresCatalogStore::connect(&self.config).expect("connect catalog")
    }

    /// Runs a scalar count query.
    fn count(&self, sql: &str, key: &str) -> i64 {
        let mut client = self.config.user_connection().connect(NoTls).expect("connect");
        client.query_one(sql, &[&key]).expect("count query").get(0)
    }

    /// Counts granule rows for a cumulus granule id.
    fn granules(&self, granule_id: &str) -> i64 {
        self.count("SELECT COUNT(*) FROM granules WHERE cumulus_granule_id = $1", granule_id)
    }

    /// Counts file rows under a key path.
    fn files(&self, key_path: &str) -> i64 {
        self.count("SELECT COUNT(*) FROM files WHERE key_path = $1", key_path)
    }

    /// Counts provider rows.
    fn providers(&self, provider_id: &str) -> i64 {
        self.count("SELECT COUNT(*) FROM providers WHERE provider_id = $1", provider_id)
    }

    /// Reads `(name, size_in_bytes)` of the file under a key path.
    fn file_row(&self, key_path: &str) -> (String, i64) {
        let mut client = self.config.user_connection().connect(NoTls).expect("connect");
        let row = client
            .query_one("SELECT name, size_in_bytes FROM files WHERE key_path = $1", &[&key_path])
            .expect("file row");
        (row.get(0), row.get(1))
    }
}

/// Builds a catalog config from a connection URL.
fn config_from_url(url: &str) -> PostgresCatalogConfig {
    let parsed: postgres::Config = url.parse().expect("parse postgres url");
    let host = match parsed.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        _ => "localhost".to_string(),
    };
    let port = parsed.get_ports().first().copied().unwrap_or(5432);
    let user = parsed.get_user().unwrap_or("postgres").to_string();
    let password = parsed
        .get_password()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();
    let database = parsed.get_dbname().unwrap_or("postgres").to_string();
    PostgresCatalogConfig {
        host,
        port,
        user_database: database.clone(),
        user_username: user.clone(),
        user_password: password.clone(),
        admin_database: database,
        admin_username: user,
        admin_password: password,
        ..PostgresCatalogConfig::default()
    }
}

/// Applies migrations, retrying while the server finishes starting.
fn migrate_with_retry(config: &PostgresCatalogConfig) {
    let mut last_error = String::new();
    for _ in 0 .. 20 {
        match migrate(config) {
            Ok(_) => return,
            Err(err) => last_error = err.to_string(),
        }
        thread::sleep(Duration::from_millis(500));
    }
    panic!("catalog migration failed: {last_error}");
}

/// Returns an id prefix unique to this test run.
fn unique(label: &str) -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    format!("{label}-{nanos}")
}

// ============================================================================
// SECTION: Message Builders
// ============================================================================

/// Builds a file entry.
fn file(name: &str, key_path: &str, size_in_bytes: u64) -> CatalogFile {
    CatalogFile {
        name: name.to_string(),
        cumulus_archive_location: "cumulus-archive".to_string(),
        orca_archive_location: "orca-archive".to_string(),
        key_path: key_path.to_string(),
        size_in_bytes,
        hash: None,
        hash_type: None,
        version: "v1".to_string(),
        ingest_time: IsoTimestamp::new(TIMESTAMP),
        etag: "E1".to_string(),
    }
}

/// Builds a message for the given ids.
fn message(
    prefix: &str,
    collection: &str,
    granule: &str,
    files: Vec<CatalogFile>,
) -> CatalogMessage {
    CatalogMessage {
        provider: Provider {
            provider_id: ProviderId::new(format!("{prefix}-P1")),
            name: "N1".to_string(),
        },
        collection: Collection {
            collection_id: CollectionId::new(format!("{prefix}-{collection}")),
            shortname: "S1".to_string(),
            version: "V1".to_string(),
        },
        granule: Granule {
            cumulus_granule_id: CumulusGranuleId::new(format!("{prefix}-{granule}")),
            execution_id: "execution-1".to_string(),
            ingest_time: IsoTimestamp::new(TIMESTAMP),
            cumulus_create_time: IsoTimestamp::new(TIMESTAMP),
            last_update: IsoTimestamp::new(TIMESTAMP),
            files,
        },
    }
}

/// Writes a message through a fresh writer.
fn write(
    store: &PostgresCatalogStore,
    msg: &CatalogMessage,
) -> Result<granule_catalog_core::GranuleKey, CatalogStoreError> {
    let writer = CatalogWriter::new(Arc::new(InMemoryAuditSink::new()));
    writer.write(&msg.provider, &msg.collection, &msg.granule, store)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn postgres_resubmission_updates_file_size_in_place() {
    let fixture = PostgresFixture::start();
    let store = fixture.store();
    let prefix = unique("resubmit");
    let key = format!("{prefix}/F1");

    let first = write(&store, &message(&prefix, "C1", "G1", vec![file("F1", &key, 4)]))
        .expect("first write");
    assert_eq!(fixture.providers(&format!("{prefix}-P1")), 1);
    assert_eq!(fixture.granules(&format!("{prefix}-G1")), 1);
    assert_eq!(fixture.files(&key), 1);
    assert_eq!(fixture.file_row(&key).1, 4);

    let second = write(&store, &message(&prefix, "C1", "G1", vec![file("F1", &key, 8)]))
        .expect("second write");
    assert_eq!(first, second);
    assert_eq!(fixture.files(&key), 1);
    assert_eq!(fixture.file_row(&key).1, 8);
    assert_eq!(fixture.granules(&format!("{prefix}-G1")), 1);
}

#[test]
fn postgres_same_granule_id_in_another_collection_is_distinct() {
    let fixture = PostgresFixture::start();
    let store = fixture.store();
    let prefix = unique("distinct");

    let first = write(&store, &message(&prefix, "C1", "G1", Vec::new())).expect("C1");
    let second = write(&store, &message(&prefix, "C2", "G1", Vec::new())).expect("C2");
    assert_ne!(first, second);
    assert_eq!(fixture.granules(&format!("{prefix}-G1")), 2);
}

#[test]
fn postgres_duplicate_file_keys_in_one_submission_collapse_to_last() {
    let fixture = PostgresFixture::start();
    let store = fixture.store();
    let prefix = unique("duplicate");
    let key = format!("{prefix}/F1");

    let files = vec![file("first", &key, 1), file("second", &key, 2)];
    write(&store, &message(&prefix, "C1", "G1", files)).expect("write");
    assert_eq!(fixture.files(&key), 1);
    assert_eq!(fixture.file_row(&key), ("second".to_string(), 2));
}

#[test]
fn postgres_file_failure_rolls_back_every_statement() {
    let fixture = PostgresFixture::start();
    let store = fixture.store();
    let prefix = unique("rollback");
    let key = format!("{prefix}/F1");

    let err = write(&store, &message(&prefix, "C1", "G1", vec![file("F1", &key, u64::MAX)]))
        .expect_err("size out of range");
    assert!(matches!(err, CatalogStoreError::Invalid(_)));
    assert_eq!(fixture.providers(&format!("{prefix}-P1")), 0);
    assert_eq!(fixture.granules(&format!("{prefix}-G1")), 0);
    assert_eq!(fixture.files(&key), 0);
}

#[test]
fn postgres_bad_timestamp_fails_the_granule_statement() {
    let fixture = PostgresFixture::start();
    let store = fixture.store();
    let prefix = unique("timestamp");
    let mut msg = message(&prefix, "C1", "G1", Vec::new());
    msg.granule.last_update = IsoTimestamp::new("not a timestamp");

    let err = write(&store, &msg).expect_err("cast fails");
    assert!(matches!(
        err,
        CatalogStoreError::Statement {
            statement: CatalogStatement::Granule,
            ..
        }
    ));
    assert_eq!(fixture.providers(&format!("{prefix}-P1")), 0);
}

#[test]
fn postgres_batch_driver_writes_through_config_sessions() {
    let fixture = PostgresFixture::start();
    let prefix = unique("batch");
    let key = format!("{prefix}/F1");
    let body = serde_json::to_string(&message(&prefix, "C1", "G1", vec![file("F1", &key, 4)]))
        .expect("serialize message");
    let validator = Arc::new(CatalogValidator::new().expect("compile schema"));
    let audit = Arc::new(InMemoryAuditSink::new());
    let driver = BatchDriver::new(validator, audit.clone(), BatchDriverConfig::default());

    let records = vec![QueueRecord::from_body(body.clone()), QueueRecord::from_body(body)];
    let report = driver.run(&records, &fixture.config).expect("batch");
    assert!(report.is_complete());
    assert_eq!(report.written[0].granule_id, report.written[1].granule_id);
    assert_eq!(fixture.files(&key), 1);
    assert_eq!(audit.events_named("catalog_write").len(), 2);
}
