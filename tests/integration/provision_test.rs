//! End-to-end provisioning: database, tables, and bulk loads.

use super::common::{admin_config, drop_database, scratch_database_name};
use imdb_loader::db::{DatabaseClient, PostgresClient, Value};
use imdb_loader::provision::{provision, DatabaseStatus, ProvisionOptions, SkipReason};
use imdb_loader::schema::SchemaRegistry;
use tempfile::tempdir;

const CREW_TSV: &str = "tconst\tdirectors\twriters\n\
                        tt0000001\tnm0005690\t\\N\n\
                        tt0000002\tnm0721526\tnm0721526\n\
                        tt0000003\tnm0721526\t\\N\n";

const RATINGS_TSV: &str = "tconst\taverageRating\tnumVotes\n\
                           tt0000001\t5.7\t2071\n\
                           tt0000002\t5.6\t278\n";

const BASICS_TSV: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n\
                          tt0000001\tshort\tCarmencita\tCarmencita\t0\t1894\t\\N\t1\tDocumentary,Short\n";

#[tokio::test]
async fn test_provision_loads_files_and_skips_missing() {
    let Some(admin) = admin_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("title.crew.tsv"), CREW_TSV).unwrap();
    std::fs::write(dir.path().join("title.ratings.tsv"), RATINGS_TSV).unwrap();
    std::fs::write(dir.path().join("title.basics.tsv"), BASICS_TSV).unwrap();
    // name.basics.tsv and title.principals.tsv are left out on purpose.

    let target_db = scratch_database_name("imdb_loader_it");
    let options = ProvisionOptions {
        target_db: target_db.clone(),
        data_dir: dir.path().to_path_buf(),
        ..ProvisionOptions::default()
    };

    let report = provision(&admin, &options).await.unwrap();

    assert_eq!(report.database, Some(DatabaseStatus::Created));
    assert_eq!(report.tables_ready.len(), 7);
    assert_eq!(report.loaded.len(), 3);
    assert_eq!(report.skipped.len(), 2);
    assert!(report
        .skipped
        .iter()
        .all(|(_, reason)| matches!(reason, SkipReason::MissingFile(_))));

    let client = PostgresClient::connect(&admin.with_database(&target_db))
        .await
        .unwrap();

    let count = client
        .execute_query("SELECT count(*) FROM title_crew")
        .await
        .unwrap();
    assert_eq!(count.rows, vec![vec![Value::Int(3)]]);

    let nulls = client
        .execute_query("SELECT count(*) FROM title_crew WHERE writers IS NULL")
        .await
        .unwrap();
    assert_eq!(nulls.rows, vec![vec![Value::Int(2)]]);

    let basics = client
        .execute_query("SELECT tconst, isadult, startyear, endyear FROM title_basics")
        .await
        .unwrap();
    assert_eq!(
        basics.rows,
        vec![vec![
            Value::String("tt0000001".to_string()),
            Value::Bool(false),
            Value::Int(1894),
            Value::Null,
        ]]
    );

    client.close().await.unwrap();
    drop_database(&admin, &target_db).await;
}

#[tokio::test]
async fn test_provision_twice_is_idempotent_and_columns_match() {
    let Some(admin) = admin_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let dir = tempdir().unwrap();
    let target_db = scratch_database_name("imdb_loader_it");
    let options = ProvisionOptions {
        target_db: target_db.clone(),
        data_dir: dir.path().to_path_buf(),
        files: Vec::new(),
        ..ProvisionOptions::default()
    };

    let first = provision(&admin, &options).await.unwrap();
    let second = provision(&admin, &options).await.unwrap();
    assert_eq!(first.database, Some(DatabaseStatus::Created));
    assert_eq!(second.database, Some(DatabaseStatus::Existed));
    assert!(second.tables_failed.is_empty());

    let client = PostgresClient::connect(&admin.with_database(&target_db))
        .await
        .unwrap();

    for table in SchemaRegistry::imdb().tables() {
        let result = client
            .execute_query(&format!(
                "SELECT column_name::text FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = '{}' ORDER BY ordinal_position",
                table.name
            ))
            .await
            .unwrap();
        let columns: Vec<String> = result
            .rows
            .into_iter()
            .map(|row| match &row[0] {
                Value::String(s) => s.clone(),
                other => panic!("unexpected value {other:?}"),
            })
            .collect();
        assert_eq!(columns, table.column_names(), "table {}", table.name);
    }

    client.close().await.unwrap();
    drop_database(&admin, &target_db).await;
}

#[tokio::test]
async fn test_malformed_file_is_rolled_back_alone() {
    let Some(admin) = admin_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("title.crew.tsv"),
        "tconst\tdirectors\twriters\ntt0000001\tnm1\nbroken-line\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("title.ratings.tsv"), RATINGS_TSV).unwrap();

    let target_db = scratch_database_name("imdb_loader_it");
    let options = ProvisionOptions {
        target_db: target_db.clone(),
        data_dir: dir.path().to_path_buf(),
        files: vec!["title.crew.tsv".to_string(), "title.ratings.tsv".to_string()],
        ..ProvisionOptions::default()
    };

    let report = provision(&admin, &options).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.loaded.len(), 1);

    let client = PostgresClient::connect(&admin.with_database(&target_db))
        .await
        .unwrap();
    let crew = client
        .execute_query("SELECT count(*) FROM title_crew")
        .await
        .unwrap();
    assert_eq!(crew.rows, vec![vec![Value::Int(0)]]);
    let ratings = client
        .execute_query("SELECT count(*) FROM title_ratings")
        .await
        .unwrap();
    assert_eq!(ratings.rows, vec![vec![Value::Int(2)]]);

    client.close().await.unwrap();
    drop_database(&admin, &target_db).await;
}
