//! Plan runner against a live server.

use super::common::admin_config;
use imdb_loader::db::{DatabaseClient, PostgresClient};
use imdb_loader::plans::{run_plans, PlanOptions};
use tempfile::tempdir;

#[tokio::test]
async fn test_run_plans_writes_tuple_lines() {
    let Some(config) = admin_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let dir = tempdir().unwrap();
    let options = PlanOptions {
        plans_dir: dir.path().join("Plans"),
        output_dir: dir.path().join("Output"),
    };
    std::fs::create_dir_all(&options.plans_dir).unwrap();
    std::fs::write(options.plans_dir.join("count.sql"), "SELECT 5::bigint").unwrap();
    std::fs::write(
        options.plans_dir.join("mixed.sql"),
        "SELECT 1, 'a''b', NULL::text, true, 2.5::float8, 7.3::real, 1.50::numeric",
    )
    .unwrap();

    let client = PostgresClient::connect(&config).await.unwrap();
    let outcomes = run_plans(&client, &options).await.unwrap();
    client.close().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        std::fs::read_to_string(options.output_dir.join("count.txt")).unwrap(),
        "(5,)\n"
    );
    assert_eq!(
        std::fs::read_to_string(options.output_dir.join("mixed.txt")).unwrap(),
        "(1, \"a'b\", None, True, 2.5, 7.3, Decimal('1.50'))\n"
    );
}

#[tokio::test]
async fn test_failing_plan_stops_the_run() {
    let Some(config) = admin_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let dir = tempdir().unwrap();
    let options = PlanOptions {
        plans_dir: dir.path().join("Plans"),
        output_dir: dir.path().join("Output"),
    };
    std::fs::create_dir_all(&options.plans_dir).unwrap();
    std::fs::write(options.plans_dir.join("a.sql"), "SELECT 1").unwrap();
    std::fs::write(
        options.plans_dir.join("b.sql"),
        "SELECT * FROM table_that_does_not_exist",
    )
    .unwrap();
    std::fs::write(options.plans_dir.join("c.sql"), "SELECT 3").unwrap();

    let client = PostgresClient::connect(&config).await.unwrap();
    let result = run_plans(&client, &options).await;
    client.close().await.unwrap();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("table_that_does_not_exist"));
    assert!(options.output_dir.join("a.txt").exists());
    assert!(!options.output_dir.join("b.txt").exists());
    assert!(!options.output_dir.join("c.txt").exists());
}
