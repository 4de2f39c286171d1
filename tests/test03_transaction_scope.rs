use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use table_middleware::prelude::*;
use table_middleware::test_utils::{MockManager, MockReply};

async fn client(mock: &MockManager) -> Result<Client<MockManager>, DbError> {
    Client::with_manager(mock.clone(), PoolSettings::sized(1, 2)).await
}

/// Echo inserted values back with a generated id, like `RETURNING *` would.
fn echo_inserts() -> MockManager {
    let next_id = Arc::new(AtomicI64::new(0));
    MockManager::new().with_responder(move |sql, params| {
        if sql.starts_with("INSERT") {
            let id = next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let mut row = vec![RowValues::Int(id)];
            row.extend(params.iter().cloned());
            MockReply::rows(&["id", "a", "b"], vec![row])
        } else {
            MockReply::Affected(0)
        }
    })
}

#[tokio::test]
async fn success_commits() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new();
    let client = client(&mock).await?;

    client.table("t").eq("id", 1).execute().await?;
    assert_eq!(
        mock.sql_log(),
        vec!["BEGIN", "SELECT * FROM t WHERE id = $1", "COMMIT"]
    );
    assert_eq!(client.status().in_use(), 0);
    Ok(())
}

#[tokio::test]
async fn failure_rolls_back_and_keeps_context() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new().with_responder(|sql, _| {
        if sql.starts_with("SELECT") {
            MockReply::Fail("relation \"missing\" does not exist".into())
        } else {
            MockReply::Affected(0)
        }
    });
    let client = client(&mock).await?;

    let err = client
        .table("missing")
        .eq("secret", "s3cr3t")
        .execute()
        .await
        .unwrap_err();
    match &err {
        DbError::QueryExecution {
            operation, target, ..
        } => {
            assert_eq!(*operation, Operation::Select);
            assert_eq!(target, "missing");
        }
        other => panic!("expected QueryExecution, got {other:?}"),
    }
    assert!(!err.to_string().contains("s3cr3t"));
    assert_eq!(
        mock.sql_log(),
        vec!["BEGIN", "SELECT * FROM missing WHERE secret = $1", "ROLLBACK"]
    );

    // the connection survived the rollback and is reused
    client.table("t").eq("id", 1).delete().await.ok();
    assert_eq!(mock.created(), 1);
    assert_eq!(client.status().in_use(), 0);
    Ok(())
}

#[tokio::test]
async fn driver_text_stays_out_of_the_message() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new().with_responder(|sql, params| {
        if sql.starts_with("INSERT") {
            let key = params[0].as_text().unwrap_or_default();
            MockReply::Fail(format!("duplicate key, Key (key)=({key}) already exists"))
        } else {
            MockReply::Affected(0)
        }
    });
    let client = client(&mock).await?;

    let err = client
        .table("archon_settings")
        .insert(Record::new().with("key", "sk-live-7731"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "INSERT on archon_settings failed: driver error"
    );
    let source = std::error::Error::source(&err).map(ToString::to_string);
    assert!(source.is_some_and(|s| s.contains("sk-live-7731")));
    assert_eq!(mock.sql_log().last().map(String::as_str), Some("ROLLBACK"));
    Ok(())
}

#[tokio::test]
async fn batch_insert_is_one_transaction_in_input_order() -> Result<(), Box<dyn std::error::Error>>
{
    let mock = echo_inserts();
    let client = client(&mock).await?;

    let rows = client
        .table("t")
        .insert([
            Record::new().with("a", 1).with("b", 2),
            Record::new().with("a", 3).with("b", 4),
        ])
        .await?;

    assert_eq!(rows.count, 2);
    assert_eq!(rows.rows[0].get("id"), Some(&RowValues::Int(1)));
    assert_eq!(rows.rows[0].get("a"), Some(&RowValues::Int(1)));
    assert_eq!(rows.rows[1].get("id"), Some(&RowValues::Int(2)));
    assert_eq!(rows.rows[1].get("b"), Some(&RowValues::Int(4)));

    let log = mock.statements();
    let sql: Vec<&str> = log.iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(
        sql,
        vec![
            "BEGIN",
            "INSERT INTO t (a, b) VALUES ($1, $2) RETURNING *",
            "INSERT INTO t (a, b) VALUES ($1, $2) RETURNING *",
            "COMMIT"
        ]
    );
    assert!(log.iter().all(|s| s.connection == log[0].connection));
    Ok(())
}

#[tokio::test]
async fn failed_insert_rolls_back_the_whole_batch() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new().with_responder(|sql, params| {
        if sql.starts_with("INSERT") && params.first() == Some(&RowValues::Int(3)) {
            MockReply::Fail("duplicate key".into())
        } else {
            MockReply::Affected(0)
        }
    });
    let client = client(&mock).await?;

    let err = client
        .table("t")
        .insert(vec![
            Record::new().with("a", 1),
            Record::new().with("a", 3),
            Record::new().with("a", 5),
        ])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::QueryExecution {
            operation: Operation::Insert,
            ..
        }
    ));
    let log = mock.sql_log();
    assert_eq!(log.len(), 4);
    assert_eq!(log.last().map(String::as_str), Some("ROLLBACK"));
    Ok(())
}

#[tokio::test]
async fn broken_connection_is_not_reused() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new().with_responder(|sql, _| {
        if sql.contains("pg_terminate_backend") {
            MockReply::Disconnect
        } else {
            MockReply::Affected(0)
        }
    });
    let client = client(&mock).await?;

    let err = client
        .execute_all("SELECT pg_terminate_backend(pg_backend_pid())", &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::QueryExecution {
            operation: Operation::Raw,
            ..
        }
    ));
    // no ROLLBACK is attempted on a dead connection
    assert_eq!(
        mock.sql_log().last().map(String::as_str),
        Some("SELECT pg_terminate_backend(pg_backend_pid())")
    );
    assert_eq!(mock.live(), 0);

    client.execute_all("SELECT 1", &[]).await?;
    let log = mock.statements();
    assert_eq!(log.last().map(|s| s.connection), Some(2));
    assert_eq!(mock.created(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_commit_is_reported_and_rolled_back() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new().with_responder(|sql, _| {
        if sql == "COMMIT" {
            MockReply::Fail("could not serialize access".into())
        } else {
            MockReply::Affected(1)
        }
    });
    let client = client(&mock).await?;

    let err = client
        .execute_mutate("UPDATE t SET n = n + 1 WHERE id = $1", &[RowValues::Int(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryExecution { .. }));
    assert_eq!(
        mock.sql_log(),
        vec![
            "BEGIN",
            "UPDATE t SET n = n + 1 WHERE id = $1",
            "COMMIT",
            "ROLLBACK"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn failed_rollback_discards_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new().with_responder(|sql, _| {
        if sql == "ROLLBACK" || sql.starts_with("SELECT") {
            MockReply::Fail("server closed the connection".into())
        } else {
            MockReply::Affected(0)
        }
    });
    let client = client(&mock).await?;

    assert!(client.execute_one("SELECT 1", &[]).await.is_err());
    assert_eq!(mock.live(), 0);
    assert_eq!(client.status().live, 0);
    Ok(())
}

#[tokio::test]
async fn failed_begin_discards_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new().with_responder(|sql, _| {
        if sql == "BEGIN" {
            MockReply::Fail("cannot begin".into())
        } else {
            MockReply::Affected(0)
        }
    });
    let client = client(&mock).await?;

    let err = client.execute_mutate("DELETE FROM t", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::QueryExecution { .. }));
    assert_eq!(mock.sql_log(), vec!["BEGIN"]);
    assert_eq!(mock.live(), 0);
    Ok(())
}
