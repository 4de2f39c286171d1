use table_middleware::prelude::*;
use table_middleware::test_utils::MockManager;

async fn client(mock: &MockManager) -> Result<Client<MockManager>, DbError> {
    Client::with_manager(mock.clone(), PoolSettings::sized(1, 2)).await
}

#[tokio::test]
async fn unfiltered_update_is_refused_without_sql() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new();
    let client = client(&mock).await?;

    let err = client
        .table("archon_settings")
        .update(Record::new().with("value", "x"))
        .await
        .unwrap_err();
    match &err {
        DbError::SafetyViolation { operation, table } => {
            assert_eq!(*operation, Operation::Update);
            assert_eq!(table, "archon_settings");
        }
        other => panic!("expected SafetyViolation, got {other:?}"),
    }
    assert!(err.to_string().contains("UPDATE without a filter is refused"));
    assert!(mock.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn unfiltered_delete_is_refused_without_sql() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new();
    let client = client(&mock).await?;

    // ordering and paging are not filters
    let err = client
        .table("archon_settings")
        .order("id", SortOrder::Asc)
        .limit(1)
        .delete()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::SafetyViolation {
            operation: Operation::Delete,
            ..
        }
    ));
    assert!(mock.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn filtered_update_binds_patch_then_filter() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new();
    let client = client(&mock).await?;

    client
        .table("archon_settings")
        .eq("key", "k")
        .neq("category", "x")
        .update(Record::new().with("value", "v2").with("is_encrypted", false))
        .await?;

    let log = mock.statements();
    assert_eq!(
        log[1].sql,
        "UPDATE archon_settings SET value = $1, is_encrypted = $2 WHERE key = $3 AND category != $4 RETURNING *"
    );
    assert_eq!(
        log[1].params,
        vec![
            RowValues::Text("v2".into()),
            RowValues::Bool(false),
            RowValues::Text("k".into()),
            RowValues::Text("x".into()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn filtered_delete_renders_returning() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new();
    let client = client(&mock).await?;

    client.table("sources").lte("updated", 5).delete().await?;
    assert_eq!(
        mock.sql_log(),
        vec![
            "BEGIN",
            "DELETE FROM sources WHERE updated <= $1 RETURNING *",
            "COMMIT"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn empty_patch_is_a_render_error() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new();
    let client = client(&mock).await?;

    let err = client
        .table("t")
        .eq("id", 1)
        .update(Record::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Render { .. }));
    assert!(mock.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_insert_never_borrows_a_connection() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new();
    let client = client(&mock).await?;
    client.close();

    // the pool is closed, so any acquisition would fail
    let rows = client.table("t").insert(Vec::<Record>::new()).await?;
    assert_eq!(rows, ResultSet::empty());
    assert_eq!(rows.to_json(), serde_json::json!({ "data": [], "count": 0 }));
    assert!(mock.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn inconsistent_records_are_refused() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockManager::new();
    let client = client(&mock).await?;

    let err = client
        .table("t")
        .insert(vec![
            Record::new().with("a", 1).with("b", 2),
            Record::new().with("a", 3),
        ])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Render {
            operation: Operation::Insert,
            ..
        }
    ));
    assert!(mock.statements().is_empty());
    Ok(())
}
