use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Tasks; counter columns stay NULL until a counter is started.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS tasks (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  created_at_ms BIGINT NOT NULL,
  task_type TEXT NOT NULL,
  status TEXT NOT NULL,
  start_value BIGINT,
  target_value BIGINT,
  current_value BIGINT,
  progress BIGINT NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);"#)
        .execute(pool)
        .await?;

    Ok(())
}
