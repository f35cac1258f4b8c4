//! Trigger/function installation for Postgres change capture.
//!
//! One plpgsql function (`notify_topic_change`) and one row-level trigger
//! (`topic_change_trigger`) on the topic table publish a JSON identity
//! payload via `pg_notify` after every committed INSERT, UPDATE, or DELETE.
//! Setup is idempotent so it can run on every deploy; teardown drops the
//! trigger before the function it depends on. The function body swallows
//! its own failures so a broken notify path can never roll back the row
//! mutation that fired it.

use crate::StoreError;
use async_trait::async_trait;

/// Name of the notify function installed in the database.
pub const NOTIFY_FUNCTION: &str = "notify_topic_change";

/// Name of the row-level trigger on the topic table.
pub const TRIGGER_NAME: &str = "topic_change_trigger";

const DEFAULT_TABLE: &str = "topics";

/// Minimal SQL execution seam; implemented over a real pool in
/// `boardcast-postgres` and by an in-memory fake in tests.
#[async_trait]
pub trait SqlRunner: Send + Sync {
    /// Run a statement; returns the affected-row count.
    async fn execute(&self, sql: &str) -> Result<u64, StoreError>;

    /// Run a query returning a single boolean scalar.
    async fn query_bool(&self, sql: &str) -> Result<bool, StoreError>;
}

/// What [`ChangeCapture::install`] did for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Created,
    AlreadyPresent,
}

/// Per-object outcome of one [`ChangeCapture::install`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOutcome {
    pub function: SetupStep,
    pub trigger: SetupStep,
}

/// Installer/remover for the change-capture trigger pair.
#[derive(Debug, Clone)]
pub struct ChangeCapture {
    table: String,
}

impl Default for ChangeCapture {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}

impl ChangeCapture {
    /// Capture changes on `table`; the production schema uses `topics`.
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// DDL for the notify function.
    ///
    /// The row record comes from OLD on DELETE and NEW otherwise, so a
    /// delete still resolves its channel. The payload carries identity and
    /// timing only. The EXCEPTION block keeps any notify failure from
    /// aborting the mutation that fired the trigger.
    pub fn create_function_sql(&self) -> String {
        format!(
            r#"CREATE FUNCTION {NOTIFY_FUNCTION}() RETURNS trigger AS $$
DECLARE
    row_rec RECORD;
BEGIN
    IF (TG_OP = 'DELETE') THEN
        row_rec := OLD;
    ELSE
        row_rec := NEW;
    END IF;
    PERFORM pg_notify(
        'topic_channel_' || row_rec.channel_id,
        json_build_object(
            'type', TG_OP,
            'id', row_rec.id,
            'channelId', row_rec.channel_id,
            'parentId', row_rec.parent_id,
            'timestamp', extract(epoch FROM now())::bigint
        )::text
    );
    RETURN NULL;
EXCEPTION WHEN OTHERS THEN
    RETURN NULL;
END;
$$ LANGUAGE plpgsql"#
        )
    }

    /// DDL for the row-level trigger on the capture table.
    pub fn create_trigger_sql(&self) -> String {
        format!(
            "CREATE TRIGGER {TRIGGER_NAME}\n\
             AFTER INSERT OR UPDATE OR DELETE ON {table}\n\
             FOR EACH ROW EXECUTE FUNCTION {NOTIFY_FUNCTION}()",
            table = self.table
        )
    }

    fn function_exists_sql(&self) -> String {
        format!("SELECT EXISTS (SELECT 1 FROM pg_proc WHERE proname = '{NOTIFY_FUNCTION}')")
    }

    fn trigger_exists_sql(&self) -> String {
        format!(
            "SELECT EXISTS (SELECT 1 FROM pg_trigger \
             WHERE tgname = '{TRIGGER_NAME}' AND NOT tgisinternal)"
        )
    }

    fn drop_trigger_sql(&self) -> String {
        format!("DROP TRIGGER IF EXISTS {TRIGGER_NAME} ON {table}", table = self.table)
    }

    fn drop_function_sql(&self) -> String {
        format!("DROP FUNCTION IF EXISTS {NOTIFY_FUNCTION}()")
    }

    /// Install the function and trigger, skipping objects that already
    /// exist. Safe to run repeatedly.
    pub async fn install<R: SqlRunner>(&self, runner: &R) -> Result<SetupOutcome, StoreError> {
        let function = if runner.query_bool(&self.function_exists_sql()).await? {
            SetupStep::AlreadyPresent
        } else {
            runner.execute(&self.create_function_sql()).await?;
            SetupStep::Created
        };

        let trigger = if runner.query_bool(&self.trigger_exists_sql()).await? {
            SetupStep::AlreadyPresent
        } else {
            runner.execute(&self.create_trigger_sql()).await?;
            SetupStep::Created
        };

        tracing::info!(
            target: "boardcast::capture",
            table = %self.table,
            function = ?function,
            trigger = ?trigger,
            "change capture installed"
        );
        Ok(SetupOutcome { function, trigger })
    }

    /// Remove the trigger, then the function it depends on. Both drops use
    /// IF EXISTS, so teardown on a clean database is a no-op.
    pub async fn uninstall<R: SqlRunner>(&self, runner: &R) -> Result<(), StoreError> {
        runner.execute(&self.drop_trigger_sql()).await?;
        runner.execute(&self.drop_function_sql()).await?;
        tracing::info!(
            target: "boardcast::capture",
            table = %self.table,
            "change capture removed"
        );
        Ok(())
    }
}
