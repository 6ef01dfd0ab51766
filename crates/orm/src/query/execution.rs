//! Query Builder execution

use sqlx::SqliteConnection;

use super::builder::QueryBuilder;
use crate::error::OrmResult;
use crate::executor::{self, QueryOutcome};
use crate::security::AllowList;

impl QueryBuilder {
    /// Render against the application allow-list and run on `conn`
    pub async fn execute(&self, conn: &mut SqliteConnection) -> OrmResult<QueryOutcome> {
        self.execute_with(AllowList::application(), conn).await
    }

    /// Render against `allow` and run on `conn`. Nothing runs if rendering fails.
    pub async fn execute_with(
        &self,
        allow: &AllowList,
        conn: &mut SqliteConnection,
    ) -> OrmResult<QueryOutcome> {
        let (sql, params) = self.build_with(allow)?;
        executor::execute(conn, &sql, &params).await
    }
}
