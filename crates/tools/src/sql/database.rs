//! A thin handle over a SQL database reachable through the sqlx `Any` driver.
//!
//! Row values are rendered as a Python-style list of tuples, the format the
//! model has been prompted with for SQL observations.

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row};
use tracing::{debug, info};

/// Sample rows appended to each table's schema description.
const SAMPLE_ROWS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Infer the dialect from a connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite => "SQLite",
            Self::Postgres => "PostgreSQL",
        }
    }

    fn list_tables_sql(&self) -> &'static str {
        match self {
            Self::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            Self::Postgres => {
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'public' ORDER BY table_name"
            }
        }
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),

    #[error("table_names {{{}}} not found in database", .0.join(", "))]
    UnknownTables(Vec<String>),

    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

pub struct SqlDatabase {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlDatabase {
    /// Connect to `url`. The dialect is inferred from the URL scheme.
    pub async fn connect(url: &str) -> Result<Self, DatabaseError> {
        let dialect =
            Dialect::from_url(url).ok_or_else(|| DatabaseError::UnsupportedUrl(url.into()))?;
        sqlx::any::install_default_drivers();

        // In-memory SQLite is per-connection, so keep a single one.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        info!(dialect = dialect.name(), "Connected to database");
        Ok(Self { pool, dialect })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn table_names(&self) -> Result<Vec<String>, DatabaseError> {
        let rows = sqlx::query(self.dialect.list_tables_sql())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>(0).map_err(DatabaseError::from))
            .collect()
    }

    /// Column definitions plus a few sample rows for each named table.
    pub async fn table_info(&self, tables: &[String]) -> Result<String, DatabaseError> {
        let known = self.table_names().await?;
        let missing: Vec<String> = tables
            .iter()
            .filter(|t| !known.contains(t))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DatabaseError::UnknownTables(missing));
        }

        let mut sections = Vec::with_capacity(tables.len());
        for table in tables {
            let quoted = self.dialect.quote(table);
            let rows = sqlx::query(&format!("SELECT * FROM {quoted} LIMIT {SAMPLE_ROWS}"))
                .fetch_all(&self.pool)
                .await?;
            let columns = self.column_definitions(table).await?;

            let mut section = format!("CREATE TABLE {quoted} (\n\t{}\n)", columns.join(",\n\t"));
            section.push_str(&format!(
                "\n\n/*\n{SAMPLE_ROWS} rows from {table} table:\n"
            ));
            if let Some(first) = rows.first() {
                let header: Vec<&str> = first.columns().iter().map(|c| c.name()).collect();
                section.push_str(&header.join("\t"));
                section.push('\n');
            }
            for row in &rows {
                let cells: Vec<String> = (0..row.len()).map(|i| cell_text(row, i)).collect();
                section.push_str(&cells.join("\t"));
                section.push('\n');
            }
            section.push_str("*/");
            sections.push(section);
        }
        Ok(sections.join("\n\n"))
    }

    async fn column_definitions(&self, table: &str) -> Result<Vec<String>, DatabaseError> {
        let sql = match self.dialect {
            Dialect::Sqlite => format!("SELECT name, type FROM pragma_table_info('{table}')"),
            Dialect::Postgres => format!(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_name = '{table}' ORDER BY ordinal_position"
            ),
        };
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|r| format!("{} {}", cell_raw(r, 0), cell_raw(r, 1)))
            .collect())
    }

    /// Run `query` and render the result rows. Statements without rows
    /// render as an empty string.
    pub async fn run(&self, query: &str) -> Result<String, DatabaseError> {
        debug!(query = %query, "Running SQL");
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(String::new());
        }
        let tuples: Vec<String> = rows.iter().map(render_tuple).collect();
        Ok(format!("[{}]", tuples.join(", ")))
    }
}

fn render_tuple(row: &AnyRow) -> String {
    let cells: Vec<String> = (0..row.len()).map(|i| cell_text(row, i)).collect();
    if cells.len() == 1 {
        format!("({},)", cells[0])
    } else {
        format!("({})", cells.join(", "))
    }
}

/// A cell as a Python literal: strings quoted, NULL as `None`.
fn cell_text(row: &AnyRow, idx: usize) -> String {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map_or_else(|| "None".into(), |s| format!("'{}'", s.replace('\'', "\\'")));
    }
    cell_raw(row, idx)
}

/// A cell without string quoting.
fn cell_raw(row: &AnyRow, idx: usize) -> String {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.unwrap_or_else(|| "None".into());
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map_or_else(|| "None".into(), |n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map_or_else(|| "None".into(), |n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map_or_else(|| "None".into(), |b| if b { "True".into() } else { "False".into() });
    }
    "<unsupported>".into()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn chinook_fixture() -> SqlDatabase {
        let db = SqlDatabase::connect("sqlite::memory:").await.unwrap();
        for stmt in [
            "CREATE TABLE artists (ArtistId INTEGER PRIMARY KEY, Name TEXT)",
            "INSERT INTO artists VALUES (1, 'AC/DC'), (2, 'Accept'), (3, 'Aerosmith')",
            "CREATE TABLE albums (AlbumId INTEGER PRIMARY KEY, Title TEXT, ArtistId INTEGER)",
            "INSERT INTO albums VALUES (1, 'Let There Be Rock', 1), (2, 'Balls to the Wall', 2)",
        ] {
            sqlx::query(stmt).execute(&db.pool).await.unwrap();
        }
        db
    }

    #[test]
    fn dialect_from_url() {
        assert_eq!(Dialect::from_url("sqlite://chinook.db"), Some(Dialect::Sqlite));
        assert_eq!(
            Dialect::from_url("postgres://u:p@db:5432/chinook"),
            Some(Dialect::Postgres)
        );
        assert_eq!(Dialect::from_url("mysql://x"), None);
        assert_eq!(Dialect::Postgres.name(), "PostgreSQL");
    }

    #[tokio::test]
    async fn unsupported_url_rejected() {
        let err = SqlDatabase::connect("mysql://localhost/x").await.err().unwrap();
        assert!(matches!(err, DatabaseError::UnsupportedUrl(_)));
    }

    #[tokio::test]
    async fn lists_tables_in_order() {
        let db = chinook_fixture().await;
        assert_eq!(db.table_names().await.unwrap(), vec!["albums", "artists"]);
    }

    #[tokio::test]
    async fn run_renders_tuples() {
        let db = chinook_fixture().await;
        let out = db
            .run("SELECT ArtistId, Name FROM artists ORDER BY ArtistId LIMIT 2")
            .await
            .unwrap();
        assert_eq!(out, "[(1, 'AC/DC'), (2, 'Accept')]");

        let count = db.run("SELECT COUNT(*) FROM albums").await.unwrap();
        assert_eq!(count, "[(2,)]");
    }

    #[tokio::test]
    async fn run_reports_sql_errors() {
        let db = chinook_fixture().await;
        assert!(db.run("SELECT * FROM nope").await.is_err());
    }

    #[tokio::test]
    async fn table_info_includes_columns_and_samples() {
        let db = chinook_fixture().await;
        let info = db.table_info(&["artists".to_string()]).await.unwrap();
        assert!(info.contains("CREATE TABLE \"artists\""));
        assert!(info.contains("Name TEXT"));
        assert!(info.contains("AC/DC"));
    }

    #[tokio::test]
    async fn table_info_unknown_table() {
        let db = chinook_fixture().await;
        let err = db.table_info(&["tracks".to_string()]).await.unwrap_err();
        assert_eq!(err.to_string(), "table_names {tracks} not found in database");
    }
}
