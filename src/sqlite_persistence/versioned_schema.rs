use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn parse(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            _ => None,
        }
    }
}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    Cascade,
    SetNull,
}

impl ForeignKeyOnChange {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::Cascade => "CASCADE",
            ForeignKeyOnChange::SetNull => "SET NULL",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    fn create_sql(&self) -> String {
        let mut columns_sql: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let mut sql = format!("{} {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    sql.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    sql.push_str(" NOT NULL");
                }
                if column.is_unique {
                    sql.push_str(" UNIQUE");
                }
                if let Some(default_value) = column.default_value {
                    sql.push_str(&format!(" DEFAULT {}", default_value));
                }
                if let Some(fk) = column.foreign_key {
                    sql.push_str(&format!(
                        " REFERENCES {}({}) ON DELETE {}",
                        fk.foreign_table,
                        fk.foreign_column,
                        fk.on_delete.as_sql()
                    ));
                }
                sql
            })
            .collect();
        for unique in self.unique_constraints {
            columns_sql.push(format!("UNIQUE ({})", unique.join(", ")));
        }
        format!("CREATE TABLE {} ({});", self.name, columns_sql.join(", "))
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])?;
        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                params![],
            )?;
        }
        Ok(())
    }

    fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? > 0,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {} ({})",
                self.name,
                actual.len(),
                self.columns.len(),
                self.columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for ((name, sql_type, non_null, is_pk), expected) in actual.iter().zip(self.columns) {
            if name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if SqlType::parse(sql_type) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    name,
                    expected.sql_type,
                    sql_type
                );
            }
            if *non_null != expected.non_null || *is_pk != expected.is_primary_key {
                bail!(
                    "Table {} column {} constraint mismatch (non_null={}, primary_key={})",
                    self.name,
                    name,
                    non_null,
                    is_pk
                );
            }
        }

        for (index_name, _) in self.indices {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2)",
                params![index_name, self.name],
                |row| row.get(0),
            )?;
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Reads the schema version stored in `PRAGMA user_version`.
pub fn read_db_version(conn: &Connection) -> Result<usize> {
    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let version = raw_version - BASE_DB_VERSION as i64;
    if version < 1 {
        bail!("Database version {} is invalid (expected >= 1)", version);
    }
    Ok(version as usize)
}

/// Brings `conn` to the latest schema in `schemas`.
///
/// A database without tables gets the latest schema created directly. An
/// existing database is validated against its recorded version and then
/// migrated forward one version at a time inside a single transaction.
pub fn prepare_schema(conn: &mut Connection, schemas: &[VersionedSchema]) -> Result<()> {
    let latest = schemas.last().context("No schema versions defined")?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
        [],
        |row| row.get(0),
    )?;
    if table_count == 0 {
        info!("Creating database schema version {}", latest.version);
        return latest.create(conn);
    }

    let db_version = read_db_version(conn)?;
    let current = schemas
        .iter()
        .find(|s| s.version == db_version)
        .with_context(|| format!("Unknown database version {}", db_version))?;
    current
        .validate(conn)
        .with_context(|| format!("Schema validation failed for version {}", db_version))?;

    if db_version < latest.version {
        info!(
            "Migrating database from version {} to {}",
            db_version, latest.version
        );
        let tx = conn.transaction()?;
        for schema in schemas.iter().filter(|s| s.version > db_version) {
            if let Some(migration) = schema.migration {
                migration(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest.version),
            [],
        )?;
        tx.commit()?;
    }
    Ok(())
}

/// Opens a file database and prepares its schema.
pub fn open_versioned<P: AsRef<Path>>(path: P, schemas: &[VersionedSchema]) -> Result<Connection> {
    let path = path.as_ref();
    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {:?}", path))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    prepare_schema(&mut conn, schemas)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_column;
    use tempfile::TempDir;

    const NOTES_V1: Table = Table {
        name: "notes",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("text", &SqlType::Text, non_null = true),
        ],
        indices: &[("idx_notes_text", "text")],
        unique_constraints: &[],
    };

    const NOTES_V2: Table = Table {
        name: "notes",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("text", &SqlType::Text, non_null = true),
            sqlite_column!("score", &SqlType::Real, non_null = true, default_value = Some("0"))
        ],
        indices: &[("idx_notes_text", "text")],
        unique_constraints: &[],
    };

    fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
        conn.execute("ALTER TABLE notes ADD COLUMN score REAL NOT NULL DEFAULT 0", [])?;
        Ok(())
    }

    const SCHEMAS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 1,
            tables: &[NOTES_V1],
            migration: None,
        },
        VersionedSchema {
            version: 2,
            tables: &[NOTES_V2],
            migration: Some(migrate_v1_to_v2),
        },
    ];

    #[test]
    fn creates_latest_schema_on_empty_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        prepare_schema(&mut conn, SCHEMAS).unwrap();
        assert_eq!(read_db_version(&conn).unwrap(), 2);
        SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn migrates_older_db_forward() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.db");
        {
            let conn = Connection::open(&path).unwrap();
            SCHEMAS[0].create(&conn).unwrap();
            conn.execute("INSERT INTO notes (text) VALUES ('hello')", [])
                .unwrap();
        }

        let conn = open_versioned(&path, SCHEMAS).unwrap();
        assert_eq!(read_db_version(&conn).unwrap(), 2);
        let score: f64 = conn
            .query_row("SELECT score FROM notes WHERE text = 'hello'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, text TEXT NOT NULL)",
            [],
        )
        .unwrap();

        let err = SCHEMAS[0].validate(&conn).unwrap_err();
        assert!(err.to_string().contains("missing index"));
    }

    #[test]
    fn validate_detects_type_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, text INTEGER NOT NULL)",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_notes_text ON notes(text)", [])
            .unwrap();

        let err = SCHEMAS[0].validate(&conn).unwrap_err();
        assert!(err.to_string().contains("type mismatch"));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        SCHEMAS[1].create(&conn).unwrap();
        conn.execute(&format!("PRAGMA user_version = {}", BASE_DB_VERSION + 7), [])
            .unwrap();

        let err = prepare_schema(&mut conn, SCHEMAS).unwrap_err();
        assert!(err.to_string().contains("Unknown database version 7"));
    }
}
