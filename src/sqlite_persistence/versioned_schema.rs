use anyhow::{bail, Result};
use rusqlite::{params, Connection};

/// Schema versions are stored in `PRAGMA user_version` offset by this value,
/// so a database that was never initialized (user_version 0) can never be
/// confused with schema version zero.
pub const BASE_DB_VERSION: usize = 99999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Text,
    Real,
    Blob,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Text => "TEXT",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    fn from_sql(s: &str) -> Option<SqlType> {
        match s {
            "INTEGER" => Some(SqlType::Integer),
            "TEXT" => Some(SqlType::Text),
            "REAL" => Some(SqlType::Real),
            "BLOB" => Some(SqlType::Blob),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(unused)]
pub enum OnDelete {
    NoAction,
    Restrict,
    SetNull,
    Cascade,
}

impl OnDelete {
    fn as_sql(self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

/// A single column declaration. Built with const chained setters so table
/// definitions can live in `const` items:
///
/// ```ignore
/// const COL: Column = Column::new("full_path", SqlType::Text).non_null().unique();
/// ```
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub non_null: bool,
    pub unique: bool,
    pub default_sql: Option<&'static str>,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Column {
            name,
            sql_type,
            primary_key: false,
            non_null: false,
            unique: false,
            default_sql: None,
            foreign_key: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn non_null(mut self) -> Self {
        self.non_null = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[allow(unused)]
    pub const fn default_sql(mut self, sql: &'static str) -> Self {
        self.default_sql = Some(sql);
        self
    }

    pub const fn references(
        mut self,
        table: &'static str,
        column: &'static str,
        on_delete: OnDelete,
    ) -> Self {
        self.foreign_key = Some(ForeignKey {
            table,
            column,
            on_delete,
        });
        self
    }

    fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type.as_sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default_sql) = self.default_sql {
            sql.push_str(&format!(" DEFAULT {}", default_sql));
        }
        if let Some(fk) = &self.foreign_key {
            sql.push_str(&format!(
                " REFERENCES {}({}) ON DELETE {}",
                fk.table,
                fk.column,
                fk.on_delete.as_sql()
            ));
        }
        sql
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// (index name, comma-separated column list)
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(Column::definition_sql).collect();
        for constraint_columns in self.unique_constraints {
            parts.push(format!("UNIQUE ({})", constraint_columns.join(", ")));
        }
        format!("CREATE TABLE {} ({});", self.name, parts.join(", "))
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])?;
        for (index_name, index_columns) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, index_columns
                ),
                params![],
            )?;
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    /// Applied when upgrading an existing database from the previous version.
    /// The version 0 schema never migrates, it is only ever created fresh.
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

    /// Checks that the live database matches this schema declaration: column
    /// names, types, nullability, defaults and primary keys in declared order,
    /// plus the expected indices, unique constraints and foreign keys.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            validate_columns(conn, table)?;
            validate_indices(conn, table)?;
            validate_unique_constraints(conn, table)?;
            validate_foreign_keys(conn, table)?;
        }
        Ok(())
    }
}

struct ActualColumn {
    name: String,
    sql_type: String,
    non_null: bool,
    default_sql: Option<String>,
    primary_key: bool,
}

fn validate_columns(conn: &Connection, table: &Table) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", table.name))?;
    let actual_columns: Vec<ActualColumn> = stmt
        .query_map(params![], |row| {
            Ok(ActualColumn {
                name: row.get(1)?,
                sql_type: row.get(2)?,
                non_null: row.get::<_, i32>(3)? == 1,
                default_sql: row.get(4)?,
                primary_key: row.get::<_, i32>(5)? == 1,
            })
        })?
        .collect::<std::result::Result<_, _>>()?;

    if actual_columns.len() != table.columns.len() {
        bail!(
            "table {} has {} columns, expected {} ({})",
            table.name,
            actual_columns.len(),
            table.columns.len(),
            table
                .columns
                .iter()
                .map(|c| c.name)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    for (actual, expected) in actual_columns.iter().zip(table.columns.iter()) {
        if actual.name != expected.name {
            bail!(
                "table {}: expected column {}, found {}",
                table.name,
                expected.name,
                actual.name
            );
        }
        match SqlType::from_sql(&actual.sql_type) {
            Some(actual_type) if actual_type == expected.sql_type => {}
            _ => bail!(
                "table {} column {}: expected type {}, found {}",
                table.name,
                expected.name,
                expected.sql_type.as_sql(),
                actual.sql_type
            ),
        }
        if actual.non_null != expected.non_null {
            bail!(
                "table {} column {}: NOT NULL mismatch (expected {})",
                table.name,
                expected.name,
                expected.non_null
            );
        }
        // SQLite may echo default expressions wrapped in parentheses.
        let actual_default = actual.default_sql.as_deref().map(strip_outer_parens);
        let expected_default = expected.default_sql.map(strip_outer_parens);
        if actual_default != expected_default {
            bail!(
                "table {} column {}: default mismatch (expected {:?}, found {:?})",
                table.name,
                expected.name,
                expected.default_sql,
                actual.default_sql
            );
        }
        if actual.primary_key != expected.primary_key {
            bail!(
                "table {} column {}: primary key mismatch (expected {})",
                table.name,
                expected.name,
                expected.primary_key
            );
        }
    }
    Ok(())
}

fn strip_outer_parens(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(s)
}

fn validate_indices(conn: &Connection, table: &Table) -> Result<()> {
    for (index_name, _) in table.indices {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1 AND tbl_name = ?2",
                params![index_name, table.name],
                |_| Ok(true),
            )
            .unwrap_or(false);
        if !exists {
            bail!("table {} is missing index {}", table.name, index_name);
        }
    }
    Ok(())
}

/// Unique constraints (both table-level and single-column UNIQUE) surface as
/// unique indices in `PRAGMA index_list`; compare their column sets ignoring
/// declaration order.
fn validate_unique_constraints(conn: &Connection, table: &Table) -> Result<()> {
    let mut expected: Vec<Vec<&str>> = table
        .unique_constraints
        .iter()
        .map(|columns| {
            let mut sorted = columns.to_vec();
            sorted.sort_unstable();
            sorted
        })
        .collect();
    for column in table.columns {
        if column.unique {
            expected.push(vec![column.name]);
        }
    }
    if expected.is_empty() {
        return Ok(());
    }

    let mut stmt = conn.prepare(&format!("PRAGMA index_list({});", table.name))?;
    let unique_index_names: Vec<String> = stmt
        .query_map(params![], |row| {
            let name: String = row.get(1)?;
            let is_unique: i32 = row.get(2)?;
            Ok((name, is_unique))
        })?
        .filter_map(|r| r.ok())
        .filter(|(_, is_unique)| *is_unique == 1)
        .map(|(name, _)| name)
        .collect();

    let mut actual_column_sets: Vec<Vec<String>> = Vec::new();
    for index_name in &unique_index_names {
        let mut stmt = conn.prepare(&format!("PRAGMA index_info({});", index_name))?;
        let mut columns: Vec<String> = stmt
            .query_map(params![], |row| row.get::<_, String>(2))?
            .filter_map(|r| r.ok())
            .collect();
        columns.sort_unstable();
        actual_column_sets.push(columns);
    }

    for expected_columns in &expected {
        let found = actual_column_sets
            .iter()
            .any(|actual| actual.iter().map(String::as_str).eq(expected_columns.iter().copied()));
        if !found {
            bail!(
                "table {} is missing a unique constraint on ({})",
                table.name,
                expected_columns.join(", ")
            );
        }
    }
    Ok(())
}

fn validate_foreign_keys(conn: &Connection, table: &Table) -> Result<()> {
    struct ActualFk {
        from_column: String,
        to_table: String,
        to_column: String,
        on_delete: String,
    }

    // PRAGMA foreign_key_list columns: id, seq, table, from, to, on_update, on_delete, match
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({});", table.name))?;
    let actual_fks: Vec<ActualFk> = stmt
        .query_map(params![], |row| {
            Ok(ActualFk {
                from_column: row.get(3)?,
                to_table: row.get(2)?,
                to_column: row.get(4)?,
                on_delete: row.get(6)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    for column in table.columns {
        let Some(expected) = &column.foreign_key else {
            continue;
        };
        let matched = actual_fks.iter().any(|actual| {
            actual.from_column == column.name
                && actual.to_table == expected.table
                && actual.to_column == expected.column
                && actual.on_delete == expected.on_delete.as_sql()
        });
        if matched {
            continue;
        }
        match actual_fks.iter().find(|a| a.from_column == column.name) {
            Some(actual) => bail!(
                "table {} column {}: foreign key mismatch, expected REFERENCES {}({}) ON DELETE {}, found REFERENCES {}({}) ON DELETE {}",
                table.name,
                column.name,
                expected.table,
                expected.column,
                expected.on_delete.as_sql(),
                actual.to_table,
                actual.to_column,
                actual.on_delete
            ),
            None => bail!(
                "table {} column {} is missing foreign key REFERENCES {}({})",
                table.name,
                column.name,
                expected.table,
                expected.column
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNERS_TABLE: Table = Table {
        name: "owners",
        columns: &[
            Column::new("owner_id", SqlType::Integer).primary_key(),
            Column::new("handle", SqlType::Text).non_null().unique(),
        ],
        indices: &[],
        unique_constraints: &[],
    };

    const ASSETS_TABLE: Table = Table {
        name: "assets",
        columns: &[
            Column::new("asset_id", SqlType::Integer).primary_key(),
            Column::new("owner_id", SqlType::Integer)
                .non_null()
                .references("owners", "owner_id", OnDelete::Cascade),
            Column::new("label", SqlType::Text).non_null(),
            Column::new("variant", SqlType::Text).non_null(),
            Column::new("size_bytes", SqlType::Integer).default_sql("0"),
        ],
        indices: &[("idx_assets_owner", "owner_id")],
        unique_constraints: &[&["label", "variant"]],
    };

    const SCHEMA: VersionedSchema = VersionedSchema {
        version: 0,
        tables: &[OWNERS_TABLE, ASSETS_TABLE],
        migration: None,
    };

    #[test]
    fn created_schema_passes_validation() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEMA.create(&conn).unwrap();
        SCHEMA.validate(&conn).unwrap();
    }

    #[test]
    fn create_stamps_offset_user_version() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEMA.create(&conn).unwrap();
        let version: usize = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, BASE_DB_VERSION);
    }

    #[test]
    fn validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE owners (owner_id INTEGER PRIMARY KEY, handle TEXT NOT NULL UNIQUE)",
            [],
        )
        .unwrap();
        conn.execute(
            "CREATE TABLE assets (
                asset_id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES owners(owner_id) ON DELETE CASCADE,
                label TEXT NOT NULL,
                variant TEXT NOT NULL,
                size_bytes INTEGER DEFAULT 0,
                UNIQUE (label, variant)
            )",
            [],
        )
        .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing index"));
        assert!(err.contains("idx_assets_owner"));
    }

    #[test]
    fn validate_detects_column_type_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE owners (owner_id INTEGER PRIMARY KEY, handle INTEGER NOT NULL UNIQUE)",
            [],
        )
        .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("expected type TEXT"));
    }

    #[test]
    fn validate_detects_missing_column_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE owners (owner_id INTEGER PRIMARY KEY, handle TEXT NOT NULL)",
            [],
        )
        .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing a unique constraint"));
        assert!(err.contains("handle"));
    }

    #[test]
    fn unique_constraint_validation_ignores_column_order() {
        let conn = Connection::open_in_memory().unwrap();
        OWNERS_TABLE.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE assets (
                asset_id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES owners(owner_id) ON DELETE CASCADE,
                label TEXT NOT NULL,
                variant TEXT NOT NULL,
                size_bytes INTEGER DEFAULT 0,
                UNIQUE (variant, label)
            )",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_assets_owner ON assets(owner_id)", [])
            .unwrap();

        SCHEMA.validate(&conn).unwrap();
    }

    #[test]
    fn validate_detects_wrong_on_delete_action() {
        let conn = Connection::open_in_memory().unwrap();
        OWNERS_TABLE.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE assets (
                asset_id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES owners(owner_id) ON DELETE SET NULL,
                label TEXT NOT NULL,
                variant TEXT NOT NULL,
                size_bytes INTEGER DEFAULT 0,
                UNIQUE (label, variant)
            )",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_assets_owner ON assets(owner_id)", [])
            .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("foreign key mismatch"));
        assert!(err.contains("SET NULL"));
    }

    #[test]
    fn validate_detects_missing_foreign_key() {
        let conn = Connection::open_in_memory().unwrap();
        OWNERS_TABLE.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE assets (
                asset_id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                label TEXT NOT NULL,
                variant TEXT NOT NULL,
                size_bytes INTEGER DEFAULT 0,
                UNIQUE (label, variant)
            )",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_assets_owner ON assets(owner_id)", [])
            .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing foreign key"));
        assert!(err.contains("owner_id"));
    }
}
