use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::extract::Record;

const SCHEMA_VERSION: i32 = 2;

pub fn connect(path: &Path) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("failed to open database {:?}", path))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

fn create_table_sql(table: &str) -> String {
    let cols: Vec<String> = Record::COLUMNS
        .iter()
        .map(|c| {
            if *c == "arquivo" {
                format!("{} TEXT UNIQUE", c)
            } else {
                format!("{} TEXT", c)
            }
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            {}
        );",
        table,
        cols.join(",\n            ")
    )
}

/// Create or migrate the schema. Databases written before the version
/// pragma was introduced may still carry the dropped `medidas_fuga`
/// column; those are rebuilt once before the version is stamped.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if version < SCHEMA_VERSION && has_column(conn, "fispq", "medidas_fuga")? {
        drop_escape_measures_column(conn)?;
    }
    conn.execute_batch(&create_table_sql("fispq"))?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cols.iter().any(|c| c == column))
}

/// Rebuild the table without `medidas_fuga`: create new, copy rows with
/// their ids, drop old, rename. SQLite's ALTER TABLE cannot drop a column
/// on every deployed version, so the rebuild path is kept.
fn drop_escape_measures_column(conn: &Connection) -> Result<()> {
    let copy_cols = format!("id, {}", Record::COLUMNS.join(", "));
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "{}
        INSERT INTO fispq_new ({cols}) SELECT {cols} FROM fispq;
        DROP TABLE fispq;
        ALTER TABLE fispq_new RENAME TO fispq;",
        create_table_sql("fispq_new"),
        cols = copy_cols,
    ))?;
    tx.commit()?;
    Ok(())
}

// ── Records ──

#[derive(Debug)]
pub struct StoredRecord {
    pub id: i64,
    pub record: Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

pub fn find_id_by_source(conn: &Connection, source_file: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM fispq WHERE arquivo = ?1",
            params![source_file],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn insert_record(conn: &Connection, rec: &Record) -> Result<i64> {
    let placeholders: Vec<String> = (1..=Record::COLUMNS.len())
        .map(|i| format!("?{}", i))
        .collect();
    let sql = format!(
        "INSERT INTO fispq ({}) VALUES ({})",
        Record::COLUMNS.join(", "),
        placeholders.join(", ")
    );
    conn.execute(
        &sql,
        params![
            rec.substance,
            rec.un_number,
            rec.risk_number,
            rec.hazard_class,
            rec.subsidiary_risk,
            rec.first_aid,
            rec.fire_fighting,
            rec.source_file,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update every non-key field of the row keyed by `arquivo`.
pub fn update_record(conn: &Connection, rec: &Record) -> Result<()> {
    let field_cols = &Record::COLUMNS[..Record::COLUMNS.len() - 1];
    let sets: Vec<String> = field_cols
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", c, i + 1))
        .collect();
    let sql = format!(
        "UPDATE fispq SET {} WHERE arquivo = ?{}",
        sets.join(", "),
        Record::COLUMNS.len()
    );
    conn.execute(
        &sql,
        params![
            rec.substance,
            rec.un_number,
            rec.risk_number,
            rec.hazard_class,
            rec.subsidiary_risk,
            rec.first_aid,
            rec.fire_fighting,
            rec.source_file,
        ],
    )?;
    Ok(())
}

pub fn upsert_record(conn: &Connection, rec: &Record) -> Result<Upsert> {
    match find_id_by_source(conn, &rec.source_file)? {
        Some(_) => {
            update_record(conn, rec)?;
            Ok(Upsert::Updated)
        }
        None => {
            insert_record(conn, rec)?;
            Ok(Upsert::Inserted)
        }
    }
}

pub fn fetch_all(conn: &Connection) -> Result<Vec<StoredRecord>> {
    let sql = format!(
        "SELECT id, {} FROM fispq ORDER BY id",
        Record::COLUMNS.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredRecord {
                id: row.get(0)?,
                record: Record {
                    substance: row.get(1)?,
                    un_number: row.get(2)?,
                    risk_number: row.get(3)?,
                    hazard_class: row.get(4)?,
                    subsidiary_risk: row.get(5)?,
                    first_aid: row.get(6)?,
                    fire_fighting: row.get(7)?,
                    source_file: row.get(8)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Returns false when no row has that id; the store is left unchanged.
pub fn delete_record(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn.execute("DELETE FROM fispq WHERE id = ?1", params![id])?;
    Ok(n > 0)
}

// ── Tests ──
