//! [`TemporalStore`] — the SQLite implementation of [`SnapshotStore`].

use std::{path::{Path, PathBuf}, str::FromStr, sync::Arc};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value as SqlValue};
use rust_decimal::Decimal;

use tally_core::{
  catalog::{
    FieldCatalog, FieldKind, ObjectSpec, RESERVED_CHILD_COLUMNS,
    RESERVED_ROOT_COLUMNS, column_for,
  },
  document::SaveDocument,
  map::map_document,
  plan::{
    ChildRow, ColumnRename, ColumnValue, RelationalPlan, StoredSnapshot,
    UnmappedField,
  },
  snapshot::{IngestOutcome, Snapshot, SnapshotId},
  store::{
    CountPoint, LedgerEntry, MarketPoint, OfficeUsage, SeriesPoint,
    SnapshotStore, TableCount,
  },
};

use crate::{
  Error, Result,
  encode::{RawChildRow, RawSnapshot, decode_value, encode_dt, sql_value},
  schema::{child_columns, quote_ident, root_columns, schema_sql, table_specs},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tally temporal store backed by a single SQLite file.
///
/// The inner connection is the store's one write connection: all writes
/// serialise onto its dedicated thread, which is what enforces the
/// single-writer discipline. Read queries acquire their own scoped read-only
/// connection against the same file, so any number of them can run while an
/// ingestion is in flight; WAL isolation keeps a half-written snapshot
/// invisible to them.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct TemporalStore {
  conn:     tokio_rusqlite::Connection,
  read_src: ReadSource,
  catalog:  Arc<FieldCatalog>,
}

#[derive(Clone)]
enum ReadSource {
  File(PathBuf),
  /// In-memory databases are private to their connection, so reads share
  /// the writer. Test-only in practice.
  SharedWriter,
}

impl TemporalStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  /// Initialising an already-initialised database file is a no-op.
  pub async fn open(
    path: impl AsRef<Path>,
    catalog: FieldCatalog,
  ) -> Result<Self> {
    catalog.validate()?;
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self {
      conn,
      read_src: ReadSource::File(path),
      catalog: Arc::new(catalog),
    };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(catalog: FieldCatalog) -> Result<Self> {
    catalog.validate()?;
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self {
      conn,
      read_src: ReadSource::SharedWriter,
      catalog: Arc::new(catalog),
    };
    store.init_schema().await?;
    Ok(store)
  }

  pub fn catalog(&self) -> &FieldCatalog { &self.catalog }

  async fn init_schema(&self) -> Result<()> {
    let sql = schema_sql(&self.catalog);
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` against a scoped read-only connection, released when the call
  /// returns. File-backed stores open a fresh `SQLITE_OPEN_READ_ONLY`
  /// connection so readers never contend with the writer.
  async fn with_read<F, T>(&self, f: F) -> Result<T>
  where
    F: FnOnce(
        &mut rusqlite::Connection,
      ) -> std::result::Result<T, tokio_rusqlite::Error>
      + Send
      + 'static,
    T: Send + 'static,
  {
    match &self.read_src {
      ReadSource::SharedWriter => Ok(self.conn.call(f).await?),
      ReadSource::File(path) => {
        let reader = tokio_rusqlite::Connection::open_with_flags(
          path.clone(),
          rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .await?;
        Ok(reader.call(f).await?)
      }
    }
  }

  /// Write a fully-mapped plan as one transaction. On any failure the
  /// transaction rolls back and nothing of the attempt remains.
  pub(crate) async fn ingest_plan(
    &self,
    filename: &str,
    plan: RelationalPlan,
  ) -> Result<SnapshotId> {
    let child_rows = plan.child_row_count();
    let fname = filename.to_owned();
    let at = encode_dt(Utc::now());

    let id = self
      .conn
      .call(move |conn| Ok(write_plan(conn, &fname, &at, &plan)?))
      .await
      .map_err(|source| Error::Ingestion {
        filename: filename.to_owned(),
        source,
      })?;

    tracing::info!(filename, snapshot_id = id, child_rows, "snapshot ingested");
    Ok(id)
  }

  /// The stored column for a catalog scalar, checking the declared kind.
  fn scalar_column(&self, field: &str, kind: FieldKind) -> Result<String> {
    match self.catalog.scalars.get(field) {
      Some(k) if *k == kind => Ok(column_for(field, RESERVED_ROOT_COLUMNS)),
      Some(k) => Err(Error::Query(format!(
        "catalog maps scalar {field:?} as {k:?}, expected {kind:?}"
      ))),
      None => {
        Err(Error::Query(format!("catalog does not map scalar {field:?}")))
      }
    }
  }
}

// ─── Write path ──────────────────────────────────────────────────────────────

fn write_plan(
  conn: &mut rusqlite::Connection,
  filename: &str,
  ingested_at: &str,
  plan: &RelationalPlan,
) -> rusqlite::Result<i64> {
  let tx = conn.transaction()?;

  // Root row.
  let mut columns = vec![
    quote_ident("filename"),
    quote_ident("ingested_at"),
    quote_ident("game_day"),
  ];
  let mut values: Vec<SqlValue> = vec![
    SqlValue::Text(filename.to_owned()),
    SqlValue::Text(ingested_at.to_owned()),
    plan.root.game_day.map_or(SqlValue::Null, SqlValue::Integer),
  ];
  for (column, value) in &plan.root.columns {
    columns.push(quote_ident(column));
    values.push(sql_value(value));
  }
  tx.execute(
    &insert_sql("snapshots", &columns),
    rusqlite::params_from_iter(values),
  )?;
  let snapshot_id = tx.last_insert_rowid();

  // Child rows. The mapper emits a uniform column set per table, so one
  // prepared statement covers all of a table's rows.
  for table in &plan.children {
    let Some(first) = table.rows.first() else { continue };

    let mut columns = vec![quote_ident("snapshot_id"), quote_ident("idx")];
    if let Some(key) = &table.key_column {
      columns.push(quote_ident(key));
    }
    for (column, _) in &first.columns {
      columns.push(quote_ident(column));
    }
    columns.push(quote_ident("extra"));

    let sql = insert_sql(&table.table, &columns);
    let mut stmt = tx.prepare(&sql)?;
    for row in &table.rows {
      let mut values: Vec<SqlValue> =
        vec![SqlValue::Integer(snapshot_id), SqlValue::Integer(row.idx)];
      if table.key_column.is_some() {
        values.push(row.key.clone().map_or(SqlValue::Null, SqlValue::Text));
      }
      for (_, value) in &row.columns {
        values.push(sql_value(value));
      }
      values.push(
        row
          .extra
          .as_ref()
          .map_or(SqlValue::Null, |e| SqlValue::Text(e.to_string())),
      );
      stmt.execute(rusqlite::params_from_iter(values))?;
    }
  }

  for u in &plan.unmapped {
    tx.execute(
      "INSERT INTO unmapped_fields (snapshot_id, \"key\", \"value\")
       VALUES (?1, ?2, ?3)",
      rusqlite::params![snapshot_id, u.key, u.value.to_string()],
    )?;
  }

  // Renames are catalog-global, not per-snapshot; re-recording is a no-op.
  for r in &plan.renames {
    tx.execute(
      "INSERT OR IGNORE INTO column_renames (\"table\", \"field\", \"column\")
       VALUES (?1, ?2, ?3)",
      rusqlite::params![r.table, r.field, r.column],
    )?;
  }

  tx.commit()?;
  Ok(snapshot_id)
}

fn insert_sql(table: &str, columns: &[String]) -> String {
  let placeholders = (1..=columns.len())
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    quote_ident(table),
    columns.join(", "),
    placeholders
  )
}

const SNAPSHOT_SELECT: &str = "SELECT id, filename, ingested_at, game_day FROM snapshots";

fn snapshot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSnapshot> {
  Ok(RawSnapshot {
    id:          row.get(0)?,
    filename:    row.get(1)?,
    ingested_at: row.get(2)?,
    game_day:    row.get(3)?,
  })
}

// ─── SnapshotStore impl ──────────────────────────────────────────────────────

impl SnapshotStore for TemporalStore {
  type Error = Error;

  // ── Write path ────────────────────────────────────────────────────────────

  async fn ingest(
    &self,
    filename: &str,
    doc: &SaveDocument,
  ) -> Result<IngestOutcome> {
    // Duplicate check runs on the write connection, so it is serialised
    // with the insert and happens before any mutation.
    if let Some(existing) = self.find_by_filename(filename).await? {
      tracing::debug!(
        filename,
        snapshot_id = existing.id,
        "already ingested; skipping"
      );
      return Ok(IngestOutcome::AlreadyIngested(existing.id));
    }

    let plan = map_document(&self.catalog, doc)?;
    let id = self.ingest_plan(filename, plan).await?;
    Ok(IngestOutcome::Ingested(id))
  }

  // ── Snapshot reads ────────────────────────────────────────────────────────

  async fn snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>> {
    let raw: Option<RawSnapshot> = self
      .with_read(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{SNAPSHOT_SELECT} WHERE id = ?1"),
              [id],
              snapshot_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSnapshot::into_snapshot).transpose()
  }

  async fn find_by_filename(&self, filename: &str) -> Result<Option<Snapshot>> {
    let fname = filename.to_owned();
    // Deliberately on the write connection; see `ingest`.
    let raw: Option<RawSnapshot> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{SNAPSHOT_SELECT} WHERE filename = ?1"),
              rusqlite::params![fname],
              snapshot_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSnapshot::into_snapshot).transpose()
  }

  async fn snapshots(&self) -> Result<Vec<Snapshot>> {
    let raws: Vec<RawSnapshot> = self
      .with_read(|conn| {
        let mut stmt = conn.prepare(&format!(
          "{SNAPSHOT_SELECT} ORDER BY game_day IS NULL, game_day, id"
        ))?;
        let rows = stmt
          .query_map([], snapshot_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawSnapshot::into_snapshot).collect()
  }

  async fn latest(&self) -> Result<Option<Snapshot>> {
    let raw: Option<RawSnapshot> = self
      .with_read(|conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "{SNAPSHOT_SELECT} ORDER BY ingested_at DESC, id DESC LIMIT 1"
              ),
              [],
              snapshot_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSnapshot::into_snapshot).transpose()
  }

  // ── Series reads ──────────────────────────────────────────────────────────

  async fn balance_series(&self) -> Result<Vec<SeriesPoint>> {
    let column = self.scalar_column("balance", FieldKind::Decimal)?;
    let sql = format!(
      "SELECT id, game_day, {col} FROM snapshots
       WHERE game_day IS NOT NULL AND {col} IS NOT NULL
       ORDER BY game_day, id",
      col = quote_ident(&column),
    );

    let raws: Vec<(i64, i64, String)> = self
      .with_read(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(snapshot_id, game_day, text)| {
        let value = Decimal::from_str(&text).map_err(|_| Error::ColumnDecode {
          column: "balance".to_owned(),
          kind:   FieldKind::Decimal,
        })?;
        Ok(SeriesPoint { snapshot_id, game_day, value })
      })
      .collect()
  }

  async fn headcount_series(&self) -> Result<Vec<CountPoint>> {
    let Some(spec) = self.catalog.collections.get("employees") else {
      return Err(Error::Query(
        "catalog does not map an employees collection".to_owned(),
      ));
    };
    let table = quote_ident(&spec.table);
    // Count active rows only when the catalog knows a fired flag.
    let count_expr = if spec.fields.contains_key("fired") {
      let fired = quote_ident(&column_for("fired", RESERVED_CHILD_COLUMNS));
      format!(
        "COUNT(CASE WHEN e.id IS NOT NULL AND IFNULL(e.{fired}, 0) = 0 THEN 1 END)"
      )
    } else {
      "COUNT(e.id)".to_owned()
    };
    let sql = format!(
      "SELECT s.id, s.game_day, {count_expr}
       FROM snapshots s LEFT JOIN {table} e ON e.snapshot_id = s.id
       WHERE s.game_day IS NOT NULL
       GROUP BY s.id, s.game_day
       ORDER BY s.game_day, s.id",
    );

    let raws: Vec<(i64, i64, i64)> = self
      .with_read(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(|(snapshot_id, game_day, count)| CountPoint {
          snapshot_id,
          game_day,
          count: count.max(0) as u64,
        })
        .collect(),
    )
  }

  async fn office_series(&self) -> Result<Vec<OfficeUsage>> {
    let Some(ObjectSpec::Row { table, fields }) =
      self.catalog.objects.get("office")
    else {
      return Err(Error::Query(
        "catalog does not map an office object".to_owned(),
      ));
    };
    if !fields.contains_key("workstations") {
      return Err(Error::Query(
        "catalog office object has no workstations field".to_owned(),
      ));
    }
    let ws = quote_ident(&column_for("workstations", RESERVED_CHILD_COLUMNS));
    let sql = format!(
      "SELECT s.id, s.game_day, o.{ws}
       FROM snapshots s JOIN {table} o ON o.snapshot_id = s.id
       WHERE s.game_day IS NOT NULL
       ORDER BY s.game_day, s.id",
      table = quote_ident(table),
    );

    let raws: Vec<(i64, i64, Option<String>)> = self
      .with_read(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(snapshot_id, game_day, raw)| {
        let (total, occupied) = match raw {
          Some(text) => workstation_tally(&serde_json::from_str(&text)?),
          None => (0, 0),
        };
        Ok(OfficeUsage {
          snapshot_id,
          game_day,
          workstations_total: total,
          workstations_occupied: occupied,
        })
      })
      .collect()
  }

  async fn market_series(&self, component: &str) -> Result<Vec<MarketPoint>> {
    let Some(ObjectSpec::KeyedRows { table, key_column, fields, .. }) =
      self.catalog.objects.get("marketValues")
    else {
      return Err(Error::Query(
        "catalog does not map a marketValues object".to_owned(),
      ));
    };
    if fields.get("basePrice") != Some(&FieldKind::Decimal) {
      return Err(Error::Query(
        "catalog marketValues object has no decimal basePrice field".to_owned(),
      ));
    }
    let price = quote_ident(&column_for("basePrice", RESERVED_CHILD_COLUMNS));
    let change_expr = if fields.contains_key("change") {
      format!("m.{}", quote_ident(&column_for("change", RESERVED_CHILD_COLUMNS)))
    } else {
      "NULL".to_owned()
    };
    let sql = format!(
      "SELECT s.id, s.game_day, m.{price}, {change_expr}
       FROM snapshots s JOIN {table} m ON m.snapshot_id = s.id
       WHERE m.{key} = ?1 AND s.game_day IS NOT NULL AND m.{price} IS NOT NULL
       ORDER BY s.game_day, s.id",
      table = quote_ident(table),
      key = quote_ident(key_column),
    );

    let component_owned = component.to_owned();
    let raws: Vec<(i64, i64, String, Option<f64>)> = self
      .with_read(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![component_owned], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(snapshot_id, game_day, text, change)| {
        let base_price =
          Decimal::from_str(&text).map_err(|_| Error::ColumnDecode {
            column: "basePrice".to_owned(),
            kind:   FieldKind::Decimal,
          })?;
        Ok(MarketPoint {
          snapshot_id,
          game_day,
          component: component.to_owned(),
          base_price,
          change,
        })
      })
      .collect()
  }

  async fn transactions(&self, id: SnapshotId) -> Result<Vec<LedgerEntry>> {
    let Some(spec) = self.catalog.collections.get("transactions") else {
      return Err(Error::Query(
        "catalog does not map a transactions collection".to_owned(),
      ));
    };
    if spec.fields.get("amount") != Some(&FieldKind::Decimal) {
      return Err(Error::Query(
        "catalog transactions collection has no decimal amount field".to_owned(),
      ));
    }
    let amount = quote_ident(&column_for("amount", RESERVED_CHILD_COLUMNS));
    let day_expr = if spec.fields.contains_key("day") {
      quote_ident(&column_for("day", RESERVED_CHILD_COLUMNS))
    } else {
      "NULL".to_owned()
    };
    let label_expr = if spec.fields.contains_key("label") {
      quote_ident(&column_for("label", RESERVED_CHILD_COLUMNS))
    } else {
      "NULL".to_owned()
    };
    let sql = format!(
      "SELECT {day_expr}, {amount}, {label_expr} FROM {table}
       WHERE snapshot_id = ?1 AND {amount} IS NOT NULL
       ORDER BY idx",
      table = quote_ident(&spec.table),
    );

    let raws: Vec<(Option<i64>, String, Option<String>)> = self
      .with_read(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(day, text, label)| {
        let amount =
          Decimal::from_str(&text).map_err(|_| Error::ColumnDecode {
            column: "amount".to_owned(),
            kind:   FieldKind::Decimal,
          })?;
        Ok(LedgerEntry { day, amount, label })
      })
      .collect()
  }

  // ── Row export & diagnostics ──────────────────────────────────────────────

  async fn fetch(&self, id: SnapshotId) -> Result<Option<StoredSnapshot>> {
    let Some(snapshot) = self.snapshot(id).await? else {
      return Ok(None);
    };

    type RawFetch = (
      Vec<(String, SqlValue)>,
      Vec<(String, Vec<RawChildRow>)>,
      Vec<(String, String)>,
      Vec<(String, String, String)>,
    );

    let catalog = Arc::clone(&self.catalog);
    let (root_raw, children_raw, unmapped_raw, renames_raw): RawFetch = self
      .with_read(move |conn| {
        // Root scalar columns.
        let root_cols = root_columns(&catalog);
        let select = root_cols
          .iter()
          .map(|(c, _)| quote_ident(c))
          .collect::<Vec<_>>()
          .join(", ");
        let root = conn.query_row(
          &format!("SELECT {select} FROM snapshots WHERE id = ?1"),
          [id],
          |row| {
            let mut out = Vec::with_capacity(root_cols.len());
            for (i, (column, _)) in root_cols.iter().enumerate() {
              out.push((column.clone(), row.get::<_, SqlValue>(i)?));
            }
            Ok(out)
          },
        )?;

        // Child tables.
        let mut children = Vec::new();
        for (table, key_column, fields) in table_specs(&catalog) {
          let cols = child_columns(&fields);
          let mut select = vec![quote_ident("idx")];
          if let Some(key) = &key_column {
            select.push(quote_ident(key));
          }
          select.extend(cols.iter().map(|(c, _)| quote_ident(c)));
          select.push(quote_ident("extra"));

          let sql = format!(
            "SELECT {} FROM {} WHERE snapshot_id = ?1 ORDER BY idx",
            select.join(", "),
            quote_ident(&table),
          );
          let has_key = key_column.is_some();
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map([id], |row| {
              let idx: i64 = row.get(0)?;
              let (key, offset) = if has_key {
                (row.get::<_, Option<String>>(1)?, 2)
              } else {
                (None, 1)
              };
              let mut columns = Vec::with_capacity(cols.len());
              for (i, (column, _)) in cols.iter().enumerate() {
                columns
                  .push((column.clone(), row.get::<_, SqlValue>(offset + i)?));
              }
              let extra: Option<String> = row.get(offset + cols.len())?;
              Ok(RawChildRow { idx, key, columns, extra })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          if !rows.is_empty() {
            children.push((table, rows));
          }
        }

        let mut stmt = conn.prepare(
          "SELECT \"key\", \"value\" FROM unmapped_fields WHERE snapshot_id = ?1",
        )?;
        let unmapped = stmt
          .query_map([id], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT \"table\", \"field\", \"column\" FROM column_renames",
        )?;
        let renames = stmt
          .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((root, children, unmapped, renames))
      })
      .await?;

    // Kind-aware decoding happens outside the connection thread.
    let root_kinds: std::collections::HashMap<String, FieldKind> =
      root_columns(&self.catalog).into_iter().collect();
    let root = root_raw
      .into_iter()
      .map(|(column, raw)| {
        let kind = root_kinds.get(&column).copied().unwrap_or(FieldKind::Text);
        Ok((column.clone(), decode_value(&column, kind, raw)?))
      })
      .collect::<Result<Vec<_>>>()?;

    let mut children = std::collections::BTreeMap::new();
    for (table, raws) in children_raw {
      let kinds: std::collections::HashMap<String, FieldKind> = table_specs(
        &self.catalog,
      )
      .into_iter()
      .find(|(t, _, _)| *t == table)
      .map(|(_, _, fields)| child_columns(&fields).into_iter().collect())
      .unwrap_or_default();

      let rows = raws
        .into_iter()
        .map(|raw| {
          let columns = raw
            .columns
            .into_iter()
            .map(|(column, value)| {
              let kind =
                kinds.get(&column).copied().unwrap_or(FieldKind::Text);
              Ok((column.clone(), decode_value(&column, kind, value)?))
            })
            .collect::<Result<Vec<(String, ColumnValue)>>>()?;
          let extra = raw
            .extra
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
          Ok(ChildRow { idx: raw.idx, key: raw.key, columns, extra })
        })
        .collect::<Result<Vec<_>>>()?;
      children.insert(table, rows);
    }

    let unmapped = unmapped_raw
      .into_iter()
      .map(|(key, value)| {
        Ok(UnmappedField { key, value: serde_json::from_str(&value)? })
      })
      .collect::<Result<Vec<_>>>()?;

    let renames = renames_raw
      .into_iter()
      .map(|(table, field, column)| ColumnRename { table, field, column })
      .collect();

    Ok(Some(StoredSnapshot { snapshot, root, children, unmapped, renames }))
  }

  async fn table_counts(&self) -> Result<Vec<TableCount>> {
    self
      .with_read(|conn| {
        let mut stmt = conn.prepare(
          "SELECT name FROM sqlite_master
           WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
           ORDER BY name",
        )?;
        let names = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts = Vec::with_capacity(names.len());
        for name in names {
          let rows: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&name)),
            [],
            |row| row.get(0),
          )?;
          counts.push(TableCount { table: name, rows: rows.max(0) as u64 });
        }
        Ok(counts)
      })
      .await
  }
}

/// Count total and occupied workstations from the office's JSON grid.
fn workstation_tally(workstations: &serde_json::Value) -> (u64, u64) {
  let Some(items) = workstations.as_array() else { return (0, 0) };
  let occupied = items
    .iter()
    .filter(|w| w.get("employee").is_some_and(|e| !e.is_null()))
    .count();
  (items.len() as u64, occupied as u64)
}
