//! [`SqliteStore`], the SQLite implementation of [`ResidentStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use refuge_core::{
  label::{Label, LabelCatalog},
  resident::{Resident, ResidentId},
  store::{Changeset, ResidentQuery, ResidentStore},
};

use crate::{
  Result,
  encode::{RawResident, ResidentRow, decode_label, encode_uuid, encode_variant},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A resident store backed by a single SQLite file.
///
/// Clones share the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Write every label of `catalog` if the label table is empty. Returns
  /// the number of labels written.
  pub async fn seed_labels(&self, catalog: &LabelCatalog) -> Result<usize> {
    let rows = label_rows(catalog.iter())?;

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existing: i64 =
          tx.query_row("SELECT COUNT(*) FROM labels", [], |r| r.get(0))?;
        if existing > 0 {
          return Ok(0);
        }
        for (id, automatic, json) in &rows {
          tx.execute(
            "INSERT INTO labels (label_id, automatic, data_json) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, automatic, json],
          )?;
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await?;
    Ok(written)
  }

  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

const UPSERT_LABEL: &str =
  "INSERT INTO labels (label_id, automatic, data_json) VALUES (?1, ?2, ?3)
   ON CONFLICT (label_id) DO UPDATE SET
     automatic = excluded.automatic,
     data_json = excluded.data_json";

const UPSERT_RESIDENT: &str = "INSERT INTO residents (
     resident_id, variant, is_archived, family_id, registered_at, data_json
   ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
   ON CONFLICT (resident_id) DO UPDATE SET
     variant     = excluded.variant,
     is_archived = excluded.is_archived,
     family_id   = excluded.family_id,
     data_json   = excluded.data_json";

fn label_rows<'a>(
  labels: impl Iterator<Item = &'a Label>,
) -> Result<Vec<(String, bool, String)>> {
  labels
    .map(|l| Ok((l.id.clone(), l.automatic, serde_json::to_string(l)?)))
    .collect()
}

// ─── ResidentStore impl ──────────────────────────────────────────────────────

impl ResidentStore for SqliteStore {
  type Error = crate::Error;

  // ── Residents ─────────────────────────────────────────────────────────────

  async fn list_residents(&self, query: ResidentQuery) -> Result<Vec<Resident>> {
    let archived = query.archived;
    let variant = query.variant.map(encode_variant);

    let raws: Vec<RawResident> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT resident_id, variant, data_json FROM residents
           WHERE (?1 IS NULL OR is_archived = ?1)
             AND (?2 IS NULL OR variant = ?2)
           ORDER BY registered_at, resident_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![archived, variant], RawResident::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResident::into_resident).collect()
  }

  async fn get_resident(&self, id: ResidentId) -> Result<Option<Resident>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawResident> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT resident_id, variant, data_json FROM residents
               WHERE resident_id = ?1",
              rusqlite::params![id_str],
              RawResident::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawResident::into_resident).transpose()
  }

  async fn put_residents(&self, residents: Vec<Resident>) -> Result<()> {
    self
      .commit(Changeset {
        residents,
        ..Changeset::default()
      })
      .await
  }

  // ── Labels ────────────────────────────────────────────────────────────────

  async fn list_labels(&self) -> Result<LabelCatalog> {
    let raws: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT data_json FROM labels ORDER BY label_id")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(|json| decode_label(json)).collect()
  }

  async fn put_label(&self, label: Label) -> Result<()> {
    self
      .commit(Changeset {
        labels_put: vec![label],
        ..Changeset::default()
      })
      .await
  }

  async fn delete_label(&self, id: String) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM labels WHERE label_id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── Batches ───────────────────────────────────────────────────────────────

  async fn commit(&self, changes: Changeset) -> Result<()> {
    if changes.is_empty() {
      return Ok(());
    }
    let labels = label_rows(changes.labels_put.iter())?;
    let deleted = changes.labels_deleted;
    let residents = changes
      .residents
      .iter()
      .map(ResidentRow::encode)
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut put_label = tx.prepare(UPSERT_LABEL)?;
          for (id, automatic, json) in &labels {
            put_label.execute(rusqlite::params![id, automatic, json])?;
          }
          let mut delete_label = tx.prepare("DELETE FROM labels WHERE label_id = ?1")?;
          for id in &deleted {
            delete_label.execute(rusqlite::params![id])?;
          }
          let mut put_resident = tx.prepare(UPSERT_RESIDENT)?;
          for row in &residents {
            put_resident.execute(rusqlite::params![
              row.resident_id,
              row.variant,
              row.is_archived,
              row.family_id,
              row.registered_at,
              row.data_json,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
