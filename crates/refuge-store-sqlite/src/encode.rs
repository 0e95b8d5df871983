//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings. Full records are stored as compact JSON.

use chrono::{DateTime, Utc};
use refuge_core::{
  label::Label,
  resident::{Resident, Variant},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn encode_variant(v: Variant) -> String { v.as_ref().to_owned() }

// ─── Residents ───────────────────────────────────────────────────────────────

/// Column values for one `residents` row, ready to bind.
pub struct ResidentRow {
  pub resident_id:   String,
  pub variant:       String,
  pub is_archived:   bool,
  pub family_id:     Option<String>,
  pub registered_at: String,
  pub data_json:     String,
}

impl ResidentRow {
  pub fn encode(resident: &Resident) -> Result<Self> {
    Ok(Self {
      resident_id:   encode_uuid(resident.id),
      variant:       encode_variant(resident.variant()),
      is_archived:   resident.is_archived(),
      family_id:     resident.family.family_id.map(encode_uuid),
      registered_at: encode_dt(resident.registration_date),
      data_json:     serde_json::to_string(resident)?,
    })
  }
}

/// Raw strings read directly from a `residents` row.
pub struct RawResident {
  pub resident_id: String,
  pub variant:     String,
  pub data_json:   String,
}

impl RawResident {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      resident_id: row.get(0)?,
      variant:     row.get(1)?,
      data_json:   row.get(2)?,
    })
  }

  pub fn into_resident(self) -> Result<Resident> {
    let id = decode_uuid(&self.resident_id)?;
    let variant: Variant = self.variant.parse()?;
    let resident: Resident = serde_json::from_str(&self.data_json)?;

    if resident.id != id {
      return Err(Error::Corrupt {
        id:     self.resident_id,
        detail: format!("payload carries id {}", resident.id),
      });
    }
    if resident.variant() != variant {
      return Err(Error::Corrupt {
        id:     self.resident_id,
        detail: format!("payload is a {}, column says {variant}", resident.variant()),
      });
    }
    Ok(resident)
  }
}

// ─── Labels ──────────────────────────────────────────────────────────────────

pub fn decode_label(data_json: &str) -> Result<Label> {
  Ok(serde_json::from_str(data_json)?)
}
