//! Reading and validating save documents.

use std::path::Path;

use tally_core::document::SaveDocument;

use crate::{Error, Result};

/// Collections of which at least one must be non-empty for the file to count
/// as a save document at all. An export with none of these is either a
/// different file kind entirely or a truncated write.
const ENTITY_COLLECTIONS: &[&str] =
  &["employees", "employeesOrder", "transactions", "products", "candidates"];

/// Load a save document from `path`.
///
/// Fails with [`Error::InvalidFormat`] if the file does not parse or the
/// mandatory fields are absent. No side effects beyond the read.
pub fn load(path: impl AsRef<Path>) -> Result<SaveDocument> {
  let path = path.as_ref();
  let raw = std::fs::read_to_string(path)
    .map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
  parse_str(&raw)
}

/// Parse and validate a save document from raw JSON text.
pub fn parse_str(raw: &str) -> Result<SaveDocument> {
  let doc = SaveDocument::parse(raw)
    .map_err(|e| Error::InvalidFormat(e.to_string()))?;
  validate(&doc)?;
  Ok(doc)
}

/// The minimal structural check: `date` and `balance` must be present, and
/// at least one entity collection must be non-empty.
fn validate(doc: &SaveDocument) -> Result<()> {
  if doc.game_date().is_none() {
    return Err(Error::InvalidFormat("missing date field".into()));
  }
  if doc.balance().is_none() {
    return Err(Error::InvalidFormat("missing balance field".into()));
  }
  if !ENTITY_COLLECTIONS.iter().any(|key| doc.collection_len(key) > 0) {
    return Err(Error::InvalidFormat("no entity collections present".into()));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write as _;

  const GOOD: &str = r#"{
    "date": "2021-04-15T10:30:00.000Z",
    "balance": 50000,
    "employees": [{ "id": "e1", "name": "Ada" }]
  }"#;

  #[test]
  fn well_formed_document_loads() {
    let doc = parse_str(GOOD).unwrap();
    assert_eq!(doc.workforce_size(), 1);
  }

  #[test]
  fn unparseable_input_is_invalid_format() {
    assert!(matches!(parse_str("{{{"), Err(Error::InvalidFormat(_))));
    assert!(matches!(parse_str("[1, 2]"), Err(Error::InvalidFormat(_))));
  }

  #[test]
  fn missing_mandatory_fields_are_invalid_format() {
    let no_date = r#"{ "balance": 1, "employees": [{}] }"#;
    assert!(matches!(parse_str(no_date), Err(Error::InvalidFormat(_))));

    let no_balance = r#"{ "date": "2021-01-01", "employees": [{}] }"#;
    assert!(matches!(parse_str(no_balance), Err(Error::InvalidFormat(_))));

    let no_entities = r#"{ "date": "2021-01-01", "balance": 1 }"#;
    assert!(matches!(parse_str(no_entities), Err(Error::InvalidFormat(_))));
  }

  #[test]
  fn load_reads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(GOOD.as_bytes()).unwrap();

    let doc = load(file.path()).unwrap();
    assert_eq!(doc.company_name(), None);
    assert_eq!(doc.workforce_size(), 1);
  }

  #[test]
  fn load_missing_file_is_a_read_error() {
    assert!(matches!(
      load("definitely/not/here.json"),
      Err(Error::Read { .. })
    ));
  }
}
