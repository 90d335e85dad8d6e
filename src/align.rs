//! Identity alignment between the database catalog and the spreadsheet fields.

use std::collections::BTreeMap;

use log::warn;

use crate::field::{DatabaseField, FieldIdentity, SpreadsheetField};

/// Identities partitioned by which source carries them, each list ordered by
/// normalized identity.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub only_database: Vec<(FieldIdentity, DatabaseField)>,
    pub only_spreadsheet: Vec<(FieldIdentity, SpreadsheetField)>,
    pub both: Vec<(FieldIdentity, DatabaseField, SpreadsheetField)>,
}

impl Alignment {
    pub fn len(&self) -> usize {
        self.only_database.len() + self.only_spreadsheet.len() + self.both.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keys fields by normalized identity.
///
/// Fields whose API name is blank are dropped. When two fields normalize to the
/// same identity the later one wins; callers that care about which one survives
/// must order their input accordingly.
pub fn index_fields<T, I, F>(fields: I, identity: F) -> BTreeMap<FieldIdentity, T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> Option<FieldIdentity>,
{
    let mut indexed = BTreeMap::new();
    for field in fields {
        match identity(&field) {
            Some(key) => {
                indexed.insert(key, field);
            }
            None => warn!("Dropping field with an empty API name"),
        }
    }
    indexed
}

pub fn align(
    database: BTreeMap<FieldIdentity, DatabaseField>,
    mut spreadsheet: BTreeMap<FieldIdentity, SpreadsheetField>,
) -> Alignment {
    let mut alignment = Alignment::default();
    for (identity, db_field) in database {
        match spreadsheet.remove(&identity) {
            Some(excel_field) => alignment.both.push((identity, db_field, excel_field)),
            None => alignment.only_database.push((identity, db_field)),
        }
    }
    alignment.only_spreadsheet = spreadsheet.into_iter().collect();
    alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str) -> DatabaseField {
        DatabaseField {
            api_name: name.to_string(),
            ..DatabaseField::default()
        }
    }

    fn sheet(name: &str) -> SpreadsheetField {
        SpreadsheetField {
            api_name: name.to_string(),
            ..SpreadsheetField::default()
        }
    }

    #[test]
    fn align_partitions_by_case_insensitive_identity() {
        let database = index_fields(
            vec![db("Voucher_No"), db("legacy_flag")],
            DatabaseField::identity,
        );
        let spreadsheet = index_fields(
            vec![sheet("voucher_no"), sheet("new_field")],
            SpreadsheetField::identity,
        );

        let alignment = align(database, spreadsheet);
        assert_eq!(alignment.len(), 3);
        assert_eq!(alignment.both.len(), 1);
        assert_eq!(alignment.both[0].1.api_name, "Voucher_No");
        assert_eq!(alignment.both[0].2.api_name, "voucher_no");
        assert_eq!(alignment.only_database[0].0.as_str(), "legacy_flag");
        assert_eq!(alignment.only_spreadsheet[0].0.as_str(), "new_field");
    }

    #[test]
    fn index_fields_drops_blank_names_and_keeps_last_write() {
        let mut first = sheet("Amount");
        first.description = "first".into();
        let mut second = sheet("AMOUNT ");
        second.description = "second".into();
        let indexed =
            index_fields(vec![first, sheet("  "), second], SpreadsheetField::identity);
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed.values().next().unwrap().description, "second");
    }

    #[test]
    fn only_sets_are_sorted_by_identity() {
        let database = index_fields(vec![db("b"), db("A"), db("c")], DatabaseField::identity);
        let alignment = align(database, BTreeMap::new());
        let order: Vec<&str> = alignment
            .only_database
            .iter()
            .map(|(identity, _)| identity.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
