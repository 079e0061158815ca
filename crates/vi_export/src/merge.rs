//! Collapse inspection reports that describe the same physical unit.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use vi_export_db::InspectionRecord;

const FOLDER_SEPARATOR: &str = ", ";

/// One export row per serial number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRecord {
    pub name: String,
    pub date_inspected: NaiveDate,
    pub serial_number: String,
    pub hybrid_status: String,
    pub prototype_usability: String,
    /// Every non-null folder of the group, encounter order, `", "`-joined.
    pub combined_folders: String,
}

impl MergedRecord {
    fn from_record(record: InspectionRecord, combined_folders: String) -> Self {
        Self {
            name: record.name,
            date_inspected: record.date_inspected,
            serial_number: record.serial_number,
            hybrid_status: record.hybrid_status,
            prototype_usability: record.prototype_usability,
            combined_folders,
        }
    }
}

/// Deduplicate by serial number.
///
/// Non-folder fields come from the record with the greatest `id`; on an
/// equal `id` the first record seen is kept. Folders are collected from all
/// records of the group, including the ones that lost. Output order is the
/// order in which each serial number was first seen.
pub fn merge_duplicates(records: Vec<InspectionRecord>) -> Vec<MergedRecord> {
    let mut first_seen: Vec<String> = Vec::new();
    let mut best: HashMap<String, InspectionRecord> = HashMap::new();
    let mut folders: HashMap<String, Vec<String>> = HashMap::new();

    for record in records {
        if let Some(folder) = &record.folder {
            folders
                .entry(record.serial_number.clone())
                .or_default()
                .push(folder.clone());
        }

        match best.entry(record.serial_number.clone()) {
            Entry::Vacant(slot) => {
                first_seen.push(record.serial_number.clone());
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if record.id > slot.get().id {
                    slot.insert(record);
                }
            }
        }
    }

    first_seen
        .into_iter()
        .filter_map(|serial| {
            let record = best.remove(&serial)?;
            let combined = folders
                .remove(&serial)
                .map(|group| group.join(FOLDER_SEPARATOR))
                .unwrap_or_default();
            Some(MergedRecord::from_record(record, combined))
        })
        .collect()
}

/// Export every record as-is, one row per stored report.
pub fn passthrough(records: Vec<InspectionRecord>) -> Vec<MergedRecord> {
    records
        .into_iter()
        .map(|mut record| {
            let folder = record.folder.take().unwrap_or_default();
            MergedRecord::from_record(record, folder)
        })
        .collect()
}
