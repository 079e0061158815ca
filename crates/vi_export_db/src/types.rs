//! Row types read from the inspection-report store.

use chrono::NaiveDate;
use serde::Serialize;

/// One visual-inspection report as stored upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct InspectionRecord {
    /// Identity of the stored report; the larger id wins among duplicates.
    pub id: i64,
    /// Person responsible for the inspection
    pub name: String,
    pub date_inspected: NaiveDate,
    /// Physical unit identifier, e.g. `X-AB123`
    pub serial_number: String,
    pub hybrid_status: String,
    pub prototype_usability: String,
    /// Storage-location reference; NULL upstream stays `None`.
    pub folder: Option<String>,
}
