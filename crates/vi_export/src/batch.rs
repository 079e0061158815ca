//! Batch numbers are not stored upstream; they are read out of the serial
//! number (`<prefix>-<segment>`, batch = characters 2 and 3 of `<segment>`).

use serde::{Serialize, Serializer};
use std::fmt;

const NOT_APPLICABLE: &str = "N/A";

/// Batch code derived from a serial number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BatchNumber {
    /// Two-character code, e.g. `B1` for `X-AB123`.
    Code(String),
    /// Serial number does not have the expected shape.
    NotApplicable,
}

impl BatchNumber {
    pub fn as_str(&self) -> &str {
        match self {
            BatchNumber::Code(code) => code,
            BatchNumber::NotApplicable => NOT_APPLICABLE,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, BatchNumber::Code(_))
    }
}

impl fmt::Display for BatchNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BatchNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Derive the batch code from a serial number. Total over all strings.
pub fn derive_batch(serial_number: &str) -> BatchNumber {
    let mut segments = serial_number.split('-');
    let _prefix = segments.next();

    let Some(segment) = segments.next() else {
        return BatchNumber::NotApplicable;
    };
    // Counted in characters, not bytes: a multi-byte serial must not
    // slice through a code point.
    if segment.chars().count() < 3 {
        return BatchNumber::NotApplicable;
    }

    BatchNumber::Code(segment.chars().skip(1).take(2).collect())
}
