//! Human-readable CAF numbers: `CAF-<yyyy>-<nnnn>`.

use std::fmt;
use std::str::FromStr;

use crate::error::CafError;

const PREFIX: &str = "CAF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CafNumber {
    pub year: i32,
    pub sequence: u32,
}

impl CafNumber {
    /// The number following `last` in `year`, or the first of the year.
    pub fn next_after(year: i32, last: Option<u32>) -> Self {
        Self {
            year,
            sequence: last.map_or(1, |seq| seq.saturating_add(1)),
        }
    }
}

impl fmt::Display for CafNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}-{:04}-{:04}", self.year, self.sequence)
    }
}

impl FromStr for CafNumber {
    type Err = CafError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CafError::InvalidNumber(s.to_string());

        let mut parts = s.splitn(3, '-');
        if parts.next() != Some(PREFIX) {
            return Err(invalid());
        }
        let year = parts.next().ok_or_else(invalid)?;
        let sequence = parts.next().ok_or_else(invalid)?;
        if year.len() != 4 || sequence.len() < 4 {
            return Err(invalid());
        }

        Ok(Self {
            year: year.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_of_year() {
        let n = CafNumber::next_after(2025, None);
        assert_eq!(n.to_string(), "CAF-2025-0001");
    }

    #[test]
    fn next_number_increments_sequence() {
        let n = CafNumber::next_after(2025, Some(1));
        assert_eq!(n.to_string(), "CAF-2025-0002");
        assert!(n > CafNumber::next_after(2025, None));
    }

    #[test]
    fn sequence_grows_past_four_digits() {
        let n = CafNumber::next_after(2025, Some(9999));
        assert_eq!(n.to_string(), "CAF-2025-10000");
        assert_eq!("CAF-2025-10000".parse::<CafNumber>().unwrap(), n);
    }

    #[test]
    fn parses_formatted_numbers() {
        let n: CafNumber = "CAF-2024-0042".parse().unwrap();
        assert_eq!(n.year, 2024);
        assert_eq!(n.sequence, 42);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let malformed = [
            "",
            "CAF-2025",
            "CAF-25-0001",
            "XYZ-2025-0001",
            "CAF-2025-01",
            "CAF-2025-00a1",
        ];
        for bad in malformed {
            assert!(bad.parse::<CafNumber>().is_err(), "accepted {bad:?}");
        }
    }
}
