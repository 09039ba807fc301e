use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar month a transaction is filed under, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthBucket {
    year: i32,
    month: u32,
}

impl MonthBucket {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(MonthBucket { year, month })
        } else {
            None
        }
    }

    /// Truncates a date to its year-month.
    pub fn of(date: NaiveDate) -> Self {
        MonthBucket {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid month bucket: '{s}'"))?;
        let year = y
            .parse::<i32>()
            .map_err(|_| format!("Invalid month bucket year: '{s}'"))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| format!("Invalid month bucket month: '{s}'"))?;
        MonthBucket::new(year, month).ok_or_else(|| format!("Month out of range: '{s}'"))
    }
}

impl TryFrom<String> for MonthBucket {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MonthBucket> for String {
    fn from(m: MonthBucket) -> Self {
        m.to_string()
    }
}
