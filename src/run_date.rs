//! The date-and-time string identifying a simulation run, in the
//! `DD-MM-YYYY_HH-MM` format the simulator uses for its output
//! directories.

use std::{fmt::Display, str::FromStr};

use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use regex::Regex;

pub const RUN_DATE_FORMAT: &str = "%d-%m-%Y_%H-%M";
pub const RUN_DATE_EXAMPLE: &str = "15-06-2024_19-11";

lazy_static! {
    static ref RUN_DATE_RE: Regex =
        Regex::new(r"^\d{2}-\d{2}-\d{4}_\d{2}-\d{2}$").expect("valid regex");
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RunDateError {
    #[error("invalid date format {0:?}, please use DD-MM-YYYY_HH-MM, e.g. {RUN_DATE_EXAMPLE}")]
    Format(String),
    #[error("invalid date {0:?}: {1}")]
    Invalid(String, chrono::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunDate(NaiveDateTime);

impl RunDate {
    /// The name of the directory holding the run's files (same as
    /// the `Display` output).
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

impl Display for RunDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(RUN_DATE_FORMAT))
    }
}

impl FromStr for RunDate {
    type Err = RunDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts single digits for %d etc., hence the
        // additional shape check.
        if !RUN_DATE_RE.is_match(s) {
            return Err(RunDateError::Format(s.into()));
        }
        let t = NaiveDateTime::parse_from_str(s, RUN_DATE_FORMAT)
            .map_err(|e| RunDateError::Invalid(s.into(), e))?;
        Ok(Self(t))
    }
}
