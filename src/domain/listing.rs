//! Listings and reports

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Active,
    Archived,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ListingStatus::Active),
            "ARCHIVED" => Ok(ListingStatus::Archived),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

/// What a report points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportTarget {
    User,
    Listing,
    Exchange,
}

impl ReportTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportTarget::User => "USER",
            ReportTarget::Listing => "LISTING",
            ReportTarget::Exchange => "EXCHANGE",
        }
    }
}

impl FromStr for ReportTarget {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(ReportTarget::User),
            "LISTING" => Ok(ReportTarget::Listing),
            "EXCHANGE" => Ok(ReportTarget::Exchange),
            other => Err(DomainError::InvalidReportTarget(other.to_string())),
        }
    }
}

/// Return the trimmed value if it is present and non-blank
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
