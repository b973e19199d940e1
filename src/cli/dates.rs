use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Parses a user supplied day such as "yesterday" or "15/03/2025" relative to `now`. `what` names
/// the argument in the error message.
pub fn parse_day(
    input: Option<&str>,
    style: DateStyle,
    now: DateTime<Local>,
    what: &str,
) -> Result<Option<NaiveDate>> {
    let Some(input) = input else {
        return Ok(None);
    };
    match parse_date_string(input, now, style.into()) {
        Ok(value) => Ok(Some(value.date_naive())),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate {what} {e}"),
            )
            .into()),
    }
}
