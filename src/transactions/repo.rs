use mongodb::bson::{doc, Document};
use time::{Date, Month, OffsetDateTime};

use super::repo_types::Transaction;
use crate::{
    db::{to_bson_time, Repo},
    error::{AppError, AppResult},
};

pub type TransactionRepo = Repo<Transaction>;

/// `[first instant of month, first instant of the next month)` in UTC.
pub fn month_bounds(month: u8, year: i32) -> AppResult<(OffsetDateTime, OffsetDateTime)> {
    let month = Month::try_from(month).map_err(|_| AppError::validation("Please send valid month"))?;
    let start = first_of(year, month)?;
    let end = match month {
        Month::December => first_of(year + 1, Month::January)?,
        other => first_of(year, other.next())?,
    };
    Ok((start, end))
}

fn first_of(year: i32, month: Month) -> AppResult<OffsetDateTime> {
    Date::from_calendar_date(year, month, 1)
        .map(|d| d.midnight().assume_utc())
        .map_err(|_| AppError::validation("Please send valid year"))
}

/// Parses `"<month>-<year>"`, e.g. `"3-2024"`.
pub fn parse_period(raw: &str) -> AppResult<(u8, i32)> {
    let (month, year) = raw
        .split_once('-')
        .ok_or_else(|| AppError::validation("Please send valid month"))?;
    Ok((parse_month(month)?, parse_year(year)?))
}

/// Parses `"<month>-<year>-<userId>"`.
pub fn parse_user_period(raw: &str) -> AppResult<(u8, i32, String)> {
    let mut parts = raw.splitn(3, '-');
    let month = parse_month(parts.next().unwrap_or_default())?;
    let year = parse_year(parts.next().unwrap_or_default())?;
    let user_id = parts.next().map(str::trim).unwrap_or_default();
    if user_id.is_empty() {
        return Err(AppError::validation("Please send valid user id"));
    }
    Ok((month, year, user_id.to_string()))
}

fn parse_month(raw: &str) -> AppResult<u8> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::validation("Please send valid month"))
}

fn parse_year(raw: &str) -> AppResult<i32> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::validation("Please send valid year"))
}

impl Repo<Transaction> {
    /// Transactions dated inside the given month, optionally for one user.
    pub async fn get_by_month_year(
        &self,
        month: u8,
        year: i32,
        user_id: Option<&str>,
    ) -> AppResult<Vec<Transaction>> {
        let (start, end) = month_bounds(month, year)?;
        let mut filter: Document = doc! {
            "date": { "$gte": to_bson_time(start), "$lt": to_bson_time(end) },
        };
        if let Some(user_id) = user_id {
            filter.insert("userId", user_id);
        }
        self.find_many(filter).await
    }

    pub async fn get_by_category(&self, category_id: &str) -> AppResult<Vec<Transaction>> {
        self.find_by("categoryId", category_id).await
    }

    pub async fn get_by_account(&self, account_id: &str) -> AppResult<Vec<Transaction>> {
        self.find_by("accountId", account_id).await
    }
}
