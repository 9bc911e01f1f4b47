// src/types.rs
use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::hierarchy::Breadcrumb;

/// Stable page identity, assigned by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(i64);

impl PageId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

impl From<i64> for PageId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl ToSql for PageId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for PageId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self)
    }
}

/// Input for `PageStore::create`.
#[derive(Debug, Clone)]
pub struct NewPage<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub parent: Option<PageId>,
}

/// One row of the `pages` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    pub id: PageId,
    pub title: String,
    pub content: String,
    pub parent_id: Option<PageId>,
    pub created_at: String,
    pub updated_at: String,
}

/// What a reader gets back from `Pages::read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub id: PageId,
    pub title: String,
    pub content: String,
    pub parent_id: Option<PageId>,
    pub child_ids: Vec<PageId>,
    pub breadcrumb: Breadcrumb,
}
