use std::str::FromStr;

use crate::dialect::SqlDialect;
use crate::error::OrmError;
use crate::value::Value;

/// Row limit of a [`FindAll`] query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// `limit ?`
    Count(u32),
    /// `limit ?, ?` (skip `offset` rows, then take `count`).
    Range { offset: u32, count: u32 },
}

impl Limit {
    pub fn range(offset: u32, count: u32) -> Self {
        Limit::Range { offset, count }
    }

    fn clause<DB: SqlDialect>(self) -> (&'static str, Vec<Value>) {
        match self {
            Limit::Count(count) => ("limit ?", vec![Value::from(count)]),
            Limit::Range { offset, count } => {
                let (clause, count_first) = DB::range_limit_clause();
                let args = if count_first {
                    vec![Value::from(count), Value::from(offset)]
                } else {
                    vec![Value::from(offset), Value::from(count)]
                };
                (clause, args)
            }
        }
    }
}

impl From<u32> for Limit {
    fn from(count: u32) -> Self {
        Limit::Count(count)
    }
}

impl From<(u32, u32)> for Limit {
    fn from((offset, count): (u32, u32)) -> Self {
        Limit::Range { offset, count }
    }
}

fn limit_part(raw: &str, whole: &str) -> Result<u32, OrmError> {
    raw.trim()
        .parse()
        .map_err(|_| OrmError::InvalidLimit(whole.to_string()))
}

/// Parses `"n"` or `"offset,count"`.
impl FromStr for Limit {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        match parts.as_slice() {
            [count] => Ok(Limit::Count(limit_part(count, s)?)),
            [offset, count] => Ok(Limit::Range {
                offset: limit_part(offset, s)?,
                count: limit_part(count, s)?,
            }),
            _ => Err(OrmError::InvalidLimit(s.to_string())),
        }
    }
}

/// Accepts a one-element (count) or two-element (offset, count) slice.
impl TryFrom<&[i64]> for Limit {
    type Error = OrmError;

    fn try_from(values: &[i64]) -> Result<Self, Self::Error> {
        let invalid = || OrmError::InvalidLimit(format!("{:?}", values));
        let part = |v: i64| u32::try_from(v).map_err(|_| invalid());
        match *values {
            [count] => Ok(Limit::Count(part(count)?)),
            [offset, count] => Ok(Limit::Range {
                offset: part(offset)?,
                count: part(count)?,
            }),
            _ => Err(invalid()),
        }
    }
}

/// Options of [`Model::find_all`](crate::model::Model::find_all).
///
/// ```
/// use quill_core::{FindAll, Limit};
///
/// let query = FindAll::new()
///     .filter("`email`=?", ["a@b.com"])
///     .order_by("created_at desc")
///     .limit(Limit::range(10, 5));
/// assert_eq!(query.limit_value(), Some(Limit::Range { offset: 10, count: 5 }));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAll {
    filters: Vec<String>,
    args: Vec<Value>,
    order_by: Option<String>,
    limit: Option<Limit>,
}

impl FindAll {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw where-clause fragment with its positional arguments.
    /// Several fragments are joined with `and`.
    pub fn filter<I, V>(mut self, condition: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(condition.into());
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an equality filter on one column.
    pub fn filter_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters
            .push(format!("`{}`=?", column.replace('`', "``")));
        self.args.push(value.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn limit_value(&self) -> Option<Limit> {
        self.limit
    }

    /// Appends the clauses to `select` and returns the statement with its arguments.
    pub fn to_sql<DB: SqlDialect>(&self, select: &str) -> (String, Vec<Value>) {
        let mut sql = select.to_string();
        let mut args = self.args.clone();
        if !self.filters.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&self.filters.join(" and "));
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" order by ");
            sql.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            let (clause, limit_args) = limit.clause::<DB>();
            sql.push(' ');
            sql.push_str(clause);
            args.extend(limit_args);
        }
        (sql, args)
    }
}
