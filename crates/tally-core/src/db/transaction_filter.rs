//! Transaction filter builder for constructing dynamic SQL queries
//!
//! Translates a [`TransactionQuery`] into WHERE/ORDER BY clauses so that
//! listing, counting and summing all select exactly the rows that
//! `TransactionQuery::matches` would accept.

use crate::aggregate::TransactionQuery;
use crate::models::UserId;

use super::format_datetime;

/// Ordering for transaction listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionSort {
    /// Newest first
    #[default]
    DateDesc,
    DateAsc,
    AmountDesc,
}

impl std::str::FromStr for TransactionSort {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "date" | "date_desc" | "newest" => Ok(Self::DateDesc),
            "date_asc" | "oldest" => Ok(Self::DateAsc),
            "amount" | "amount_desc" => Ok(Self::AmountDesc),
            _ => Err(crate::error::Error::Validation(format!(
                "Unknown sort: {}",
                s
            ))),
        }
    }
}

/// Builder for constructing transaction query filters
///
/// The lifetime `'query` is how long the owner and query it borrows must live.
pub struct TransactionFilter<'query> {
    owner: &'query UserId,
    query: Option<&'query TransactionQuery>,
    sort: TransactionSort,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword (always scoped to the owner)
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> TransactionFilter<'query> {
    /// Create a filter over one owner's transactions
    pub fn new(owner: &'query UserId) -> Self {
        Self {
            owner,
            query: None,
            sort: TransactionSort::default(),
        }
    }

    /// Apply type, category and date filters
    pub fn query(mut self, query: &'query TransactionQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn sort(mut self, sort: TransactionSort) -> Self {
        self.sort = sort;
        self
    }

    /// Build the filter components
    pub fn build(self) -> FilterResult {
        let mut conditions = vec!["t.user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(self.owner.as_str().to_string())];

        if let Some(query) = self.query {
            if let Some(kind) = query.transaction_type {
                conditions.push("t.type = ?".to_string());
                params.push(Box::new(kind.as_str()));
            }
            if let Some(ref category) = query.category {
                conditions.push("t.category = ?".to_string());
                params.push(Box::new(category.clone()));
            }
            if let Some(start) = query.lower_bound() {
                conditions.push("t.date >= ?".to_string());
                params.push(Box::new(format_datetime(start)));
            }
            if let Some(end) = query.upper_bound() {
                conditions.push("t.date <= ?".to_string());
                params.push(Box::new(format_datetime(end)));
            }
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));
        let order_clause = match self.sort {
            TransactionSort::DateDesc => "ORDER BY t.date DESC, t.id DESC",
            TransactionSort::DateAsc => "ORDER BY t.date ASC, t.id ASC",
            TransactionSort::AmountDesc => "ORDER BY CAST(t.amount AS REAL) DESC, t.id DESC",
        }
        .to_string();

        FilterResult {
            where_clause,
            order_clause,
            params,
        }
    }
}

impl FilterResult {
    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_owner_only() {
        let owner = UserId::from("u1");
        let result = TransactionFilter::new(&owner).build();
        assert_eq!(result.where_clause, "WHERE t.user_id = ?");
        assert_eq!(result.params.len(), 1);
        assert!(result.order_clause.contains("t.date DESC"));
    }

    #[test]
    fn test_full_query() {
        let owner = UserId::from("u1");
        let query = TransactionQuery::expenses()
            .with_category("Food")
            .between(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            );
        let result = TransactionFilter::new(&owner)
            .query(&query)
            .sort(TransactionSort::AmountDesc)
            .build();

        assert_eq!(
            result.where_clause,
            "WHERE t.user_id = ? AND t.type = ? AND t.category = ? AND t.date >= ? AND t.date <= ?"
        );
        assert_eq!(result.params_refs().len(), 5);
        assert!(result.order_clause.contains("CAST(t.amount AS REAL) DESC"));
    }

    #[test]
    fn test_income_filter() {
        let owner = UserId::from("u1");
        let query = TransactionQuery::new().with_type(TransactionType::Income);
        let result = TransactionFilter::new(&owner).query(&query).build();
        assert!(result.where_clause.ends_with("t.type = ?"));
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("amount".parse::<TransactionSort>().unwrap(), TransactionSort::AmountDesc);
        assert!("colour".parse::<TransactionSort>().is_err());
    }
}
