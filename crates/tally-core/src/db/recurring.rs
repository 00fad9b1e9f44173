//! Recurring transaction materialization

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use super::transactions::TRANSACTION_COLUMNS;
use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewTransaction, RecurrenceKind, Transaction, UserId};
use crate::recurrence::due_occurrences;

impl Database {
    /// The owner's recurring templates (recurrence set, no parent), oldest first
    pub fn list_recurring_templates(&self, owner: &UserId) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions t \
             WHERE t.user_id = ? AND t.recurrence != 'none' AND t.parent_id IS NULL \
             ORDER BY t.date, t.id",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let templates = stmt
            .query_map(params![owner.as_str()], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(templates)
    }

    /// Owners that have at least one recurring template
    pub fn list_recurring_owners(&self) -> Result<Vec<UserId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT user_id FROM transactions \
             WHERE recurrence != 'none' AND parent_id IS NULL ORDER BY user_id",
        )?;
        let owners = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(UserId::from))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    /// Insert every instance of the owner's recurring templates that has come
    /// due by `now`. Returns how many were created.
    ///
    /// Instances already generated are never repeated: each template resumes
    /// after its latest instance.
    pub fn materialize_recurring(&self, owner: &UserId, now: DateTime<Utc>) -> Result<usize> {
        let templates = self.list_recurring_templates(owner)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut created = 0;

        for template in &templates {
            let latest: Option<String> = tx
                .query_row(
                    "SELECT MAX(date) FROM transactions WHERE parent_id = ? AND user_id = ?",
                    params![template.id, owner.as_str()],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            let after = latest
                .as_deref()
                .and_then(parse_datetime)
                .unwrap_or(template.date)
                .max(template.date);

            let due = due_occurrences(template.date, template.recurrence, after, now);
            for date in &due {
                let instance = NewTransaction {
                    description: template.description.clone(),
                    amount: template.amount,
                    transaction_type: template.transaction_type,
                    category: template.category.clone(),
                    date: *date,
                    note: template.note.clone(),
                    photo_url: template.photo_url.clone(),
                    recurrence: RecurrenceKind::None,
                    parent_id: Some(template.id),
                };
                Self::insert_transaction_on(&tx, owner, &instance)?;
            }
            if !due.is_empty() {
                debug!(template_id = template.id, count = due.len(), "Generated recurring instances");
            }
            created += due.len();
        }

        tx.commit()?;
        if created > 0 {
            info!(owner = %owner, created, "Recurring transactions materialized");
        }
        Ok(created)
    }

    /// Run [`Database::materialize_recurring`] for every owner with templates
    pub fn materialize_all_recurring(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut total = 0;
        for owner in self.list_recurring_owners()? {
            total += self.materialize_recurring(&owner, now)?;
        }
        Ok(total)
    }
}
