//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{Error, database_id::DatabaseId, db::text_enum, user::UserId};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction brings money in or takes money out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

/// How often a recurring transaction repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurringInterval {
    /// Every day.
    Daily,
    /// Every seven days.
    Weekly,
    /// Every fourteen days.
    BiWeekly,
    /// Every calendar month, clamped to the length of the target month.
    Monthly,
    /// Every calendar year, clamping Feb 29 in non-leap years.
    Yearly,
}

/// The settlement state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Not yet settled.
    Pending,
    /// Settled.
    Completed,
    /// The payment did not go through.
    Failed,
}

/// How a transaction was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    MobilePayment,
    AutoDebit,
    Cash,
    Other,
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// Amounts are stored in minor currency units (cents) as a non-negative
/// magnitude; `transaction_type` carries the sign.
///
/// A recurring transaction acts as a schedule: the recurring batch job
/// materializes one non-recurring copy per due occurrence. The invariant is
/// that `next_recurring_date` is set iff `is_recurring` is true and
/// `recurring_interval` is set, and materialized copies are never recurring.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseId,
    /// The ID of the user that owns the transaction.
    pub user_id: UserId,
    /// A short label for the transaction, e.g. "Rent".
    pub title: String,
    /// Whether this is income or an expense.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The amount of money in cents.
    pub amount: i64,
    /// The category the transaction belongs to, e.g. "Groceries".
    pub category: String,
    /// An optional free-text description.
    pub description: Option<String>,
    /// The transaction's effective date.
    pub date: Date,
    /// Whether this transaction repeats on a schedule.
    pub is_recurring: bool,
    /// How often the transaction repeats, when recurring.
    pub recurring_interval: Option<RecurringInterval>,
    /// The next date a new instance must be materialized, when recurring.
    pub next_recurring_date: Option<Date>,
    /// When the recurring batch job last materialized an instance.
    pub last_processed: Option<OffsetDateTime>,
    /// The settlement state of the transaction.
    pub status: TransactionStatus,
    /// How the transaction was paid.
    pub payment_method: PaymentMethod,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        user_id: UserId,
        title: &str,
        transaction_type: TransactionType,
        amount: i64,
        category: &str,
        date: Date,
    ) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            title: title.to_owned(),
            transaction_type,
            amount,
            category: category.to_owned(),
            description: None,
            date,
            recurring_interval: None,
            next_recurring_date: None,
            status: TransactionStatus::Completed,
            payment_method: PaymentMethod::Card,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// Optional fields default to the values the original records carried when
/// omitted: status `COMPLETED`, payment method `CARD`, not recurring.
///
/// The schedule fields are not settable individually: [recurring](Self::recurring)
/// is the only way to set them, so an interval without a due date (or vice
/// versa) cannot be built.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    user_id: UserId,
    title: String,
    transaction_type: TransactionType,
    amount: i64,
    category: String,
    description: Option<String>,
    date: Date,
    recurring_interval: Option<RecurringInterval>,
    next_recurring_date: Option<Date>,
    status: TransactionStatus,
    payment_method: PaymentMethod,
}

impl TransactionBuilder {
    /// Set the free-text description.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Make the transaction recurring with the given interval and next due
    /// date.
    pub fn recurring(mut self, interval: RecurringInterval, next_date: Date) -> Self {
        self.recurring_interval = Some(interval);
        self.next_recurring_date = Some(next_date);
        self
    }

    /// Set the settlement status.
    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the payment method.
    pub fn payment_method(mut self, payment_method: PaymentMethod) -> Self {
        self.payment_method = payment_method;
        self
    }
}

/// The fields a transaction update is allowed to change.
///
/// Named explicitly so an update can never clobber `last_processed` or the
/// owner. `is_recurring` is derived from `recurring_interval`; callers must
/// pass `next_recurring_date` iff an interval is set.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    /// The new title.
    pub title: String,
    /// Whether this is income or an expense.
    pub transaction_type: TransactionType,
    /// The amount of money in cents.
    pub amount: i64,
    /// The category the transaction belongs to.
    pub category: String,
    /// An optional free-text description.
    pub description: Option<String>,
    /// The transaction's effective date.
    pub date: Date,
    /// How often the transaction repeats. `None` makes the row one-off.
    pub recurring_interval: Option<RecurringInterval>,
    /// The next date the recurring batch job should act on the row.
    pub next_recurring_date: Option<Date>,
    /// The settlement state of the transaction.
    pub status: TransactionStatus,
    /// How the transaction was paid.
    pub payment_method: PaymentMethod,
}

// ============================================================================
// STRING AND SQL CONVERSIONS
// ============================================================================

text_enum!(
    TransactionType,
    Error::InvalidFieldValue,
    [
        (TransactionType::Income, "INCOME"),
        (TransactionType::Expense, "EXPENSE"),
    ]
);

text_enum!(
    RecurringInterval,
    Error::InvalidInterval,
    [
        (RecurringInterval::Daily, "DAILY"),
        (RecurringInterval::Weekly, "WEEKLY"),
        (RecurringInterval::BiWeekly, "BI_WEEKLY"),
        (RecurringInterval::Monthly, "MONTHLY"),
        (RecurringInterval::Yearly, "YEARLY"),
    ]
);

text_enum!(
    TransactionStatus,
    Error::InvalidFieldValue,
    [
        (TransactionStatus::Pending, "PENDING"),
        (TransactionStatus::Completed, "COMPLETED"),
        (TransactionStatus::Failed, "FAILED"),
    ]
);

text_enum!(
    PaymentMethod,
    Error::InvalidFieldValue,
    [
        (PaymentMethod::Card, "CARD"),
        (PaymentMethod::BankTransfer, "BANK_TRANSFER"),
        (PaymentMethod::MobilePayment, "MOBILE_PAYMENT"),
        (PaymentMethod::AutoDebit, "AUTO_DEBIT"),
        (PaymentMethod::Cash, "CASH"),
        (PaymentMethod::Other, "OTHER"),
    ]
);

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str = "id, user_id, title, transaction_type, amount, category, \
     description, date, is_recurring, recurring_interval, next_recurring_date, last_processed, \
     status, payment_method";

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                amount INTEGER NOT NULL,
                category TEXT NOT NULL,
                description TEXT,
                date TEXT NOT NULL,
                is_recurring INTEGER NOT NULL DEFAULT 0,
                recurring_interval TEXT,
                next_recurring_date TEXT,
                last_processed TEXT,
                status TEXT NOT NULL DEFAULT 'COMPLETED',
                payment_method TEXT NOT NULL DEFAULT 'CARD',
                FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
                )",
        (),
    )?;

    // Index used by the recurring batch job's due-record query.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_due
             ON \"transaction\"(is_recurring, next_recurring_date);",
        (),
    )?;

    Ok(())
}

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error, e.g. if `user_id`
/// does not refer to a registered user.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, title, transaction_type, amount, category, \
             description, date, is_recurring, recurring_interval, next_recurring_date, \
             last_processed, status, payment_method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11, ?12)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.user_id,
                builder.title,
                builder.transaction_type,
                builder.amount,
                builder.category,
                builder.description,
                builder.date,
                builder.recurring_interval.is_some(),
                builder.recurring_interval,
                builder.next_recurring_date,
                builder.status,
                builder.payment_method,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction owned by `user_id` by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by the user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(
    id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(&[(":id", &id), (":user_id", &user_id)], map_transaction_row)?;

    Ok(transaction)
}

/// Delete a transaction owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no such transaction exists.
pub fn delete_transaction(
    id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_deleted = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Apply a [TransactionUpdate] to a transaction owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by the user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: DatabaseId,
    user_id: UserId,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET title = ?1, transaction_type = ?2, amount = ?3, category = ?4,
                 description = ?5, date = ?6, is_recurring = ?7,
                 recurring_interval = ?8, next_recurring_date = ?9, status = ?10,
                 payment_method = ?11
             WHERE id = ?12 AND user_id = ?13
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                update.title,
                update.transaction_type,
                update.amount,
                update.category,
                update.description,
                update.date,
                update.recurring_interval.is_some(),
                update.recurring_interval,
                update.next_recurring_date,
                update.status,
                update.payment_method,
                id,
                user_id,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Delete several transactions owned by `user_id` at once.
///
/// IDs that do not exist or belong to another user are skipped; the returned
/// count covers only the rows actually deleted.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn delete_transactions(
    ids: &[DatabaseId],
    user_id: UserId,
    connection: &Connection,
) -> Result<u64, Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let rows_deleted = connection.execute(
        &format!("DELETE FROM \"transaction\" WHERE user_id = ? AND id IN ({placeholders})"),
        rusqlite::params_from_iter(std::iter::once(&user_id).chain(ids.iter())),
    )?;

    Ok(rows_deleted as u64)
}

/// Filter for [list_transactions]: all, only recurring, or only one-off rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecurringFilter {
    /// No filter.
    #[default]
    All,
    /// Only rows that act as recurring schedules.
    Recurring,
    /// Only one-off rows, including materialized occurrences.
    NonRecurring,
}

/// List a page of a user's transactions, most recent first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn list_transactions(
    user_id: UserId,
    filter: RecurringFilter,
    page_number: u64,
    page_size: u64,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let recurring_clause = match filter {
        RecurringFilter::All => "",
        RecurringFilter::Recurring => "AND is_recurring = 1",
        RecurringFilter::NonRecurring => "AND is_recurring = 0",
    };
    let offset = (page_number.max(1) - 1) * page_size;

    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = :user_id {recurring_clause}
             ORDER BY date DESC, id DESC
             LIMIT :limit OFFSET :offset"
        ))?
        .query_map(
            &[
                (":user_id", &user_id),
                (":limit", &(page_size as i64)),
                (":offset", &(offset as i64)),
            ],
            map_transaction_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Count a user's transactions under the given recurring filter.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn count_transactions(
    user_id: UserId,
    filter: RecurringFilter,
    connection: &Connection,
) -> Result<u64, Error> {
    let recurring_clause = match filter {
        RecurringFilter::All => "",
        RecurringFilter::Recurring => "AND is_recurring = 1",
        RecurringFilter::NonRecurring => "AND is_recurring = 0",
    };

    connection
        .query_row(
            &format!(
                "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = :user_id {recurring_clause}"
            ),
            &[(":user_id", &user_id)],
            |row| row.get::<_, i64>(0).map(|count| count as u64),
        )
        .map_err(|error| error.into())
}

/// Find the recurring transactions whose next occurrence is due on or before
/// `today`.
///
/// The result is a point-in-time snapshot: the batch job iterates it while
/// concurrent API writers may mutate the table, so each record is re-fetched
/// inside its own atomic scope before being processed.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn find_due_recurring(today: Date, connection: &Connection) -> Result<Vec<Transaction>, Error> {
    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE is_recurring = 1 AND next_recurring_date <= :today
             ORDER BY id"
        ))?
        .query_map(&[(":today", &today)], map_transaction_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Advance a recurring transaction's schedule after materializing an
/// occurrence.
///
/// Only the schedule fields are touched; all financial fields are left alone.
///
/// # Errors
/// Returns [Error::NotFound] if the row vanished or stopped being recurring
/// since the due-record query, so the caller can roll back its atomic scope.
pub fn advance_recurring_schedule(
    id: DatabaseId,
    next_date: Date,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_updated = connection.execute(
        "UPDATE \"transaction\"
         SET next_recurring_date = ?1, last_processed = ?2
         WHERE id = ?3 AND is_recurring = 1",
        (next_date, now, id),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Map a database row to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        transaction_type: row.get(3)?,
        amount: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        date: row.get(7)?,
        is_recurring: row.get(8)?,
        recurring_interval: row.get(9)?,
        next_recurring_date: row.get(10)?,
        last_processed: row.get(11)?,
        status: row.get(12)?,
        payment_method: row.get(13)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod enum_tests {
    use super::{PaymentMethod, RecurringInterval, TransactionType};
    use crate::Error;

    #[test]
    fn interval_round_trips_through_text() {
        assert_eq!(RecurringInterval::BiWeekly.as_str(), "BI_WEEKLY");
        assert_eq!(
            "BI_WEEKLY".parse::<RecurringInterval>().unwrap(),
            RecurringInterval::BiWeekly
        );
    }

    #[test]
    fn unknown_interval_is_rejected() {
        assert_eq!(
            "HOURLY".parse::<RecurringInterval>(),
            Err(Error::InvalidInterval("HOURLY".to_owned()))
        );
    }

    #[test]
    fn serde_names_match_wire_format() {
        assert_eq!(
            serde_json::to_string(&TransactionType::Expense).unwrap(),
            "\"EXPENSE\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"BANK_TRANSFER\""
        );
    }
}
