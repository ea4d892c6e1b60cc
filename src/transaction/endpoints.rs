//! The route handlers for creating, listing, fetching, and deleting
//! transactions.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::Claims,
    database_id::DatabaseId,
    jobs::next_occurrence,
    pagination::{Paginated, PaginationQuery},
    transaction::{
        PaymentMethod, RecurringFilter, RecurringInterval, Transaction, TransactionStatus,
        TransactionType, TransactionUpdate, count_transactions, create_transaction,
        delete_transaction, delete_transactions, get_transaction, list_transactions,
        update_transaction,
    },
};

/// The request body for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct CreateTransaction {
    /// A short label for the transaction.
    pub title: String,
    /// Whether this is income or an expense.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The amount of money in cents. Must not be negative.
    pub amount: i64,
    /// The category the transaction belongs to.
    pub category: String,
    /// An optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// The transaction's effective date.
    pub date: Date,
    /// Whether this transaction repeats on a schedule.
    #[serde(default)]
    pub is_recurring: bool,
    /// How often the transaction repeats. Required when `is_recurring`.
    #[serde(default)]
    pub recurring_interval: Option<RecurringInterval>,
    /// The settlement state, defaulting to `COMPLETED`.
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    /// The payment method, defaulting to `CARD`.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// A route handler for creating a new transaction.
///
/// For recurring transactions the first due date is derived from the
/// transaction date; a date far enough in the past that the derived occurrence
/// is already due is advanced again from today, so backdated schedules do not
/// flood the next batch run.
///
/// # Errors
/// This function will return an error in a few situations.
/// - The amount is negative.
/// - The transaction is recurring but no interval was given.
/// - There was an unexpected SQL error.
pub async fn create_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateTransaction>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    if request.amount < 0 {
        return Err(Error::InvalidFieldValue(request.amount.to_string()));
    }

    let mut builder = Transaction::build(
        claims.user_id,
        &request.title,
        request.transaction_type,
        request.amount,
        &request.category,
        request.date,
    )
    .description(request.description);

    if let Some(status) = request.status {
        builder = builder.status(status);
    }
    if let Some(payment_method) = request.payment_method {
        builder = builder.payment_method(payment_method);
    }

    if request.is_recurring {
        let interval = request.recurring_interval.ok_or(Error::InvalidRecurrence)?;
        let today = OffsetDateTime::now_utc().date();

        let mut next_date = next_occurrence(request.date, Some(interval));
        if next_date <= today {
            next_date = next_occurrence(today, Some(interval));
        }

        builder = builder.recurring(interval, next_date);
    }

    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let transaction = create_transaction(builder, &connection)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// The filter parameters of a transaction list request.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct TransactionFilterQuery {
    /// `true` for only recurring rows, `false` for only one-off rows, absent
    /// for both.
    #[serde(default)]
    pub recurring: Option<bool>,
}

/// A route handler for listing a page of the user's transactions, most recent
/// first.
///
/// # Errors
/// Returns an error if there is an unexpected SQL error.
pub async fn get_transactions_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Query(pagination): Query<PaginationQuery>,
    Query(filter): Query<TransactionFilterQuery>,
) -> Result<Json<Paginated<Transaction>>, Error> {
    let pagination = pagination.clamped();
    let recurring_filter = match filter.recurring {
        None => RecurringFilter::All,
        Some(true) => RecurringFilter::Recurring,
        Some(false) => RecurringFilter::NonRecurring,
    };

    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let transactions = list_transactions(
        claims.user_id,
        recurring_filter,
        pagination.page,
        pagination.page_size,
        &connection,
    )?;
    let total = count_transactions(claims.user_id, recurring_filter, &connection)?;

    Ok(Json(Paginated::new(transactions, pagination, total)))
}

/// A route handler for fetching a single transaction owned by the user.
///
/// # Errors
/// Returns [Error::NotFound] if the ID does not refer to one of the user's
/// transactions.
pub async fn get_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(transaction_id): Path<DatabaseId>,
) -> Result<Json<Transaction>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let transaction = get_transaction(transaction_id, claims.user_id, &connection)?;

    Ok(Json(transaction))
}

/// A route handler for deleting a transaction owned by the user.
///
/// # Errors
/// Returns [Error::NotFound] if the ID does not refer to one of the user's
/// transactions.
pub async fn delete_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(transaction_id): Path<DatabaseId>,
) -> Result<StatusCode, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    delete_transaction(transaction_id, claims.user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// The request body for updating a transaction. Every field is optional;
/// absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTransaction {
    /// A short label for the transaction.
    #[serde(default)]
    pub title: Option<String>,
    /// Whether this is income or an expense.
    #[serde(default, rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// The amount of money in cents. Must not be negative.
    #[serde(default)]
    pub amount: Option<i64>,
    /// The category the transaction belongs to.
    #[serde(default)]
    pub category: Option<String>,
    /// A free-text description. `null` or absent keeps the stored one.
    #[serde(default)]
    pub description: Option<String>,
    /// The transaction's effective date.
    #[serde(default)]
    pub date: Option<Date>,
    /// Whether this transaction repeats on a schedule.
    #[serde(default)]
    pub is_recurring: Option<bool>,
    /// How often the transaction repeats.
    #[serde(default)]
    pub recurring_interval: Option<RecurringInterval>,
    /// The settlement state.
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    /// The payment method.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// A route handler for updating a transaction owned by the user.
///
/// Absent fields keep their stored values. Turning recurrence off clears the
/// schedule fields; turning it on, or changing the interval or date of a
/// recurring transaction, re-derives the next due date the same way creation
/// does. An unchanged recurring schedule keeps its stored due date.
///
/// # Errors
/// This function will return an error in a few situations.
/// - The ID does not refer to one of the user's transactions.
/// - The updated amount is negative.
/// - The update makes the transaction recurring without an interval.
/// - There was an unexpected SQL error.
pub async fn update_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(transaction_id): Path<DatabaseId>,
    Json(request): Json<UpdateTransaction>,
) -> Result<Json<Transaction>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let current = get_transaction(transaction_id, claims.user_id, &connection)?;

    let amount = request.amount.unwrap_or(current.amount);
    if amount < 0 {
        return Err(Error::InvalidFieldValue(amount.to_string()));
    }

    let date = request.date.unwrap_or(current.date);
    let is_recurring = request.is_recurring.unwrap_or(current.is_recurring);

    let (recurring_interval, next_recurring_date) = if is_recurring {
        let interval = request
            .recurring_interval
            .or(current.recurring_interval)
            .ok_or(Error::InvalidRecurrence)?;

        let schedule_unchanged = current.is_recurring
            && current.recurring_interval == Some(interval)
            && request.date.is_none();

        let next_date = if schedule_unchanged {
            current.next_recurring_date.unwrap_or_else(|| {
                derive_next_occurrence(date, interval, OffsetDateTime::now_utc().date())
            })
        } else {
            derive_next_occurrence(date, interval, OffsetDateTime::now_utc().date())
        };

        (Some(interval), Some(next_date))
    } else {
        (None, None)
    };

    let updated = update_transaction(
        transaction_id,
        claims.user_id,
        TransactionUpdate {
            title: request.title.unwrap_or(current.title),
            transaction_type: request.transaction_type.unwrap_or(current.transaction_type),
            amount,
            category: request.category.unwrap_or(current.category),
            description: request.description.or(current.description),
            date,
            recurring_interval,
            next_recurring_date,
            status: request.status.unwrap_or(current.status),
            payment_method: request.payment_method.unwrap_or(current.payment_method),
        },
        &connection,
    )?;

    Ok(Json(updated))
}

/// Derive the next due date from a transaction date, advancing once more from
/// today when the first derived occurrence is already due.
fn derive_next_occurrence(date: Date, interval: RecurringInterval, today: Date) -> Date {
    let next_date = next_occurrence(date, Some(interval));

    if next_date <= today {
        next_occurrence(today, Some(interval))
    } else {
        next_date
    }
}

/// The request body for deleting several transactions at once.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteTransactions {
    /// The IDs of the transactions to delete.
    pub transaction_ids: Vec<DatabaseId>,
}

/// How many rows a bulk delete removed.
#[derive(Debug, Serialize)]
pub struct BulkDeleteOutcome {
    /// The number of transactions that were deleted.
    pub deleted_count: u64,
}

/// A route handler for deleting several of the user's transactions at once.
///
/// IDs that do not refer to one of the user's transactions are skipped, so the
/// reported count may be smaller than the number of IDs submitted.
///
/// # Errors
/// Returns an error if there is an unexpected SQL error.
pub async fn bulk_delete_transactions_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<BulkDeleteTransactions>,
) -> Result<Json<BulkDeleteOutcome>, Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let deleted_count = delete_transactions(&request.transaction_ids, claims.user_id, &connection)?;

    Ok(Json(BulkDeleteOutcome { deleted_count }))
}

/// A route handler for creating a copy of a transaction owned by the user.
///
/// The copy carries every user-editable field of the source, including its
/// recurring schedule, and gets a fresh ID.
///
/// # Errors
/// Returns [Error::NotFound] if the ID does not refer to one of the user's
/// transactions.
pub async fn duplicate_transaction_endpoint(
    State(state): State<AppState>,
    claims: Claims,
    Path(transaction_id): Path<DatabaseId>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let connection = state.db_connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let source = get_transaction(transaction_id, claims.user_id, &connection)?;

    let mut builder = Transaction::build(
        claims.user_id,
        &source.title,
        source.transaction_type,
        source.amount,
        &source.category,
        source.date,
    )
    .description(source.description)
    .status(source.status)
    .payment_method(source.payment_method);

    if let (Some(interval), Some(next_date)) =
        (source.recurring_interval, source.next_recurring_date)
    {
        builder = builder.recurring(interval, next_date);
    }

    let copy = create_transaction(builder, &connection)?;

    Ok((StatusCode::CREATED, Json(copy)))
}

// ============================================================================
// TESTS
// ============================================================================
