//! The batch job that materializes due recurring transactions.

use std::sync::Mutex;

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    jobs::{JobOutcome, next_occurrence},
    transaction::{Transaction, advance_recurring_schedule, create_transaction, find_due_recurring},
};

/// Process every recurring transaction whose next occurrence is due at `now`.
///
/// For each due transaction, one new non-recurring transaction is created
/// dated at the due occurrence and the source's schedule is advanced. The two
/// writes are atomic: a failure on either rolls both back, leaves the record
/// due, and moves on to the next record.
///
/// # Errors
/// Returns an error only if the due-record query itself fails; per-record
/// failures are tallied in the returned [JobOutcome] instead.
pub fn process_recurring_transactions(
    db_connection: &Mutex<Connection>,
    now: OffsetDateTime,
) -> Result<JobOutcome, Error> {
    let connection = db_connection.lock().map_err(|_| Error::DatabaseLockError)?;

    let due = find_due_recurring(now.date(), &connection)?;
    tracing::info!("Starting recurring process");

    let outcome = process_due(&due, now, &connection);

    tracing::info!(
        "Processed {} recurring transactions out of {}.",
        outcome.processed,
        outcome.total
    );
    tracing::info!(
        "Failed {} recurring transactions out of {}.",
        outcome.failed,
        outcome.total
    );

    Ok(outcome)
}

/// Run the per-record step for a snapshot of due transactions.
fn process_due(due: &[Transaction], now: OffsetDateTime, connection: &Connection) -> JobOutcome {
    let mut outcome = JobOutcome::default();

    for source in due {
        outcome.total += 1;

        match materialize_occurrence(source, now, connection) {
            Ok(()) => outcome.processed += 1,
            Err(error) => {
                outcome.failed += 1;
                tracing::error!(
                    "Failed recurring transaction: ({}) - {}: {}",
                    source.title,
                    source.id,
                    error
                );
            }
        }
    }

    outcome
}

/// Create one occurrence of `source` and advance its schedule, atomically.
///
/// The schedule update is guarded by an affected-row check so a source row
/// that vanished (or stopped being recurring) since the due-record query rolls
/// the freshly inserted occurrence back instead of leaving an orphan.
fn materialize_occurrence(
    source: &Transaction,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    // The due-record query only returns rows with a next date, but the field
    // is optional on the model.
    let due_date = source.next_recurring_date.ok_or(Error::NotFound)?;
    let next_date = next_occurrence(due_date, source.recurring_interval);

    let transaction = connection.unchecked_transaction()?;

    create_transaction(
        Transaction::build(
            source.user_id,
            &format!("Recurring - {}", source.title),
            source.transaction_type,
            source.amount,
            &source.category,
            due_date,
        )
        .description(source.description.clone())
        .status(source.status)
        .payment_method(source.payment_method),
        &transaction,
    )?;
    advance_recurring_schedule(source.id, next_date, now, &transaction)?;

    transaction.commit()?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
