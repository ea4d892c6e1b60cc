//! Transactions: the core models, their database queries, and route handlers.

mod core;
mod endpoints;

pub use core::{
    PaymentMethod, RecurringFilter, RecurringInterval, Transaction, TransactionBuilder,
    TransactionStatus, TransactionType, TransactionUpdate, advance_recurring_schedule,
    count_transactions, create_transaction, create_transaction_table, delete_transaction,
    delete_transactions, find_due_recurring, get_transaction, list_transactions,
    map_transaction_row, update_transaction,
};
pub use endpoints::{
    BulkDeleteOutcome, BulkDeleteTransactions, CreateTransaction, TransactionFilterQuery,
    UpdateTransaction, bulk_delete_transactions_endpoint, create_transaction_endpoint,
    delete_transaction_endpoint, duplicate_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint, update_transaction_endpoint,
};
