//! Database initialization and shared persistence helpers.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::Error;

/// Create the tables for the domain models if they do not exist.
///
/// Table creation runs inside one exclusive transaction so a crashed start-up
/// never leaves a partial schema behind.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    crate::user::create_user_table(&transaction)?;
    crate::transaction::create_transaction_table(&transaction)?;
    crate::report::create_report_tables(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Implements the canonical TEXT representation of a field enum: `as_str`,
/// `Display`, `FromStr` and the rusqlite `ToSql`/`FromSql` pair.
///
/// The `FromStr` error is the crate [Error](crate::Error) variant given as the
/// second argument, carrying the offending text.
macro_rules! text_enum {
    ($type:ty, $error:path, [$(($variant:path, $text:literal)),+ $(,)?]) => {
        impl $type {
            /// The canonical wire/database spelling of the variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $type {
            type Err = $crate::Error;

            fn from_str(text: &str) -> Result<Self, Self::Err> {
                match text {
                    $($text => Ok($variant),)+
                    _ => Err($error(text.to_owned())),
                }
            }
        }

        impl rusqlite::types::ToSql for $type {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl rusqlite::types::FromSql for $type {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value.as_str().and_then(|text| {
                    text.parse().map_err(|error: $crate::Error| {
                        rusqlite::types::FromSqlError::Other(Box::new(error))
                    })
                })
            }
        }
    };
}

pub(crate) use text_enum;
