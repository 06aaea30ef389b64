//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Calendar, CurrencyCode, Error, config::LedgerConfig, db::initialize,
    recurring::CatchUpRunner,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The user's time zone, used for all calendar arithmetic.
    pub calendar: Calendar,

    /// The currency used when a request does not name one.
    pub default_currency: CurrencyCode,

    /// How many occurrences to create up front for a new recurring rule.
    pub lookahead_count: u32,

    /// Materializes due recurring rules, shared so that only one pass runs at a time.
    pub catch_up: CatchUpRunner,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the time zone in `config` is not a valid, canonical
    /// time zone name or if the database cannot be initialized.
    pub fn new(db_connection: Connection, config: &LedgerConfig) -> Result<Self, Error> {
        let calendar = Calendar::new(&config.local_timezone)?;

        initialize(&db_connection)?;

        let db_connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            catch_up: CatchUpRunner::new(db_connection.clone(), calendar.clone()),
            db_connection,
            calendar,
            default_currency: config.default_currency.clone(),
            lookahead_count: config.lookahead_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::{Error, config::LedgerConfig};

    use super::AppState;

    #[test]
    fn rejects_unknown_timezone() {
        let config = LedgerConfig {
            local_timezone: "Mars/Olympus_Mons".to_owned(),
            ..Default::default()
        };

        let result = AppState::new(Connection::open_in_memory().unwrap(), &config);

        assert!(matches!(result, Err(Error::InvalidTimezoneError(_))));
    }
}
