//! Settings that are fixed for the lifetime of the server.

use crate::CurrencyCode;

/// The default number of occurrences created when a recurring rule is added.
pub const DEFAULT_LOOKAHEAD_COUNT: u32 = 12;

/// How the ledger interprets dates and fills in omitted values.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// The canonical name of the user's time zone, e.g. "Pacific/Auckland".
    ///
    /// Month boundaries and recurring schedules follow this zone.
    pub local_timezone: String,

    /// The currency used when a transaction or rule does not name one.
    pub default_currency: CurrencyCode,

    /// How many occurrences to create up front for a new recurring rule.
    pub lookahead_count: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            local_timezone: "Etc/UTC".to_owned(),
            default_currency: CurrencyCode::default(),
            lookahead_count: DEFAULT_LOOKAHEAD_COUNT,
        }
    }
}
