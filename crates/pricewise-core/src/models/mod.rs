pub mod alias;
pub mod price;
pub mod product;
pub mod resolution;
pub mod stats;

pub use alias::*;
pub use price::*;
pub use product::*;
pub use resolution::*;
pub use stats::*;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the microsecond precision timestamps are stored with, so a
/// freshly built record compares equal to the row read back.
pub(crate) fn now() -> DateTime<Utc> {
    stored_precision(Utc::now())
}

pub(crate) fn stored_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}
