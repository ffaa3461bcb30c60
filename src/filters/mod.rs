//! The built-in filter library.
//!
//! Every filter here implements [`Filter`](crate::Filter) and converts into a
//! [`Selector`](crate::Selector), so filters nest directly: the selector of
//! an outer filter can be an inner filter, and a chain evaluates
//! innermost-first.

mod combine;
mod date;
mod env;
mod number;
mod regex;
mod table;
mod text;

pub use combine::{Eval, Format, Join, Map};
pub use date::{parse_date_text, CombineDate, Date, DateTime, Time};
pub use env::{Base, Env};
pub use number::{CleanDecimal, Convert, ReplaceDots, Sign};
pub use regex::{Nth, Regexp, Template};
pub use table::TableCell;
pub use text::{Capitalize, CleanText, Lower, Normalization, RawText, Upper};

macro_rules! impl_into_selector {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<$name> for $crate::select::Selector {
                fn from(filter: $name) -> Self {
                    Self::Nested(Box::new(filter))
                }
            }
        )*
    };
}

impl_into_selector! {
    Base,
    Capitalize,
    CleanDecimal,
    CleanText,
    CombineDate,
    Convert,
    Date,
    DateTime,
    Env,
    Eval,
    Format,
    Join,
    Lower,
    Map,
    RawText,
    Regexp,
    TableCell,
    Time,
    Upper,
}
