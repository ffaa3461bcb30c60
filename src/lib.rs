#![forbid(unsafe_code)]
//! Declarative extraction of typed values from parsed HTML.
//!
//! A [`Filter`] is one step of an extraction pipeline: it selects a raw value
//! from the current item (a CSS path, a nested filter, a callable, or a
//! literal — see [`Selector`]) and transforms it into a typed [`Value`].
//! Filters are plain configuration values declared once and applied to many
//! items; all per-item state lives on the caller-built [`ItemContext`].
//!
//! Chains compose by nesting: the selector of an outer filter can be an
//! inner filter, evaluated innermost-first.
//!
//! ```
//! use pagesieve::{filters::{CleanText, Regexp}, Filter, ItemContext};
//!
//! let html = scraper::Html::parse_document(
//!     "<html><body><p>Date: <span>13/08/1988</span></p></body></html>",
//! );
//! let year = Regexp::new(CleanText::new("p"), r"(\d{4})")?;
//!
//! let item = ItemContext::new(html.root_element());
//! assert_eq!(year.apply(&item)?.try_unwrap::<String>()?, "1988");
//! # Ok::<(), pagesieve::Error>(())
//! ```
//!
//! Every filter can carry a default: with one, any failure of that filter
//! resolves silently to the default; without one, the failure surfaces as a
//! typed [`Error`] naming the selector, column, pattern, or key involved.

#[macro_use]
mod error;

mod context;
mod filter;
mod select;
mod value;

pub mod filters;

pub use context::{Columns, ItemContext};
pub use error::{Error, MessageExt, Result};
pub use filter::Filter;
pub use scraper::ElementRef;
pub use select::{CssSelector, NodeFn, Selected, Selector};
pub use value::{Data, NValue, Node, TryFromValue, Value};
