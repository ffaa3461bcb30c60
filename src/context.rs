use std::{collections::BTreeMap, sync::Arc};

use crate::value::Value;

/// A reference to a parsed HTML element.
pub use scraper::ElementRef;

/// Header-name to column-index mapping for one table, built by the enclosing
/// table-parsing code and shared by every row's [`ItemContext`].
///
/// The matching policy between raw header markup and the names stored here is
/// owned by the caller; [`TableCell`](crate::filters::TableCell) only does
/// exact lookups against it.
#[derive(Debug, Clone, Default)]
pub struct Columns(BTreeMap<String, usize>);

impl Columns {
    /// Creates a new, empty column map.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` as the header of column `index`.  The first
    /// registration of a name wins.
    pub fn insert(&mut self, name: impl Into<String>, index: usize) {
        self.0.entry(name.into()).or_insert(index);
    }

    /// Returns the column index registered under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    /// Indexes a header row by the cleaned text of its `th`/`td` cells.
    ///
    /// Convenience for the common case where header names are usable as-is;
    /// callers with fancier alias policies build the map by hand.
    #[must_use]
    pub fn from_header_row(row: ElementRef<'_>) -> Self {
        use crate::filters::{CleanText, Normalization};

        let mut columns = Self::new();
        let cells = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| matches!(el.value().name(), "th" | "td"));
        for (index, cell) in cells.enumerate() {
            let name = CleanText::clean(
                &CleanText::clean_node(cell, true),
                true,
                Some(Normalization::Nfc),
            );
            if !name.is_empty() {
                columns.insert(name, index);
            }
        }
        columns
    }
}

/// Per-item state threaded through one extracted object's filters.
///
/// Holds the current document node, the caller-owned environment of named
/// values, the optional column map of the enclosing table, a diagnostic
/// label naming the owning page/object, and the explicit highlight flag for
/// the selection step's debug logging.
///
/// Created once per extracted object and discarded after; filters never
/// mutate it, so one context can be borrowed by a whole chain.
#[derive(Debug, Clone)]
pub struct ItemContext<'doc> {
    node: ElementRef<'doc>,
    env: BTreeMap<Arc<str>, Value>,
    columns: Option<Arc<Columns>>,
    label: Option<Arc<str>>,
    highlight: bool,
}

impl<'doc> ItemContext<'doc> {
    /// Creates a context rooted at `node` with an empty environment.
    #[must_use]
    pub fn new(node: ElementRef<'doc>) -> Self {
        Self {
            node,
            env: BTreeMap::new(),
            columns: None,
            label: None,
            highlight: false,
        }
    }

    /// Attaches a diagnostic label naming the owning page or object.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches the column map of the enclosing table.
    #[must_use]
    pub fn with_columns(mut self, columns: Arc<Columns>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Enables debug logging of matched nodes during selection.  Diagnostics
    /// only; never affects extraction semantics.
    #[must_use]
    pub fn with_highlight(mut self, highlight: bool) -> Self {
        self.highlight = highlight;
        self
    }

    /// The current document node.
    #[inline]
    #[must_use]
    pub fn node(&self) -> ElementRef<'doc> {
        self.node
    }

    /// The diagnostic label, if one was set.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The enclosing table's column map, if this item is a table row.
    #[must_use]
    pub fn columns(&self) -> Option<&Columns> {
        self.columns.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn highlight(&self) -> bool {
        self.highlight
    }

    /// Reads a named value from the environment.
    #[must_use]
    pub fn env_get(&self, name: &str) -> Option<&Value> {
        self.env.get(name)
    }

    /// Writes a named value into the environment, overwriting a previous
    /// value bound to that name if one is present.
    ///
    /// This is the caller's escape hatch for threading an intermediate result
    /// (e.g., a normalized date string computed by one step) into a later,
    /// independently declared step on the same item.
    pub fn env_set(&mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) {
        self.env.insert(name.into(), value.into());
    }

    /// A copy of this context rooted at a different node, sharing the same
    /// environment, columns, label, and highlight flag.
    ///
    /// Used by [`Base`](crate::filters::Base) to re-root a selection.
    #[must_use]
    pub fn rebased(&self, node: ElementRef<'doc>) -> Self {
        Self {
            node,
            env: self.env.clone(),
            columns: self.columns.clone(),
            label: self.label.clone(),
            highlight: self.highlight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_round_trip() {
        let html = scraper::Html::parse_fragment("<p>x</p>");
        let mut item = ItemContext::new(html.root_element());
        assert!(item.env_get("date").is_none());

        item.env_set("date", "1988-08-13");
        assert_eq!(item.env_get("date"), Some(&Value::from("1988-08-13")));

        item.env_set("date", "1989-01-01");
        assert_eq!(item.env_get("date"), Some(&Value::from("1989-01-01")));
    }

    #[test]
    fn columns_first_registration_wins() {
        let mut columns = Columns::new();
        columns.insert("Date", 0);
        columns.insert("Date", 3);
        assert_eq!(columns.get("Date"), Some(0));
        assert_eq!(columns.get("Label"), None);
    }

    #[test]
    fn columns_from_header_row() {
        let html = scraper::Html::parse_fragment(
            "<table><tr><th> Date </th><th>Libell\u{e9}\u{a0}</th><th>Amount</th></tr></table>",
        );
        let selector = scraper::Selector::parse("tr").unwrap();
        let row = html.select(&selector).next().unwrap();

        let columns = Columns::from_header_row(row);
        assert_eq!(columns.get("Date"), Some(0));
        assert_eq!(columns.get("Libell\u{e9}"), Some(1));
        assert_eq!(columns.get("Amount"), Some(2));
    }
}
