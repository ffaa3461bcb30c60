//! Table-column addressing.

use scraper::ElementRef;

use crate::{
    context::ItemContext,
    error::{Error, Result},
    filter::{default_or_raise, next_sequence, Filter},
    value::{NValue, Value},
};

/// Address a cell of the current table row by column header name.
///
/// The enclosing table construct builds a [`Columns`](crate::Columns) map and
/// attaches it to each row's [`ItemContext`]; this filter tries each
/// candidate name in order and returns the cell node(s) at the first resolved
/// column index.  Several aliases for the same header (`"Name"`, `"Label"`)
/// therefore address the same cell.
///
/// A known column whose cell is missing from a short row yields an empty
/// sequence, so downstream cleaning sees "no text" rather than an error; an
/// unknown column resolves via the default policy naming every candidate.
pub struct TableCell {
    names: Vec<String>,
    default: Option<Value>,
    support_th: bool,
    sequence: u64,
}

impl TableCell {
    #[must_use]
    pub fn new<N: Into<String>>(names: impl IntoIterator<Item = N>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            default: None,
            support_th: false,
            sequence: next_sequence(),
        }
    }

    /// Sets the default returned when no candidate column is known.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Also count `th` cells when addressing the row (for tables whose first
    /// column is a header cell).
    #[must_use]
    pub fn with_support_th(mut self, support_th: bool) -> Self {
        self.support_th = support_th;
        self
    }

    fn cell_at<'doc>(&self, row: ElementRef<'doc>, index: usize) -> Option<ElementRef<'doc>> {
        row.children()
            .filter_map(ElementRef::wrap)
            .filter(|el| {
                let name = el.value().name();
                name == "td" || (self.support_th && name == "th")
            })
            .nth(index)
    }
}

impl Filter for TableCell {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        if let Some(columns) = item.columns() {
            for name in &self.names {
                let Some(index) = columns.get(name) else {
                    continue;
                };
                let cells = match self.cell_at(item.node(), index) {
                    Some(cell) => vec![NValue::from(cell)],
                    None => Vec::new(),
                };
                tracing::trace!(
                    target: "pagesieve::filters",
                    seq = self.sequence,
                    label = item.label().unwrap_or(""),
                    "TableCell({name:?}) -> column {index}"
                );
                return Ok(Value::List(cells));
            }
        }

        default_or_raise(
            self.default.as_ref(),
            Error::ColumnNotFound {
                names: self.names.clone(),
            },
        )
    }

    fn kind(&self) -> &'static str {
        "TableCell"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filters::CleanText,
        Columns,
    };
    use std::sync::Arc;

    const TABLE: &str = r"
        <table>
          <thead>
            <tr><th>Date</th><th>Label</th><th>Amount</th></tr>
          </thead>
          <tbody>
            <tr><td>13/08/1988</td><td>GROCERIES</td><td>-15.00</td></tr>
          </tbody>
        </table>
    ";

    fn row_context(html: &scraper::Html) -> ItemContext<'_> {
        let head = scraper::Selector::parse("thead tr").unwrap();
        let columns = Arc::new(Columns::from_header_row(html.select(&head).next().unwrap()));

        let body = scraper::Selector::parse("tbody tr").unwrap();
        ItemContext::new(html.select(&body).next().unwrap()).with_columns(columns)
    }

    #[test]
    fn addresses_cell_by_header_name() {
        let html = scraper::Html::parse_document(TABLE);
        let item = row_context(&html);

        let f = CleanText::new(TableCell::new(["Label"]));
        assert_eq!(f.apply(&item).unwrap(), Value::from("GROCERIES"));
    }

    #[test]
    fn aliases_address_the_same_cell() {
        let html = scraper::Html::parse_document(TABLE);
        let item = row_context(&html);

        for names in [vec!["Label"], vec!["Name", "Label"], vec!["Label", "Name"]] {
            let f = CleanText::new(TableCell::new(names));
            assert_eq!(f.apply(&item).unwrap(), Value::from("GROCERIES"));
        }
    }

    #[test]
    fn unknown_column_names_every_candidate() {
        let html = scraper::Html::parse_document(TABLE);
        let item = row_context(&html);

        let err = TableCell::new(["Balance", "Solde"]).apply(&item).unwrap_err();
        assert_eq!(err.to_string(), "unable to find column Balance or Solde");

        let with_default = TableCell::new(["Balance"]).with_default(Value::Null);
        assert_eq!(with_default.apply(&item).unwrap(), Value::Null);
    }

    #[test]
    fn missing_cell_in_short_row_is_an_empty_sequence() {
        let html = scraper::Html::parse_document(
            r"<table>
                <thead><tr><th>A</th><th>B</th></tr></thead>
                <tbody><tr><td>only</td></tr></tbody>
              </table>",
        );
        let item = row_context(&html);

        assert_eq!(
            TableCell::new(["B"]).apply(&item).unwrap(),
            Value::List(vec![])
        );
    }

    #[test]
    fn no_table_context_resolves_via_default_policy() {
        let html = scraper::Html::parse_document(TABLE);
        let item = ItemContext::new(html.root_element());
        assert!(TableCell::new(["Date"]).apply(&item).is_err());
    }
}
