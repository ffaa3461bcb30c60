use scraper::ElementRef;

use crate::{
    context::ItemContext,
    error::{Error, Result},
    filter::Filter,
    value::{snippet, NValue, Node, Value},
};

/// A callable selector, invoked with the current document node.
pub type NodeFn = Box<dyn for<'doc> Fn(ElementRef<'doc>) -> NValue<'doc> + Send + Sync>;

/// The input specification of a filter: how to get the raw value the filter
/// will transform.
///
/// A tagged sum with explicit dispatch in [`Selector::select`], instead of
/// duck-typing on "is it string-like or callable".
pub enum Selector {
    /// A CSS path expression, matched over the descendants of the current
    /// node.  Yields the ordered sequence of matches, possibly empty.
    Css(CssSelector),
    /// Another filter, evaluated against the same item.  This is how chains
    /// compose: the outer filter's selector is the inner filter, evaluated
    /// innermost-first.
    Nested(Box<dyn Filter>),
    /// A plain callable, invoked with the current document node.
    Func(NodeFn),
    /// A literal value, passed through unchanged.
    Literal(Value),
}

/// A CSS path expression, compiled at construction.  Invalid selector text is
/// kept and surfaces as a parse error when the filter is applied, so building
/// a filter never panics.
pub struct CssSelector {
    raw: String,
    compiled: Result<scraper::Selector>,
}

impl CssSelector {
    fn parse(raw: &str) -> Self {
        let compiled = scraper::Selector::parse(raw)
            .map_err(|e| Error::parse(format!("invalid selector `{raw}`: {e}")));
        Self {
            raw: raw.to_string(),
            compiled,
        }
    }

    /// The selector source text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl From<&str> for Selector {
    fn from(raw: &str) -> Self {
        Self::Css(CssSelector::parse(raw))
    }
}

impl From<String> for Selector {
    fn from(raw: String) -> Self {
        Self::Css(CssSelector::parse(&raw))
    }
}

impl From<Box<dyn Filter>> for Selector {
    fn from(filter: Box<dyn Filter>) -> Self {
        Self::Nested(filter)
    }
}

impl From<NodeFn> for Selector {
    fn from(func: NodeFn) -> Self {
        Self::Func(func)
    }
}

impl From<Value> for Selector {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl Selector {
    /// A literal selector from anything convertible to an owned [`Value`].
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// A callable selector from a closure over the document node.
    #[must_use]
    pub fn func<F>(func: F) -> Self
    where
        F: for<'doc> Fn(ElementRef<'doc>) -> NValue<'doc> + Send + Sync + 'static,
    {
        Self::Func(Box::new(func))
    }

    /// A short rendering of this selector for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Css(css) => css.raw().to_string(),
            Self::Nested(filter) => filter.kind().to_string(),
            Self::Func(_) => "<callable>".to_string(),
            Self::Literal(value) => value.to_string(),
        }
    }

    /// Run the selection step against `item`.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if this is a [`Selector::Css`] with invalid selector
    /// text, or a [`Selector::Nested`] whose inner filter fails.
    pub fn select<'doc>(&self, item: &ItemContext<'doc>) -> Result<Selected<'doc>> {
        match self {
            Self::Css(css) => {
                let compiled = match &css.compiled {
                    Ok(compiled) => compiled,
                    Err(e) => return Err(Error::parse(e.to_string())),
                };
                let nodes: Vec<_> = item.node().select(compiled).collect();
                highlight(item, css.raw(), &nodes);
                Ok(Selected::Nodes(nodes))
            }
            Self::Nested(filter) => filter.apply(item).map(Selected::Value),
            Self::Func(func) => Ok(Selected::Value(func(item.node()))),
            Self::Literal(value) => Ok(Selected::Value(Value::from_data(value.clone()))),
        }
    }
}

/// Log matched nodes when the item's highlight flag is set.  Diagnostics
/// only; never affects extraction semantics.
fn highlight(item: &ItemContext<'_>, raw: &str, nodes: &[ElementRef<'_>]) {
    if !item.highlight() {
        return;
    }
    for el in nodes {
        tracing::debug!(
            target: "pagesieve::select",
            label = item.label().unwrap_or(""),
            selector = raw,
            "matched `{}`",
            snippet(&el.html(), 120)
        );
    }
}

/// The outcome of the selection step: either an ordered sequence of document
/// nodes (from a path expression) or an already-produced value (from a nested
/// filter, callable, or literal).
#[derive(Debug)]
pub enum Selected<'doc> {
    /// Ordered sequence of matched nodes, possibly empty.
    Nodes(Vec<ElementRef<'doc>>),
    /// A plain value.
    Value(NValue<'doc>),
}

impl<'doc> Selected<'doc> {
    /// View this selection as a node sequence if it is one: direct matches, a
    /// single node value, or a list made only of nodes.  Otherwise gives the
    /// value back.
    ///
    /// # Errors
    ///
    /// Returns `Err` with the original value when it is not node-shaped.
    pub fn try_into_nodes(self) -> core::result::Result<Vec<ElementRef<'doc>>, NValue<'doc>> {
        match self {
            Self::Nodes(nodes) => Ok(nodes),
            Self::Value(Value::Extra(Node::Element(el))) => Ok(vec![el]),
            Self::Value(Value::List(items)) => {
                if items
                    .iter()
                    .all(|v| matches!(v, Value::Extra(Node::Element(_))))
                {
                    Ok(items
                        .into_iter()
                        .map(|v| match v {
                            Value::Extra(Node::Element(el)) => el,
                            _ => unreachable!(),
                        })
                        .collect())
                } else {
                    Err(Value::List(items))
                }
            }
            Self::Value(value) => Err(value),
        }
    }

    /// Collapse this selection into a value: node sequences become lists of
    /// node values.
    #[must_use]
    pub fn into_value(self) -> NValue<'doc> {
        match self {
            Self::Nodes(mut nodes) => {
                if nodes.len() == 1 {
                    nodes.remove(0).into()
                } else {
                    Value::List(nodes.into_iter().map(NValue::from).collect())
                }
            }
            Self::Value(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_passes_through() {
        let html = scraper::Html::parse_fragment("<p>x</p>");
        let item = ItemContext::new(html.root_element());

        let selector = Selector::literal(42i64);
        let Selected::Value(v) = selector.select(&item).unwrap() else {
            panic!("expected a value");
        };
        assert_eq!(v, Value::Int(42));
    }

    #[test]
    fn func_receives_the_document_node() {
        let html = scraper::Html::parse_fragment("<p id=\"a\">x</p>");
        let item = ItemContext::new(html.root_element());

        let selector = Selector::func(|el| {
            Value::from(el.select(&scraper::Selector::parse("p").unwrap()).count() as i64)
        });
        let Selected::Value(v) = selector.select(&item).unwrap() else {
            panic!("expected a value");
        };
        assert_eq!(v, Value::Int(1));
    }

    #[test]
    fn invalid_css_surfaces_at_apply_time() {
        let html = scraper::Html::parse_fragment("<p>x</p>");
        let item = ItemContext::new(html.root_element());

        let selector = Selector::from("p:!!nope");
        let err = selector.select(&item).unwrap_err();
        assert!(err.to_string().contains("invalid selector"));
    }

    #[test]
    fn css_returns_ordered_matches() {
        let html = scraper::Html::parse_fragment("<ul><li>a</li><li>b</li></ul>");
        let item = ItemContext::new(html.root_element());

        let nodes = Selector::from("li")
            .select(&item)
            .unwrap()
            .try_into_nodes()
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].inner_html(), "a");
        assert_eq!(nodes[1].inner_html(), "b");
    }
}
