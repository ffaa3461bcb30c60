//! Context-reading filters: the item environment and selection re-rooting.

use std::sync::Arc;

use crate::{
    context::ItemContext,
    error::{Error, Result},
    filter::{default_or_raise, next_sequence, Core, Filter},
    select::Selector,
    value::{NValue, Value},
};

/// Read a named value from the item environment.
///
/// The environment is written by the caller between extraction steps; this is
/// the escape hatch that threads an intermediate result (a normalized date
/// string, a page parameter) into a later, independently declared step on the
/// same item.  A missing name resolves via the default policy.
pub struct Env {
    name: Arc<str>,
    default: Option<Value>,
    sequence: u64,
}

impl Env {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            default: None,
            sequence: next_sequence(),
        }
    }

    /// Sets the default returned when the name is missing.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Env {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        tracing::trace!(
            target: "pagesieve::filters",
            seq = self.sequence,
            label = item.label().unwrap_or(""),
            "Env({:?})",
            self.name
        );
        match item.env_get(&self.name) {
            Some(value) => Ok(Value::from_data(value.clone())),
            None => default_or_raise(
                self.default.as_ref(),
                Error::EnvNotFound {
                    name: self.name.to_string(),
                },
            ),
        }
    }

    fn kind(&self) -> &'static str {
        "Env"
    }
}

/// Change the base element used by a selector.
///
/// The `base` selector picks a node; the main selector then runs against a
/// context re-rooted there.  The raw selection result is returned so an
/// enclosing filter can consume it like any other selector.
pub struct Base {
    base: Selector,
    core: Core,
}

impl Base {
    #[must_use]
    pub fn new(base: impl Into<Selector>, selector: impl Into<Selector>) -> Self {
        Self {
            base: base.into(),
            core: Core::new(selector),
        }
    }

    /// Sets the default returned when the base node is missing.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }
}

impl Filter for Base {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let node = match self.base.select(item)?.try_into_nodes() {
            Ok(nodes) if !nodes.is_empty() => nodes[0],
            _ => {
                return self.core.default_or_raise(Error::ElementNotFound {
                    selector: self.base.describe(),
                })
            }
        };

        let rebased = item.rebased(node);
        Ok(self.core.select(&rebased)?.into_value())
    }

    fn kind(&self) -> &'static str {
        "Base"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::CleanText;

    #[test]
    fn env_reads_and_misses() {
        let html = scraper::Html::parse_fragment("<p>x</p>");
        let mut item = ItemContext::new(html.root_element());
        item.env_set("page", 3i64);

        assert_eq!(Env::new("page").apply(&item).unwrap(), Value::Int(3));

        let err = Env::new("missing").apply(&item).unwrap_err();
        assert_eq!(err.to_string(), "environment value `missing` not found");

        assert_eq!(
            Env::new("missing").with_default(Value::Null).apply(&item).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn env_feeds_a_later_step() {
        let html = scraper::Html::parse_fragment("<p>x</p>");
        let mut item = ItemContext::new(html.root_element());
        item.env_set("amount", "1 234,56");

        let f = crate::filters::CleanDecimal::new(Env::new("amount"))
            .with_replace_dots(crate::filters::ReplaceDots::French);
        assert_eq!(
            f.apply(&item).unwrap(),
            Value::Decimal("1234.56".parse().unwrap())
        );
    }

    #[test]
    fn base_re_roots_the_selection() {
        let html = scraper::Html::parse_document(
            r#"<div id="header"><h1> Title </h1></div><div id="body"><h1>Other</h1></div>"#,
        );
        let item = ItemContext::new(html.root_element());

        let f = CleanText::new(Base::new("div#header", "h1"));
        assert_eq!(f.apply(&item).unwrap(), Value::from("Title"));
    }

    #[test]
    fn base_missing_node_resolves_via_default_policy() {
        let html = scraper::Html::parse_fragment("<p>x</p>");
        let item = ItemContext::new(html.root_element());

        assert!(Base::new("article", "h1").apply(&item).is_err());
        assert_eq!(
            Base::new("article", "h1")
                .with_default("")
                .apply(&item)
                .unwrap(),
            Value::from("")
        );
    }
}
