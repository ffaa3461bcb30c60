//! Regex extraction over cleaned text.

use regex::{Captures, Regex};

use crate::{
    context::ItemContext,
    error::{Error, MessageExt as _, Result},
    filter::{trace_apply, Core, Filter},
    select::Selector,
    value::{snippet, NValue, Value},
};

use super::text::cleaned_text_of;

/// Which match of the pattern to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nth {
    /// The n-th match found by sequential search, 0-indexed; negative values
    /// count from the end (`-1` is the last match).
    Index(i64),
    /// Every match, each individually expanded, as an ordered list.
    All,
}

impl Nth {
    fn ordinal(self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Index(0) => "first".to_string(),
            Self::Index(n) if n < 0 => format!("{} from the end", ordinal(-n)),
            Self::Index(n) => ordinal(n + 1),
        }
    }
}

impl Default for Nth {
    fn default() -> Self {
        Self::Index(0)
    }
}

/// Readable match ordinals for diagnostics: 1 => "1st", 2 => "2nd", ...
fn ordinal(n: i64) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

type TemplateFn = Box<dyn Fn(&Captures<'_>) -> String + Send + Sync>;

/// How a match expands into the extracted string.
pub enum Template {
    /// A literal group-reference template in the `regex` crate's replacement
    /// syntax (`$1`, `${name}`).
    Literal(String),
    /// A callable applied to the captures.
    Func(TemplateFn),
}

impl From<&str> for Template {
    fn from(tpl: &str) -> Self {
        Self::Literal(tpl.to_string())
    }
}

impl From<String> for Template {
    fn from(tpl: String) -> Self {
        Self::Literal(tpl)
    }
}

/// Apply a regex to the cleaned selected text and extract a match.
///
/// Without a template, a match expands to its first participating capture
/// group (or the whole match when the pattern has none).
///
/// ```
/// # use pagesieve::{filters::{CleanText, Regexp}, Filter, ItemContext};
/// let html = scraper::Html::parse_document(
///     "<html><body><p>Date: <span>13/08/1988</span></p></body></html>",
/// );
/// let f = Regexp::new(CleanText::new("p"), r"Date: (\d+)/(\d+)/(\d+)")
///     .unwrap()
///     .with_template("$3-$2-$1");
/// let item = ItemContext::new(html.root_element());
/// assert_eq!(f.apply(&item).unwrap().try_unwrap::<String>().unwrap(), "1988-08-13");
/// ```
pub struct Regexp {
    core: Core,
    pattern: String,
    regex: Regex,
    template: Option<Template>,
    nth: Nth,
}

impl Regexp {
    /// Compiles `pattern` over the given selector.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `pattern` is not a valid regex.
    pub fn new(selector: impl Into<Selector>, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).with_msg(|| format!("invalid pattern `{pattern}`"))?;
        Ok(Self {
            core: Core::new(selector),
            pattern: pattern.to_string(),
            regex,
            template: None,
            nth: Nth::default(),
        })
    }

    /// Sets the default returned when no match is found.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }

    /// Sets the expansion template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<Template>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Expands each match through a callable instead of a literal template.
    #[must_use]
    pub fn with_template_fn<F>(mut self, func: F) -> Self
    where
        F: Fn(&Captures<'_>) -> String + Send + Sync + 'static,
    {
        self.template = Some(Template::Func(Box::new(func)));
        self
    }

    /// Selects which match to extract.
    #[must_use]
    pub fn with_nth(mut self, nth: Nth) -> Self {
        self.nth = nth;
        self
    }

    fn expand(&self, caps: &Captures<'_>) -> String {
        match &self.template {
            Some(Template::Literal(tpl)) => {
                let mut out = String::new();
                caps.expand(tpl, &mut out);
                out
            }
            Some(Template::Func(func)) => func(caps),
            None => caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
    }

    fn not_found(&self, txt: &str) -> Error {
        Error::RegexNotFound {
            pattern: self.pattern.clone(),
            ordinal: self.nth.ordinal(),
            input: snippet(txt, 120).into_owned(),
        }
    }
}

impl Filter for Regexp {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let selected = self.core.select(item)?;
        let Some(txt) = cleaned_text_of(selected) else {
            return self.core.default_or_raise(Error::parse(
                "unable to search a regex in no text".to_string(),
            ));
        };

        trace_apply("Regexp", self.core.sequence(), item, &txt);

        match self.nth {
            Nth::All => Ok(Value::List(
                self.regex
                    .captures_iter(&txt)
                    .map(|caps| Value::from(self.expand(&caps)))
                    .collect(),
            )),
            Nth::Index(n) => {
                let caps = if n >= 0 {
                    self.regex.captures_iter(&txt).nth(n as usize)
                } else {
                    // the source materialized and reversed the full match
                    // list for negative indices; same selected match, done
                    // here with a single collect
                    let all: Vec<_> = self.regex.captures_iter(&txt).collect();
                    all.into_iter().rev().nth((-n - 1) as usize)
                };

                match caps {
                    Some(caps) => Ok(Value::from(self.expand(&caps))),
                    None => self.core.default_or_raise(self.not_found(&txt)),
                }
            }
        }
    }

    fn kind(&self) -> &'static str {
        "Regexp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::CleanText;

    const DOC: &str = "<html><body><p>Date: <span>13/08/1988</span></p></body></html>";

    fn apply<'doc>(f: &dyn Filter, html: &'doc scraper::Html) -> Result<NValue<'doc>> {
        f.apply(&ItemContext::new(html.root_element()))
    }

    #[test]
    fn template_reorders_groups() {
        let html = scraper::Html::parse_document(DOC);
        let f = Regexp::new(CleanText::new("p"), r"Date: (\d+)/(\d+)/(\d+)")
            .unwrap()
            .with_template("$3-$2-$1");
        assert_eq!(apply(&f, &html).unwrap(), Value::from("1988-08-13"));
    }

    #[test]
    fn nth_selection() {
        let html = scraper::Html::parse_document(DOC);

        let first = Regexp::new(CleanText::new("body"), r"(\d+)").unwrap();
        assert_eq!(apply(&first, &html).unwrap(), Value::from("13"));

        let second = Regexp::new(CleanText::new("body"), r"(\d+)")
            .unwrap()
            .with_nth(Nth::Index(1));
        assert_eq!(apply(&second, &html).unwrap(), Value::from("08"));

        let last = Regexp::new(CleanText::new("body"), r"(\d+)")
            .unwrap()
            .with_nth(Nth::Index(-1));
        assert_eq!(apply(&last, &html).unwrap(), Value::from("1988"));

        let all = Regexp::new(CleanText::new("body"), r"(\d+)")
            .unwrap()
            .with_nth(Nth::All);
        assert_eq!(
            apply(&all, &html).unwrap(),
            Value::List(vec!["13".into(), "08".into(), "1988".into()])
        );
    }

    #[test]
    fn all_with_template() {
        let html = scraper::Html::parse_document(DOC);
        let f = Regexp::new(CleanText::new("body"), r"(\d+)")
            .unwrap()
            .with_template("[$1]")
            .with_nth(Nth::All);
        assert_eq!(
            apply(&f, &html).unwrap(),
            Value::List(vec!["[13]".into(), "[08]".into(), "[1988]".into()])
        );
    }

    #[test]
    fn template_fn() {
        let html = scraper::Html::parse_document(DOC);
        let f = Regexp::new(CleanText::new("body"), r"(\d+)/(\d+)")
            .unwrap()
            .with_template_fn(|caps| format!("{}.{}", &caps[2], &caps[1]));
        assert_eq!(apply(&f, &html).unwrap(), Value::from("08.13"));
    }

    #[test]
    fn miss_names_pattern_ordinal_and_input() {
        let html = scraper::Html::parse_document(DOC);
        let f = Regexp::new(CleanText::new("body"), r"(\d+)")
            .unwrap()
            .with_nth(Nth::Index(5));
        let err = apply(&f, &html).unwrap_err();
        assert_eq!(
            err.to_string(),
            r"unable to find 6th match of `(\d+)` in `Date: 13/08/1988`"
        );
    }

    #[test]
    fn miss_resolves_via_default_policy() {
        let html = scraper::Html::parse_document(DOC);
        let without = Regexp::new(CleanText::new("body"), r"[a-z]{20}").unwrap();
        assert!(apply(&without, &html).is_err());

        let with = Regexp::new(CleanText::new("body"), r"[a-z]{20}")
            .unwrap()
            .with_default(Value::Null);
        assert_eq!(apply(&with, &html).unwrap(), Value::Null);
    }

    #[test]
    fn no_groups_falls_back_to_whole_match() {
        let html = scraper::Html::parse_document(DOC);
        let f = Regexp::new(CleanText::new("body"), r"\d+/\d+/\d+").unwrap();
        assert_eq!(apply(&f, &html).unwrap(), Value::from("13/08/1988"));
    }
}
