//! Text extraction and cleanup filters.

use scraper::ElementRef;
use unicode_normalization::UnicodeNormalization as _;

use crate::{
    context::ItemContext,
    error::Result,
    filter::{trace_apply, Core, Filter},
    parse_error,
    select::Selected,
    value::{NValue, Value},
};

/// Unicode normalization form applied at the end of cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Canonical composition (the default).
    Nfc,
    /// Canonical decomposition.
    Nfd,
    /// Compatibility composition (folds e.g. `…` to `...`).
    Nfkc,
    /// Compatibility decomposition.
    Nfkd,
}

impl Normalization {
    fn apply(self, txt: &str) -> String {
        match self {
            Self::Nfc => txt.nfc().collect(),
            Self::Nfd => txt.nfd().collect(),
            Self::Nfkc => txt.nfkc().collect(),
            Self::Nfkd => txt.nfkd().collect(),
        }
    }
}

/// Get a cleaned text from an element.
///
/// Concatenates the stripped text content of the selected nodes (descendant
/// text when `children` is enabled), collapses whitespace runs to single
/// spaces (including newlines when `newlines` is enabled, or per line when it
/// is not), strips the result, normalizes it to a standard Unicode form,
/// removes each configured symbol, and applies the configured literal
/// replacements in order.
///
/// Cleaning is idempotent: re-applying it to already-cleaned text yields the
/// same text.
///
/// ```
/// # use pagesieve::filters::CleanText;
/// assert_eq!(CleanText::clean("coucou ", true, None), "coucou");
/// assert_eq!(CleanText::clean("coucou\u{a0}coucou", true, None), "coucou coucou");
/// ```
pub struct CleanText {
    core: Core,
    symbols: String,
    replace: Vec<(String, String)>,
    children: bool,
    newlines: bool,
    normalize: Option<Normalization>,
}

impl CleanText {
    /// Creates the filter with default cleaning: descendant text, newline
    /// collapsing, and NFC normalization.
    #[must_use]
    pub fn new(selector: impl Into<crate::select::Selector>) -> Self {
        Self {
            core: Core::new(selector),
            symbols: String::new(),
            replace: Vec::new(),
            children: true,
            newlines: true,
            normalize: Some(Normalization::Nfc),
        }
    }

    /// Sets the default returned when cleaning fails.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }

    /// Literal symbols to remove from the cleaned text, one by one.
    #[must_use]
    pub fn with_symbols(mut self, symbols: impl Into<String>) -> Self {
        self.symbols = symbols.into();
        self
    }

    /// Ordered literal substring replacements applied after symbol removal.
    #[must_use]
    pub fn with_replace<B, A>(mut self, replace: impl IntoIterator<Item = (B, A)>) -> Self
    where
        B: Into<String>,
        A: Into<String>,
    {
        self.replace = replace
            .into_iter()
            .map(|(b, a)| (b.into(), a.into()))
            .collect();
        self
    }

    /// Whether descendant text is included (`true`, the default) or only the
    /// node's direct text.
    #[must_use]
    pub fn with_children(mut self, children: bool) -> Self {
        self.children = children;
        self
    }

    /// Whether newlines collapse into spaces (`true`, the default) or are
    /// preserved with each line cleaned independently.
    #[must_use]
    pub fn with_newlines(mut self, newlines: bool) -> Self {
        self.newlines = newlines;
        self
    }

    /// The Unicode normalization form, or `None` to skip normalization.
    #[must_use]
    pub fn with_normalize(mut self, normalize: Option<Normalization>) -> Self {
        self.normalize = normalize;
        self
    }

    /// Concatenates the stripped text parts of one node with single spaces:
    /// every descendant text node when `children` is set, otherwise only the
    /// node's direct text children.
    #[must_use]
    pub fn clean_node(el: ElementRef<'_>, children: bool) -> String {
        if children {
            el.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            el.children()
                .filter_map(|c| c.value().as_text().map(|t| t.trim()))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        }
    }

    /// Collapses whitespace runs to single spaces, strips, and normalizes.
    ///
    /// All Unicode whitespace variants (non-breaking space included) fold to
    /// a plain ASCII space.  When `newlines` is `false`, collapsing happens
    /// independently per line and the line structure is kept.
    #[must_use]
    pub fn clean(txt: &str, newlines: bool, normalize: Option<Normalization>) -> String {
        let txt = if newlines {
            txt.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            txt.lines()
                .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        };

        match normalize {
            Some(form) => form.apply(&txt),
            None => txt,
        }
    }

    fn remove(txt: &str, symbols: &str) -> String {
        let mut txt = txt.to_string();
        for symbol in symbols.chars() {
            txt = txt.replace(symbol, "");
        }
        txt.trim().to_string()
    }

    fn replace_all(txt: &str, replace: &[(String, String)]) -> String {
        let mut txt = txt.to_string();
        for (before, after) in replace {
            txt = txt.replace(before, after);
        }
        txt
    }

    fn filter_text(&self, txt: &str) -> String {
        let txt = Self::clean(txt, self.newlines, self.normalize);
        let txt = Self::remove(&txt, &self.symbols);
        Self::replace_all(&txt, &self.replace)
    }

    fn apply_selected<'doc>(&self, item: &ItemContext<'doc>, selected: Selected<'doc>) -> Result<NValue<'doc>> {
        let raw = match selected.try_into_nodes() {
            Ok(nodes) => nodes
                .into_iter()
                .map(|el| Self::clean_node(el, self.children))
                .collect::<Vec<_>>()
                .join(" "),
            Err(value) => match value.to_text() {
                Some(txt) => txt,
                None => {
                    return self
                        .core
                        .default_or_raise(parse_error!("unable to clean {value}"))
                }
            },
        };

        trace_apply("CleanText", self.core.sequence(), item, &raw);
        Ok(Value::String(self.filter_text(&raw).into()))
    }
}

impl Filter for CleanText {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let selected = self.core.select(item)?;
        self.apply_selected(item, selected)
    }

    fn kind(&self) -> &'static str {
        "CleanText"
    }
}

macro_rules! case_variant {
    ($(#[$attr:meta])* $name:ident, $kind:literal, $map:expr) => {
        $(#[$attr])*
        pub struct $name(CleanText);

        impl $name {
            #[must_use]
            pub fn new(selector: impl Into<crate::select::Selector>) -> Self {
                Self(CleanText::new(selector))
            }

            /// Sets the default returned when cleaning fails.
            #[must_use]
            pub fn with_default(self, default: impl Into<Value>) -> Self {
                Self(self.0.with_default(default))
            }
        }

        impl Filter for $name {
            fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
                match self.0.apply(item)? {
                    Value::String(s) => {
                        let mapped: fn(&str) -> String = $map;
                        Ok(Value::String(mapped(&s).into()))
                    }
                    other => Ok(other),
                }
            }

            fn kind(&self) -> &'static str {
                $kind
            }
        }
    };
}

case_variant!(
    /// [`CleanText`] lowercased.
    Lower,
    "Lower",
    |s| s.to_lowercase()
);

case_variant!(
    /// [`CleanText`] uppercased.
    Upper,
    "Upper",
    |s| s.to_uppercase()
);

case_variant!(
    /// [`CleanText`] with the first letter of each word uppercased and the
    /// rest lowercased.
    Capitalize,
    "Capitalize",
    title_case
);

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// The raw, uncleaned text of the selected node(s).
///
/// Direct text only by default; descendant text when `children` is enabled.
/// A node with no text resolves via the default policy.
pub struct RawText {
    core: Core,
    children: bool,
}

impl RawText {
    #[must_use]
    pub fn new(selector: impl Into<crate::select::Selector>) -> Self {
        Self {
            core: Core::new(selector),
            children: false,
        }
    }

    /// Sets the default returned when the node carries no text.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }

    /// Include descendant text instead of only the node's direct text.
    #[must_use]
    pub fn with_children(mut self, children: bool) -> Self {
        self.children = children;
        self
    }

    fn text_of(&self, el: ElementRef<'_>) -> String {
        if self.children {
            el.text().collect()
        } else {
            el.children()
                .filter_map(|c| c.value().as_text().map(|t| &**t))
                .collect()
        }
    }
}

impl Filter for RawText {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let selected = self.core.select(item)?;
        let txt = match selected.try_into_nodes() {
            Ok(nodes) => nodes
                .into_iter()
                .map(|el| self.text_of(el))
                .collect::<Vec<_>>()
                .join(" "),
            Err(Value::String(s)) => s.to_string(),
            Err(value) => {
                return self
                    .core
                    .default_or_raise(parse_error!("expected a node or string, got {value}"))
            }
        };

        if txt.is_empty() {
            return self
                .core
                .default_or_raise(parse_error!("selected node has no text"));
        }

        Ok(Value::String(txt.into()))
    }

    fn kind(&self) -> &'static str {
        "RawText"
    }
}

/// Default-settings cleaning for filters that consume text but are not
/// [`CleanText`] themselves (decimals, regexes, mappings): descendant text,
/// collapsed newlines, NFC.
///
/// Returns `None` for input that has no text rendering (null, mixed lists,
/// ...).
pub(crate) fn cleaned_text_of(selected: Selected<'_>) -> Option<String> {
    let raw = match selected.try_into_nodes() {
        Ok(nodes) => nodes
            .into_iter()
            .map(|el| CleanText::clean_node(el, true))
            .collect::<Vec<_>>()
            .join(" "),
        Err(value) => value.to_text()?,
    };
    Some(CleanText::clean(&raw, true, Some(Normalization::Nfc)))
}

/// The selected value when it is a numeric literal that should bypass text
/// cleanup entirely.
pub(crate) fn numeric_literal(selected: &Selected<'_>) -> Option<String> {
    match selected {
        Selected::Value(v @ (Value::Int(_) | Value::Float(_) | Value::Decimal(_))) => v.to_text(),
        _ => None,
    }
}
