//! Locale-aware numeric parsing.

use std::str::FromStr as _;

use rust_decimal::Decimal;

use crate::{
    context::ItemContext,
    error::Result,
    filter::{trace_apply, Core, Filter},
    parse_error,
    select::Selector,
    value::{NValue, Value},
};

use super::text::{cleaned_text_of, numeric_literal};

/// How thousands and decimal separators are handled before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceDots {
    /// Only `.` is a decimal separator (the default).
    #[default]
    Off,
    /// `,` is the decimal separator and `.` a thousands separator to strip
    /// (the French convention, as in `4 115,00`).
    French,
    /// An explicit pair: strip the first, then map the second to `.`.
    ///
    /// For the UK style (`1,234,567.89`), use
    /// `ReplaceDots::Separators { thousands: ',', decimal: '.' }`.
    Separators {
        thousands: char,
        decimal: char,
    },
}

/// The sign a [`CleanDecimal`] sign function derives from the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

type SignFn = Box<dyn Fn(&str) -> Sign + Send + Sync>;

/// Get a cleaned [`Decimal`] value from an element.
///
/// The selected text is cleaned first (descendant text, collapsed whitespace,
/// NFC), separators are normalized per [`ReplaceDots`], every character
/// outside `[0-9.-]` is stripped, and the remainder is parsed as an exact
/// decimal.  Numeric literal inputs are stringified and parsed the same way;
/// empty input resolves via the default policy, never as zero.
///
/// An optional sign function sees the *pre-stripped* cleaned text and may
/// flip the sign of the parsed magnitude (e.g., a trailing debit marker).
pub struct CleanDecimal {
    core: Core,
    replace_dots: ReplaceDots,
    sign: Option<SignFn>,
}

impl CleanDecimal {
    #[must_use]
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self {
            core: Core::new(selector),
            replace_dots: ReplaceDots::Off,
            sign: None,
        }
    }

    /// Sets the default returned when parsing fails.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }

    /// Sets the separator convention.
    #[must_use]
    pub fn with_replace_dots(mut self, replace_dots: ReplaceDots) -> Self {
        self.replace_dots = replace_dots;
        self
    }

    /// Derives the sign from the cleaned, pre-stripped text.
    #[must_use]
    pub fn with_sign<F>(mut self, sign: F) -> Self
    where
        F: Fn(&str) -> Sign + Send + Sync + 'static,
    {
        self.sign = Some(Box::new(sign));
        self
    }

    fn normalize_separators(&self, txt: &str) -> String {
        let (thousands, decimal) = match self.replace_dots {
            ReplaceDots::Off => return txt.to_string(),
            ReplaceDots::French => ('.', ','),
            ReplaceDots::Separators { thousands, decimal } => (thousands, decimal),
        };
        txt.replace(thousands, "").replace(decimal, ".")
    }
}

impl Filter for CleanDecimal {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let selected = self.core.select(item)?;

        let cleaned = match numeric_literal(&selected) {
            Some(literal) => literal,
            None => match cleaned_text_of(selected) {
                Some(txt) => txt,
                None => {
                    return self
                        .core
                        .default_or_raise(parse_error!("unable to parse a decimal from no text"))
                }
            },
        };

        trace_apply("CleanDecimal", self.core.sequence(), item, &cleaned);

        if cleaned.is_empty() {
            return self
                .core
                .default_or_raise(parse_error!("unable to parse a decimal from empty text"));
        }

        let normalized = self.normalize_separators(&cleaned);
        let stripped: String = normalized
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '.'))
            .collect();

        match Decimal::from_str(&stripped) {
            Ok(v) => {
                let v = match self.sign.as_deref() {
                    Some(sign) if sign(&cleaned) == Sign::Negative => -v,
                    _ => v,
                };
                Ok(Value::Decimal(v))
            }
            Err(e) => self
                .core
                .default_or_raise(parse_error!(@e, "unable to parse a decimal from `{cleaned}`")),
        }
    }

    fn kind(&self) -> &'static str {
        "CleanDecimal"
    }
}

type ConvertFn = Box<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// Get a cleaned value of any type from an element's text, through a caller
/// conversion function.
///
/// By default empty text is not converted and resolves via the default
/// policy; a different minimum length can be set, or the guard disabled
/// entirely with `with_min_len(None)`.
pub struct Convert {
    core: Core,
    func: ConvertFn,
    min_len: Option<usize>,
}

impl Convert {
    #[must_use]
    pub fn new<F>(selector: impl Into<Selector>, func: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            core: Core::new(selector),
            func: Box::new(func),
            min_len: Some(0),
        }
    }

    /// Sets the default returned when conversion fails.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }

    /// Text at most this long resolves via the default policy instead of
    /// being converted; `None` disables the guard.
    #[must_use]
    pub fn with_min_len(mut self, min_len: Option<usize>) -> Self {
        self.min_len = min_len;
        self
    }
}

impl Filter for Convert {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let selected = self.core.select(item)?;
        let Some(txt) = cleaned_text_of(selected) else {
            return self
                .core
                .default_or_raise(parse_error!("unable to convert from no text"));
        };

        if let Some(min_len) = self.min_len {
            if txt.chars().count() <= min_len {
                return self
                    .core
                    .default_or_raise(parse_error!("unable to convert `{txt}`: too short"));
            }
        }

        match (self.func)(&txt) {
            Ok(v) => Ok(Value::from_data(v)),
            Err(e) => self.core.default_or_raise(e),
        }
    }

    fn kind(&self) -> &'static str {
        "Convert"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn apply<'doc>(f: &dyn Filter, html: &'doc scraper::Html) -> Result<NValue<'doc>> {
        f.apply(&ItemContext::new(html.root_element()))
    }

    #[test]
    fn plain_dot_decimal() {
        let html = scraper::Html::parse_fragment("<td>229.90</td>");
        let f = CleanDecimal::new("td");
        assert_eq!(apply(&f, &html).unwrap(), Value::Decimal(dec("229.90")));
    }

    #[test]
    fn french_convention() {
        let html = scraper::Html::parse_fragment("<td>4\u{a0}115,00</td>");
        let f = CleanDecimal::new("td").with_replace_dots(ReplaceDots::French);
        assert_eq!(apply(&f, &html).unwrap(), Value::Decimal(dec("4115.00")));
    }

    #[test]
    fn explicit_separator_pair() {
        let html = scraper::Html::parse_fragment("<td>1,234,567.89</td>");
        let f = CleanDecimal::new("td").with_replace_dots(ReplaceDots::Separators {
            thousands: ',',
            decimal: '.',
        });
        assert_eq!(apply(&f, &html).unwrap(), Value::Decimal(dec("1234567.89")));
    }

    #[test]
    fn currency_symbols_are_stripped() {
        let html = scraper::Html::parse_fragment("<td>\u{20ac} 1 234,56</td>");
        let f = CleanDecimal::new("td").with_replace_dots(ReplaceDots::French);
        assert_eq!(apply(&f, &html).unwrap(), Value::Decimal(dec("1234.56")));
    }

    #[test]
    fn sign_function_sees_pre_stripped_text() {
        let html = scraper::Html::parse_fragment("<td>15,00 DB</td>");
        let f = CleanDecimal::new("td")
            .with_replace_dots(ReplaceDots::French)
            .with_sign(|txt| {
                if txt.ends_with("DB") {
                    Sign::Negative
                } else {
                    Sign::Positive
                }
            });
        assert_eq!(apply(&f, &html).unwrap(), Value::Decimal(dec("-15.00")));
    }

    #[test]
    fn numeric_literal_input() {
        let html = scraper::Html::parse_fragment("<p>x</p>");
        let f = CleanDecimal::new(Selector::literal(42i64));
        assert_eq!(apply(&f, &html).unwrap(), Value::Decimal(dec("42")));
    }

    #[test]
    fn empty_is_never_zero() {
        let html = scraper::Html::parse_fragment("<td></td>");
        assert!(apply(&CleanDecimal::new("td"), &html).is_err());

        let with_default = CleanDecimal::new("td").with_default(Value::Null);
        assert_eq!(apply(&with_default, &html).unwrap(), Value::Null);
    }

    #[test]
    fn unparsable_resolves_via_default_policy() {
        let html = scraper::Html::parse_fragment("<td>--</td>");
        assert!(apply(&CleanDecimal::new("td"), &html).is_err());

        let with_default = CleanDecimal::new("td").with_default(Value::Decimal(dec("0.00")));
        assert_eq!(
            apply(&with_default, &html).unwrap(),
            Value::Decimal(dec("0.00"))
        );
    }

    #[test]
    fn convert_parses_through_caller_function() {
        let html = scraper::Html::parse_fragment("<td>42</td>");
        let f = Convert::new("td", |txt| {
            txt.parse::<i64>()
                .map(Value::Int)
                .map_err(|e| crate::parse_error!(@e, "unable to parse `{txt}` as an integer"))
        });
        assert_eq!(apply(&f, &html).unwrap(), Value::Int(42));
    }

    #[test]
    fn convert_min_len_guard() {
        let html = scraper::Html::parse_fragment("<td></td>");
        let f = Convert::new("td", |txt| Ok(Value::from(txt))).with_default("fallback");
        assert_eq!(apply(&f, &html).unwrap(), Value::from("fallback"));

        let unguarded =
            Convert::new("td", |txt| Ok(Value::from(txt))).with_min_len(None);
        assert_eq!(apply(&unguarded, &html).unwrap(), Value::from(""));
    }
}
