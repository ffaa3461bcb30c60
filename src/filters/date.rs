//! Free-text date and time parsing.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::{
    context::ItemContext,
    error::Result,
    filter::{next_sequence, trace_apply, Core, Filter},
    parse_error,
    select::Selector,
    value::{NValue, Value},
};

use super::text::cleaned_text_of;

type ParseFn = Box<dyn Fn(&str, bool, bool) -> Option<NaiveDateTime> + Send + Sync>;

/// Parse free text into a [`NaiveDateTime`].
///
/// The underlying parser function is pluggable (the default tries a table of
/// common formats); `day_first` resolves numeric day/month ambiguity,
/// `translations` is an ordered list of (pattern, replacement) rewrites
/// applied before parsing (for localized month and weekday names), and
/// `fuzzy` tolerates surrounding prose by scanning for a date-shaped
/// substring.  Empty or unparsable input resolves via the default policy.
pub struct DateTime {
    core: Core,
    day_first: bool,
    fuzzy: bool,
    translations: Vec<(Regex, String)>,
    parse_fn: Option<ParseFn>,
}

impl DateTime {
    #[must_use]
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self {
            core: Core::new(selector),
            day_first: false,
            fuzzy: false,
            translations: Vec::new(),
            parse_fn: None,
        }
    }

    /// Sets the default returned when parsing fails.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }

    /// Resolve `13/08/1988`-style ambiguity day-first.
    #[must_use]
    pub fn with_day_first(mut self, day_first: bool) -> Self {
        self.day_first = day_first;
        self
    }

    /// Tolerate surrounding prose by scanning for a date-shaped substring.
    #[must_use]
    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// Ordered textual rewrites applied before parsing.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if any pattern is not a valid regex.
    pub fn with_translations<P, R>(
        mut self,
        translations: impl IntoIterator<Item = (P, R)>,
    ) -> Result<Self>
    where
        P: AsRef<str>,
        R: Into<String>,
    {
        use crate::error::MessageExt as _;

        self.translations = translations
            .into_iter()
            .map(|(pattern, repl)| {
                let pattern = pattern.as_ref();
                Regex::new(pattern)
                    .with_msg(|| format!("invalid translation pattern `{pattern}`"))
                    .map(|re| (re, repl.into()))
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// Replaces the underlying parser function.
    #[must_use]
    pub fn with_parse_fn<F>(mut self, parse_fn: F) -> Self
    where
        F: Fn(&str, bool, bool) -> Option<NaiveDateTime> + Send + Sync + 'static,
    {
        self.parse_fn = Some(Box::new(parse_fn));
        self
    }

    fn parse(&self, txt: &str) -> Option<NaiveDateTime> {
        match &self.parse_fn {
            Some(f) => f(txt, self.day_first, self.fuzzy),
            None => parse_date_text(txt, self.day_first, self.fuzzy),
        }
    }

    fn apply_text<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        // an upstream step may already have produced a typed date
        let selected = match self.core.select(item)? {
            crate::select::Selected::Value(v @ (Value::Date(_) | Value::DateTime(_))) => {
                return Ok(v)
            }
            other => other,
        };

        let Some(mut txt) = cleaned_text_of(selected) else {
            return self
                .core
                .default_or_raise(parse_error!("unable to parse a date from no text"));
        };

        trace_apply("DateTime", self.core.sequence(), item, &txt);

        if txt.is_empty() {
            return self
                .core
                .default_or_raise(parse_error!("unable to parse a date from empty text"));
        }

        for (pattern, repl) in &self.translations {
            txt = pattern.replace_all(&txt, repl.as_str()).into_owned();
        }

        match self.parse(&txt) {
            Some(dt) => Ok(Value::DateTime(dt)),
            None => self
                .core
                .default_or_raise(parse_error!("unable to parse a date from `{txt}`")),
        }
    }
}

impl Filter for DateTime {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        self.apply_text(item)
    }

    fn kind(&self) -> &'static str {
        "DateTime"
    }
}

/// [`DateTime`] with the time-of-day component discarded.
pub struct Date(DateTime);

impl Date {
    #[must_use]
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self(DateTime::new(selector))
    }

    /// Sets the default returned when parsing fails.
    #[must_use]
    pub fn with_default(self, default: impl Into<Value>) -> Self {
        Self(self.0.with_default(default))
    }

    /// Resolve `13/08/1988`-style ambiguity day-first.
    #[must_use]
    pub fn with_day_first(self, day_first: bool) -> Self {
        Self(self.0.with_day_first(day_first))
    }

    /// Tolerate surrounding prose by scanning for a date-shaped substring.
    #[must_use]
    pub fn with_fuzzy(self, fuzzy: bool) -> Self {
        Self(self.0.with_fuzzy(fuzzy))
    }

    /// Ordered textual rewrites applied before parsing.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if any pattern is not a valid regex.
    pub fn with_translations<P, R>(
        self,
        translations: impl IntoIterator<Item = (P, R)>,
    ) -> Result<Self>
    where
        P: AsRef<str>,
        R: Into<String>,
    {
        Ok(Self(self.0.with_translations(translations)?))
    }

    /// Replaces the underlying parser function.
    #[must_use]
    pub fn with_parse_fn<F>(self, parse_fn: F) -> Self
    where
        F: Fn(&str, bool, bool) -> Option<NaiveDateTime> + Send + Sync + 'static,
    {
        Self(self.0.with_parse_fn(parse_fn))
    }
}

impl Filter for Date {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        match self.0.apply(item)? {
            Value::DateTime(dt) => Ok(Value::Date(dt.date())),
            other => Ok(other),
        }
    }

    fn kind(&self) -> &'static str {
        "Date"
    }
}

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<hh>\d{1,2})[:h]?(?P<mm>\d{2})(?:[:m](?P<ss>\d{2}))?")
        .expect("time pattern is valid")
});

/// Extract a time of day (`14:30`, `14h30`, `14:30:59`) from the selected
/// text.
pub struct Time {
    core: Core,
}

impl Time {
    #[must_use]
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self {
            core: Core::new(selector),
        }
    }

    /// Sets the default returned when no time is found.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }
}

impl Filter for Time {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let selected = self.core.select(item)?;
        let Some(txt) = cleaned_text_of(selected) else {
            return self
                .core
                .default_or_raise(parse_error!("unable to find a time in no text"));
        };

        let time = TIME_RE.captures(&txt).and_then(|caps| {
            let part = |name: &str| {
                caps.name(name)
                    .map_or(Some(0), |m| m.as_str().parse::<u32>().ok())
            };
            NaiveTime::from_hms_opt(part("hh")?, part("mm")?, part("ss")?)
        });

        match time {
            Some(t) => Ok(Value::Time(t)),
            None => self
                .core
                .default_or_raise(parse_error!("unable to find a time in `{txt}`")),
        }
    }

    fn kind(&self) -> &'static str {
        "Time"
    }
}

/// Combine an upstream date and an upstream time into a datetime.
pub struct CombineDate {
    date: Box<dyn Filter>,
    time: Box<dyn Filter>,
    sequence: u64,
}

impl CombineDate {
    #[must_use]
    pub fn new(date: impl Filter + 'static, time: impl Filter + 'static) -> Self {
        Self {
            date: Box::new(date),
            time: Box::new(time),
            sequence: next_sequence(),
        }
    }
}

impl Filter for CombineDate {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        // resolve both inputs before combining; either failure propagates
        let date = self.date.apply(item)?;
        let time = self.time.apply(item)?;

        tracing::trace!(
            target: "pagesieve::filters",
            seq = self.sequence,
            label = item.label().unwrap_or(""),
            "CombineDate({date}, {time})"
        );

        match (date, time) {
            (Value::Date(d), Value::Time(t)) => Ok(Value::DateTime(d.and_time(t))),
            (date, time) => Err(parse_error!(
                "unable to combine {date} and {time} into a datetime"
            )),
        }
    }

    fn kind(&self) -> &'static str {
        "CombineDate"
    }
}

/// The default parser function: a table of common numeric and month-name
/// formats over `chrono` naive types.
///
/// `day_first` switches the ambiguous all-numeric formats between `d/m/y`
/// and `m/d/y`; `fuzzy` retries on the first date-shaped substring when the
/// whole text does not parse.
#[must_use]
pub fn parse_date_text(text: &str, day_first: bool, fuzzy: bool) -> Option<NaiveDateTime> {
    let text = text.trim();

    for fmt in datetime_formats(day_first) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in date_formats(day_first) {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    if fuzzy {
        for re in FUZZY_RES.iter() {
            if let Some(m) = re.find(text) {
                if let Some(dt) = parse_date_text(m.as_str(), day_first, false) {
                    return Some(dt);
                }
            }
        }
    }

    None
}

fn date_formats(day_first: bool) -> &'static [&'static str] {
    const COMMON: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d %B %Y",
        "%d %b %Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%B %d %Y",
        "%b %d %Y",
    ];
    const DAY_FIRST: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%y"];
    const MONTH_FIRST: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y", "%m/%d/%y"];

    static WITH_DAY_FIRST: LazyLock<Vec<&'static str>> =
        LazyLock::new(|| DAY_FIRST.iter().chain(COMMON).copied().collect());
    static WITH_MONTH_FIRST: LazyLock<Vec<&'static str>> =
        LazyLock::new(|| MONTH_FIRST.iter().chain(COMMON).copied().collect());

    if day_first {
        &WITH_DAY_FIRST
    } else {
        &WITH_MONTH_FIRST
    }
}

fn datetime_formats(day_first: bool) -> &'static [&'static str] {
    const COMMON: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    const DAY_FIRST: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];
    const MONTH_FIRST: &[&str] = &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];

    static WITH_DAY_FIRST: LazyLock<Vec<&'static str>> =
        LazyLock::new(|| COMMON.iter().chain(DAY_FIRST).copied().collect());
    static WITH_MONTH_FIRST: LazyLock<Vec<&'static str>> =
        LazyLock::new(|| COMMON.iter().chain(MONTH_FIRST).copied().collect());

    if day_first {
        &WITH_DAY_FIRST
    } else {
        &WITH_MONTH_FIRST
    }
}

static FUZZY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2})?)?",
        r"\d{1,2}[./-]\d{1,2}[./-]\d{2,4}(?: \d{2}:\d{2}(?::\d{2})?)?",
        r"\d{1,2} [[:alpha:]]+ \d{4}",
        r"[[:alpha:]]+ \d{1,2},? \d{4}",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("fuzzy patterns are valid"))
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    fn item(html: &scraper::Html) -> ItemContext<'_> {
        ItemContext::new(html.root_element())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_first_resolves_ambiguity() {
        let html = scraper::Html::parse_fragment("<p>13/08/1988</p>");
        let f = Date::new("p").with_day_first(true);
        assert_eq!(f.apply(&item(&html)).unwrap(), Value::Date(ymd(1988, 8, 13)));

        let html = scraper::Html::parse_fragment("<p>08/13/1988</p>");
        let f = Date::new("p");
        assert_eq!(f.apply(&item(&html)).unwrap(), Value::Date(ymd(1988, 8, 13)));
    }

    #[test]
    fn month_names() {
        let html = scraper::Html::parse_fragment("<p>August 13, 1988</p>");
        assert_eq!(
            Date::new("p").apply(&item(&html)).unwrap(),
            Value::Date(ymd(1988, 8, 13))
        );

        let html = scraper::Html::parse_fragment("<p>13 Aug 1988</p>");
        assert_eq!(
            Date::new("p").apply(&item(&html)).unwrap(),
            Value::Date(ymd(1988, 8, 13))
        );
    }

    #[test]
    fn translations_rewrite_localized_names() {
        let html = scraper::Html::parse_fragment("<p>13 août 1988</p>");
        let f = Date::new("p")
            .with_translations([("août", "August")])
            .unwrap();
        assert_eq!(f.apply(&item(&html)).unwrap(), Value::Date(ymd(1988, 8, 13)));
    }

    #[test]
    fn fuzzy_scans_for_a_date() {
        let html = scraper::Html::parse_fragment("<p>Paid on 13/08/1988, thank you</p>");
        let f = Date::new("p").with_day_first(true).with_fuzzy(true);
        assert_eq!(f.apply(&item(&html)).unwrap(), Value::Date(ymd(1988, 8, 13)));

        assert!(Date::new("p")
            .with_day_first(true)
            .apply(&item(&html))
            .is_err());
    }

    #[test]
    fn datetime_keeps_time_and_date_discards_it() {
        let html = scraper::Html::parse_fragment("<p>1988-08-13 14:30:59</p>");

        let dt = DateTime::new("p").apply(&item(&html)).unwrap();
        assert_eq!(
            dt,
            Value::DateTime(ymd(1988, 8, 13).and_hms_opt(14, 30, 59).unwrap())
        );

        let d = Date::new("p").apply(&item(&html)).unwrap();
        assert_eq!(d, Value::Date(ymd(1988, 8, 13)));
    }

    #[test]
    fn empty_and_unparsable_resolve_via_default_policy() {
        let html = scraper::Html::parse_fragment("<p></p>");
        assert!(DateTime::new("p").apply(&item(&html)).is_err());
        assert_eq!(
            DateTime::new("p").with_default(Value::Null).apply(&item(&html)).unwrap(),
            Value::Null
        );

        let html = scraper::Html::parse_fragment("<p>not a date</p>");
        assert!(DateTime::new("p").apply(&item(&html)).is_err());
    }

    #[test]
    fn pluggable_parse_fn() {
        let html = scraper::Html::parse_fragment("<p>day 42</p>");
        let f = DateTime::new("p").with_parse_fn(|txt, _, _| {
            let day: u32 = txt.strip_prefix("day ")?.parse().ok()?;
            NaiveDate::from_yo_opt(2024, day)?.and_hms_opt(0, 0, 0)
        });
        assert_eq!(
            f.apply(&item(&html)).unwrap(),
            Value::DateTime(ymd(2024, 2, 11).and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn time_extraction() {
        let html = scraper::Html::parse_fragment("<p>at 14h30</p>");
        assert_eq!(
            Time::new("p").apply(&item(&html)).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(14, 30, 0).unwrap())
        );

        let html = scraper::Html::parse_fragment("<p>14:30:59</p>");
        assert_eq!(
            Time::new("p").apply(&item(&html)).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(14, 30, 59).unwrap())
        );

        let html = scraper::Html::parse_fragment("<p>no time here</p>");
        assert!(Time::new("p").apply(&item(&html)).is_err());
    }

    #[test]
    fn combine_date_and_time() {
        let html = scraper::Html::parse_fragment(
            r#"<p><span class="d">13/08/1988</span> <span class="t">14:30</span></p>"#,
        );
        let f = CombineDate::new(
            Date::new("span.d").with_day_first(true),
            Time::new("span.t"),
        );
        assert_eq!(
            f.apply(&item(&html)).unwrap(),
            Value::DateTime(ymd(1988, 8, 13).and_hms_opt(14, 30, 0).unwrap())
        );
    }
}
