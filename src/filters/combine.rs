//! Combinators over other filters: mapping, formatting, joining, and
//! arbitrary computation.

use std::collections::BTreeMap;

use crate::{
    context::ItemContext,
    error::{Error, MessageExt as _, Result},
    filter::{default_or_raise, next_sequence, trace_apply, Core, Filter},
    parse_error,
    select::Selector,
    value::{NValue, Value},
};

use super::text::{cleaned_text_of, CleanText, Normalization};

/// Resolve every child filter against the same item, in declaration order.
/// The first failure propagates; there are no partial results.
pub(crate) fn resolve_all<'doc>(
    children: &[Box<dyn Filter>],
    item: &ItemContext<'doc>,
) -> Result<Vec<NValue<'doc>>> {
    children.iter().map(|f| f.apply(item)).collect()
}

/// Translate the selected value through a declared key/value mapping.
///
/// The key is the cleaned text of the selection; the mapped value can be of
/// any type.  A key outside the mapping resolves via the default policy with
/// an error naming both the key and the full mapping, so a new label on a
/// scraped page is noticed rather than silently passed through.
pub struct Map {
    core: Core,
    mapping: BTreeMap<String, Value>,
}

impl Map {
    #[must_use]
    pub fn new<K, V>(
        selector: impl Into<Selector>,
        mapping: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            core: Core::new(selector),
            mapping: mapping
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Sets the default returned when the key is outside the mapping.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }

    fn describe_mapping(&self) -> String {
        let entries = self
            .mapping
            .iter()
            .map(|(k, v)| format!("{k:?}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{entries}}}")
    }
}

impl Filter for Map {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let selected = self.core.select(item)?;
        let Some(key) = cleaned_text_of(selected) else {
            return self
                .core
                .default_or_raise(parse_error!("unable to build a mapping key from no text"));
        };

        trace_apply("Map", self.core.sequence(), item, &key);

        match self.mapping.get(&key) {
            Some(value) => Ok(Value::from_data(value.clone())),
            None => self.core.default_or_raise(Error::MappingNotFound {
                key,
                mapping: self.describe_mapping(),
            }),
        }
    }

    fn kind(&self) -> &'static str {
        "Map"
    }
}

/// Interpolate the results of several filters into a template.
///
/// The template uses positional `{}` placeholders, one per argument filter,
/// in order.  Every argument must resolve to a text-renderable scalar; a
/// placeholder count that does not match the argument count is a declaration
/// error and always raises.
pub struct Format {
    template: String,
    args: Vec<Box<dyn Filter>>,
    default: Option<Value>,
    sequence: u64,
}

impl Format {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            args: Vec::new(),
            default: None,
            sequence: next_sequence(),
        }
    }

    /// Appends an argument filter for the next `{}` placeholder.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Filter + 'static) -> Self {
        self.args.push(Box::new(arg));
        self
    }

    /// Sets the default returned when an argument is not renderable.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Format {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let parts: Vec<&str> = self.template.split("{}").collect();
        if parts.len() - 1 != self.args.len() {
            bail!(
                "format template `{}` has {} placeholders for {} arguments",
                self.template,
                parts.len() - 1,
                self.args.len()
            );
        }

        let values = resolve_all(&self.args, item)?;

        let mut out = String::new();
        for (part, value) in parts.iter().zip(&values) {
            out.push_str(part);
            match value.to_text() {
                Some(txt) => out.push_str(&txt),
                None => {
                    return default_or_raise(
                        self.default.as_ref(),
                        parse_error!("unable to format {value}"),
                    )
                }
            }
        }
        out.push_str(parts[parts.len() - 1]);

        trace_apply("Format", self.sequence, item, &out);
        Ok(Value::from(out))
    }

    fn kind(&self) -> &'static str {
        "Format"
    }
}

/// Join the cleaned texts of every selected node with a separator.
///
/// Empty texts are dropped before joining.  `add_before` and `add_after` wrap
/// a non-trivial result; when the final text is empty the default policy
/// decides between a configured default and the empty string itself.
pub struct Join {
    core: Core,
    separator: String,
    add_before: String,
    add_after: String,
}

impl Join {
    #[must_use]
    pub fn new(selector: impl Into<Selector>, separator: impl Into<String>) -> Self {
        Self {
            core: Core::new(selector),
            separator: separator.into(),
            add_before: String::new(),
            add_after: String::new(),
        }
    }

    /// Join with `"\r\n"` instead of the configured separator.
    #[must_use]
    pub fn with_newline(mut self) -> Self {
        self.separator = "\r\n".to_string();
        self
    }

    /// Prefix added when the joined text is not empty.
    #[must_use]
    pub fn with_add_before(mut self, add_before: impl Into<String>) -> Self {
        self.add_before = add_before.into();
        self
    }

    /// Suffix added when the joined text is not empty.
    #[must_use]
    pub fn with_add_after(mut self, add_after: impl Into<String>) -> Self {
        self.add_after = add_after.into();
        self
    }

    /// Sets the default returned when the joined text is empty.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.core.set_default(default.into());
        self
    }

    fn pieces(selected: crate::select::Selected<'_>) -> Result<Vec<String>> {
        let texts = match selected.try_into_nodes() {
            Ok(nodes) => nodes
                .into_iter()
                .map(|el| {
                    CleanText::clean(
                        &CleanText::clean_node(el, true),
                        true,
                        Some(Normalization::Nfc),
                    )
                })
                .collect(),
            Err(Value::List(items)) => items
                .iter()
                .map(|v| {
                    v.to_text()
                        .with_msg(|| format!("unable to join {v}"))
                })
                .collect::<Result<_>>()?,
            Err(value) => vec![value
                .to_text()
                .with_msg(|| format!("unable to join {value}"))?],
        };
        Ok(texts.into_iter().filter(|t| !t.is_empty()).collect())
    }
}

impl Filter for Join {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let pieces = Self::pieces(self.core.select(item)?)?;
        let joined = pieces.join(&self.separator);

        let mut out = String::new();
        if !joined.is_empty() {
            out.push_str(&self.add_before);
            out.push_str(&joined);
            out.push_str(&self.add_after);
        }

        trace_apply("Join", self.core.sequence(), item, &out);

        if out.is_empty() {
            if let Some(default) = self.core.default() {
                return Ok(Value::from_data(default.clone()));
            }
        }
        Ok(Value::from(out))
    }

    fn kind(&self) -> &'static str {
        "Join"
    }
}

type EvalFn = Box<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Compute a value from the results of several filters with an arbitrary
/// function.
///
/// Arguments are resolved in declaration order and handed to the function as
/// owned data.  A failing function resolves via the default policy.
pub struct Eval {
    func: EvalFn,
    args: Vec<Box<dyn Filter>>,
    default: Option<Value>,
    sequence: u64,
}

impl Eval {
    #[must_use]
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
            args: Vec::new(),
            default: None,
            sequence: next_sequence(),
        }
    }

    /// Appends an argument filter.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Filter + 'static) -> Self {
        self.args.push(Box::new(arg));
        self
    }

    /// Sets the default returned when the function fails.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl Filter for Eval {
    fn apply<'doc>(&self, item: &ItemContext<'doc>) -> Result<NValue<'doc>> {
        let args = resolve_all(&self.args, item)?
            .into_iter()
            .map(|v| {
                v.into_data()
                    .msg("unable to pass a document node to a computation")
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(
            target: "pagesieve::filters",
            seq = self.sequence,
            label = item.label().unwrap_or(""),
            "Eval({} args)",
            args.len()
        );

        match (self.func)(&args) {
            Ok(value) => Ok(Value::from_data(value)),
            Err(err) => default_or_raise(self.default.as_ref(), err),
        }
    }

    fn kind(&self) -> &'static str {
        "Eval"
    }
}
