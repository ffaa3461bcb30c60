#![allow(clippy::enum_glob_use)]
use std::{borrow::Cow, convert::Infallible, fmt, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{MessageExt, Result};

/// Trait for attempting to unwrap a [`Value`] into a concrete type.
///
/// This is the output boundary of the pipeline: object-assembly code uses it
/// to move extracted values onto typed domain records.
pub trait TryFromValue<T>: Sized {
    /// Try to unwrap a [`Value`] variant into an instance of type `Self`.
    ///
    /// # Errors
    ///
    /// Implementors should return an `Err` if the input value cannot be
    /// unwrapped into `Self`.
    fn try_from_value(value: Value<T>) -> Result<Self>;
}

/// A variant-typed extraction result.
///
/// # Extension Type
///
/// It is possible to store other variants in the `Extra` slot of this enum by
/// changing the type parameter `T`.  The default [`Data`] extension is
/// uninhabited, so a plain `Value` is always owned data and can live in the
/// item environment or in a filter's default.  [`NValue`] uses the [`Node`]
/// extension to carry borrowed document nodes through a chain.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value<T = Data> {
    /// A value of `null`.
    #[serde(serialize_with = "serialize_null_as_option")]
    Null,
    /// A boolean value.
    Bool(bool),
    /// A signed integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
    /// An exact decimal value, as parsed from locale-formatted amounts.
    Decimal(Decimal),
    /// A UTF-8 string value, stored as an `Arc<str>` for cheaper cloning.
    String(Arc<str>),
    /// A calendar date without a time-of-day component.
    Date(NaiveDate),
    /// A time of day without a date component.
    Time(NaiveTime),
    /// A combined date and time.
    DateTime(NaiveDateTime),
    /// A list of other values, not necessarily of the same type.
    List(Vec<Value<T>>),
    /// Any extension variants to this type.  See the main enum docs.
    Extra(T),
}

/// Helper trait to implement [`TryFromValue<X>`] on all [`Value<X>`] for `T`
/// if `T` is a common data type that doesn't depend on `X`.
trait TryFromData: Sized {
    fn try_from_data(value: Value) -> Result<Self>;
}

macro_rules! generate_impls {
    ($($variant:ident ($ty:ty)$(,)?)*) => {
        $(
            impl TryFromData for $ty {
                fn try_from_data(value: Value) -> Result<Self> {
                    let Value::$variant(x) = value else {
                        bail!("expected a {}, got {}", stringify!($variant), value);
                    };
                    Ok(x)
                }
            }
            impl<X> From<$ty> for Value<X> {
                #[inline]
                fn from(x: $ty) -> Self {
                    Self::$variant(x)
                }
            }
        )*
    };
}

generate_impls! {
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    String(Arc<str>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl<X> Value<X> {
    /// Convert from a `Value<Data>` (no extensions) to `Self`.  This is
    /// always possible because `Value<Data>` is a subset of `Value<X>`.
    #[must_use]
    pub fn from_data(value: Value) -> Self {
        use Value::*;

        match value {
            Null => Null,
            Bool(b) => Bool(b),
            Int(i) => Int(i),
            Float(f) => Float(f),
            Decimal(d) => Decimal(d),
            String(s) => String(s),
            Date(d) => Date(d),
            Time(t) => Time(t),
            DateTime(dt) => DateTime(dt),
            List(l) => List(l.into_iter().map(Self::from_data).collect()),
            #[allow(unreachable_patterns)]
            Extra(never) => match never.0 {},
        }
    }

    /// Try to convert this value into an owned `Value<Data>`.
    ///
    /// This is a **lossy operation**.  If `self` is `Value::Extra` (e.g., a
    /// borrowed document node), it is not possible to convert into plain data
    /// and this returns `None`.
    #[must_use]
    pub fn into_data(self) -> Option<Value> {
        use Value::*;

        match self {
            Null => Some(Null),
            Bool(b) => Some(Bool(b)),
            Int(i) => Some(Int(i)),
            Float(f) => Some(Float(f)),
            Decimal(d) => Some(Decimal(d)),
            String(s) => Some(String(s)),
            Date(d) => Some(Date(d)),
            Time(t) => Some(Time(t)),
            DateTime(dt) => Some(DateTime(dt)),
            List(l) => Some(List(l.into_iter().filter_map(Self::into_data).collect())),
            Extra(_) => None,
        }
    }

    /// Render a scalar value as plain text, the way it would appear inside a
    /// formatted field: strings unquoted, numbers and dates via `Display`.
    ///
    /// Returns `None` for `Null`, lists, and extension values.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(x) => Some(x.to_string()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::String(s) => Some(s.to_string()),
            Self::Date(d) => Some(d.to_string()),
            Self::Time(t) => Some(t.to_string()),
            Self::DateTime(dt) => Some(dt.to_string()),
            Self::Null | Self::List(_) | Self::Extra(_) => None,
        }
    }

    /// Try to unwrap a value into a type that implements [`TryFromValue<X>`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if it is not possible to unwrap `self` to an instance
    /// of type `T`.
    #[inline]
    pub fn try_unwrap<T: TryFromValue<X>>(self) -> Result<T> {
        T::try_from_value(self)
    }
}

impl<T: TryFromData, X> TryFromValue<X> for T {
    fn try_from_value(value: Value<X>) -> Result<Self> {
        T::try_from_data(
            value
                .into_data()
                .msg("unsupported data type with default TryFromData conversion")?,
        )
    }
}

impl<X> TryFromValue<X> for Value<X> {
    #[inline]
    fn try_from_value(value: Value<X>) -> Result<Self> {
        Ok(value)
    }
}

impl<X> TryFromValue<X> for String {
    fn try_from_value(value: Value<X>) -> Result<Self> {
        Arc::<str>::try_from_value(value).map(|s| s.to_string())
    }
}

impl<X, T: TryFromValue<X>> TryFromValue<X> for Option<T> {
    fn try_from_value(value: Value<X>) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::try_from_value(other).map(Some),
        }
    }
}

impl<X: fmt::Display, T: TryFromValue<X>> TryFromValue<X> for Vec<T> {
    fn try_from_value(value: Value<X>) -> Result<Self> {
        let Value::List(items) = value else {
            bail!("expected a List, got {value}");
        };
        items.into_iter().map(T::try_from_value).collect()
    }
}

/// The default extension for a [`Value`], marking that it is not possible to
/// have a `Value::Extra` variant.
#[allow(unreachable_code)]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Data(Infallible);

impl Serialize for Data {
    fn serialize<S>(&self, _: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0 {}
    }
}

impl fmt::Display for Data {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {}
    }
}

/// [`Value`] carrying borrowed document nodes, valid for the lifetime of the
/// parsed document.
pub type NValue<'doc> = Value<Node<'doc>>;

/// Extension to hold a document node in a [`Value`].  Valid as long as the
/// parsed document is.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node<'doc> {
    /// A reference to a parsed HTML element.
    Element(scraper::ElementRef<'doc>),
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(el) => write!(f, "`{}`", snippet(&el.html(), 120)),
        }
    }
}

impl Serialize for Node<'_> {
    fn serialize<S>(&self, se: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Element(el) => se.serialize_str(&el.html()),
        }
    }
}

impl<'doc> From<scraper::ElementRef<'doc>> for NValue<'doc> {
    fn from(value: scraper::ElementRef<'doc>) -> Self {
        Self::Extra(Node::Element(value))
    }
}

impl<'doc> TryFromValue<Node<'doc>> for scraper::ElementRef<'doc> {
    fn try_from_value(value: Value<Node<'doc>>) -> Result<Self> {
        match value {
            Value::Extra(Node::Element(e)) => Ok(e),
            _ => bail!("expected an element, got {value}"),
        }
    }
}

/// Helper function to serialize `Value::Null` as `Option::None`, which is
/// understood as a null value by e.g., `serde_json`.
#[inline]
fn serialize_null_as_option<S: serde::Serializer>(se: S) -> core::result::Result<S::Ok, S::Error> {
    None::<()>.serialize(se)
}

impl<T: fmt::Display> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, r#""{s}""#),
            Self::Date(d) => write!(f, "{d}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::List(ls) => {
                write!(f, "[")?;
                for (i, x) in ls.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Self::Extra(t) => write!(f, "{t}"),
        }
    }
}

impl<T, X> From<Option<T>> for Value<X>
where
    T: Into<Value<X>>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            None => Self::Null,
            Some(x) => x.into(),
        }
    }
}

impl<'a, X> From<&'a str> for Value<X> {
    fn from(value: &'a str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl<X> From<std::string::String> for Value<X> {
    fn from(value: std::string::String) -> Self {
        Self::String(Arc::from(&*value))
    }
}

/// Truncate `text` for display in diagnostics, marking the cut with an
/// ellipsis.
pub(crate) fn snippet(text: &str, limit: usize) -> Cow<'_, str> {
    if text.chars().count() <= limit {
        Cow::Borrowed(text)
    } else {
        let cut: String = text.chars().take(limit).collect();
        Cow::Owned(format!("{cut}..."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_scalars() {
        let v: Value = Value::Int(3);
        assert_eq!(v.try_unwrap::<i64>().unwrap(), 3);

        let v: Value = "hello".into();
        assert_eq!(v.try_unwrap::<String>().unwrap(), "hello");

        let v: Value = Value::Null;
        assert_eq!(v.try_unwrap::<Option<i64>>().unwrap(), None);

        let v: Value = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(v.try_unwrap::<Vec<i64>>().unwrap(), vec![1, 2]);

        let v: Value = Value::Bool(true);
        assert!(v.try_unwrap::<i64>().is_err());
    }

    #[test]
    fn plain_text_rendering() {
        use std::str::FromStr as _;

        let d = Decimal::from_str("4115.00").unwrap();
        assert_eq!(Value::<Data>::Decimal(d).to_text().unwrap(), "4115.00");
        assert_eq!(Value::<Data>::from("x").to_text().unwrap(), "x");
        assert_eq!(Value::<Data>::Null.to_text(), None);
    }

    #[test]
    fn serializes_untagged() {
        let v: Value = Value::List(vec![
            Value::Null,
            Value::Int(2),
            "a".into(),
            Value::Date(NaiveDate::from_ymd_opt(1988, 8, 13).unwrap()),
        ]);
        insta::assert_snapshot!(
            serde_json::to_string(&v).unwrap(),
            @r#"[null,2,"a","1988-08-13"]"#
        );
    }

    #[test]
    fn snippet_truncates() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("0123456789abc", 10), "0123456789...");
    }
}
