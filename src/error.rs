use core::fmt;

use std::error::Error as StdError;

/// A specialized [`Result`](core::result::Result) type using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for every extraction failure in the pipeline.
///
/// All variants are specializations of one "extraction failed" kind; the
/// variant says which step failed and carries enough context to name the
/// selector, column, pattern, or key involved.  Whether a failure surfaces at
/// all is decided by the failing filter's default policy: a configured
/// default is returned silently instead.
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// The selection step produced nothing where a value was required.
    ElementNotFound {
        /// Human-readable rendering of the selector that matched nothing.
        selector: String,
    },
    /// No candidate header name resolved to a known table column.
    ColumnNotFound {
        /// Every candidate name that was tried, in order.
        names: Vec<String>,
    },
    /// A regex match with the requested ordinal does not exist.
    RegexNotFound {
        /// The pattern that was searched for.
        pattern: String,
        /// Which match was requested ("first", "3rd", "all", ...).
        ordinal: String,
        /// The searched text, truncated for display.
        input: String,
    },
    /// A [`Map`](crate::filters::Map) key outside the declared mapping.
    MappingNotFound {
        /// The unmatched key.
        key: String,
        /// Rendering of the full mapping.
        mapping: String,
    },
    /// A name missing from the item environment.
    EnvNotFound {
        /// The requested environment name.
        name: String,
    },
    /// Generic parse failure (decimal, date, typed conversion, ...).
    Parse {
        /// The error message for this error.
        message: String,
        /// An optional inner error that implements [`std::error::Error`] + `Send + Sync`.
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ElementNotFound { selector } => {
                write!(f, "element not found for selector `{selector}`")
            }
            Error::ColumnNotFound { names } => {
                write!(f, "unable to find column {}", names.join(" or "))
            }
            Error::RegexNotFound {
                pattern,
                ordinal,
                input,
            } => {
                write!(f, "unable to find {ordinal} match of `{pattern}` in `{input}`")
            }
            Error::MappingNotFound { key, mapping } => {
                write!(f, "unable to map `{key}` with {mapping}")
            }
            Error::EnvNotFound { name } => {
                write!(f, "environment value `{name}` not found")
            }
            Error::Parse { message, source } => {
                write!(f, "{message}")?;
                if let Some(source) = source {
                    write!(f, ": {source}")?;
                }
                Ok(())
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Parse {
                source: Some(source),
                ..
            } => Some(&**source),
            _ => None,
        }
    }
}

impl Error {
    /// Creates a [`Error::Parse`] with the given `message` and no source.
    #[inline]
    #[must_use]
    pub fn parse(message: String) -> Self {
        Self::Parse {
            message,
            source: None,
        }
    }
}

/// Easily create an [`Error::Parse`] from a format string and optional
/// source error.
///
/// # Examples
///
/// With no inner error:
///
/// ```rust
/// # use pagesieve::{parse_error, Error};
/// let error = parse_error!("unable to parse `{}`", "abc");
/// assert_eq!(error.to_string(), "unable to parse `abc`");
/// ```
///
/// With an inner error:
///
/// ```rust
/// # use pagesieve::{parse_error, Error};
/// let source = "abcdef".parse::<i32>().unwrap_err();
/// let error = parse_error!(@source, "couldn't parse integer `abcdef`");
/// assert!(matches!(error, Error::Parse { source: Some(..), .. }));
/// ```
#[macro_export]
macro_rules! parse_error {
    (@Option: $err:expr, $($tt:tt)*) => {
        $crate::Error::Parse {
            message: format!($($tt)*),
            source: $err,
        }
    };

    (@$err:expr, $($tt:tt)*) => {
        $crate::parse_error!(@Option:Some(Box::new($err)), $($tt)*)
    };

    ($($tt:tt)*) => {
        $crate::parse_error!(@Option: None, $($tt)*)
    };
}

/// Exit early out of a function with a [`parse_error!`] variant.  Equivalent
/// to `return Err(parse_error!(...))`, so the function must return [`Result`].
#[macro_export]
macro_rules! bail {
    ($($tt:tt)*) => {
        return Err($crate::parse_error!($($tt)*))
    };
}

/// Helper trait to provide the [`msg`](MessageExt::msg)
/// and [`with_msg`](MessageExt::with_msg) methods on [`Result`] and
/// [`Option`], converting foreign errors into [`Error::Parse`].
pub trait MessageExt {
    type Wrapped: Sized;

    /// If `self` is `Ok` or `Some`, keep that.  Otherwise, return
    /// `Err(Error::Parse)` with the given message, keeping the inner `E`
    /// as the source if `Self = Result<T, E>`.
    #[allow(clippy::missing_errors_doc)]
    fn msg<D: fmt::Display>(self, message: D) -> Self::Wrapped;
    /// Equivalent to [`MessageExt::msg`] but lazily calls the `message`
    /// function when necessary.
    #[allow(clippy::missing_errors_doc)]
    fn with_msg<D, F>(self, message: F) -> Self::Wrapped
    where
        D: fmt::Display,
        F: FnOnce() -> D;
}

impl<T, E: StdError + Send + Sync + 'static> MessageExt for core::result::Result<T, E> {
    type Wrapped = Result<T>;

    fn msg<D: fmt::Display>(self, message: D) -> Self::Wrapped {
        match self {
            Ok(t) => Ok(t),
            Err(source) => Err(Error::Parse {
                message: message.to_string(),
                source: Some(Box::new(source)),
            }),
        }
    }

    fn with_msg<D, F>(self, message: F) -> Self::Wrapped
    where
        D: fmt::Display,
        F: FnOnce() -> D,
    {
        match self {
            Ok(t) => Ok(t),
            Err(source) => Err(Error::Parse {
                message: message().to_string(),
                source: Some(Box::new(source)),
            }),
        }
    }
}

impl<T> MessageExt for Option<T> {
    type Wrapped = Result<T>;

    fn msg<D: fmt::Display>(self, message: D) -> Self::Wrapped {
        self.ok_or_else(|| Error::parse(message.to_string()))
    }

    fn with_msg<D, F>(self, message: F) -> Self::Wrapped
    where
        D: fmt::Display,
        F: FnOnce() -> D,
    {
        self.ok_or_else(|| Error::parse(message().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failing_step() {
        let err = Error::ColumnNotFound {
            names: vec!["Date".into(), "Value date".into()],
        };
        assert_eq!(err.to_string(), "unable to find column Date or Value date");

        let err = Error::RegexNotFound {
            pattern: r"(\d+)".into(),
            ordinal: "2nd".into(),
            input: "no digits".into(),
        };
        assert_eq!(
            err.to_string(),
            r"unable to find 2nd match of `(\d+)` in `no digits`"
        );
    }

    #[test]
    fn parse_error_keeps_the_source() {
        let source = "x".parse::<i32>().unwrap_err();
        let err = parse_error!(@source, "unable to parse `x`");
        assert!(StdError::source(&err).is_some());
        assert!(err.to_string().starts_with("unable to parse `x`: "));
    }
}
