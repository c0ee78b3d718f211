//! Error wrapping that accumulates call sites and local diagnostic values.
//!
//! Every time a failure crosses a boundary that knows something useful about
//! it (the spreadsheet id, the range, the shape of the data) the error is
//! wrapped with [`ExceptionChain::wrap`]. Wrapping an existing chain appends a
//! new call site and overlays the new locals, so the final value carries the
//! whole path from the origin outwards.

use std::{error::Error, fmt, panic::Location};

use serde::Serialize;
use serde_json::{Map, Value};

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Where a wrap happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    pub file: &'static str,
    pub function: String,
    pub line: u32,
}

impl SiteInfo {
    #[track_caller]
    fn capture(function: &str) -> Self {
        let location = Location::caller();
        SiteInfo {
            file: location.file(),
            function: function.to_owned(),
            line: location.line(),
        }
    }
}

/// Snapshot of named values taken at a wrap point, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalState(Map<String, Value>);

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` under `key`. A value that cannot be serialized is kept
    /// as the serializer's error message.
    pub fn with<V: Serialize + ?Sized>(mut self, key: impl Into<String>, value: &V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<V: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &V) {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|error| Value::String(format!("<unserializable: {error}>")));
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Right-biased merge: keys of `newer` replace keys of `self`.
    fn overlay(mut self, newer: LocalState) -> Self {
        for (key, value) in newer.0 {
            self.0.insert(key, value);
        }
        self
    }
}

/// An error together with every call site it was wrapped at and the merged
/// local state of all those sites.
#[derive(Debug)]
pub struct ExceptionChain {
    source: BoxError,
    call_stack: Vec<SiteInfo>,
    local_state: LocalState,
}

impl ExceptionChain {
    /// Wraps `error`, recording the location of this call.
    ///
    /// If `error` is already an [`ExceptionChain`] the new site is appended to
    /// its call stack and `local_state` is overlaid on its locals. Otherwise a
    /// new chain with a single site is started.
    #[track_caller]
    pub fn wrap<E>(error: E, function_name: &str, local_state: LocalState) -> Self
    where
        E: Into<BoxError>,
    {
        let site = SiteInfo::capture(function_name);

        match error.into().downcast::<ExceptionChain>() {
            Ok(chain) => {
                let ExceptionChain {
                    source,
                    mut call_stack,
                    local_state: previous,
                } = *chain;
                call_stack.push(site);
                ExceptionChain {
                    source,
                    call_stack,
                    local_state: previous.overlay(local_state),
                }
            }
            Err(source) => ExceptionChain {
                source,
                call_stack: vec![site],
                local_state,
            },
        }
    }

    /// The error that started the chain.
    pub fn original_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Call sites, origin first.
    pub fn call_stack(&self) -> &[SiteInfo] {
        &self.call_stack
    }

    pub fn local_state(&self) -> &LocalState {
        &self.local_state
    }

    /// The first wrap site. A chain always has at least one.
    pub fn origin(&self) -> &SiteInfo {
        &self.call_stack[0]
    }

    pub fn render_report(&self) -> String {
        render_report(self)
    }
}

impl fmt::Display for ExceptionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Display already shows the original error, so the source skips past it.
impl Error for ExceptionChain {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.source()
    }
}

/// Renders the plain-text diagnostic report sent as a notification body.
///
/// The site line always names the origin of the chain, not the last rewrap.
pub fn render_report(chain: &ExceptionChain) -> String {
    let origin = chain.origin();

    let mut report = String::from("An exception has occurred in your application:\n\n");
    report.push_str(&format!("Original error message: {}\n\n", chain));
    report.push_str(&format!(
        "The error occurred in function '{}' at line number {} in file '{}'\n\n",
        origin.function, origin.line, origin.file
    ));
    report.push_str("Local object states at the point of exception:\n");
    for (key, value) in chain.local_state.iter() {
        let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        report.push_str(&format!("{}: {}\n", key, pretty));
    }

    report
}

/// `Result` adapter for [`ExceptionChain::wrap`].
pub trait WrapErr<T> {
    fn wrap_err(self, function_name: &str, local_state: LocalState)
        -> Result<T, ExceptionChain>;

    /// Like [`WrapErr::wrap_err`], building the local state only on failure.
    fn wrap_err_with<F>(self, function_name: &str, local_state: F) -> Result<T, ExceptionChain>
    where
        F: FnOnce() -> LocalState;
}

impl<T, E> WrapErr<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    #[track_caller]
    fn wrap_err(
        self,
        function_name: &str,
        local_state: LocalState,
    ) -> Result<T, ExceptionChain> {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(ExceptionChain::wrap(error, function_name, local_state)),
        }
    }

    #[track_caller]
    fn wrap_err_with<F>(self, function_name: &str, local_state: F) -> Result<T, ExceptionChain>
    where
        F: FnOnce() -> LocalState,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(ExceptionChain::wrap(error, function_name, local_state())),
        }
    }
}
