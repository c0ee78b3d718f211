use std::fmt::Formatter;

/// A range or cell reference in A1 notation, optionally sheet qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Notation(String);

impl A1Notation {
    /// Every cell of a worksheet, e.g. `'Users'`.
    pub fn whole_sheet(sheet_title: &str) -> Self {
        A1Notation(quote_sheet_title(sheet_title))
    }

    /// `local` (e.g. `B2:C9`) prefixed with the quoted sheet title.
    pub fn in_sheet(sheet_title: &str, local: &str) -> Self {
        A1Notation(format!("{}!{}", quote_sheet_title(sheet_title), local))
    }

    /// The unquoted sheet title, if the reference has one.
    /// # Examples
    /// ```
    /// use sheets_relay::domain::sheets::a1_notation::A1Notation;
    /// let range = A1Notation::in_sheet("Bob's tab", "A1:B2");
    /// assert_eq!(range.as_ref(), "'Bob''s tab'!A1:B2");
    /// assert_eq!(range.sheet_title().as_deref(), Some("Bob's tab"));
    /// assert_eq!(A1Notation::from("A1").sheet_title(), None);
    /// ```
    pub fn sheet_title(&self) -> Option<String> {
        split(&self.0).0.map(unquote_sheet_title)
    }

    /// The part after the sheet title, empty for a whole-sheet reference.
    pub fn local(&self) -> &str {
        split(&self.0).1
    }
}

impl std::fmt::Display for A1Notation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<A1Notation> for String {
    fn from(a1_notation: A1Notation) -> Self {
        a1_notation.0
    }
}

impl From<String> for A1Notation {
    fn from(s: String) -> Self {
        A1Notation(s)
    }
}

impl From<&str> for A1Notation {
    fn from(s: &str) -> Self {
        A1Notation(s.to_owned())
    }
}

impl AsRef<str> for A1Notation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub trait ToA1Notation {
    fn to_a1_notation(&self, sheet_name: Option<&str>) -> A1Notation;
}

pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn unquote_sheet_title(title: &str) -> String {
    match title.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => title.to_owned(),
    }
}

/// Splits at the `!` that follows the sheet title. A title without `!` is a
/// whole-sheet reference only when it is quoted.
fn split(a1_notation: &str) -> (Option<&str>, &str) {
    if a1_notation.starts_with('\'') {
        let mut quoted = false;
        for (index, c) in a1_notation.char_indices() {
            match c {
                '\'' => quoted = !quoted,
                '!' if !quoted => return (Some(&a1_notation[..index]), &a1_notation[index + 1..]),
                _ => {}
            }
        }
        return (Some(a1_notation), "");
    }

    match a1_notation.find('!') {
        Some(index) => (Some(&a1_notation[..index]), &a1_notation[index + 1..]),
        None => (None, a1_notation),
    }
}
