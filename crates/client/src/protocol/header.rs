//! Ordered header fields.
//!
//! Unlike [`http::HeaderMap`], [`Headers`] is a plain sequence: the wire order of
//! fields is exactly their insertion order, duplicates are kept side by side and
//! lookups compare names case-insensitively.

use http::{HeaderName, HeaderValue};

/// A single `name: value` header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl Header {
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }

    #[inline]
    fn is<N: AsRef<str>>(&self, name: N) -> bool {
        self.name.as_str().eq_ignore_ascii_case(name.as_ref())
    }
}

/// An ordered sequence of [`Header`] fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { fields: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.fields.iter()
    }

    /// Returns the first value stored under `name`.
    pub fn get<N: AsRef<str>>(&self, name: N) -> Option<&HeaderValue> {
        self.fields.iter().find(|h| h.is(name.as_ref())).map(|h| &h.value)
    }

    /// Returns the first value stored under `name` as a `&str`, empty if absent or not visible ASCII.
    pub fn get_str<N: AsRef<str>>(&self, name: N) -> &str {
        self.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
    }

    pub fn get_all<'a, N: AsRef<str> + 'a>(&'a self, name: N) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.fields.iter().filter(move |h| h.is(name.as_ref())).map(|h| &h.value)
    }

    pub fn contains<N: AsRef<str>>(&self, name: N) -> bool {
        self.fields.iter().any(|h| h.is(name.as_ref()))
    }

    /// Checks whether any `name` field lists `token` in its comma separated value.
    ///
    /// Both sides are compared case-insensitively, so `Connection: Keep-Alive, Close`
    /// contains the token `close`.
    pub fn contains_token<N: AsRef<str>>(&self, name: N, token: &str) -> bool {
        self.get_all(name).any(|value| {
            value.as_bytes().split(|b| *b == b',').any(|item| item.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
        })
    }

    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        self.fields.push(Header::new(name, value));
    }

    /// Replaces the first `name` field in place and drops the others, or appends when absent.
    pub fn set(&mut self, name: HeaderName, value: HeaderValue) {
        match self.fields.iter().position(|h| h.is(&name)) {
            Some(index) => {
                self.fields[index].value = value;
                let mut seen = 0usize;
                self.fields.retain(|h| {
                    if h.is(&name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.append(name, value),
        }
    }

    /// Removes every `name` field, returning how many were dropped.
    pub fn remove<N: AsRef<str>>(&mut self, name: N) -> usize {
        let before = self.fields.len();
        self.fields.retain(|h| !h.is(name.as_ref()));
        before - self.fields.len()
    }

    pub fn retain<F: FnMut(&Header) -> bool>(&mut self, f: F) {
        self.fields.retain(f);
    }

    pub fn extend<I: IntoIterator<Item = Header>>(&mut self, iter: I) {
        self.fields.extend(iter);
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

impl FromIterator<(HeaderName, HeaderValue)> for Headers {
    fn from_iter<I: IntoIterator<Item = (HeaderName, HeaderValue)>>(iter: I) -> Self {
        iter.into_iter().map(|(name, value)| Header::new(name, value)).collect()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for Headers {
    type Item = Header;
    type IntoIter = std::vec::IntoIter<Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
