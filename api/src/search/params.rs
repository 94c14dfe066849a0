/// Raw query-string parameters of a product listing request.
///
/// Keys keep their first-seen order; a repeated key collects every value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl RawQueryParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            params.push(key.into(), value.into());
        }
        params
    }

    pub fn push(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// First value given for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values(key).first().map(String::as_str)
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }
}

/// Splits bracketed operator syntax: `price[gte]` -> `("price", "gte")`
pub fn split_operator_key(key: &str) -> Option<(&str, &str)> {
    let inner = key.strip_suffix(']')?;
    let open = inner.find('[')?;
    let (field, token) = (&inner[..open], &inner[open + 1..]);
    if field.is_empty() || token.is_empty() || token.contains(['[', ']']) {
        return None;
    }
    Some((field, token))
}
