//! URL-encoded field lists. Paynow hashes values in the order the fields
//! appear, so fields are kept as an ordered list rather than a map.

use url::form_urlencoded;

/// Ordered `key=value` pairs.
pub type Fields = Vec<(String, String)>;

/// Parses a form body, keeping field order.
pub fn parse(body: &str) -> Fields {
    form_urlencoded::parse(body.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub fn encode(fields: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

/// First value of `name`, compared case-insensitively.
pub fn get<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
