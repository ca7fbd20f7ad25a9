// Reply sentence classification
//
// Every sentence the router sends starts with a reply word (`!re`,
// `!done`, `!trap`, `!fatal`, `!empty`). Attribute words have the form
// `=key=value`; the value may itself contain `=`.

use std::collections::BTreeMap;

use crate::error::Error;

/// One `!re` data record: attribute name to raw string value.
///
/// RouterOS transmits every value as text, so numeric fields like
/// `sent` or `received` are parsed by the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A decoded reply sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `!re`: one data record.
    Record(Record),
    /// `!done`: end of the command's output. May carry attributes (`=ret=`).
    Done(Record),
    /// `!empty`: the command produced no records (RouterOS 7.18+).
    Empty,
    /// `!trap`: the command failed. Always followed by `!done`.
    Trap { message: String },
    /// `!fatal`: the router is closing the session.
    Fatal { message: String },
}

impl Reply {
    /// Classify a sentence received from the router.
    pub fn parse(words: Vec<String>) -> Result<Self, Error> {
        let mut words = words.into_iter();
        let Some(kind) = words.next() else {
            return Err(Error::Protocol("empty reply sentence".into()));
        };

        match kind.as_str() {
            "!re" => Ok(Self::Record(parse_attributes(words))),
            "!done" => Ok(Self::Done(parse_attributes(words))),
            "!empty" => Ok(Self::Empty),
            "!trap" => {
                let attrs = parse_attributes(words);
                let message = attrs
                    .get("message")
                    .unwrap_or("unknown error")
                    .to_owned();
                Ok(Self::Trap { message })
            }
            // `!fatal` carries a bare message word, not an attribute.
            "!fatal" => Ok(Self::Fatal {
                message: words.collect::<Vec<_>>().join(" "),
            }),
            other => Err(Error::Protocol(format!("unexpected reply word {other:?}"))),
        }
    }
}

/// Collect `=key=value` words, skipping API tags (`.tag=`) and anything else.
fn parse_attributes(words: impl Iterator<Item = String>) -> Record {
    words
        .filter_map(|word| {
            let rest = word.strip_prefix('=')?;
            let (key, value) = rest.split_once('=').unwrap_or((rest, ""));
            Some((key.to_owned(), value.to_owned()))
        })
        .collect()
}
