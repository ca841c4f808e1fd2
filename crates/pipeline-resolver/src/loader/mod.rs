//! per-platform yaml loaders
//!
//! Each loader turns the raw bytes of one pipeline file into a [crate::document::Document], annotating every
//! import declaration with its [crate::location::SourceLocation]. Loaders only need to be valid yaml to accept a
//! file; unknown keys are ignored.
pub mod azure;
pub mod bitbucket;
pub mod github;
pub mod gitlab;

use crate::location::Locator;
use crate::platform::Platform;
use serde_yaml::{Mapping, Value};

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("file is not valid utf-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Unable to parse yaml file")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("invalid {platform} pipeline: {message}")]
    InvalidDocument { platform: Platform, message: String },
}

/// Raw text and root mapping of a yaml file
///
/// An empty file is an empty mapping.
pub(crate) fn read(bytes: &[u8], platform: Platform) -> Result<(&str, Mapping), LoadError> {
    let text = std::str::from_utf8(bytes)?;
    match serde_yaml::from_str::<Value>(text)? {
        Value::Mapping(mapping) => Ok((text, mapping)),
        Value::Null => Ok((text, Mapping::new())),
        other => Err(LoadError::InvalidDocument {
            platform,
            message: format!("expected a mapping at the document root, found {}", kind(&other)),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

pub(crate) fn string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// Entries of a sequence, or nothing
pub(crate) fn items(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Scalar strings, given either as a single string or a sequence of strings
pub(crate) fn strings(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::String(single)) => vec![single.as_str()],
        Some(Value::Sequence(sequence)) => sequence.iter().filter_map(Value::as_str).collect(),
        _ => vec![],
    }
}

/// Locate a mapping entry by its first key, matching the value when it is a single-line string
pub(crate) fn locate_entry(
    locator: &mut Locator,
    entry: &Mapping,
    after: usize,
) -> crate::location::SourceLocation {
    let first = entry
        .iter()
        .next()
        .and_then(|(key, value)| key.as_str().map(|key| (key, value.as_str())));

    match first {
        Some((key, value)) => {
            let value = value.filter(|value| !value.contains('\n'));
            locator.find(key, value, after)
        }
        None => locator.synthetic(),
    }
}
