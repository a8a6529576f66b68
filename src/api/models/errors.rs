//! Field-scoped validation errors.
//!
//! Errors form a tree keyed by field-path segments. A leaf holds the messages for one
//! field, an inner node holds the errors of a nested object or list item. The tree
//! serialises to the JSON shape returned in 400 responses, e.g.
//! `{"resources": {"0": {"schema": {"language": ["..."]}}}}`.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// One node of the error tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorNode {
    Messages(Vec<String>),
    Nested(ValidationErrors),
}

impl Serialize for ErrorNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ErrorNode::Messages(messages) => messages.serialize(serializer),
            ErrorNode::Nested(nested) => nested.serialize(serializer),
        }
    }
}

/// Key used when messages and nested errors collide on the same field.
const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Recursive mapping from field name to messages or nested errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, ErrorNode>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Append a message to `field`, keeping earlier messages in order.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.extend(field, [message.into()]);
    }

    /// Append several messages to `field`.
    pub fn extend<I>(&mut self, field: impl Into<String>, messages: I)
    where
        I: IntoIterator<Item = String>,
    {
        let messages: Vec<String> = messages.into_iter().collect();
        if messages.is_empty() {
            return;
        }
        let field = field.into();
        match self.0.get_mut(&field) {
            Some(ErrorNode::Messages(existing)) => existing.extend(messages),
            Some(ErrorNode::Nested(nested)) => nested.extend(NON_FIELD_ERRORS, messages),
            None => {
                self.0.insert(field, ErrorNode::Messages(messages));
            }
        }
    }

    /// Attach a nested error tree under `field`. Empty trees are dropped.
    pub fn nest(&mut self, field: impl Into<String>, nested: ValidationErrors) {
        if nested.is_empty() {
            return;
        }
        let mut wrapper = ValidationErrors::new();
        wrapper.0.insert(field.into(), ErrorNode::Nested(nested));
        self.merge(wrapper);
    }

    /// Merge another tree into this one. Message lists on the same field are
    /// concatenated and nested trees are merged recursively.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, node) in other.0 {
            match node {
                ErrorNode::Messages(messages) => self.extend(field, messages),
                ErrorNode::Nested(nested) => match self.0.get_mut(&field) {
                    Some(ErrorNode::Nested(existing)) => existing.merge(nested),
                    Some(ErrorNode::Messages(_)) => {
                        let Some(ErrorNode::Messages(messages)) = self.0.remove(&field) else {
                            continue;
                        };
                        let mut combined = nested;
                        combined.extend(NON_FIELD_ERRORS, messages);
                        self.0.insert(field, ErrorNode::Nested(combined));
                    }
                    None => {
                        self.0.insert(field, ErrorNode::Nested(nested));
                    }
                },
            }
        }
    }

    /// Remove and return the messages recorded directly on `field`.
    pub fn take(&mut self, field: &str) -> Vec<String> {
        match self.0.remove(field) {
            Some(ErrorNode::Messages(messages)) => messages,
            Some(nested @ ErrorNode::Nested(_)) => {
                self.0.insert(field.to_string(), nested);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Messages recorded directly on `field`, if any.
    pub fn messages(&self, field: &str) -> Option<&[String]> {
        match self.0.get(field) {
            Some(ErrorNode::Messages(messages)) => Some(messages),
            _ => None,
        }
    }

    /// Wrap this tree under a dotted path, e.g. `wrap("data.attributes")`.
    pub fn wrap(self, path: &str) -> ValidationErrors {
        path.rsplit('.')
            .filter(|segment| !segment.is_empty())
            .fold(self, |inner, segment| {
                let mut outer = ValidationErrors::new();
                outer.nest(segment, inner);
                outer
            })
    }

    /// Convert into `Ok(())` when empty, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
