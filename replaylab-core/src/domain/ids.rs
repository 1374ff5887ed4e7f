use serde::{Deserialize, Serialize};
use std::fmt;

/// Template ID — the unique key tying an intent to its fills and trade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl TemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One-cancels-other group ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OcoGroupId(pub String);

impl OcoGroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for OcoGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OcoGroupId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_id_ordering_is_lexicographic() {
        let a = TemplateId::from("T0001");
        let b = TemplateId::from("T0002");
        assert!(a < b);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TemplateId::from("T0042");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"T0042\"");
        let oco = OcoGroupId::from("G7");
        assert_eq!(serde_json::to_string(&oco).unwrap(), "\"G7\"");
    }
}
