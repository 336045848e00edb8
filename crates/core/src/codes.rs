//! Configurable enumerated code lists (depletion reasons, loss categories).
//!
//! Lists are passed explicitly to validators instead of living in global
//! constants, so tests and deployments can supply their own.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// An allowed set of lowercase codes, one of which means "other" and demands
/// free-text notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeList {
    name: String,
    codes: Vec<String>,
    other_code: String,
}

impl CodeList {
    pub fn new(
        name: impl Into<String>,
        codes: impl IntoIterator<Item = impl Into<String>>,
        other_code: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        let other_code = normalize(&other_code.into());
        let mut codes: Vec<String> = codes.into_iter().map(|c| normalize(&c.into())).collect();
        codes.retain(|c| !c.is_empty());
        for (i, code) in codes.iter().enumerate() {
            if codes[..i].contains(code) {
                return Err(DomainError::validation(format!("{name} '{code}' is listed more than once")));
            }
        }
        if codes.is_empty() {
            return Err(DomainError::validation(format!("{name} list cannot be empty")));
        }
        if !codes.contains(&other_code) {
            codes.push(other_code.clone());
        }
        Ok(Self {
            name,
            codes,
            other_code,
        })
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn other_code(&self) -> &str {
        &self.other_code
    }

    pub fn contains(&self, code: &str) -> bool {
        let code = normalize(code);
        self.codes.iter().any(|c| *c == code)
    }

    /// Validate `code` (and, for the "other" code, the presence of notes).
    ///
    /// Returns the normalized code.
    pub fn validate(&self, code: &str, notes: Option<&str>) -> DomainResult<String> {
        let normalized = normalize(code);
        if !self.contains(&normalized) {
            return Err(DomainError::validation(format!(
                "invalid {} '{}' (expected one of: {})",
                self.name,
                code,
                self.codes.join(", ")
            )));
        }
        let has_notes = notes.is_some_and(|n| !n.trim().is_empty());
        if normalized == self.other_code && !has_notes {
            return Err(DomainError::validation(format!(
                "notes are required when {} is '{}'",
                self.name, self.other_code
            )));
        }
        Ok(normalized)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasons() -> CodeList {
        CodeList::new("depletion reason", ["spoilage", "gift", "other"], "other").unwrap()
    }

    #[test]
    fn accepts_known_code_case_insensitively() {
        assert_eq!(reasons().validate("Spoilage", None).unwrap(), "spoilage");
    }

    #[test]
    fn rejects_unknown_code() {
        let err = reasons().validate("theft", None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn other_requires_notes() {
        assert!(reasons().validate("other", None).is_err());
        assert!(reasons().validate("other", Some("   ")).is_err());
        assert!(reasons().validate("other", Some("fed to the dog")).is_ok());
    }

    #[test]
    fn duplicate_codes_are_rejected_wherever_they_appear() {
        let err = CodeList::new("loss category", ["burnt", "broken", "Burnt "], "other").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(err.to_string().contains("loss category 'burnt' is listed more than once"));
    }

    #[test]
    fn other_code_is_always_allowed() {
        let list = CodeList::new("loss category", ["burnt"], "other").unwrap();
        assert!(list.contains("other"));
    }
}
