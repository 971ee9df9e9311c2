use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

#[allow(clippy::expect_used)]
fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("redaction pattern must compile")
}

lazy_static! {
    static ref EMAIL_REGEX: Regex = pattern(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b");
    static ref PHONE_REGEX: Regex = pattern(r"\b(?:\+\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b");
    static ref SSN_REGEX: Regex = pattern(r"\b\d{3}-\d{2}-\d{4}\b");
}

/// Payload keys whose values are always replaced, wherever they appear
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "policyId",
    "name",
    "display",
    "birthDate",
    "telecom",
    "address",
    "identifier",
];

/// PHI redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_ssn: bool,
    /// Replace values with a short hash so repeated values stay correlatable
    pub hash_for_correlation: bool,
    pub sensitive_keys: Vec<String>,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_ssn: true,
            hash_for_correlation: true,
            sensitive_keys: DEFAULT_SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect(),
            custom_patterns: Vec::new(),
        }
    }
}

/// Redactor for log messages and JSON payloads
#[derive(Debug, Clone)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    /// Mask e-mails, phone numbers, SSNs and custom patterns in free text
    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_emails {
            result = self.replace(&EMAIL_REGEX, &result, "EMAIL", "***@***");
        }
        if self.config.redact_phones {
            result = self.replace(&PHONE_REGEX, &result, "PHONE", "(***) ***-****");
        }
        if self.config.redact_ssn {
            result = self.replace(&SSN_REGEX, &result, "SSN", "***-**-****");
        }
        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).into_owned();
        }

        result
    }

    /// Copy of `value` with sensitive keys replaced and strings masked
    pub fn redact_json(&self, value: &Value) -> Value {
        match value {
            Value::Object(fields) => {
                let redacted: Map<String, Value> = fields
                    .iter()
                    .map(|(key, field)| {
                        let field = if self.is_sensitive(key) {
                            self.mask_value(field)
                        } else {
                            self.redact_json(field)
                        };
                        (key.clone(), field)
                    })
                    .collect();
                Value::Object(redacted)
            }
            Value::Array(items) => Value::Array(items.iter().map(|item| self.redact_json(item)).collect()),
            Value::String(text) => Value::String(self.redact(text)),
            other => other.clone(),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        self.config.sensitive_keys.iter().any(|k| k == key)
    }

    fn mask_value(&self, value: &Value) -> Value {
        match value {
            Value::String(text) if self.config.hash_for_correlation => {
                Value::String(format!("REDACTED[{}]", self.hash_value(text)))
            }
            Value::Null => Value::Null,
            _ => Value::String("[REDACTED]".to_string()),
        }
    }

    fn replace(&self, regex: &Regex, text: &str, label: &str, mask: &str) -> String {
        regex
            .replace_all(text, |caps: &regex::Captures| {
                if self.config.hash_for_correlation {
                    format!("{}[{}]", label, self.hash_value(caps.get(0).map_or("", |m| m.as_str())))
                } else {
                    mask.to_string()
                }
            })
            .into_owned()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let digest = hasher.finalize();
        // First 8 bytes keep the token short
        general_purpose::STANDARD_NO_PAD.encode(digest.get(..8).unwrap_or_default())
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new(RedactionConfig::default())
    }
}
