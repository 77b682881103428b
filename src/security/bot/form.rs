//! Registration form payloads and the tokens issued to render them.

use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

pub const FORM_TIMESTAMP_FIELD: &str = "form_timestamp";
pub const HONEYPOT_FIELD: &str = "honeypot_field";
pub const EMAIL_FIELD: &str = "email";

/// Plausible-looking names for the decoy field.
const DECOY_NAMES: &[&str] = &["company", "phone_number", "website_url", "referrer"];

/// A submitted registration form as a flat field → value map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    fields: HashMap<String, String>,
}

impl RegistrationForm {
    /// Build from a request body, by content type. Unknown or undecodable
    /// bodies yield `None`.
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Option<Self> {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        match mime.as_str() {
            "application/x-www-form-urlencoded" => Some(Self::from_urlencoded(body)),
            "application/json" | "" => serde_json::from_slice::<serde_json::Value>(body)
                .ok()
                .and_then(|value| Self::from_json(&value)),
            _ => None,
        }
    }

    /// Scalars are stringified; nested values and nulls are dropped.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let fields = object
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((key.clone(), text))
            })
            .collect();
        Some(Self { fields })
    }

    pub fn from_urlencoded(body: &[u8]) -> Self {
        Self {
            fields: url::form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn email(&self) -> &str {
        self.get(EMAIL_FIELD).unwrap_or("")
    }

    pub fn form_timestamp(&self) -> Option<&str> {
        self.get(FORM_TIMESTAMP_FIELD)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RegistrationForm
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Handed to the client when it renders the registration form.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FormToken {
    /// Render time, epoch seconds. Echoed back as `form_timestamp`.
    pub form_timestamp: f64,
    /// Name of the decoy field. Echoed back as `honeypot_field`.
    pub honeypot_field: String,
}

/// Pick a decoy name with a 4-digit suffix taken from the render time.
pub fn decoy_field_name(epoch_secs: i64) -> String {
    let base = DECOY_NAMES[rand::thread_rng().gen_range(0..DECOY_NAMES.len())];
    format!("{}_{:04}", base, epoch_secs.rem_euclid(10_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_stringifies_scalars() {
        let body = br#"{"email":"a@b.cd","form_timestamp":1714564797.5,"newsletter":true,"tags":["x"],"middle":null}"#;
        let form = RegistrationForm::parse(Some("application/json; charset=utf-8"), body).unwrap();
        assert_eq!(form.email(), "a@b.cd");
        assert_eq!(form.form_timestamp(), Some("1714564797.5"));
        assert_eq!(form.get("newsletter"), Some("true"));
        assert_eq!(form.get("tags"), None);
        assert_eq!(form.get("middle"), None);
        assert_eq!(form.len(), 3);
    }

    #[test]
    fn test_parse_urlencoded() {
        let body = b"email=player%40example.com&username=p1&company_0042=";
        let form = RegistrationForm::parse(Some("application/x-www-form-urlencoded"), body).unwrap();
        assert_eq!(form.email(), "player@example.com");
        assert_eq!(form.get("company_0042"), Some(""));
    }

    #[test]
    fn test_parse_rejects_unknown_bodies() {
        assert!(RegistrationForm::parse(Some("text/plain"), b"hello").is_none());
        assert!(RegistrationForm::parse(Some("application/json"), b"[1,2]").is_none());
        assert!(RegistrationForm::parse(None, b"{broken").is_none());

        let judged = RegistrationForm::parse(Some("text/plain"), b"hello").unwrap_or_default();
        assert!(judged.is_empty());
        assert_eq!(judged.email(), "");
    }

    #[test]
    fn test_decoy_names() {
        let name = decoy_field_name(1_714_564_797);
        assert!(name.ends_with("_4797"));
        assert!(DECOY_NAMES.iter().any(|base| name.starts_with(base)));
        assert!(decoy_field_name(7).ends_with("_0007"));
    }
}
