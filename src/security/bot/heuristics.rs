//! Individual bot signals. Each check is a pure function of its inputs.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::{Regex, RegexSet};
use std::collections::HashSet;

use crate::clock::epoch_secs;
use crate::security::bot::form::{RegistrationForm, HONEYPOT_FIELD};

/// Substrings that mark a user agent as automated.
pub const BOT_USER_AGENT_TOKENS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "scraper",
    "curl",
    "wget",
    "python-requests",
    "python-urllib",
    "automated",
    "headless",
];

pub const MIN_USER_AGENT_LEN: usize = 20;
pub const MAX_USER_AGENT_LEN: usize = 500;

lazy_static! {
    static ref EMAIL_SHAPE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex");
    static ref THROWAWAY_EMAIL: RegexSet = RegexSet::new([
        r"test.*@",
        r"temp.*@",
        r"^\d{10,}@",
        r"@fake",
        r"@temp",
    ])
    .expect("valid throwaway email patterns");
}

/// A failed check, as recorded in the violation ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    SuspiciousUserAgent,
    SuspiciousFormTiming,
    SuspiciousEmail,
    HoneypotFilled,
}

impl Violation {
    /// Reason stored in the ledger.
    pub fn ledger_reason(self) -> &'static str {
        match self {
            Violation::SuspiciousUserAgent => "Suspicious user agent",
            Violation::SuspiciousFormTiming => "Suspicious form timing",
            Violation::SuspiciousEmail => "Suspicious email pattern",
            Violation::HoneypotFilled => "Honeypot field filled",
        }
    }

    /// Reason reported to the caller.
    pub fn message(self) -> &'static str {
        match self {
            Violation::SuspiciousUserAgent => "Invalid browser detected",
            Violation::SuspiciousFormTiming => "Form submitted too quickly or expired",
            Violation::SuspiciousEmail => "Invalid email address",
            Violation::HoneypotFilled => "Automated submission detected",
        }
    }

    pub fn metric_label(self) -> &'static str {
        match self {
            Violation::SuspiciousUserAgent => "user_agent",
            Violation::SuspiciousFormTiming => "form_timing",
            Violation::SuspiciousEmail => "email",
            Violation::HoneypotFilled => "honeypot",
        }
    }
}

/// Empty, bot-token, or implausibly sized user agents are suspicious.
pub fn is_suspicious_user_agent(user_agent: Option<&str>) -> bool {
    let user_agent = match user_agent {
        Some(ua) if !ua.is_empty() => ua,
        _ => return true,
    };

    let lower = user_agent.to_lowercase();
    if BOT_USER_AGENT_TOKENS.iter().any(|token| lower.contains(token)) {
        return true;
    }

    let len = user_agent.chars().count();
    !(MIN_USER_AGENT_LEN..=MAX_USER_AGENT_LEN).contains(&len)
}

/// `raw` is the form render time in epoch seconds. Unparsable values fail.
pub fn check_form_timing(raw: &str, now: DateTime<Utc>, min_fill_secs: f64, max_fill_secs: f64) -> bool {
    let rendered_at = match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return false,
    };
    let elapsed = epoch_secs(now) - rendered_at;
    elapsed >= min_fill_secs && elapsed <= max_fill_secs
}

/// Well-formed, not throwaway-looking, not on the disposable denylist.
pub fn is_acceptable_email(email: &str, disposable_domains: &HashSet<String>) -> bool {
    if email.is_empty() || !EMAIL_SHAPE.is_match(email) {
        return false;
    }

    let lower = email.to_lowercase();
    if THROWAWAY_EMAIL.is_match(&lower) {
        return false;
    }

    match lower.rsplit_once('@') {
        Some((_, domain)) => !disposable_domains.contains(domain),
        None => false,
    }
}

/// The form names its decoy field in `honeypot_field`; a filled decoy trips it.
pub fn honeypot_triggered(form: &RegistrationForm) -> bool {
    let decoy = match form.get(HONEYPOT_FIELD) {
        Some(name) if !name.is_empty() => name,
        _ => return false,
    };
    form.get(decoy)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BROWSER: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

    fn disposable() -> HashSet<String> {
        ["mailinator.com", "yopmail.com"].iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_user_agent_signals() {
        assert!(!is_suspicious_user_agent(Some(BROWSER)));
        assert!(is_suspicious_user_agent(None));
        assert!(is_suspicious_user_agent(Some("")));
        assert!(is_suspicious_user_agent(Some("curl/7.68.0")));
        assert!(is_suspicious_user_agent(Some("Mozilla/5.0 (compatible; Googlebot/2.1)")));
        assert!(is_suspicious_user_agent(Some("Mozilla/5.0 HeadlessChrome/120.0.0.0 Safari")));
        assert!(is_suspicious_user_agent(Some("Mozilla/5.0 short")));
        assert!(is_suspicious_user_agent(Some(&"A".repeat(501))));
    }

    #[test]
    fn test_form_timing_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let at = |secs_ago: f64| (epoch_secs(now) - secs_ago).to_string();

        assert!(!check_form_timing(&at(1.0), now, 3.0, 1800.0));
        assert!(check_form_timing(&at(3.0), now, 3.0, 1800.0));
        assert!(check_form_timing(&at(10.0), now, 3.0, 1800.0));
        assert!(check_form_timing(&at(1800.0), now, 3.0, 1800.0));
        assert!(!check_form_timing(&at(1801.0), now, 3.0, 1800.0));
        assert!(!check_form_timing(&at(-60.0), now, 3.0, 1800.0));
    }

    #[test]
    fn test_malformed_timestamp_fails() {
        let now = Utc::now();
        assert!(!check_form_timing("yesterday", now, 3.0, 1800.0));
        assert!(!check_form_timing("", now, 3.0, 1800.0));
        assert!(!check_form_timing("NaN", now, 3.0, 1800.0));
    }

    #[test]
    fn test_email_patterns() {
        let deny = disposable();
        assert!(is_acceptable_email("player.one@gmail.com", &deny));
        assert!(is_acceptable_email("a_b+games@example.co.uk", &deny));

        assert!(!is_acceptable_email("", &deny));
        assert!(!is_acceptable_email("no-at-sign.example.com", &deny));
        assert!(!is_acceptable_email("user@localhost", &deny));
        assert!(!is_acceptable_email("testuser@gmail.com", &deny));
        assert!(!is_acceptable_email("TempAccount@gmail.com", &deny));
        assert!(!is_acceptable_email("5551234567@gmail.com", &deny));
        assert!(!is_acceptable_email("me@fakemail.net", &deny));
        assert!(!is_acceptable_email("me@Mailinator.com", &deny));
    }

    #[test]
    fn test_honeypot() {
        let clean: RegistrationForm = [("honeypot_field", "website_url_1234"), ("email", "a@b.cd")]
            .into_iter()
            .collect();
        assert!(!honeypot_triggered(&clean));

        let blank: RegistrationForm = [("honeypot_field", "website_url_1234"), ("website_url_1234", "  ")]
            .into_iter()
            .collect();
        assert!(!honeypot_triggered(&blank));

        let filled: RegistrationForm = [("honeypot_field", "website_url_1234"), ("website_url_1234", "http://spam")]
            .into_iter()
            .collect();
        assert!(honeypot_triggered(&filled));

        let unnamed: RegistrationForm = [("website_url_1234", "http://spam")].into_iter().collect();
        assert!(!honeypot_triggered(&unnamed));
    }
}
