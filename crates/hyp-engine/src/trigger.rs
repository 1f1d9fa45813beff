//! Trigger specification parser
//!
//! Grammar: `event[:modifier[:value]] [modifier2 ...]`, comma-separated for
//! multiple specs. Modifiers are whitespace-separated `key:value` tokens
//! after the event name; a bare key gets the value `"true"`.
//!
//! Also home to the interval/TTL token grammar shared by polling and
//! prefetching: digits with an optional `ms`/`s`/`m` suffix, seconds by
//! default.

use std::collections::HashMap;
use std::time::Duration;

/// One parsed trigger specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    pub event: String,
    pub mods: HashMap<String, String>,
}

impl TriggerSpec {
    fn flag(&self, name: &str) -> bool {
        self.mods.contains_key(name)
    }

    pub fn once(&self) -> bool {
        self.flag("once")
    }

    pub fn capture(&self) -> bool {
        self.flag("capture")
    }

    pub fn passive(&self) -> bool {
        self.flag("passive")
    }

    /// Debounce window, defaulting to 300ms when the value is absent or bad
    pub fn debounce(&self) -> Option<Duration> {
        self.mods
            .get("debounce")
            .map(|v| Duration::from_millis(v.parse().unwrap_or(300)))
    }

    /// Throttle window, defaulting to 300ms when the value is absent or bad
    pub fn throttle(&self) -> Option<Duration> {
        self.mods
            .get("throttle")
            .map(|v| Duration::from_millis(v.parse().unwrap_or(300)))
    }

    /// Selector redirecting where the listener is attached
    pub fn from(&self) -> Option<&str> {
        self.mods.get("from").map(String::as_str).filter(|s| *s != "true")
    }

    /// Intersection threshold (0.0 default)
    pub fn threshold(&self) -> f32 {
        self.mods
            .get("threshold")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    /// Intersection root margin ("0px" default)
    pub fn root_margin(&self) -> String {
        self.mods
            .get("rootMargin")
            .cloned()
            .unwrap_or_else(|| "0px".to_string())
    }
}

/// Parse one trigger spec: event name plus modifier map
pub fn parse_trigger(spec: &str) -> Option<TriggerSpec> {
    let mut parts = spec.trim().split_ascii_whitespace();
    let event = parts.next()?.to_string();
    let mut mods = HashMap::new();
    for token in parts {
        let (key, value) = match token.split_once(':') {
            Some((k, v)) => (k, v),
            None => (token, "true"),
        };
        mods.insert(key.to_string(), value.to_string());
    }
    Some(TriggerSpec { event, mods })
}

/// Parse a comma-separated list of trigger specs, skipping empties
pub fn parse_triggers(value: &str) -> Vec<TriggerSpec> {
    value.split(',').filter_map(parse_trigger).collect()
}

/// Parse an interval/TTL token: `150ms`, `2s`, `5m`, or bare seconds digits
pub fn parse_interval(token: &str) -> Option<Duration> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    let digits_end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    if digits_end == 0 {
        return None;
    }
    let value: u64 = token[..digits_end].parse().ok()?;
    match &token[digits_end..] {
        "ms" => Some(Duration::from_millis(value)),
        "s" | "" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        _ => None,
    }
}
