use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    Business,
    Personal,
}

/// Environment facts gathered while the session boots.
///
/// Created once the page reports its version, filled in as the bootstrap
/// progresses and published on the `DebugInfo` namespace at handoff.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DebugInfo {
    pub wa_version: String,
    pub page_ua: String,
    pub sesame_version: String,
    pub browser_version: String,
    pub os: String,
    /// Milliseconds since the Unix epoch.
    pub start_ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acc_type: Option<AccountType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_time_ms: Option<u64>,
    /// Last four digits of the account number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_hash: Option<String>,
}

impl DebugInfo {
    pub fn new(wa_version: String, page_ua: String, browser_version: String) -> Self {
        let start_ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            wa_version,
            page_ua,
            sesame_version: env!("CARGO_PKG_VERSION").to_string(),
            browser_version,
            os: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            start_ts,
            ..Default::default()
        }
    }

    /// Records the account number without keeping it in full.
    pub fn record_account(&mut self, number: &str) {
        let digits: Vec<char> = number.chars().collect();
        let tail = digits.len().saturating_sub(4);
        self.num = Some(digits[tail..].iter().collect());
        self.num_hash = Some(format!("{:x}", Sha256::digest(number.as_bytes())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_tail_of_the_number() {
        let mut info = DebugInfo::new("2.3000".into(), "UA".into(), "Chrome/120".into());
        info.record_account("447700900123");
        assert_eq!(info.num.as_deref(), Some("0123"));
        let hash = info.num_hash.clone().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(!hash.contains("447700900123"));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["NUM"], "0123");
        assert_eq!(json["WA_VERSION"], "2.3000");
        assert!(json.get("ACC_TYPE").is_none());
    }

    #[test]
    fn short_numbers_are_kept_whole() {
        let mut info = DebugInfo::default();
        info.record_account("12");
        assert_eq!(info.num.as_deref(), Some("12"));
    }
}
