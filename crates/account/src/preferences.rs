//! Per-account notification delivery preferences, kept in the KV store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use ledger_domain::Result;
use ledger_kv::KvStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSettings {
    pub enabled: bool,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    pub enabled: bool,
    #[serde(default)]
    pub projects: HashMap<i64, ProjectSettings>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            enabled: true,
            projects: HashMap::new(),
        }
    }
}

fn key(account_id: i64) -> String {
    format!("notifications:prefs:{account_id}")
}

pub async fn get(kv: &KvStore, account_id: i64) -> Result<Preferences> {
    let raw = kv.get(&key(account_id)).await?;
    Ok(raw
        .and_then(|v| serde_json::from_str(&v).ok())
        .unwrap_or_default())
}

pub async fn update(kv: &KvStore, account_id: i64, prefs: &Preferences) -> Result<Preferences> {
    let raw = serde_json::to_string(prefs)?;
    // Preferences have no natural expiry; a year keeps abandoned accounts
    // from pinning keys forever.
    kv.set_ex(&key(account_id), &raw, 365 * 24 * 3600).await?;
    Ok(prefs.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_enabled_with_no_project_rules() {
        let prefs = Preferences::default();
        assert!(prefs.enabled);
        assert!(prefs.projects.is_empty());
    }

    #[test]
    fn json_roundtrip() {
        let mut prefs = Preferences::default();
        prefs.projects.insert(
            7,
            ProjectSettings {
                enabled: false,
                levels: vec!["critical".into()],
                types: vec![],
            },
        );
        let raw = serde_json::to_string(&prefs).unwrap();
        let back: Preferences = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, prefs);
    }
}
