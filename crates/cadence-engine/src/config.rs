use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the SQLite database file.
    pub data_dir: String,
    /// Result-size cap for the "latest habits" listing.
    #[serde(default = "default_latest_limit")]
    pub latest_limit: usize,
}

fn default_latest_limit() -> usize {
    6
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            latest_limit: default_latest_limit(),
        }
    }
}
