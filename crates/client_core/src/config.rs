use std::{collections::HashMap, fs};

use serde::Deserialize;
use shared::protocol::Network;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub gateway_url: String,
    pub contract_address: String,
    pub contract_name: String,
    pub network: Network,
    pub page_size: usize,
    pub submission_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_url: "https://api.testnet.hiro.so".into(),
            contract_address: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".into(),
            contract_name: "bridgarr".into(),
            network: Network::Testnet,
            page_size: 10,
            submission_timeout_secs: 120,
        }
    }
}

/// Defaults, overridden by an optional `bridgarr.toml` in the working
/// directory, overridden in turn by `BRIDGARR_*` environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("bridgarr.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply(&mut settings, |key| file_cfg.get(key).cloned());
        }
    }

    apply(&mut settings, |key| {
        std::env::var(format!("BRIDGARR_{}", key.to_uppercase())).ok()
    });

    settings
}

fn apply(settings: &mut Settings, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("gateway_url") {
        settings.gateway_url = v;
    }
    if let Some(v) = get("contract_address") {
        settings.contract_address = v;
    }
    if let Some(v) = get("contract_name") {
        settings.contract_name = v;
    }
    if let Some(v) = get("network") {
        if let Some(network) = parse_network(&v) {
            settings.network = network;
        }
    }
    if let Some(v) = get("page_size") {
        if let Ok(parsed) = v.parse::<usize>() {
            if parsed > 0 {
                settings.page_size = parsed;
            }
        }
    }
    if let Some(v) = get("submission_timeout_secs") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.submission_timeout_secs = parsed;
        }
    }
}

fn parse_network(raw: &str) -> Option<Network> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "testnet" => Some(Network::Testnet),
        "mainnet" => Some(Network::Mainnet),
        _ => None,
    }
}
