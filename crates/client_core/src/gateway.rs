use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use shared::protocol::ContractCall;

use crate::{config::Settings, ContractReader};

/// `ContractReader` over a JSON read-only gateway. The gateway exposes the
/// contract's read-only functions at
/// `POST {base}/v2/read-only/{contract_address}/{contract_name}/{function}`
/// taking the argument list as JSON and returning the projected value
/// (`null` when the contract returns none).
pub struct HttpContractReader {
    http: Client,
    base_url: Url,
    contract_address: String,
    contract_name: String,
}

impl HttpContractReader {
    pub fn new(settings: &Settings) -> Result<Self> {
        let base_url = Url::parse(&settings.gateway_url)
            .with_context(|| format!("invalid gateway url: {}", settings.gateway_url))?;
        Ok(Self {
            http: Client::new(),
            base_url,
            contract_address: settings.contract_address.clone(),
            contract_name: settings.contract_name.clone(),
        })
    }

    fn endpoint(&self, function: &str) -> Result<Url> {
        self.base_url
            .join(&format!(
                "/v2/read-only/{}/{}/{function}",
                self.contract_address, self.contract_name
            ))
            .context("failed to build read-only endpoint url")
    }
}

#[async_trait]
impl ContractReader for HttpContractReader {
    async fn read_only(&self, call: ContractCall) -> Result<serde_json::Value> {
        let endpoint = self.endpoint(&call.function)?;
        let value = self
            .http
            .post(endpoint.clone())
            .json(&call.args)
            .send()
            .await
            .with_context(|| format!("read-only call failed: {endpoint}"))?
            .error_for_status()
            .with_context(|| format!("gateway rejected read-only call: {}", call.function))?
            .json()
            .await
            .with_context(|| format!("invalid gateway response for {}", call.function))?;
        Ok(value)
    }
}
