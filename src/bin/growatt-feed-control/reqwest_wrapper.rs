use anyhow::Context;
use async_trait::async_trait;
use growatt2feed::gateway_config::{Credentials, GatewayConfig};
use growatt2feed::gateway_wrapper::{Envelope, FormParams, GatewayWrapper};
use log::debug;
use reqwest::Client;

pub struct ReqwestWrapper {
    client: Client,
    base_url: String,
    permissions_key: String,
}

#[async_trait]
impl GatewayWrapper for ReqwestWrapper {
    async fn post(&self, credentials: &Credentials, params: &FormParams) -> anyhow::Result<Envelope> {
        let response = self
            .client
            .post(&self.base_url)
            .header("maketoken", credentials.token())
            .header("permissionskey", &self.permissions_key)
            .form(params)
            .send()
            .await
            .context("gateway request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("could not read gateway response")?;
        debug!("gateway replied {status}: {body}");

        // error statuses still carry a usable envelope most of the time
        serde_json::from_str(&body)
            .with_context(|| format!("unparsable gateway response ({status}): {body}"))
    }

    fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("could not build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            permissions_key: config.permissions_key.clone(),
        })
    }
}
