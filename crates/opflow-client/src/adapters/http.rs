use async_trait::async_trait;
use chrono::Utc;
use opflow_core::HttpConfig;
use opflow_crypto::{sign_request, KeyPair, RequestParts, JSON_CONTENT_TYPE};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ClientError;
use crate::traits::{ClientFactory, ClientHandle, OpenPaymentsApi};
use crate::types::{
    normalize_wallet_url, AccessToken, CreateIncomingPayment, CreateOutgoingPayment,
    GrantRequest, GrantResponse, IncomingPayment, OutgoingPayment, Page, RotatedToken,
    WalletAddress,
};

/// Open Payments client speaking signed HTTP.
///
/// Every request except the public wallet address lookup carries an
/// Ed25519 HTTP message signature; resource and token requests also carry
/// `Authorization: GNAP <token>`.
pub struct HttpClient {
    http: reqwest::Client,
    wallet_address_url: String,
    key_id: String,
    keypair: KeyPair,
}

impl HttpClient {
    pub fn new(
        wallet_url: &str,
        private_key: &str,
        key_id: &str,
        config: &HttpConfig,
    ) -> Result<Self, ClientError> {
        let keypair = KeyPair::from_encoded_private_key(private_key)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            wallet_address_url: normalize_wallet_url(wallet_url),
            key_id: key_id.to_string(),
            keypair,
        })
    }

    /// Send a signed request and return the response if it was successful.
    async fn send(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, ClientError> {
        let authorization = token.map(|t| format!("GNAP {}", t));
        let parts = RequestParts {
            method: method.as_str(),
            target_uri: url,
            authorization: authorization.as_deref(),
            body: body.as_deref(),
        };
        let signed = sign_request(&parts, &self.key_id, &self.keypair, Utc::now().timestamp());

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header("Signature", signed.signature)
            .header("Signature-Input", signed.signature_input);
        if let Some(auth) = authorization {
            request = request.header(AUTHORIZATION, auth);
        }
        if let Some(digest) = signed.content_digest {
            request = request.header("Content-Digest", digest);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(body);
        }

        tracing::debug!(%method, %url, "sending signed request");
        let response = request.send().await?;
        check_status(&method, url, response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> Result<T, ClientError> {
        let response = self.send(method, url, token, body).await?;
        decode(url, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_vec(body)?;
        self.send_json(Method::POST, url, token, Some(body)).await
    }
}

async fn check_status(
    method: &Method,
    url: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = api_error(method, url, status, &body);
    tracing::debug!(%method, %url, status = status.as_u16(), error = %err, "request rejected");
    Err(err)
}

async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    Plain(String),
}

/// Build an [`ClientError::Api`] from an error response body.
///
/// Auth servers answer `{"error": {"code", "description"}}`, resource
/// servers `{"message"}`.
fn api_error(method: &Method, url: &str, status: StatusCode, body: &str) -> ClientError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let (code, description) = match parsed.error {
        Some(ErrorDetail::Structured { code, description }) => (code, description),
        Some(ErrorDetail::Plain(code)) => (Some(code), None),
        None => (None, None),
    };
    let description = description
        .or(parsed.message)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| status.as_str().to_string());
    ClientError::Api {
        method: method.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
        code,
        description,
    }
}

fn endpoint(resource_server: &str, path: &str) -> String {
    format!("{}/{}", resource_server.trim_end_matches('/'), path)
}

fn outgoing_payments_url(
    resource_server: &str,
    wallet_address: &str,
    first: u32,
) -> Result<Url, ClientError> {
    let base = endpoint(resource_server, "outgoing-payments");
    let mut url = Url::parse(&base).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base, e)))?;
    url.query_pairs_mut()
        .append_pair("wallet-address", wallet_address)
        .append_pair("first", &first.to_string());
    Ok(url)
}

#[async_trait]
impl OpenPaymentsApi for HttpClient {
    fn wallet_address_url(&self) -> &str {
        &self.wallet_address_url
    }

    async fn get_wallet_address(&self, url: &str) -> Result<WalletAddress, ClientError> {
        let url = normalize_wallet_url(url);
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .send()
            .await?;
        let response = check_status(&Method::GET, &url, response).await?;
        decode(&url, response).await
    }

    async fn request_grant(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<GrantResponse, ClientError> {
        self.post_json(auth_server, None, request).await
    }

    async fn continue_grant(
        &self,
        continue_uri: &str,
        continue_token: &str,
    ) -> Result<GrantResponse, ClientError> {
        self.send_json(Method::POST, continue_uri, Some(continue_token), None)
            .await
    }

    async fn cancel_grant(
        &self,
        continue_uri: &str,
        continue_token: &str,
    ) -> Result<(), ClientError> {
        self.send(Method::DELETE, continue_uri, Some(continue_token), None)
            .await?;
        Ok(())
    }

    async fn rotate_token(
        &self,
        management_url: &str,
        access_token: &str,
    ) -> Result<AccessToken, ClientError> {
        let rotated: RotatedToken = self
            .send_json(Method::POST, management_url, Some(access_token), None)
            .await?;
        Ok(rotated.access_token)
    }

    async fn create_incoming_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateIncomingPayment,
    ) -> Result<IncomingPayment, ClientError> {
        let url = endpoint(resource_server, "incoming-payments");
        self.post_json(&url, Some(access_token), request).await
    }

    async fn create_outgoing_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateOutgoingPayment,
    ) -> Result<OutgoingPayment, ClientError> {
        let url = endpoint(resource_server, "outgoing-payments");
        self.post_json(&url, Some(access_token), request).await
    }

    async fn list_outgoing_payments(
        &self,
        resource_server: &str,
        access_token: &str,
        wallet_address: &str,
        first: u32,
    ) -> Result<Vec<OutgoingPayment>, ClientError> {
        let url = outgoing_payments_url(resource_server, wallet_address, first)?;
        let page: Page<OutgoingPayment> = self
            .send_json(Method::GET, url.as_str(), Some(access_token), None)
            .await?;
        Ok(page.result)
    }
}

/// Builds [`HttpClient`]s sharing one transport configuration.
pub struct HttpClientFactory {
    config: HttpConfig,
}

impl HttpClientFactory {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(
        &self,
        wallet_url: &str,
        private_key: &str,
        key_id: &str,
    ) -> Result<ClientHandle, ClientError> {
        let client = HttpClient::new(wallet_url, private_key, key_id, &self.config)?;
        tracing::debug!(wallet = %client.wallet_address_url, %key_id, "created http client");
        Ok(Arc::new(client))
    }
}
