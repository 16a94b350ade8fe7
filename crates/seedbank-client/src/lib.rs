//! # seedbank-client — HTTP client for the accession API
//!
//! [`SeedbankClient`] implements the engine's
//! [`AccessionRepository`] over the backend's JSON API.
//!
//! ## API Paths
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/api/v2/seedbank/accessions/{id}` | load |
//! | PUT    | `/api/v2/seedbank/accessions/{id}` | save (`If-Match: <version>`) |
//! | DELETE | `/api/v2/seedbank/accessions/{id}` | delete |
//! | POST   | `/api/v2/seedbank/accessions/{id}/checkIn` | check in |
//! | POST   | `/api/v2/seedbank/accessions/{id}/withdrawals` | general withdrawal |
//! | POST   | `/api/v2/seedbank/accessions/{id}/transfers/nursery` | nursery transfer |
//! | POST   | `/api/v2/seedbank/accessions/{id}/viabilityTests` | create test |
//! | PUT    | `/api/v2/seedbank/accessions/{id}/viabilityTests/{testId}` | update test |
//! | DELETE | `/api/v2/seedbank/accessions/{id}/viabilityTests/{testId}` | delete test |
//!
//! ## Failures
//!
//! Requests are sent once. A failed call is reported to the engine as a
//! [`RepositoryError`](seedbank_accession::RepositoryError) and the caller
//! decides whether to offer the action again.

pub mod config;
pub mod error;

pub use config::SeedbankApiConfig;
pub use error::ClientError;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, IF_MATCH};
use serde::de::DeserializeOwned;

use seedbank_accession::{
    Accession, AccessionRepository, NewWithdrawal, NurseryTransfer, RepositoryError,
    ViabilityTest, ViabilityTestPayload, Withdrawal,
};
use seedbank_core::{AccessionId, ViabilityTestId};

/// Path prefix of the accession resource.
pub const ACCESSIONS_PATH: &str = "/api/v2/seedbank/accessions";

/// Typed client for the accession API.
#[derive(Debug, Clone)]
pub struct SeedbankClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl SeedbankClient {
    /// Create a client from configuration.
    pub fn new(config: SeedbankApiConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.api_token.as_ref() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|_| ClientError::Config(config::ConfigError::InvalidToken))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    fn accession_url(&self, accession_id: AccessionId, suffix: &str) -> String {
        format!(
            "{}{ACCESSIONS_PATH}/{}{suffix}",
            self.base_url.as_str().trim_end_matches('/'),
            accession_id.as_uuid()
        )
    }

    /// Send `request` once. Non-success statuses become
    /// [`ClientError::Api`].
    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let resp = request.send().await.map_err(|e| ClientError::Http {
            endpoint: endpoint.to_string(),
            source: e,
        })?;
        let status = resp.status();
        tracing::debug!(endpoint, status = status.as_u16(), "accession API call");
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let resp = self.send(endpoint, request).await?;
        resp.json().await.map_err(|e| ClientError::Deserialization {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    /// Get an accession.
    ///
    /// Calls `GET {base_url}/api/v2/seedbank/accessions/{id}`.
    pub async fn get_accession(&self, accession_id: AccessionId) -> Result<Accession, ClientError> {
        let endpoint = format!("GET /accessions/{}", accession_id.as_uuid());
        let url = self.accession_url(accession_id, "");
        self.send_json(&endpoint, self.http.get(&url)).await
    }

    /// Update an accession, guarded by its version.
    ///
    /// Calls `PUT {base_url}/api/v2/seedbank/accessions/{id}`.
    pub async fn update_accession(&self, accession: &Accession) -> Result<Accession, ClientError> {
        let endpoint = format!("PUT /accessions/{}", accession.id.as_uuid());
        let url = self.accession_url(accession.id, "");
        let request = self
            .http
            .put(&url)
            .header(IF_MATCH, accession.version.to_string())
            .json(accession);
        self.send_json(&endpoint, request).await
    }

    /// Delete an accession.
    pub async fn delete_accession(&self, accession_id: AccessionId) -> Result<(), ClientError> {
        let endpoint = format!("DELETE /accessions/{}", accession_id.as_uuid());
        let url = self.accession_url(accession_id, "");
        self.send(&endpoint, self.http.delete(&url)).await.map(|_| ())
    }

    /// Check an accession in.
    pub async fn check_in_accession(&self, accession_id: AccessionId) -> Result<(), ClientError> {
        let endpoint = format!("POST /accessions/{}/checkIn", accession_id.as_uuid());
        let url = self.accession_url(accession_id, "/checkIn");
        self.send(&endpoint, self.http.post(&url)).await.map(|_| ())
    }

    /// Record a general withdrawal.
    pub async fn post_withdrawal(
        &self,
        accession_id: AccessionId,
        withdrawal: &NewWithdrawal,
    ) -> Result<Withdrawal, ClientError> {
        let endpoint = format!("POST /accessions/{}/withdrawals", accession_id.as_uuid());
        let url = self.accession_url(accession_id, "/withdrawals");
        self.send_json(&endpoint, self.http.post(&url).json(withdrawal))
            .await
    }

    /// Transfer seeds to a nursery.
    pub async fn post_nursery_transfer(
        &self,
        accession_id: AccessionId,
        transfer: &NurseryTransfer,
    ) -> Result<(), ClientError> {
        let endpoint = format!(
            "POST /accessions/{}/transfers/nursery",
            accession_id.as_uuid()
        );
        let url = self.accession_url(accession_id, "/transfers/nursery");
        self.send(&endpoint, self.http.post(&url).json(transfer))
            .await
            .map(|_| ())
    }

    /// Create a viability test.
    pub async fn post_viability_test(
        &self,
        accession_id: AccessionId,
        test: &ViabilityTestPayload,
    ) -> Result<ViabilityTest, ClientError> {
        let endpoint = format!("POST /accessions/{}/viabilityTests", accession_id.as_uuid());
        let url = self.accession_url(accession_id, "/viabilityTests");
        self.send_json(&endpoint, self.http.post(&url).json(test))
            .await
    }

    /// Replace a viability test.
    pub async fn put_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
        test: &ViabilityTestPayload,
    ) -> Result<ViabilityTest, ClientError> {
        let suffix = format!("/viabilityTests/{}", test_id.as_uuid());
        let endpoint = format!("PUT /accessions/{}{suffix}", accession_id.as_uuid());
        let url = self.accession_url(accession_id, &suffix);
        self.send_json(&endpoint, self.http.put(&url).json(test))
            .await
    }

    /// Delete a viability test.
    pub async fn delete_viability_test_by_id(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
    ) -> Result<(), ClientError> {
        let suffix = format!("/viabilityTests/{}", test_id.as_uuid());
        let endpoint = format!("DELETE /accessions/{}{suffix}", accession_id.as_uuid());
        let url = self.accession_url(accession_id, &suffix);
        self.send(&endpoint, self.http.delete(&url)).await.map(|_| ())
    }
}

impl AccessionRepository for SeedbankClient {
    async fn load(&self, accession_id: AccessionId) -> Result<Accession, RepositoryError> {
        Ok(self.get_accession(accession_id).await?)
    }

    async fn save(&self, accession: &Accession) -> Result<Accession, RepositoryError> {
        Ok(self.update_accession(accession).await?)
    }

    async fn check_in(&self, accession_id: AccessionId) -> Result<(), RepositoryError> {
        Ok(self.check_in_accession(accession_id).await?)
    }

    async fn create_withdrawal(
        &self,
        accession_id: AccessionId,
        withdrawal: &NewWithdrawal,
    ) -> Result<Withdrawal, RepositoryError> {
        Ok(self.post_withdrawal(accession_id, withdrawal).await?)
    }

    async fn transfer_to_nursery(
        &self,
        accession_id: AccessionId,
        transfer: &NurseryTransfer,
    ) -> Result<(), RepositoryError> {
        Ok(self.post_nursery_transfer(accession_id, transfer).await?)
    }

    async fn create_viability_test(
        &self,
        accession_id: AccessionId,
        test: &ViabilityTestPayload,
    ) -> Result<ViabilityTest, RepositoryError> {
        Ok(self.post_viability_test(accession_id, test).await?)
    }

    async fn update_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
        test: &ViabilityTestPayload,
    ) -> Result<ViabilityTest, RepositoryError> {
        Ok(self.put_viability_test(accession_id, test_id, test).await?)
    }

    async fn delete_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
    ) -> Result<(), RepositoryError> {
        Ok(self
            .delete_viability_test_by_id(accession_id, test_id)
            .await?)
    }

    async fn delete(&self, accession_id: AccessionId) -> Result<(), RepositoryError> {
        Ok(self.delete_accession(accession_id).await?)
    }
}
