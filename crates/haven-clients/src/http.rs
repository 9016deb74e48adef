//! HTTP adapters for the remote stages.
//!
//! Each adapter POSTs JSON to a configured endpoint with a per-call timeout,
//! parses the response into the typed domain structs, and validates ranges
//! and uniqueness before handing anything to the pipeline. HTTP 4xx and any
//! parse/validation failure is a contract violation; timeouts and transport
//! failures (including 5xx) are transient.

use crate::contract::{Classifier, RiskScorer, Simulator, StageError};
use async_trait::async_trait;
use haven_types::{Classification, ResidentId, RiskProfile, SimulatedOption};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Where a stage lives and how long one call may take.
#[derive(Clone, Debug)]
pub struct StageEndpoint {
    pub url: String,
    pub timeout: Duration,
}

impl StageEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

fn build_client(stage: &'static str, timeout: Duration) -> Result<Client, StageError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StageError::Connection {
            stage,
            message: format!("failed to build HTTP client: {}", e),
        })
}

fn map_transport(stage: &'static str, err: reqwest::Error) -> StageError {
    if err.is_timeout() {
        StageError::Timeout {
            stage,
            message: err.to_string(),
        }
    } else {
        StageError::Connection {
            stage,
            message: err.to_string(),
        }
    }
}

async fn post_json<Req, Resp>(
    client: &Client,
    stage: &'static str,
    url: &str,
    body: &Req,
) -> Result<Resp, StageError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| map_transport(stage, e))?;

    let status = response.status();
    if status.is_client_error() {
        return Err(StageError::contract(
            stage,
            format!("unexpected status {}", status),
        ));
    }
    if !status.is_success() {
        return Err(StageError::Connection {
            stage,
            message: format!("unexpected status {}", status),
        });
    }

    response
        .json::<Resp>()
        .await
        .map_err(|e| StageError::contract(stage, format!("malformed response body: {}", e)))
}

// ── Classification ───────────────────────────────────────────────────

#[derive(Serialize)]
struct ClassifyBody<'a> {
    resident_id: &'a str,
    message_text: &'a str,
}

/// HTTP adapter for the classification stage.
pub struct HttpClassifier {
    client: Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(endpoint: StageEndpoint) -> Result<Self, StageError> {
        Ok(Self {
            client: build_client("classification", endpoint.timeout)?,
            url: endpoint.url,
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        resident_id: &ResidentId,
        message_text: &str,
    ) -> Result<Classification, StageError> {
        let body = ClassifyBody {
            resident_id: &resident_id.0,
            message_text,
        };
        let classification: Classification =
            post_json(&self.client, "classification", &self.url, &body).await?;
        check_classification(classification)
    }
}

fn check_classification(classification: Classification) -> Result<Classification, StageError> {
    classification
        .validate()
        .map_err(|e| StageError::contract("classification", e.to_string()))?;
    Ok(classification)
}

// ── Risk ─────────────────────────────────────────────────────────────

/// HTTP adapter for the risk stage.
pub struct HttpRiskScorer {
    client: Client,
    url: String,
}

impl HttpRiskScorer {
    pub fn new(endpoint: StageEndpoint) -> Result<Self, StageError> {
        Ok(Self {
            client: build_client("risk", endpoint.timeout)?,
            url: endpoint.url,
        })
    }
}

#[async_trait]
impl RiskScorer for HttpRiskScorer {
    async fn score(&self, classification: &Classification) -> Result<RiskProfile, StageError> {
        let risk: RiskProfile =
            post_json(&self.client, "risk", &self.url, classification).await?;
        check_risk(risk)
    }
}

fn check_risk(risk: RiskProfile) -> Result<RiskProfile, StageError> {
    risk.validate()
        .map_err(|e| StageError::contract("risk", e.to_string()))?;
    Ok(risk)
}

// ── Simulation ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct SimulateBody<'a> {
    classification: &'a Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk: Option<&'a RiskProfile>,
}

#[derive(serde::Deserialize)]
struct SimulateResponse {
    options: Vec<SimulatedOption>,
}

/// HTTP adapter for the simulation stage.
pub struct HttpSimulator {
    client: Client,
    url: String,
}

impl HttpSimulator {
    pub fn new(endpoint: StageEndpoint) -> Result<Self, StageError> {
        Ok(Self {
            client: build_client("simulation", endpoint.timeout)?,
            url: endpoint.url,
        })
    }
}

#[async_trait]
impl Simulator for HttpSimulator {
    async fn simulate(
        &self,
        classification: &Classification,
        risk: Option<&RiskProfile>,
    ) -> Result<Vec<SimulatedOption>, StageError> {
        let body = SimulateBody {
            classification,
            risk,
        };
        let response: SimulateResponse =
            post_json(&self.client, "simulation", &self.url, &body).await?;
        check_options(response.options)
    }
}

fn check_options(options: Vec<SimulatedOption>) -> Result<Vec<SimulatedOption>, StageError> {
    if options.is_empty() {
        return Err(StageError::contract(
            "simulation",
            "empty option list for a request that requires simulation",
        ));
    }
    SimulatedOption::validate_all(&options)
        .map_err(|e| StageError::contract("simulation", e.to_string()))?;
    Ok(options)
}
