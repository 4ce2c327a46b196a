//! Forwarding proxy to the external waste-classification model.
//!
//! The model server is never a hard dependency: any upstream failure
//! substitutes a fixed set of illustrative predictions marked `mock: true`,
//! so the user-facing response always succeeds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
pub struct Classification {
    pub predictions: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock: Option<bool>,
    pub classification_timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Classifier {
    http: reqwest::Client,
    url: String,
}

impl Classifier {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    /// Forwards the uploaded image to the model server and returns its
    /// predictions, or the mock set when the server is down or unhappy.
    pub async fn classify(&self, image: Vec<u8>, filename: String) -> Classification {
        let part = Part::bytes(image).file_name(filename);
        let form = Form::new().part("data", part);

        let response = self
            .http
            .post(&self.url)
            .multipart(form)
            .timeout(UPSTREAM_TIMEOUT)
            .send()
            .await;

        let (predictions, mock) = match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(predictions) => (predictions, None),
                Err(e) => {
                    warn!("Classifier response unreadable, returning mock results: {e}");
                    (transport_failure_mock(), Some(true))
                }
            },
            Ok(resp) => {
                warn!(
                    "Classifier not available (status: {}), returning mock results",
                    resp.status()
                );
                (model_failure_mock(), Some(true))
            }
            Err(e) => {
                warn!("Classifier connection failed, returning mock results: {e}");
                (transport_failure_mock(), Some(true))
            }
        };

        Classification {
            predictions,
            mock,
            classification_timestamp: Utc::now(),
        }
    }
}

/// Illustrative predictions for a reachable model server that answered with a
/// non-success status.
fn model_failure_mock() -> Value {
    json!([
        {
            "class": "Recyclable Plastic",
            "confidence": 0.94,
            "category": "Recyclable",
            "description": "This appears to be a plastic bottle or container that can be recycled.",
            "disposal_method": "Place in recycling bin with plastic containers",
            "environmental_impact": "High - Proper recycling saves energy and reduces landfill waste"
        },
        {
            "class": "Organic Waste",
            "confidence": 0.76,
            "category": "Compostable",
            "description": "This looks like organic matter that can be composted.",
            "disposal_method": "Add to compost bin or organic waste collection",
            "environmental_impact": "Medium - Composting reduces methane emissions from landfills"
        },
        {
            "class": "General Waste",
            "confidence": 0.45,
            "category": "Landfill",
            "description": "This item may need to go to general waste.",
            "disposal_method": "Place in general waste bin",
            "environmental_impact": "Low - Consider reducing consumption of such items"
        }
    ])
}

/// Illustrative predictions for an unreachable model server.
fn transport_failure_mock() -> Value {
    json!([
        {
            "class": "Recyclable Paper",
            "confidence": 0.89,
            "category": "Recyclable",
            "description": "This appears to be paper material that can be recycled.",
            "disposal_method": "Place in paper recycling bin",
            "environmental_impact": "High - Paper recycling saves trees and reduces energy consumption"
        },
        {
            "class": "Electronic Waste",
            "confidence": 0.67,
            "category": "E-Waste",
            "description": "This looks like electronic components requiring special disposal.",
            "disposal_method": "Take to electronic waste collection point",
            "environmental_impact": "Very High - Proper e-waste disposal prevents toxic contamination"
        }
    ])
}
