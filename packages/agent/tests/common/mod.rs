//! Shared test doubles for integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use formagent::error::Result;
use formagent::llm::{Backoff, BackendResponse, GenerationRequest, LlmBackend, SafetyFeedback, SafetyRating};
use formagent::Document;

/// Backend replaying a fixed list of responses, recording every request.
/// Once the script runs out it answers with an empty response.
pub struct ScriptedBackend {
    responses: Mutex<Vec<Result<BackendResponse>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(mut responses: Vec<Result<BackendResponse>>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }
}

impl LlmBackend for ScriptedBackend {
    fn generate(&self, request: &GenerationRequest) -> Result<BackendResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(BackendResponse::default()))
    }
}

/// Backoff that records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingBackoff {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingBackoff {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

impl Backoff for RecordingBackoff {
    fn wait(&self, delay: Duration) {
        self.waits.lock().unwrap().push(delay);
    }
}

pub fn text(t: &str) -> Result<BackendResponse> {
    Ok(BackendResponse {
        text: Some(t.to_string()),
        ..Default::default()
    })
}

pub fn empty() -> Result<BackendResponse> {
    Ok(BackendResponse::default())
}

pub fn blocked(category: &str, probability: &str) -> Result<BackendResponse> {
    Ok(BackendResponse {
        safety: Some(SafetyFeedback {
            block_reason: Some("SAFETY".into()),
            ratings: vec![SafetyRating {
                category: category.into(),
                probability: probability.into(),
            }],
        }),
        ..Default::default()
    })
}

pub fn sample_documents() -> Vec<Document> {
    vec![
        Document::new(
            "3f2a9c1e",
            "job_application.pdf",
            "JOB APPLICATION\nFull Name: Alex Johnson\nCity: Bangalore\nCGPA: 8.6",
        ),
        Document::new(
            "8b71d0aa",
            "insurance_claim.png",
            "INSURANCE CLAIM\nClaimant: Priya Sharma\nClaim amount: 600000\nGross income: 1200000",
        ),
    ]
}
