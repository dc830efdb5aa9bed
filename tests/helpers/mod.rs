//! Test helper module for lectern integration tests
//!
//! Provides scripted analyzer doubles, multipart request builders, and
//! router construction around a test configuration.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;

use lectern::analyzers::{AnalyzerError, PipelineAnalyzer};
use lectern::config::EvalConfig;
use lectern::services::orchestrator::EvaluationOrchestrator;
use lectern::types::{
    AcousticMetrics, ContentMetrics, PipelineKind, RawMetrics, Submission, VisualMetrics,
};
use lectern::{build_router, AppState};

/// One scripted response step.
pub enum Step {
    Succeed(RawMetrics),
    Fail(AnalyzerError),
    Panic,
}

/// Analyzer double that replays a script, one step per call. An
/// exhausted script keeps succeeding with canonical sample metrics.
pub struct ScriptedAnalyzer {
    kind: PipelineKind,
    delay: Duration,
    script: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    topics: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn new(kind: PipelineKind) -> Self {
        Self::with_delay(kind, Duration::ZERO)
    }

    pub fn with_delay(kind: PipelineKind, delay: Duration) -> Self {
        Self {
            kind,
            delay,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            topics: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, step: Step) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Topics seen across all calls, in call order.
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineAnalyzer for ScriptedAnalyzer {
    fn kind(&self) -> PipelineKind {
        self.kind
    }

    async fn analyze(&self, submission: &Submission) -> Result<RawMetrics, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.topics.lock().unwrap().push(submission.topic.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Succeed(metrics)) => Ok(metrics),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Panic) => panic!("scripted analyzer panic"),
            None => Ok(sample_metrics(self.kind)),
        }
    }
}

/// Canonical per-pipeline sample metrics. Normalized, these give
/// content 8.0, acoustic 7.0, visual 7.5, and a default-weight overall
/// of 7.5.
pub fn sample_metrics(kind: PipelineKind) -> RawMetrics {
    match kind {
        PipelineKind::Content => RawMetrics::Content(ContentMetrics {
            accuracy_score: 8.0,
            structure_score: 8.0,
            key_strengths: vec!["clear definitions".to_string()],
            missing_concepts: vec!["boundary cases".to_string()],
            transcript: "Today we cover ownership and borrowing.".to_string(),
        }),
        PipelineKind::Acoustic => RawMetrics::Acoustic(AcousticMetrics {
            pace_bpm: 150.0,
            silence_ratio: 0.05,
            pitch_variability: Some(42.0),
        }),
        PipelineKind::Visual => RawMetrics::Visual(VisualMetrics {
            engagement: 7.0,
            energy: 8.0,
            posture_openness: Some(6.5),
        }),
    }
}

/// Minimal MP4: an `ftyp` box with an isom brand, padded to 4096 bytes.
pub fn fake_mp4_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    bytes.extend_from_slice(b"isommp41");
    bytes.resize(4096, 0);
    bytes
}

pub const BOUNDARY: &str = "lectern-test-boundary";

/// Hand-rolled multipart body with a `file` part and an optional
/// `topic` part.
pub fn multipart_body(file: &[u8], file_name: &str, topic: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: video/mp4\r\n\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(b"\r\n");

    if let Some(topic) = topic {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"topic\"\r\n\r\n");
        body.extend_from_slice(topic.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// POST /analyze request carrying the given multipart body.
pub fn analyze_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Configuration with deadlines short enough for tests: 2s overall,
/// 1s per pipeline call, 10ms retry backoff.
pub fn test_config() -> EvalConfig {
    let mut config = EvalConfig::default();
    config.overall_deadline_ms = 2_000;
    config.content.deadline_ms = Some(1_000);
    config.acoustic.deadline_ms = Some(1_000);
    config.visual.deadline_ms = Some(1_000);
    config.retry.backoff_ms = 10;
    config
}

/// Build the full router around scripted analyzers.
pub fn app_with_analyzers(
    config: EvalConfig,
    content: Arc<dyn PipelineAnalyzer>,
    acoustic: Arc<dyn PipelineAnalyzer>,
    visual: Arc<dyn PipelineAnalyzer>,
) -> Router {
    let orchestrator = EvaluationOrchestrator::with_analyzers(content, acoustic, visual, &config);
    let state = AppState::with_orchestrator(Arc::new(config), Arc::new(orchestrator))
        .expect("test config must be valid");
    build_router(state)
}

/// Router where every pipeline succeeds with sample metrics.
pub fn happy_app() -> Router {
    app_with_analyzers(
        test_config(),
        Arc::new(ScriptedAnalyzer::new(PipelineKind::Content)),
        Arc::new(ScriptedAnalyzer::new(PipelineKind::Acoustic)),
        Arc::new(ScriptedAnalyzer::new(PipelineKind::Visual)),
    )
}
