//! In-memory journey backend for coordinator tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use journeycache_core::api::{ApiError, FinalTestSubmission, JourneyApi};
use journeycache_core::cache::MemoryCacheStore;
use journeycache_core::models::{
    CompleteDayResponse, FinalTestResult, FinalTestStart, JourneyEnvelope, JourneyOverview,
    JourneyResponse, Stage,
};
use journeycache_core::utils::Clock;
use journeycache_core::JourneyCoordinator;

/// Keeps a journey document and applies mutations to it the way the server would.
pub struct FakeBackend {
    pub authenticated: bool,
    journey: Mutex<Value>,
    /// When set, `fetch_stages` serves this document instead of `journey`
    stages_document: Mutex<Option<Value>>,
    read_failure: Mutex<Option<u16>>,
    stages_failure: Mutex<Option<u16>>,
    pub reads: Mutex<Vec<(&'static str, Option<i64>)>>,
}

impl FakeBackend {
    pub fn new(journey: Value) -> Self {
        Self {
            authenticated: true,
            journey: Mutex::new(journey),
            stages_document: Mutex::new(None),
            read_failure: Mutex::new(None),
            stages_failure: Mutex::new(None),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn replace_journey(&self, journey: Value) {
        *self.journey.lock().unwrap() = journey;
    }

    pub fn serve_stages_from(&self, journey: Value) {
        *self.stages_document.lock().unwrap() = Some(journey);
    }

    pub fn fail_reads_with(&self, status: Option<u16>) {
        *self.read_failure.lock().unwrap() = status;
    }

    /// Fail only `fetch_stages`; the overview keeps being served.
    pub fn fail_stages_with(&self, status: Option<u16>) {
        *self.stages_failure.lock().unwrap() = status;
    }

    pub fn reads(&self) -> Vec<(&'static str, Option<i64>)> {
        self.reads.lock().unwrap().clone()
    }

    fn check_read(&self) -> Result<(), ApiError> {
        Self::fail_with(*self.read_failure.lock().unwrap())
    }

    fn fail_with(status: Option<u16>) -> Result<(), ApiError> {
        match status {
            Some(code) => Err(ApiError::from_status(
                StatusCode::from_u16(code).unwrap(),
                "fake failure",
            )),
            None => Ok(()),
        }
    }

    fn parse(doc: &Value) -> JourneyResponse {
        serde_json::from_value::<JourneyEnvelope>(doc.clone())
            .unwrap()
            .into_inner()
    }

    /// Stage object inside either the `{data: ...}` envelope or a bare document.
    fn stage_mut<'a>(doc: &'a mut Value, stage_id: &str) -> &'a mut Value {
        let journey = if doc.get("data").is_some() {
            &mut doc["data"]
        } else {
            doc
        };
        journey["stages"]
            .as_array_mut()
            .unwrap()
            .iter_mut()
            .find(|s| s["_id"] == stage_id)
            .unwrap()
    }
}

#[async_trait]
impl JourneyApi for FakeBackend {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn fetch_overview(&self, cache_bust: Option<i64>) -> Result<JourneyOverview, ApiError> {
        self.reads.lock().unwrap().push(("overview", cache_bust));
        self.check_read()?;
        Ok(Self::parse(&self.journey.lock().unwrap()).to_overview())
    }

    async fn fetch_stages(&self, cache_bust: Option<i64>) -> Result<Vec<Stage>, ApiError> {
        self.reads.lock().unwrap().push(("stages", cache_bust));
        self.check_read()?;
        Self::fail_with(*self.stages_failure.lock().unwrap())?;
        let doc = match self.stages_document.lock().unwrap().clone() {
            Some(doc) => doc,
            None => self.journey.lock().unwrap().clone(),
        };
        Ok(Self::parse(&doc).to_stages())
    }

    async fn complete_day(
        &self,
        stage_id: &str,
        day_number: u32,
    ) -> Result<CompleteDayResponse, ApiError> {
        let mut doc = self.journey.lock().unwrap();
        let stage = Self::stage_mut(&mut doc, stage_id);
        for day in stage["days"].as_array_mut().unwrap() {
            if day["dayNumber"] == day_number {
                day["completed"] = json!(true);
            }
        }
        Ok(CompleteDayResponse {
            stage_id: Some(stage_id.to_string()),
            day_number: Some(day_number),
            completed: Some(true),
            ..Default::default()
        })
    }

    async fn start_final_test(&self, stage_id: &str) -> Result<FinalTestStart, ApiError> {
        let mut doc = self.journey.lock().unwrap();
        Self::stage_mut(&mut doc, stage_id)["finalTest"]["started"] = json!(true);
        Ok(FinalTestStart {
            stage_id: Some(stage_id.to_string()),
            started: Some(true),
            question_ids: vec!["fq1".to_string()],
        })
    }

    async fn complete_final_test(
        &self,
        stage_id: &str,
        submission: &FinalTestSubmission,
    ) -> Result<FinalTestResult, ApiError> {
        let mut doc = self.journey.lock().unwrap();
        // No explicit verdict: clients judge the score against minScore
        Self::stage_mut(&mut doc, stage_id)["finalTest"] = json!({
            "unlocked": true,
            "started": true,
            "completed": true,
            "score": submission.score,
        });
        Ok(FinalTestResult {
            stage_id: Some(stage_id.to_string()),
            score: Some(submission.score),
            max_score: submission.max_score,
            ..Default::default()
        })
    }
}

/// Two-stage journey: stage 1 has every day done, final test pending; stage 2 untouched.
pub fn two_stage_journey(id: &str) -> Value {
    json!({
        "data": {
            "_id": id,
            "title": "TOEIC 600 in 8 weeks",
            "stages": [
                {
                    "_id": format!("{}-tpl-1", id),
                    "userProgressId": format!("{}-prog-1", id),
                    "stageNumber": 1,
                    "minScore": 70,
                    "targetScore": 450,
                    "status": "in_progress",
                    "days": [
                        { "dayNumber": 1, "completed": true, "questions": ["q1", "q2"] },
                        { "dayNumber": 2, "completed": true, "questions": ["q3"] }
                    ],
                    "finalTest": { "unlocked": true }
                },
                {
                    "_id": format!("{}-tpl-2", id),
                    "userProgressId": format!("{}-prog-2", id),
                    "stageNumber": 2,
                    "minScore": 70,
                    "targetScore": 600,
                    "status": "LOCKED",
                    "days": [
                        { "dayNumber": 1 },
                        { "dayNumber": 2 }
                    ]
                }
            ]
        }
    })
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

pub const TTL_MINUTES: i64 = 5;

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub store: Arc<MemoryCacheStore>,
    pub clock: Clock,
    pub coordinator: JourneyCoordinator,
}

pub fn harness(journey: Value) -> Harness {
    let backend = Arc::new(FakeBackend::new(journey));
    let store = Arc::new(MemoryCacheStore::new());
    let clock = Clock::manual(start_time());
    let coordinator = JourneyCoordinator::new(
        store.clone(),
        backend.clone(),
        Duration::minutes(TTL_MINUTES),
    )
    .with_clock(clock.clone());
    Harness {
        backend,
        store,
        clock,
        coordinator,
    }
}
