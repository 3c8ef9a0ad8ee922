//! Scripted in-memory enrichment service for tests.
//!
//! Replies are keyed by document file name and consumed in order; a document
//! with no scripted replies left gets the default reply. Every call is
//! recorded so tests can assert exactly what reached the service.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::EnrichError;
use crate::service::{EnrichmentService, StagedDocument};

/// A call observed by [`ScriptedService`], tagged with the document file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Stage(String),
    Infer(String),
    Release(String),
}

pub struct ScriptedService {
    model: String,
    default_reply: String,
    replies: Mutex<HashMap<String, VecDeque<Result<String, EnrichError>>>>,
    failing_stage: HashSet<String>,
    failing_release: bool,
    calls: Mutex<Vec<ServiceCall>>,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            model: "scripted-model".into(),
            default_reply: r#"{"records": []}"#.into(),
            replies: Mutex::new(HashMap::new()),
            failing_stage: HashSet::new(),
            failing_release: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_default_reply(mut self, text: impl Into<String>) -> Self {
        self.default_reply = text.into();
        self
    }

    /// Queue replies for a document, consumed one per `infer` call.
    pub fn with_replies(
        self,
        file_name: impl Into<String>,
        replies: Vec<Result<String, EnrichError>>,
    ) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(file_name.into(), replies.into());
        self
    }

    pub fn with_failing_stage(mut self, file_name: impl Into<String>) -> Self {
        self.failing_stage.insert(file_name.into());
        self
    }

    pub fn with_failing_release(mut self) -> Self {
        self.failing_release = true;
        self
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stage_count(&self) -> usize {
        self.count(|c| matches!(c, ServiceCall::Stage(_)))
    }

    pub fn infer_count(&self) -> usize {
        self.count(|c| matches!(c, ServiceCall::Infer(_)))
    }

    pub fn release_count(&self) -> usize {
        self.count(|c| matches!(c, ServiceCall::Release(_)))
    }

    /// File names in the order they were staged.
    pub fn staged_files(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ServiceCall::Stage(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ServiceCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: ServiceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EnrichmentService for ScriptedService {
    fn model(&self) -> &str {
        &self.model
    }

    async fn stage(&self, document: &Path) -> Result<StagedDocument, EnrichError> {
        let file_name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.record(ServiceCall::Stage(file_name.clone()));
        if self.failing_stage.contains(&file_name) {
            return Err(EnrichError::Service {
                status: 500,
                body: format!("upload of {file_name} rejected"),
            });
        }
        Ok(StagedDocument {
            name: file_name.clone(),
            uri: format!("scripted://files/{file_name}"),
            mime_type: "application/pdf".into(),
        })
    }

    async fn infer(&self, staged: &StagedDocument, _prompt: &str) -> Result<String, EnrichError> {
        self.record(ServiceCall::Infer(staged.name.clone()));
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&staged.name)
            .and_then(|queue| queue.pop_front());
        next.unwrap_or_else(|| Ok(self.default_reply.clone()))
    }

    async fn release(&self, staged: &StagedDocument) -> Result<(), EnrichError> {
        self.record(ServiceCall::Release(staged.name.clone()));
        if self.failing_release {
            return Err(EnrichError::Transient("release refused".into()));
        }
        Ok(())
    }
}
