//! Scripted in-process backend for tests.

use std::sync::Mutex;

use serde_json::{Value, json};

use super::{BackendError, BackendReply, BackendResult, JobBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Post,
}

/// One recorded call against the fake.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

type Handler = dyn Fn(&Call, usize) -> BackendResult<BackendReply> + Send + Sync;

/// Backend whose replies come from a closure.
///
/// The closure receives the call and how many earlier calls hit the same
/// method and path, which is enough to script "fails twice, then succeeds".
pub(crate) struct ScriptedBackend {
    handler: Box<Handler>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new(
        handler: impl Fn(&Call, usize) -> BackendResult<BackendReply> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    fn dispatch(&self, call: Call) -> BackendResult<BackendReply> {
        let previous = {
            let mut calls = self.calls.lock().unwrap();
            let previous = calls
                .iter()
                .filter(|c| c.method == call.method && c.path == call.path)
                .count();
            calls.push(call.clone());
            previous
        };
        (self.handler)(&call, previous)
    }
}

impl JobBackend for ScriptedBackend {
    async fn get(&self, path: &str, _query: &[(&str, &str)]) -> BackendResult<BackendReply> {
        self.dispatch(Call {
            method: Method::Get,
            path: path.to_string(),
            body: None,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> BackendResult<BackendReply> {
        self.dispatch(Call {
            method: Method::Post,
            path: path.to_string(),
            body: Some(body.clone()),
        })
    }
}

pub(crate) fn ok(body: Value) -> BackendResult<BackendReply> {
    Ok(BackendReply::new(200, body))
}

pub(crate) fn http(status: u16, body: Value) -> BackendResult<BackendReply> {
    Ok(BackendReply::new(status, body))
}

pub(crate) fn unreachable() -> BackendResult<BackendReply> {
    Err(BackendError::Unreachable {
        message: "connection refused".to_string(),
    })
}

/// A valid question as the backend would send it.
pub(crate) fn question_json(n: usize, domain: &str) -> Value {
    json!({
        "question": format!("Question {n}: which service fits?"),
        "options": ["Amazon S3", "Amazon EBS", "Amazon EFS", "AWS Backup"],
        "correctAnswers": [n % 4],
        "explanation": format!("Explanation {n}"),
        "domain": domain,
        "difficulty": "medium",
        "experienceLevel": "associate",
    })
}

pub(crate) fn questions_json(count: usize, domain: &str) -> Value {
    Value::Array((0..count).map(|n| question_json(n, domain)).collect())
}
