//! Scripted collaborators shared by the agent tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use postwright_core::bus::{Mention, MessageBus};
use postwright_core::error::{BusError, ProviderError};
use postwright_core::message::Message;
use postwright_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use tokio::sync::Notify;

/// Ordered record of collaborator calls, shared between mocks.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// A provider that replays scripted completions in order.
///
/// Panics if called more times than it has answers.
pub struct ScriptedProvider {
    answers: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    log: Option<EventLog>,
}

impl ScriptedProvider {
    pub fn new(answers: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            requests: Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Some(log) = &self.log {
            let body = request
                .messages
                .last()
                .map(|m| m.content.lines().nth(2).unwrap_or_default().to_string())
                .unwrap_or_default();
            log.lock().unwrap().push(format!("generate:{body}"));
        }
        self.requests.lock().unwrap().push(request);

        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more answers");

        answer.map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// A reply recorded by [`ScriptedBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub thread_id: String,
    pub recipient_id: String,
    pub content: String,
}

/// A bus that hands out scripted mentions, then goes quiet.
///
/// Once the script is exhausted, `drained` is notified and every further
/// wait stays pending, like a bus with nobody talking.
pub struct ScriptedBus {
    inbox: Mutex<VecDeque<Result<Mention, BusError>>>,
    sent: Mutex<Vec<SentReply>>,
    failing_sends: Mutex<usize>,
    drained: Arc<Notify>,
    log: Option<EventLog>,
}

impl ScriptedBus {
    pub fn new(inbox: Vec<Result<Mention, BusError>>) -> Self {
        Self {
            inbox: Mutex::new(inbox.into()),
            sent: Mutex::new(Vec::new()),
            failing_sends: Mutex::new(0),
            drained: Arc::new(Notify::new()),
            log: None,
        }
    }

    /// Fail the next `count` sends.
    pub fn failing_sends(self, count: usize) -> Self {
        *self.failing_sends.lock().unwrap() = count;
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn drained(&self) -> Arc<Notify> {
        self.drained.clone()
    }

    pub fn sent(&self) -> Vec<SentReply> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBus for ScriptedBus {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn wait_for_mention(&self) -> Result<Mention, BusError> {
        let next = self.inbox.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                self.drained.notify_one();
                std::future::pending().await
            }
        }
    }

    async fn send_message(
        &self,
        thread_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<(), BusError> {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("send:{thread_id}"));
        }

        {
            let mut failing = self.failing_sends.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(BusError::DeliveryFailed {
                    thread_id: thread_id.to_string(),
                    reason: "scripted failure".into(),
                });
            }
        }

        self.sent.lock().unwrap().push(SentReply {
            thread_id: thread_id.to_string(),
            recipient_id: recipient_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}

/// A well-formed five-post answer.
pub fn sample_reply() -> String {
    let topics = [
        ("Attention really is all you need", "ai", "transformers"),
        ("Why positional encodings matter", "ml", "nlp"),
        ("Scaling laws without the hype", "llm", "research"),
        ("Fine-tuning on a budget", "lora", "gpu"),
        ("What BERT still teaches us", "bert", "history"),
    ];
    topics
        .iter()
        .enumerate()
        .map(|(i, (title, a, b))| {
            format!(
                "Post {}:\nTitle: {title}\nContent: Let's talk about {title}.\nWhat has your experience been?\nKeywords: #{a} #{b}",
                i + 1
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
