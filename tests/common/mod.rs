// tests/common/mod.rs — Shared fakes and fixtures for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::mpsc;

use parley::core::access::AccessController;
use parley::core::agents::AgentConnectionManager;
use parley::core::processor::EventProcessor;
use parley::core::types::Visibility;
use parley::infra::config::RealtimeConfig;
use parley::infra::errors::ParleyError;
use parley::jobs::{self, SummarizeJob};
use parley::provider::{
    CallProvider, ChannelMessage, ChatModel, ChatProvider, ModelMessage, ProviderUser,
    RealtimeSession, SessionConfig, SubscriptionProvider,
};
use parley::store::{schema, spawn_store_server, NewAgent, NewMeeting, Store, StoreHandle};

pub const WEBHOOK_SIGNATURE: &str = "valid-signature";

// -- Fake call provider --

pub struct FakeCallProvider {
    /// Action log, e.g. "end_call:m-1" or "remove_member:m-1:agent-1".
    pub log: Mutex<Vec<String>>,
    /// Live real-time sessions held against this provider right now.
    pub open_sessions: Arc<AtomicUsize>,
    pub fail_connect: AtomicBool,
    pub fail_close: Arc<AtomicBool>,
    pub fail_remove: AtomicBool,
}

impl FakeCallProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            log: Mutex::new(Vec::new()),
            open_sessions: Arc::new(AtomicUsize::new(0)),
            fail_connect: AtomicBool::new(false),
            fail_close: Arc::new(AtomicBool::new(false)),
            fail_remove: AtomicBool::new(false),
        })
    }

    pub fn logged(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

struct FakeSession {
    open_sessions: Arc<AtomicUsize>,
    fail_close: Arc<AtomicBool>,
    closed: AtomicBool,
}

#[async_trait]
impl RealtimeSession for FakeSession {
    async fn configure(&self, _config: &SessionConfig) -> Result<(), ParleyError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(ParleyError::Upstream {
                service: "realtime-ai",
                message: "close failed".into(),
            });
        }
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl CallProvider for FakeCallProvider {
    async fn upsert_user(&self, user: &ProviderUser) -> Result<(), ParleyError> {
        self.record(format!("upsert_user:{}", user.id));
        Ok(())
    }

    async fn create_call(
        &self,
        call_id: &str,
        _created_by: &str,
        _meeting_name: &str,
    ) -> Result<(), ParleyError> {
        self.record(format!("create_call:{call_id}"));
        Ok(())
    }

    async fn end_call(&self, call_id: &str) -> Result<(), ParleyError> {
        self.record(format!("end_call:{call_id}"));
        Ok(())
    }

    async fn remove_member(&self, call_id: &str, user_id: &str) -> Result<(), ParleyError> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(ParleyError::Upstream {
                service: "call-provider",
                message: "remove_member failed".into(),
            });
        }
        self.record(format!("remove_member:{call_id}:{user_id}"));
        Ok(())
    }

    async fn connect_realtime_agent(
        &self,
        call_id: &str,
        agent_user_id: &str,
    ) -> Result<Box<dyn RealtimeSession>, ParleyError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ParleyError::Upstream {
                service: "realtime-ai",
                message: "realtime endpoint unreachable".into(),
            });
        }
        self.record(format!("connect_agent:{call_id}:{agent_user_id}"));
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            open_sessions: self.open_sessions.clone(),
            fail_close: self.fail_close.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn verify_webhook(&self, _body: &[u8], signature: &str) -> bool {
        signature == WEBHOOK_SIGNATURE
    }

    fn user_token(&self, user_id: &str, _ttl_seconds: i64) -> Result<String, ParleyError> {
        Ok(format!("video-token-{user_id}"))
    }
}

// -- Fake chat provider --

pub struct FakeChatProvider {
    pub history: Mutex<Vec<ChannelMessage>>,
    /// (channel_id, author_id, text) for every send_message call.
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl FakeChatProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            history: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn push_history(&self, user_id: &str, text: &str) {
        self.history.lock().unwrap().push(ChannelMessage {
            user_id: user_id.to_string(),
            text: text.to_string(),
            created_at: None,
        });
    }
}

#[async_trait]
impl ChatProvider for FakeChatProvider {
    async fn upsert_user(&self, _user: &ProviderUser) -> Result<(), ParleyError> {
        Ok(())
    }

    async fn recent_messages(
        &self,
        _channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ParleyError> {
        let history = self.history.lock().unwrap();
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        author_id: &str,
        text: &str,
    ) -> Result<(), ParleyError> {
        self.sent.lock().unwrap().push((
            channel_id.to_string(),
            author_id.to_string(),
            text.to_string(),
        ));
        Ok(())
    }

    fn user_token(&self, user_id: &str, _ttl_seconds: i64) -> Result<String, ParleyError> {
        Ok(format!("chat-token-{user_id}"))
    }
}

// -- Fake model --

pub struct FakeModel {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn complete(
        &self,
        system: &str,
        _messages: &[ModelMessage],
    ) -> Result<String, ParleyError> {
        self.prompts.lock().unwrap().push(system.to_string());
        Ok(self.reply.clone())
    }
}

// -- Fake subscription provider --

pub struct FakeSubscriptions {
    pub premium: AtomicBool,
}

impl FakeSubscriptions {
    pub fn new(premium: bool) -> Arc<Self> {
        Arc::new(Self {
            premium: AtomicBool::new(premium),
        })
    }
}

#[async_trait]
impl SubscriptionProvider for FakeSubscriptions {
    async fn is_premium(&self, _user_id: &str) -> Result<bool, ParleyError> {
        Ok(self.premium.load(Ordering::SeqCst))
    }
}

// -- World fixture --

pub struct World {
    pub store: StoreHandle,
    pub calls: Arc<FakeCallProvider>,
    pub chat: Arc<FakeChatProvider>,
    pub model: Arc<FakeModel>,
    pub subscriptions: Arc<FakeSubscriptions>,
    pub agents: Arc<AgentConnectionManager>,
    pub access: Arc<AccessController>,
    pub processor: Arc<EventProcessor>,
    pub jobs_rx: mpsc::Receiver<SummarizeJob>,
}

/// A full engine over an in-memory store and fake providers.
pub async fn world() -> World {
    let conn = Connection::open_in_memory().unwrap();
    schema::run_migrations(&conn).unwrap();
    let (store, _task) = spawn_store_server(Store::new(conn));

    let calls = FakeCallProvider::new();
    let chat = FakeChatProvider::new();
    let model = FakeModel::new("As discussed, the launch moves to Thursday.");
    let subscriptions = FakeSubscriptions::new(false);

    let agents = Arc::new(AgentConnectionManager::new(
        store.clone(),
        calls.clone() as Arc<dyn CallProvider>,
        RealtimeConfig::default(),
    ));
    let access = Arc::new(AccessController::new(store.clone(), agents.clone()));

    let (summary_queue, jobs_rx) = jobs::queue(16);
    let processor = Arc::new(EventProcessor::new(
        store.clone(),
        agents.clone(),
        calls.clone() as Arc<dyn CallProvider>,
        chat.clone() as Arc<dyn ChatProvider>,
        model.clone() as Arc<dyn ChatModel>,
        summary_queue,
        5,
    ));

    World {
        store,
        calls,
        chat,
        model,
        subscriptions,
        agents,
        access,
        processor,
        jobs_rx,
    }
}

pub async fn seed_agent(store: &StoreHandle, id: &str, owner: &str) {
    store
        .insert_agent(NewAgent {
            id: id.to_string(),
            user_id: owner.to_string(),
            name: format!("Agent {id}"),
            instructions: "You are a helpful meeting participant.".to_string(),
        })
        .await
        .unwrap();
}

pub async fn seed_meeting(
    store: &StoreHandle,
    id: &str,
    owner: &str,
    agent_id: &str,
    visibility: Visibility,
    max_participants: Option<i64>,
) {
    store
        .insert_meeting(NewMeeting {
            id: id.to_string(),
            name: format!("Meeting {id}"),
            user_id: owner.to_string(),
            agent_id: agent_id.to_string(),
            visibility,
            max_participants,
        })
        .await
        .unwrap();
}

pub fn identity(user_id: &str) -> parley::core::types::Identity {
    parley::core::types::Identity {
        user_id: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        name: user_id.to_string(),
    }
}
