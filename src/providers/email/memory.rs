//! In-memory mail store.
//!
//! Holds an account's addresses, threads and labels in process memory and
//! records every call made against it, so behavior of the sweep can be
//! asserted without a network. Failures can be injected per thread and per
//! step.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{MailStore, Pagination, ProviderError, Result, ThreadPage, DEFAULT_PAGE_SIZE};
use crate::domain::{Address, EmailId, FailureStage, Label, Message, ThreadId};

/// A call made against the store, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListOwnedAddresses,
    ListThreads { page_token: Option<String> },
    GetThreadLabels(ThreadId),
    GetThreadMessages(ThreadId),
    Forward { message: EmailId, to: String },
    GetLabelByName(String),
    CreateLabel(String),
    AttachLabel { label: String, thread: ThreadId },
    Archive(ThreadId),
    MarkRead(ThreadId),
}

#[derive(Debug)]
struct StoredThread {
    id: ThreadId,
    messages: Vec<Message>,
    labels: Vec<String>,
    in_inbox: bool,
    unread: bool,
}

#[derive(Debug, Default)]
struct State {
    addresses: Vec<Address>,
    threads: Vec<StoredThread>,
    labels: Vec<Label>,
    next_label_id: u32,
    calls: Vec<StoreCall>,
    failures: HashSet<(ThreadId, FailureStage)>,
    racing_labels: HashSet<String>,
    listing_fails: bool,
}

impl State {
    fn thread_mut(&mut self, id: &ThreadId) -> Result<&mut StoredThread> {
        self.threads
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    fn check_failure(&self, id: &ThreadId, stage: FailureStage) -> Result<()> {
        if self.failures.contains(&(id.clone(), stage)) {
            return Err(ProviderError::Connection(format!(
                "injected {} failure for thread {}",
                stage, id
            )));
        }
        Ok(())
    }

    fn insert_label(&mut self, name: &str) -> Label {
        self.next_label_id += 1;
        let label = Label::new(format!("Label_{}", self.next_label_id), name);
        self.labels.push(label.clone());
        label
    }
}

/// Mail store backed by process memory.
///
/// Threads are listed in insertion order. Every stored thread is treated as
/// matching the eligibility query.
#[derive(Debug, Default)]
pub struct InMemoryMailStore {
    state: RwLock<State>,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the account's send-as addresses, in store order.
    pub fn with_addresses<I, S>(self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write().addresses = addresses.into_iter().map(Address::new).collect();
        self
    }

    /// Adds an unread inbox thread carrying the given user labels.
    pub fn add_thread(&self, id: impl Into<ThreadId>, messages: Vec<Message>, labels: &[&str]) {
        self.write().threads.push(StoredThread {
            id: id.into(),
            messages,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            in_inbox: true,
            unread: true,
        });
    }

    /// Creates a user label directly, bypassing call recording.
    pub fn add_label(&self, name: &str) -> Label {
        self.write().insert_label(name)
    }

    /// Makes the given step fail for one thread.
    pub fn fail_on(&self, thread_id: impl Into<ThreadId>, stage: FailureStage) {
        self.write().failures.insert((thread_id.into(), stage));
    }

    /// Makes every `list_threads` call fail.
    pub fn fail_listing(&self) {
        self.write().listing_fails = true;
    }

    /// Simulates another client creating `name` just before this store's
    /// next `create_label(name)`: the label appears and creation conflicts.
    pub fn race_label_creation(&self, name: &str) {
        self.write().racing_labels.insert(name.to_string());
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.read().calls.clone()
    }

    /// `(message, target)` pairs of every forward made so far.
    pub fn forwards(&self) -> Vec<(EmailId, String)> {
        self.read()
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::Forward { message, to } => Some((message.clone(), to.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of `create_label` calls made for `name`.
    pub fn create_label_calls(&self, name: &str) -> usize {
        self.read()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::CreateLabel(n) if n == name))
            .count()
    }

    /// All user labels in the store.
    pub fn labels(&self) -> Vec<Label> {
        self.read().labels.clone()
    }

    /// Label names currently on a thread.
    pub fn thread_labels(&self, id: &str) -> Vec<String> {
        self.read()
            .threads
            .iter()
            .find(|t| t.id.0 == id)
            .map(|t| t.labels.clone())
            .unwrap_or_default()
    }

    /// True once the thread has left the inbox.
    pub fn is_archived(&self, id: &str) -> bool {
        self.read()
            .threads
            .iter()
            .any(|t| t.id.0 == id && !t.in_inbox)
    }

    /// True once the thread has been marked read.
    pub fn is_read(&self, id: &str) -> bool {
        self.read().threads.iter().any(|t| t.id.0 == id && !t.unread)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MailStore for InMemoryMailStore {
    async fn list_owned_addresses(&self) -> Result<Vec<Address>> {
        let mut state = self.write();
        state.calls.push(StoreCall::ListOwnedAddresses);
        Ok(state.addresses.clone())
    }

    async fn list_threads(&self, _query: &str, pagination: Pagination) -> Result<ThreadPage> {
        let mut state = self.write();
        state.calls.push(StoreCall::ListThreads {
            page_token: pagination.page_token.clone(),
        });

        if state.listing_fails {
            return Err(ProviderError::Connection("injected listing failure".to_string()));
        }

        let start = match &pagination.page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ProviderError::InvalidRequest(format!("bad page token {}", token)))?,
            None => 0,
        };
        let limit = pagination.limit.unwrap_or(DEFAULT_PAGE_SIZE) as usize;
        let end = (start + limit).min(state.threads.len());

        let threads = state
            .threads
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        let next_page_token = (end < state.threads.len()).then(|| end.to_string());

        Ok(ThreadPage {
            threads,
            next_page_token,
        })
    }

    async fn get_thread_labels(&self, thread_id: &ThreadId) -> Result<Vec<String>> {
        let mut state = self.write();
        state.calls.push(StoreCall::GetThreadLabels(thread_id.clone()));
        state.check_failure(thread_id, FailureStage::Fetch)?;
        Ok(state.thread_mut(thread_id)?.labels.clone())
    }

    async fn get_thread_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        let mut state = self.write();
        state.calls.push(StoreCall::GetThreadMessages(thread_id.clone()));
        state.check_failure(thread_id, FailureStage::Fetch)?;
        Ok(state.thread_mut(thread_id)?.messages.clone())
    }

    async fn forward_message(&self, message: &Message, to: &Address) -> Result<()> {
        let mut state = self.write();
        state.calls.push(StoreCall::Forward {
            message: message.id.clone(),
            to: to.email.clone(),
        });
        state.check_failure(&message.thread_id, FailureStage::Forward)
    }

    async fn get_label_by_name(&self, name: &str) -> Result<Option<Label>> {
        let mut state = self.write();
        state.calls.push(StoreCall::GetLabelByName(name.to_string()));
        Ok(state.labels.iter().find(|l| l.name == name).cloned())
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        let mut state = self.write();
        state.calls.push(StoreCall::CreateLabel(name.to_string()));

        if state.racing_labels.remove(name) {
            state.insert_label(name);
            return Err(ProviderError::AlreadyExists(name.to_string()));
        }
        if state.labels.iter().any(|l| l.name == name) {
            return Err(ProviderError::AlreadyExists(name.to_string()));
        }
        Ok(state.insert_label(name))
    }

    async fn attach_label(&self, label: &Label, thread_id: &ThreadId) -> Result<()> {
        let mut state = self.write();
        state.calls.push(StoreCall::AttachLabel {
            label: label.name.clone(),
            thread: thread_id.clone(),
        });
        state.check_failure(thread_id, FailureStage::Label)?;

        if !state.labels.iter().any(|l| l.id == label.id) {
            return Err(ProviderError::NotFound(label.id.to_string()));
        }
        let thread = state.thread_mut(thread_id)?;
        if !thread.labels.contains(&label.name) {
            thread.labels.push(label.name.clone());
        }
        Ok(())
    }

    async fn archive_thread(&self, thread_id: &ThreadId) -> Result<()> {
        let mut state = self.write();
        state.calls.push(StoreCall::Archive(thread_id.clone()));
        state.check_failure(thread_id, FailureStage::Archive)?;
        state.thread_mut(thread_id)?.in_inbox = false;
        Ok(())
    }

    async fn mark_thread_read(&self, thread_id: &ThreadId) -> Result<()> {
        let mut state = self.write();
        state.calls.push(StoreCall::MarkRead(thread_id.clone()));
        state.check_failure(thread_id, FailureStage::MarkRead)?;
        state.thread_mut(thread_id)?.unread = false;
        Ok(())
    }
}
