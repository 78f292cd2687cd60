//! In-memory record store for tests and local runs

use super::{ContactDraft, OrderDraft, OrderRef, RecordKeeperError, RecordResult, RecordStage, RecordStore};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredContact {
    pub id: String,
    pub draft: ContactDraft,
}

#[derive(Debug, Default)]
struct State {
    contacts: Vec<StoredContact>,
    orders: Vec<OrderDraft>,
    calls: usize,
}

/// Record store that keeps contacts and orders in memory
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: Mutex<State>,
    fail_at: Option<RecordStage>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call at `stage` fails
    pub fn failing_at(stage: RecordStage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn contacts(&self) -> Vec<StoredContact> {
        self.lock().contacts.clone()
    }

    pub fn orders(&self) -> Vec<OrderDraft> {
        self.lock().orders.clone()
    }

    /// Number of capability calls made so far, failed ones included
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, stage: RecordStage) -> RecordResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls += 1;
        if self.fail_at == Some(stage) {
            return Err(RecordKeeperError::new(stage, "record store unavailable"));
        }
        Ok(state)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_contact(&self, plate: &str) -> RecordResult<Option<String>> {
        let state = self.enter(RecordStage::FindContact)?;
        Ok(state
            .contacts
            .iter()
            .find(|c| c.draft.plate == plate)
            .map(|c| c.id.clone()))
    }

    async fn create_contact(&self, draft: &ContactDraft) -> RecordResult<String> {
        let mut state = self.enter(RecordStage::CreateContact)?;
        let id = Uuid::new_v4().to_string();
        state.contacts.push(StoredContact {
            id: id.clone(),
            draft: draft.clone(),
        });
        Ok(id)
    }

    async fn create_order(&self, draft: &OrderDraft) -> RecordResult<OrderRef> {
        let mut state = self.enter(RecordStage::CreateOrder)?;
        state.orders.push(draft.clone());
        Ok(OrderRef {
            id: Uuid::new_v4().to_string(),
            url: None,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
