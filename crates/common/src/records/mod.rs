//! Record keeping: contacts and orders in the external database
//!
//! A contact is keyed by vehicle plate and looked up before it is created.
//! The lookup and the create are two separate calls, so two concurrent
//! submissions for a new plate may still both create a contact.

pub mod memory;
pub mod notion;

use crate::storage::StorageReference;
use crate::submission::SubmissionRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

pub use memory::InMemoryRecordStore;
pub use notion::NotionRecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactAction {
    Found,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRef {
    pub id: String,
    pub action: ContactAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Step of record keeping an error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    FindContact,
    CreateContact,
    CreateOrder,
    Timeout,
}

impl fmt::Display for RecordStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordStage::FindContact => "find_contact",
            RecordStage::CreateContact => "create_contact",
            RecordStage::CreateOrder => "create_order",
            RecordStage::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Record keeping failed at {stage}: {message}")]
pub struct RecordKeeperError {
    pub stage: RecordStage,
    pub message: String,
}

impl RecordKeeperError {
    pub fn new(stage: RecordStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

pub type RecordResult<T> = Result<T, RecordKeeperError>;

/// Values written onto a new contact entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDraft {
    pub name: String,
    pub plate: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: String,
    pub priority: String,
}

/// Values written onto a new order entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub title: String,
    /// ISO date when the submitted date parses, otherwise absent
    pub incident_date: Option<String>,
    pub incident_location: String,
    pub document_link: Option<String>,
    pub contact_id: Option<String>,
}

/// Record-keeping backend capability
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Id of the contact whose plate equals `plate` exactly
    async fn find_contact(&self, plate: &str) -> RecordResult<Option<String>>;

    async fn create_contact(&self, draft: &ContactDraft) -> RecordResult<String>;

    async fn create_order(&self, draft: &OrderDraft) -> RecordResult<OrderRef>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Contact upsert and order creation on top of a [`RecordStore`]
#[derive(Clone)]
pub struct RecordKeeper {
    store: Arc<dyn RecordStore>,
    default_priority: String,
}

impl RecordKeeper {
    pub fn new(store: Arc<dyn RecordStore>, default_priority: impl Into<String>) -> Self {
        Self {
            store,
            default_priority: default_priority.into(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Find the contact for the record's plate or create it
    #[instrument(skip(self, record), fields(plate = %record.client.plate))]
    pub async fn upsert_contact(&self, record: &SubmissionRecord) -> RecordResult<ContactRef> {
        if let Some(id) = self.store.find_contact(&record.client.plate).await? {
            info!(contact_id = %id, "Contact found");
            return Ok(ContactRef {
                id,
                action: ContactAction::Found,
            });
        }

        let draft = ContactDraft {
            name: record.client.name.clone(),
            plate: record.client.plate.clone(),
            email: record.client.email.clone(),
            phone: record.client.phone.clone(),
            address: record.client.address.clone(),
            priority: self.default_priority.clone(),
        };
        let id = self.store.create_contact(&draft).await?;
        info!(contact_id = %id, "Contact created");

        Ok(ContactRef {
            id,
            action: ContactAction::Created,
        })
    }

    /// Create the order entry; contact and document link are attached when given
    #[instrument(skip_all, fields(order_number = %record.order_number))]
    pub async fn create_order(
        &self,
        record: &SubmissionRecord,
        contact: Option<&ContactRef>,
        storage: Option<&StorageReference>,
    ) -> RecordResult<OrderRef> {
        let draft = OrderDraft {
            title: order_title(record),
            incident_date: record
                .incident
                .parsed_date()
                .map(|d| d.format("%Y-%m-%d").to_string()),
            incident_location: record.incident.location.clone(),
            document_link: storage.map(|s| s.link.clone()),
            contact_id: contact.map(|c| c.id.clone()),
        };

        let order = self.store.create_order(&draft).await?;
        info!(
            order_id = %order.id,
            linked_contact = draft.contact_id.is_some(),
            linked_document = draft.document_link.is_some(),
            "Order created"
        );
        Ok(order)
    }
}

/// `"{plate} - {name} - {order_number}"`
pub fn order_title(record: &SubmissionRecord) -> String {
    format!(
        "{} - {} - {}",
        record.client.plate, record.client.name, record.order_number
    )
}
