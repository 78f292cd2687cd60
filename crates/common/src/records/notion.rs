//! Notion record store
//!
//! Contacts and orders live in two Notion databases. Property names come from
//! [`NotionProperties`] so the code does not depend on one workspace layout.

use super::{ContactDraft, OrderDraft, OrderRef, RecordKeeperError, RecordResult, RecordStage, RecordStore};
use crate::config::{NotionConfig, NotionProperties};
use crate::errors::AppError;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const NOTION_VERSION_HEADER: &str = "Notion-Version";
/// Notion rejects rich text items longer than this
const MAX_TEXT_LEN: usize = 2000;

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<PageResponse>,
}

#[derive(Deserialize)]
struct PageResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

/// Notion API backed [`RecordStore`]
pub struct NotionRecordStore {
    client: reqwest::Client,
    token: String,
    api_base: String,
    api_version: String,
    contacts_database_id: String,
    orders_database_id: String,
    properties: NotionProperties,
}

impl NotionRecordStore {
    pub fn from_config(config: &NotionConfig) -> Result<Self, AppError> {
        let (token, contacts, orders) = config.credentials().ok_or_else(|| AppError::Configuration {
            message: "Notion token and database ids are required".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            token: token.to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            contacts_database_id: contacts.to_string(),
            orders_database_id: orders.to_string(),
            properties: config.properties.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header(NOTION_VERSION_HEADER, &self.api_version)
    }

    /// Query body matching contacts whose plate equals `plate`
    pub fn contact_filter(&self, plate: &str) -> Value {
        json!({
            "filter": {
                "property": self.properties.contact_plate,
                "rich_text": { "equals": plate },
            },
            "page_size": 1,
        })
    }

    /// Page body for a new contact
    pub fn contact_page(&self, draft: &ContactDraft) -> Value {
        let p = &self.properties;
        let mut properties = Map::new();
        properties.insert(p.contact_name.clone(), title(&draft.name));
        properties.insert(p.contact_plate.clone(), rich_text(&draft.plate));
        properties.insert(p.contact_address.clone(), rich_text(&draft.address));
        properties.insert(p.contact_priority.clone(), json!({ "select": { "name": draft.priority } }));
        if let Some(email) = &draft.email {
            properties.insert(p.contact_email.clone(), json!({ "email": email }));
        }
        if let Some(phone) = &draft.phone {
            properties.insert(p.contact_phone.clone(), json!({ "phone_number": phone }));
        }

        json!({
            "parent": { "database_id": self.contacts_database_id },
            "properties": properties,
        })
    }

    /// Page body for a new order
    pub fn order_page(&self, draft: &OrderDraft) -> Value {
        let p = &self.properties;
        let mut properties = Map::new();
        properties.insert(p.order_title.clone(), title(&draft.title));
        properties.insert(p.order_location.clone(), rich_text(&draft.incident_location));
        if let Some(date) = &draft.incident_date {
            properties.insert(p.order_date.clone(), json!({ "date": { "start": date } }));
        }
        if let Some(link) = &draft.document_link {
            properties.insert(p.order_link.clone(), json!({ "url": link }));
        }
        if let Some(contact_id) = &draft.contact_id {
            properties.insert(p.order_contact.clone(), json!({ "relation": [{ "id": contact_id }] }));
        }

        json!({
            "parent": { "database_id": self.orders_database_id },
            "properties": properties,
        })
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}

fn title(text: &str) -> Value {
    json!({ "title": [{ "text": { "content": truncate(text) } }] })
}

fn rich_text(text: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": truncate(text) } }] })
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder, stage: RecordStage) -> RecordResult<T> {
    let response = request.send().await.map_err(|e| {
        let stage = if e.is_timeout() { RecordStage::Timeout } else { stage };
        RecordKeeperError::new(stage, format!("Request failed: {}", e))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RecordKeeperError::new(stage, format!("API error {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| RecordKeeperError::new(stage, format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl RecordStore for NotionRecordStore {
    async fn find_contact(&self, plate: &str) -> RecordResult<Option<String>> {
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("/databases/{}/query", self.contacts_database_id),
            )
            .json(&self.contact_filter(plate));

        let response: QueryResponse = send_json(request, RecordStage::FindContact).await?;
        Ok(response.results.into_iter().next().map(|page| page.id))
    }

    async fn create_contact(&self, draft: &ContactDraft) -> RecordResult<String> {
        let request = self
            .request(reqwest::Method::POST, "/pages")
            .json(&self.contact_page(draft));

        let page: PageResponse = send_json(request, RecordStage::CreateContact).await?;
        Ok(page.id)
    }

    async fn create_order(&self, draft: &OrderDraft) -> RecordResult<OrderRef> {
        let request = self
            .request(reqwest::Method::POST, "/pages")
            .json(&self.order_page(draft));

        let page: PageResponse = send_json(request, RecordStage::CreateOrder).await?;
        Ok(OrderRef {
            id: page.id,
            url: page.url,
        })
    }

    fn backend_name(&self) -> &'static str {
        "notion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NotionRecordStore {
        let config = NotionConfig {
            token: Some("secret".into()),
            contacts_database_id: Some("contacts-db".into()),
            orders_database_id: Some("orders-db".into()),
            ..NotionConfig::default()
        };
        NotionRecordStore::from_config(&config).unwrap()
    }

    #[test]
    fn test_unconfigured_store_is_rejected() {
        assert!(NotionRecordStore::from_config(&NotionConfig::default()).is_err());
    }

    #[test]
    fn test_contact_filter_matches_plate_exactly() {
        let body = store().contact_filter("BI-XX 123");
        assert_eq!(body["filter"]["property"], "Kennzeichen");
        assert_eq!(body["filter"]["rich_text"]["equals"], "BI-XX 123");
    }

    #[test]
    fn test_contact_page_omits_missing_phone() {
        let draft = ContactDraft {
            name: "Max".into(),
            plate: "BI-XX 123".into(),
            email: Some("max@test.de".into()),
            phone: None,
            address: "Teststr 1".into(),
            priority: "Normal".into(),
        };
        let body = store().contact_page(&draft);

        assert_eq!(body["parent"]["database_id"], "contacts-db");
        let props = &body["properties"];
        assert_eq!(props["Name"]["title"][0]["text"]["content"], "Max");
        assert_eq!(props["E-Mail"]["email"], "max@test.de");
        assert_eq!(props["Priorität"]["select"]["name"], "Normal");
        assert!(props.get("Telefon").is_none());
    }

    #[test]
    fn test_order_page_links() {
        let draft = OrderDraft {
            title: "BI-XX 123 - Max - GA-1".into(),
            incident_date: Some("2025-01-01".into()),
            incident_location: "Bielefeld".into(),
            document_link: Some("https://drive.google.com/file/d/x/view".into()),
            contact_id: Some("contact-1".into()),
        };
        let body = store().order_page(&draft);
        let props = &body["properties"];

        assert_eq!(body["parent"]["database_id"], "orders-db");
        assert_eq!(props["Kontakt"]["relation"][0]["id"], "contact-1");
        assert_eq!(props["Gutachten PDF"]["url"], "https://drive.google.com/file/d/x/view");
        assert_eq!(props["Unfalldatum"]["date"]["start"], "2025-01-01");
    }

    #[test]
    fn test_long_text_is_truncated() {
        let long = "x".repeat(MAX_TEXT_LEN + 10);
        let value = rich_text(&long);
        let content = value["rich_text"][0]["text"]["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), MAX_TEXT_LEN);
    }
}
