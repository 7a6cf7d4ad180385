use crate::error::{Result, SealError};
use crate::registry::{
    AttachLedgerIdRequest, CreateItemRequest, ErrorBody, ItemRegistry, SyncTallyRequest,
};
use crate::types::{Item, ItemKind, NewItem, Tally};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Registry reached over the HTTP surface of `sealbox-server`.
pub struct HttpRegistry {
    client: Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SealError::config("Registry URL cannot be empty"));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn collection_url(&self, kind: ItemKind) -> String {
        format!("{}/api/{}", self.base_url, kind.path_segment())
    }

    fn item_url(&self, kind: ItemKind, id: i64) -> String {
        format!("{}/{}", self.collection_url(kind), id)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status.to_string(),
    };

    Err(match status {
        StatusCode::NOT_FOUND => SealError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => SealError::Validation(message),
        _ => SealError::Http(format!("{}: {}", status, message)),
    })
}

#[async_trait]
impl ItemRegistry for HttpRegistry {
    async fn create(&self, new_item: NewItem) -> Result<Item> {
        new_item.validate()?;

        let response = self
            .client
            .post(self.collection_url(new_item.kind))
            .json(&CreateItemRequest::from(&new_item))
            .send()
            .await?;

        decode(response).await
    }

    async fn get(&self, kind: ItemKind, id: i64) -> Result<Item> {
        let response = self.client.get(self.item_url(kind, id)).send().await?;
        decode(response).await
    }

    async fn list(&self, kind: ItemKind) -> Result<Vec<Item>> {
        let response = self.client.get(self.collection_url(kind)).send().await?;
        decode(response).await
    }

    async fn attach_ledger_id(
        &self,
        kind: ItemKind,
        id: i64,
        contract_item_id: u64,
        transaction_hash: &str,
    ) -> Result<Item> {
        let response = self
            .client
            .patch(format!("{}/contract-id", self.item_url(kind, id)))
            .json(&AttachLedgerIdRequest {
                contract_item_id,
                transaction_hash: transaction_hash.to_string(),
            })
            .send()
            .await?;

        decode(response).await
    }

    async fn sync_tally(&self, kind: ItemKind, id: i64, counts: Tally) -> Result<Item> {
        let response = self
            .client
            .post(format!("{}/sync", self.item_url(kind, id)))
            .json(&SyncTallyRequest { counts })
            .send()
            .await?;

        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let registry = HttpRegistry::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            registry.collection_url(ItemKind::Auction),
            "http://localhost:5000/api/auctions"
        );
        assert_eq!(
            registry.item_url(ItemKind::Poll, 3),
            "http://localhost:5000/api/polls/3"
        );
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(matches!(
            HttpRegistry::new("", Duration::from_secs(5)),
            Err(SealError::Config(_))
        ));
    }
}
