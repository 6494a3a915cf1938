pub mod chat;
pub mod cross_encoder;

pub use chat::{ChatCompletionGenerator, ChatConfig};
pub use cross_encoder::{CrossEncoderConfig, HttpCrossEncoder};

use crate::SearchError;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::OnceCell;

async fn shared_client(cell: &OnceCell<Client>, timeout: Duration) -> Result<&Client, SearchError> {
    cell.get_or_try_init(|| async move { Client::builder().timeout(timeout).build() })
        .await
        .map_err(SearchError::from)
}
