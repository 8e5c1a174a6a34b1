use crate::apis::to_params;
use crate::apis::types::{NewsParams, NewsResponse};
use crate::core::client::SignedClient;
use crate::core::errors::PipelineError;

pub const NEWS_LIST: &str = "/api/news/list";

/// News feed endpoints
#[derive(Debug, Clone)]
pub struct NewsApi {
    client: SignedClient,
}

impl NewsApi {
    pub fn new(client: SignedClient) -> Self {
        Self { client }
    }

    /// Get a page of headlines, optionally filtered by category
    pub async fn news_list(&self, params: &NewsParams) -> Result<NewsResponse, PipelineError> {
        self.client.send(NEWS_LIST, to_params(params)?).await
    }
}
