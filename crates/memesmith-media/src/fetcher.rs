use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::TemplateCache;
use crate::search::TemplateSearch;

/// Cache-aware front for a [`TemplateSearch`].
pub struct TemplateFetcher {
    search: Arc<dyn TemplateSearch>,
    cache: Option<TemplateCache>,
}

impl TemplateFetcher {
    pub fn new(search: Arc<dyn TemplateSearch>, cache: Option<TemplateCache>) -> Self {
        Self { search, cache }
    }

    pub fn provider_id(&self) -> &str {
        self.search.provider_id()
    }

    /// First template URL for `query`, from cache when fresh, else from search.
    pub async fn fetch(&self, query: &str) -> Option<String> {
        if let Some(cache) = &self.cache {
            if let Some(url) = cache.get(query).await {
                debug!("template cache hit for '{query}'");
                return Some(url);
            }
        }

        let urls = match self.search.search(query).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(
                    provider = self.search.provider_id(),
                    "template search failed for '{query}': {e}"
                );
                return None;
            }
        };

        let Some(url) = urls.into_iter().next() else {
            info!(
                provider = self.search.provider_id(),
                "no templates found for '{query}'"
            );
            return None;
        };

        if let Some(cache) = &self.cache {
            cache.put(query, &url).await;
        }
        Some(url)
    }
}
