//! Ready-made token and endpoint providers

use crate::services::{EndpointResolver, TokenProvider};
use async_trait::async_trait;
use parking_lot::RwLock;

/// Token held in memory; replace it on sign-in or sign-out
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    token: RwLock<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token.into()),
        }
    }

    /// Read the token from an environment variable; unset means signed out
    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).unwrap_or_default())
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = token.into();
    }

    pub fn clear(&self) {
        self.token.write().clear();
    }
}

impl TokenProvider for StaticTokenProvider {
    fn current_token(&self) -> String {
        self.token.read().clone()
    }
}

/// Builds the server URL from a template containing `{kb}`
#[derive(Debug, Clone)]
pub struct TemplateEndpointResolver {
    template: String,
}

impl TemplateEndpointResolver {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl EndpointResolver for TemplateEndpointResolver {
    async fn resolve(&self, _token: &str, kb_id: &str) -> anyhow::Result<String> {
        if kb_id.is_empty() {
            anyhow::bail!("empty knowledge base id");
        }
        let url = self.template.replace("{kb}", &urlencoding::encode(kb_id));
        url::Url::parse(&url)?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_can_be_replaced_and_cleared() {
        let tokens = StaticTokenProvider::new("abc");
        assert_eq!(tokens.current_token(), "abc");
        tokens.set_token("def");
        assert_eq!(tokens.current_token(), "def");
        tokens.clear();
        assert!(tokens.current_token().is_empty());
    }

    #[tokio::test]
    async fn template_encodes_kb_id() {
        let resolver = TemplateEndpointResolver::new("https://kb.example.com/{kb}/xmlrpc");
        let url = resolver.resolve("tok", "team kb").await.unwrap();
        assert_eq!(url, "https://kb.example.com/team%20kb/xmlrpc");
        assert!(resolver.resolve("tok", "").await.is_err());
    }
}
