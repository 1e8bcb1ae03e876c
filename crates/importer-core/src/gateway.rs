//! Tag index gateway
//!
//! [`TagIndex`] is the seam to the cloud provider's tagging service: one
//! call, one page. [`Gateway`] drives pagination on top of it and turns
//! the collected matches into a [`MatchResult`].

use crate::error::{GatewayError, IndexError};
use crate::filter::Predicate;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tag that carries the identity to adopt, unless configured otherwise
pub const DEFAULT_IDENTITY_TAG_KEY: &str = "crossplane.io/external-name";

/// Page size requested from the index, unless configured otherwise
pub const DEFAULT_RESOURCES_PER_PAGE: u32 = 100;

/// One page request against the tag index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetResourcesRequest {
    /// Conjunctive predicates
    pub tag_filters: Vec<Predicate>,
    /// Continuation token from the previous page, `None` for the first page
    pub pagination_token: Option<String>,
    pub resources_per_page: Option<u32>,
}

/// One page of matches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetResourcesPage {
    pub mappings: Vec<ResourceTagMapping>,
    /// Empty or absent on the last page
    pub pagination_token: Option<String>,
}

/// An external resource and all of its tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTagMapping {
    /// Provider-global reference (eg, an ARN)
    pub resource_ref: String,
    pub tags: Vec<Tag>,
}

impl ResourceTagMapping {
    /// Value of the tag named `key`, if present
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

/// Key/value tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// Create tag
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Searchable index of external resources by tag
///
/// Implementations perform exactly one remote call per invocation and
/// must not retry internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagIndex: Send + Sync {
    /// Fetch one page of resources matching every predicate in `request`
    async fn get_resources(
        &self,
        request: &GetResourcesRequest,
    ) -> Result<GetResourcesPage, IndexError>;
}

/// Classification of a completed query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// No external resource matched
    NotFound,
    /// Exactly one match, carrying a non-empty identity tag
    Found {
        identity: String,
        resource_ref: String,
    },
    /// More than one match; references in index order
    Ambiguous(Vec<String>),
}

/// Paginating client over a [`TagIndex`]
#[derive(Clone)]
pub struct Gateway {
    index: Arc<dyn TagIndex>,
    identity_tag_key: String,
    resources_per_page: u32,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("identity_tag_key", &self.identity_tag_key)
            .field("resources_per_page", &self.resources_per_page)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create gateway with default identity tag and page size
    #[must_use]
    pub fn new(index: Arc<dyn TagIndex>) -> Self {
        Self {
            index,
            identity_tag_key: DEFAULT_IDENTITY_TAG_KEY.to_string(),
            resources_per_page: DEFAULT_RESOURCES_PER_PAGE,
        }
    }

    /// Set the tag read as the identity of a match
    #[must_use]
    pub fn with_identity_tag_key(mut self, key: impl Into<String>) -> Self {
        self.identity_tag_key = key.into();
        self
    }

    /// Set the page size requested from the index
    #[must_use]
    pub fn with_resources_per_page(mut self, n: u32) -> Self {
        self.resources_per_page = n;
        self
    }

    /// Tag read as the identity of a match
    #[inline]
    #[must_use]
    pub fn identity_tag_key(&self) -> &str {
        &self.identity_tag_key
    }

    /// Collect every page matching `predicates` and classify the result
    ///
    /// Pagination continues until the index returns an empty or absent
    /// token. A token the index already handed out ends pagination with
    /// what has been collected so far.
    ///
    /// # Errors
    /// - [`GatewayError::IndexUnavailable`] on any index failure; partial
    ///   pages are discarded
    /// - [`GatewayError::IdentityTagMissing`] when the single match has no
    ///   non-empty identity tag
    pub async fn query(&self, predicates: &[Predicate]) -> Result<MatchResult, GatewayError> {
        let mut request = GetResourcesRequest {
            tag_filters: predicates.to_vec(),
            pagination_token: None,
            resources_per_page: Some(self.resources_per_page),
        };
        let mut mappings = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self.index.get_resources(&request).await?;
            pages += 1;
            mappings.extend(page.mappings);

            let Some(token) = page.pagination_token.filter(|t| !t.is_empty()) else {
                break;
            };
            if !seen_tokens.insert(token.clone()) {
                warn!(token = %token, pages, "tag index repeated a pagination token, stopping");
                break;
            }
            request.pagination_token = Some(token);
        }

        debug!(pages, matches = mappings.len(), "tag index query complete");
        self.classify(mappings)
    }

    fn classify(&self, mut mappings: Vec<ResourceTagMapping>) -> Result<MatchResult, GatewayError> {
        match mappings.len() {
            0 => Ok(MatchResult::NotFound),
            1 => {
                let mapping = mappings.remove(0);
                let identity = mapping
                    .tag(&self.identity_tag_key)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
                match identity {
                    Some(identity) => Ok(MatchResult::Found {
                        identity,
                        resource_ref: mapping.resource_ref,
                    }),
                    None => Err(GatewayError::IdentityTagMissing {
                        resource_ref: mapping.resource_ref,
                        tag: self.identity_tag_key.clone(),
                    }),
                }
            }
            _ => Ok(MatchResult::Ambiguous(
                mappings.into_iter().map(|m| m.resource_ref).collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    fn mapping(resource_ref: &str, tags: &[(&str, &str)]) -> ResourceTagMapping {
        ResourceTagMapping {
            resource_ref: resource_ref.to_string(),
            tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
        }
    }

    fn page(mappings: Vec<ResourceTagMapping>, token: Option<&str>) -> GetResourcesPage {
        GetResourcesPage {
            mappings,
            pagination_token: token.map(str::to_string),
        }
    }

    fn gateway(index: MockTagIndex) -> Gateway {
        Gateway::new(Arc::new(index))
    }

    #[tokio::test]
    async fn single_match_yields_identity() {
        let mut index = MockTagIndex::new();
        index
            .expect_get_resources()
            .times(1)
            .withf(|req| {
                req.pagination_token.is_none()
                    && req.resources_per_page == Some(DEFAULT_RESOURCES_PER_PAGE)
                    && req.tag_filters == vec![Predicate::new("env", "prod")]
            })
            .returning(|_| {
                Ok(page(
                    vec![mapping(
                        "arn:aws:ec2:us-east-1:123:security-group/sg-1",
                        &[(DEFAULT_IDENTITY_TAG_KEY, "sg-1"), ("env", "prod")],
                    )],
                    None,
                ))
            });

        let result = gateway(index)
            .query(&[Predicate::new("env", "prod")])
            .await
            .unwrap();
        assert_eq!(
            result,
            MatchResult::Found {
                identity: "sg-1".into(),
                resource_ref: "arn:aws:ec2:us-east-1:123:security-group/sg-1".into(),
            }
        );
    }

    #[tokio::test]
    async fn no_match_is_not_found() {
        let mut index = MockTagIndex::new();
        index
            .expect_get_resources()
            .returning(|_| Ok(page(vec![], Some(""))));

        let result = gateway(index).query(&[]).await.unwrap();
        assert_eq!(result, MatchResult::NotFound);
    }

    #[tokio::test]
    async fn follows_pagination_tokens() {
        let mut index = MockTagIndex::new();
        let mut seq = Sequence::new();
        index
            .expect_get_resources()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.pagination_token.is_none())
            .returning(|_| Ok(page(vec![], Some("page-2"))));
        index
            .expect_get_resources()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.pagination_token.as_deref() == Some("page-2"))
            .returning(|_| Ok(page(vec![mapping("arn:a", &[(DEFAULT_IDENTITY_TAG_KEY, "a")])], None)));

        let result = gateway(index).query(&[]).await.unwrap();
        assert_eq!(
            result,
            MatchResult::Found {
                identity: "a".into(),
                resource_ref: "arn:a".into(),
            }
        );
    }

    #[tokio::test]
    async fn ambiguity_spanning_pages() {
        let mut index = MockTagIndex::new();
        let mut seq = Sequence::new();
        index
            .expect_get_resources()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(vec![mapping("arn:a", &[])], Some("t"))));
        index
            .expect_get_resources()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(vec![mapping("arn:b", &[])], None)));

        let result = gateway(index).query(&[]).await.unwrap();
        assert_eq!(
            result,
            MatchResult::Ambiguous(vec!["arn:a".into(), "arn:b".into()])
        );
    }

    #[tokio::test]
    async fn repeated_token_stops_pagination() {
        let mut index = MockTagIndex::new();
        index
            .expect_get_resources()
            .times(2)
            .returning(|_| Ok(page(vec![], Some("same"))));

        let result = gateway(index).query(&[]).await.unwrap();
        assert_eq!(result, MatchResult::NotFound);
    }

    #[tokio::test]
    async fn index_failure_discards_partial_results() {
        let mut index = MockTagIndex::new();
        let mut seq = Sequence::new();
        index
            .expect_get_resources()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(vec![mapping("arn:a", &[])], Some("t"))));
        index
            .expect_get_resources()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(IndexError::new("throttled")));

        let err = gateway(index).query(&[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::IndexUnavailable(_)));
        assert!(err.to_string().contains("throttled"));
    }

    #[tokio::test]
    async fn missing_or_empty_identity_tag() {
        for tags in [vec![("other", "x")], vec![(DEFAULT_IDENTITY_TAG_KEY, "")]] {
            let mut index = MockTagIndex::new();
            index
                .expect_get_resources()
                .returning(move |_| Ok(page(vec![mapping("arn:a", &tags)], None)));

            let err = gateway(index).query(&[]).await.unwrap_err();
            match err {
                GatewayError::IdentityTagMissing { resource_ref, tag } => {
                    assert_eq!(resource_ref, "arn:a");
                    assert_eq!(tag, DEFAULT_IDENTITY_TAG_KEY);
                }
                other => panic!("expected IdentityTagMissing, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn custom_identity_tag_key() {
        let mut index = MockTagIndex::new();
        index.expect_get_resources().returning(|_| {
            Ok(page(
                vec![mapping("arn:a", &[("Name", "my-sg"), (DEFAULT_IDENTITY_TAG_KEY, "x")])],
                None,
            ))
        });

        let gateway = gateway(index)
            .with_identity_tag_key("Name")
            .with_resources_per_page(10);
        assert_eq!(gateway.identity_tag_key(), "Name");

        let result = gateway.query(&[]).await.unwrap();
        assert_eq!(
            result,
            MatchResult::Found {
                identity: "my-sg".into(),
                resource_ref: "arn:a".into(),
            }
        );
    }
}
