//! JSON bodies of the `GetResources` operation

use importer_core::{GetResourcesPage, GetResourcesRequest, ResourceTagMapping, Tag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetResourcesInput<'a> {
    tag_filters: Vec<TagFilter<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources_per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TagFilter<'a> {
    key: &'a str,
    values: &'a [String],
}

impl<'a> From<&'a GetResourcesRequest> for GetResourcesInput<'a> {
    fn from(request: &'a GetResourcesRequest) -> Self {
        Self {
            tag_filters: request
                .tag_filters
                .iter()
                .map(|p| TagFilter {
                    key: &p.key,
                    values: &p.values,
                })
                .collect(),
            pagination_token: request.pagination_token.as_deref().filter(|t| !t.is_empty()),
            resources_per_page: request.resources_per_page,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetResourcesOutput {
    #[serde(default)]
    resource_tag_mapping_list: Vec<Mapping>,
    #[serde(default)]
    pagination_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Mapping {
    #[serde(rename = "ResourceARN", default)]
    resource_arn: String,
    #[serde(default)]
    tags: Vec<WireTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireTag {
    key: String,
    #[serde(default)]
    value: String,
}

impl From<GetResourcesOutput> for GetResourcesPage {
    fn from(output: GetResourcesOutput) -> Self {
        Self {
            mappings: output
                .resource_tag_mapping_list
                .into_iter()
                .map(|m| ResourceTagMapping {
                    resource_ref: m.resource_arn,
                    tags: m.tags.into_iter().map(|t| Tag::new(t.key, t.value)).collect(),
                })
                .collect(),
            pagination_token: output.pagination_token,
        }
    }
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceFault {
    #[serde(rename = "__type", default)]
    pub(crate) kind: String,
    #[serde(alias = "Message", default)]
    pub(crate) message: String,
}

impl ServiceFault {
    /// Error code without the service namespace prefix
    pub(crate) fn code(&self) -> &str {
        self.kind.rsplit('#').next().unwrap_or_default()
    }
}
