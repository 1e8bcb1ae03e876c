//! Functional tests for the HTTP tag index against a mock endpoint.

use importer_core::{Gateway, GetResourcesRequest, MatchResult, Predicate, TagIndex, TaggingConfig};
use importer_tagging::{HttpTagIndex, TaggingError, AMZ_JSON_CONTENT_TYPE, GET_RESOURCES_TARGET};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn index_for(server: &MockServer) -> HttpTagIndex {
    let config = TaggingConfig::default()
        .with_endpoint(server.uri())
        .with_header("x-api-key", "secret");
    HttpTagIndex::new(&config).unwrap()
}

fn request(token: Option<&str>) -> GetResourcesRequest {
    GetResourcesRequest {
        tag_filters: vec![
            Predicate::new("crossplane-name", "test"),
            Predicate::new("crossplane-kind", "securitygroup.ec2.aws.upbound.io"),
        ],
        pagination_token: token.map(str::to_string),
        resources_per_page: Some(100),
    }
}

/// Tenet: requests follow the GetResources wire protocol.
#[tokio::test]
async fn sends_get_resources_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-amz-target", GET_RESOURCES_TARGET))
        .and(header("content-type", AMZ_JSON_CONTENT_TYPE))
        .and(header("x-api-key", "secret"))
        .and(body_json(json!({
            "TagFilters": [
                {"Key": "crossplane-name", "Values": ["test"]},
                {"Key": "crossplane-kind", "Values": ["securitygroup.ec2.aws.upbound.io"]}
            ],
            "ResourcesPerPage": 100
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PaginationToken": "",
            "ResourceTagMappingList": [{
                "ResourceARN": "arn:aws:ec2:us-east-1:123:security-group/sg-1",
                "Tags": [
                    {"Key": "crossplane.io/external-name", "Value": "sg-1"},
                    {"Key": "crossplane-name", "Value": "test"}
                ]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = index_for(&server).get_resources(&request(None)).await.unwrap();

    assert_eq!(page.mappings.len(), 1);
    assert_eq!(
        page.mappings[0].resource_ref,
        "arn:aws:ec2:us-east-1:123:security-group/sg-1"
    );
    assert_eq!(page.mappings[0].tag("crossplane.io/external-name"), Some("sg-1"));
    assert_eq!(page.pagination_token.as_deref(), Some(""));
}

/// Tenet: the gateway drives pagination over HTTP.
#[tokio::test]
async fn gateway_paginates_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"PaginationToken": "page-2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ResourceTagMappingList": [{
                "ResourceARN": "arn:2",
                "Tags": [{"Key": "crossplane.io/external-name", "Value": "two"}]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PaginationToken": "page-2",
            "ResourceTagMappingList": [{
                "ResourceARN": "arn:1",
                "Tags": [{"Key": "crossplane.io/external-name", "Value": "one"}]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(Arc::new(index_for(&server)));
    let result = gateway
        .query(&[Predicate::new("crossplane-name", "test")])
        .await
        .unwrap();

    assert_eq!(
        result,
        MatchResult::Ambiguous(vec!["arn:1".into(), "arn:2".into()])
    );
}

/// Tenet: service errors surface code and message.
#[tokio::test]
async fn service_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "com.amazonaws.tagging#ThrottledException",
            "Message": "Rate exceeded"
        })))
        .mount(&server)
        .await;

    let index = index_for(&server);
    let err = index.fetch(&request(None)).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    match &err {
        TaggingError::Service { code, message, .. } => {
            assert_eq!(code, "ThrottledException");
            assert_eq!(message, "Rate exceeded");
        }
        other => panic!("expected Service error, got {other:?}"),
    }

    let err = index.get_resources(&request(None)).await.unwrap_err();
    assert!(err.message().contains("ThrottledException"));
}

/// Tenet: undecodable success bodies are errors, not empty pages.
#[tokio::test]
async fn malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = index_for(&server).fetch(&request(None)).await.unwrap_err();
    assert!(matches!(err, TaggingError::Decode(_)));
}
