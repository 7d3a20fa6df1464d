//! Integration tests for the REST region client using wiremock
//!
//! Every region gets its own path prefix on one mock server, so a single
//! server can stand in for several regional endpoints.

use images::dispatch::{CopyRequest, Dispatcher};
use images::provider::client::RestRegionClient;
use images::provider::credentials::Credentials;
use images::provider::http::HttpClient;
use images::provider::image::{ListFilter, Tag};
use images::provider::regions::RegionRegistry;
use images::provider::RegionClient;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{basic_auth, body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn template(server: &MockServer) -> String {
    format!("{}/{{region}}", server.uri())
}

fn http() -> HttpClient {
    let creds = Credentials::new("AKID", "secret").unwrap();
    HttpClient::new(creds, Duration::from_secs(5)).unwrap()
}

fn client(server: &MockServer, region: &str) -> RestRegionClient {
    RestRegionClient::with_http(region, &template(server), http()).unwrap()
}

fn dispatcher(server: &MockServer, regions: &[&str]) -> Dispatcher<RestRegionClient> {
    let http = http();
    let endpoint = template(server);
    let registry = RegionRegistry::from_spec(regions, &[] as &[&str], &[], |region| {
        RestRegionClient::with_http(region, &endpoint, http.clone())
    })
    .unwrap();
    Dispatcher::new(registry)
}

async fn mount_listing(server: &MockServer, region: &str, ids: &[&str]) {
    let images: Vec<_> = ids
        .iter()
        .map(|id| json!({"imageId": id, "name": id, "state": "available"}))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/{}/images", region)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "images": images })))
        .mount(server)
        .await;
}

mod region_client_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_follows_page_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/us-east-1/images"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [{"imageId": "ami-2", "creationDate": "2015-06-02T00:00:00Z"}]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/us-east-1/images"))
            .and(query_param("owner", "self"))
            .and(basic_auth("AKID", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [{"imageId": "ami-1", "creationDate": "2015-06-01T00:00:00Z"}],
                "nextPageToken": "p2"
            })))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let images = client(&server, "us-east-1")
            .list_images(&ListFilter::owned())
            .await
            .unwrap();

        let ids: Vec<&str> = images.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ami-1", "ami-2"]);
        assert!(images.iter().all(|i| i.region == "us-east-1"));
        assert!(images[0].creation_time.is_some());
    }

    #[tokio::test]
    async fn test_list_sends_id_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/eu-west-1/images"))
            .and(query_param("imageId", "ami-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [{"imageId": "ami-7"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let filter = ListFilter::owned().with_ids(["ami-7"]);
        let images = client(&server, "eu-west-1").list_images(&filter).await.unwrap();
        assert_eq!(images.len(), 1);
    }

    #[tokio::test]
    async fn test_create_tags_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/us-east-1/tags"))
            .and(body_json(json!({
                "resources": ["ami-1", "ami-2"],
                "tags": [{"key": "env", "value": "prod"}, {"key": "team", "value": ""}],
                "dryRun": true
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, "us-east-1")
            .create_tags(
                &["ami-1".to_string(), "ami-2".to_string()],
                &[Tag::new("env", "prod"), Tag::new("team", "")],
                true,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_tags_omits_missing_values() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/us-east-1/tags/delete"))
            .and(body_json(json!({
                "resources": ["ami-1"],
                "tags": [{"key": "env"}],
                "dryRun": false
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, "us-east-1")
            .delete_tags(&["ami-1".to_string()], &[Tag::key_only("env")], false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deregister_passes_dry_run() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/us-east-1/images/ami-1"))
            .and(query_param("dryRun", "true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, "us-east-1")
            .deregister_image("ami-1", true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/us-east-1/images/ami-1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "image not found"}
            })))
            .mount(&server)
            .await;

        let err = client(&server, "us-east-1")
            .describe_image("ami-1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_malformed_listing_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/us-east-1/images"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client(&server, "us-east-1")
            .list_images(&ListFilter::owned())
            .await;
        assert!(result.is_err());
    }
}

mod dispatch_tests {
    use super::*;

    #[tokio::test]
    async fn test_tags_reach_owning_regions_only() {
        let server = MockServer::start().await;
        mount_listing(&server, "us-east-1", &["ami-1"]).await;
        mount_listing(&server, "eu-west-1", &["ami-2"]).await;
        mount_listing(&server, "ap-southeast-1", &[]).await;

        for (region, id) in [("us-east-1", "ami-1"), ("eu-west-1", "ami-2")] {
            Mock::given(method("POST"))
                .and(path(format!("/{}/tags", region)))
                .and(body_partial_json(json!({ "resources": [id] })))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;
        }

        Mock::given(method("POST"))
            .and(path("/ap-southeast-1/tags"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let d = dispatcher(&server, &["us-east-1", "eu-west-1", "ap-southeast-1"]);
        d.create_tags(
            &[Tag::new("env", "prod")],
            false,
            &["ami-1".to_string(), "ami-2".to_string()],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_failing_region_is_aggregated() {
        let server = MockServer::start().await;
        mount_listing(&server, "us-east-1", &["ami-1"]).await;
        mount_listing(&server, "eu-west-1", &["ami-2"]).await;

        Mock::given(method("DELETE"))
            .and(path("/us-east-1/images/ami-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/eu-west-1/images/ami-2"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let d = dispatcher(&server, &["us-east-1", "eu-west-1"]);
        let err = d
            .deregister(false, &["ami-1".to_string(), "ami-2".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.len(), 1);
        assert_eq!(err.failed_regions(), vec!["eu-west-1"]);
        assert!(err.to_string().starts_with("1 error occurred:"));
    }

    #[tokio::test]
    async fn test_copy_goes_through_source_region() {
        let server = MockServer::start().await;
        mount_listing(&server, "us-east-1", &["ami-1"]).await;
        mount_listing(&server, "eu-west-1", &[]).await;

        Mock::given(method("GET"))
            .and(path("/us-east-1/images/ami-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "imageId": "ami-1",
                "name": "base",
                "description": "golden image"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/us-east-1/images/copy"))
            .and(body_partial_json(json!({
                "sourceImageId": "ami-1",
                "sourceRegion": "us-east-1",
                "destinationRegion": "eu-west-1",
                "name": "base",
                "description": "[Copied ami-1 from us-east-1 via images] golden image"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"imageId": "ami-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let d = dispatcher(&server, &["us-east-1", "eu-west-1"]);
        let (copies, errors) = d
            .copy(&CopyRequest {
                source_id: "ami-1".to_string(),
                destinations: vec!["eu-west-1".to_string()],
                description: String::new(),
                dry_run: false,
            })
            .await;

        assert!(errors.is_none());
        assert_eq!(copies.get("eu-west-1").map(String::as_str), Some("ami-9"));
    }
}
