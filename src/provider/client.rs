//! REST region client
//!
//! Implements [`RegionClient`] against a JSON image API. Every region has its
//! own base URL, derived from an endpoint template containing `{region}`.

use super::credentials::Credentials;
use super::http::HttpClient;
use super::image::{CopyImageInput, Image, ImagePage, ListFilter, Tag};
use super::RegionClient;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Placeholder replaced by the region name in endpoint templates
pub const REGION_PLACEHOLDER: &str = "{region}";

/// Upper bound on list pages, guards against a backend that never stops
/// returning page tokens
const MAX_PAGES: usize = 1000;

/// Build the base URL of one region from an endpoint template
pub fn region_base_url(template: &str, region: &str) -> Result<String> {
    if !template.contains(REGION_PLACEHOLDER) {
        bail!(
            "Endpoint '{}' has no {} placeholder. Please check your configuration",
            template,
            REGION_PLACEHOLDER
        );
    }

    let raw = template.replace(REGION_PLACEHOLDER, region);
    let url = Url::parse(&raw).with_context(|| format!("Invalid endpoint URL: {}", raw))?;

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Image API client bound to one region
#[derive(Clone)]
pub struct RestRegionClient {
    region: String,
    base_url: String,
    http: HttpClient,
}

impl RestRegionClient {
    /// Create a client for `region`. Issues no network calls.
    pub fn new(
        region: &str,
        endpoint_template: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let http = HttpClient::new(credentials, timeout)?;
        Self::with_http(region, endpoint_template, http)
    }

    /// Create a client reusing an existing HTTP connection pool
    pub fn with_http(region: &str, endpoint_template: &str, http: HttpClient) -> Result<Self> {
        Ok(Self {
            region: region.to_string(),
            base_url: region_base_url(endpoint_template, region)?,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an API URL below the region base
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn image_url(&self, image_id: &str) -> String {
        self.url(&format!("images/{}", urlencoding::encode(image_id)))
    }

    fn list_url(&self, filter: &ListFilter, page_token: Option<&str>) -> Result<String> {
        let mut url = Url::parse(&self.url("images"))
            .with_context(|| format!("Invalid list URL for region {}", self.region))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("owner", &filter.owner);
            for id in &filter.image_ids {
                query.append_pair("imageId", id);
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url.into())
    }

    /// Fetch one page of images
    async fn list_page(&self, filter: &ListFilter, page_token: Option<&str>) -> Result<ImagePage> {
        let url = self.list_url(filter, page_token)?;
        let response = self.http.get(&url).await?;

        if response.is_null() {
            return Ok(ImagePage {
                images: Vec::new(),
                next_page_token: None,
            });
        }

        serde_json::from_value(response)
            .with_context(|| format!("Unexpected list response from region {}", self.region))
    }

    fn tag_body(image_ids: &[String], tags: &[Tag], dry_run: bool) -> Value {
        json!({
            "resources": image_ids,
            "tags": tags,
            "dryRun": dry_run,
        })
    }
}

#[async_trait]
impl RegionClient for RestRegionClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_images(&self, filter: &ListFilter) -> Result<Vec<Image>> {
        let mut all_images = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.list_page(filter, page_token.as_deref()).await?;
            all_images.extend(page.images);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => {
                    for image in &mut all_images {
                        image.region = self.region.clone();
                    }
                    tracing::debug!("{}: listed {} images", self.region, all_images.len());
                    return Ok(all_images);
                }
            }
        }

        bail!(
            "Region {} returned more than {} pages of images",
            self.region,
            MAX_PAGES
        )
    }

    async fn describe_image(&self, image_id: &str) -> Result<Image> {
        let response = self.http.get(&self.image_url(image_id)).await?;
        let mut image: Image = serde_json::from_value(response)
            .with_context(|| format!("Unexpected describe response for image {}", image_id))?;
        image.region = self.region.clone();
        Ok(image)
    }

    async fn create_tags(&self, image_ids: &[String], tags: &[Tag], dry_run: bool) -> Result<()> {
        let body = Self::tag_body(image_ids, tags, dry_run);
        self.http
            .post(&self.url("tags"), &body)
            .await
            .with_context(|| format!("Failed to create tags in region {}", self.region))?;
        Ok(())
    }

    async fn delete_tags(&self, image_ids: &[String], tags: &[Tag], dry_run: bool) -> Result<()> {
        let body = Self::tag_body(image_ids, tags, dry_run);
        self.http
            .post(&self.url("tags/delete"), &body)
            .await
            .with_context(|| format!("Failed to delete tags in region {}", self.region))?;
        Ok(())
    }

    async fn deregister_image(&self, image_id: &str, dry_run: bool) -> Result<()> {
        let url = format!("{}?dryRun={}", self.image_url(image_id), dry_run);
        self.http
            .delete(&url)
            .await
            .with_context(|| format!("Failed to deregister image {}", image_id))?;
        Ok(())
    }

    async fn copy_image(&self, input: &CopyImageInput) -> Result<String> {
        let body = serde_json::to_value(input).context("Failed to encode copy request")?;
        let response = self
            .http
            .post(&self.url("images/copy"), &body)
            .await
            .with_context(|| {
                format!(
                    "Failed to copy image {} to region {}",
                    input.source_image_id, input.destination_region
                )
            })?;

        // Dry runs return no body
        Ok(response
            .get("imageId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}
