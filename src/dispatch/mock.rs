//! In-memory region client for dispatcher tests

use crate::provider::image::{CopyImageInput, Image, ListFilter, Tag};
use crate::provider::RegionClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Fixed timestamp `offset` minutes after a reference point
pub fn at(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(offset)
}

/// One mutating call received by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTags(Vec<String>, Vec<Tag>),
    DeleteTags(Vec<String>, Vec<Tag>),
    Deregister(String),
    Copy(CopyImageInput),
}

pub struct MockRegionClient {
    region: String,
    images: Vec<Image>,
    fail_list: bool,
    fail_ops: bool,
    fail_ids: Vec<String>,
    list_calls: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl MockRegionClient {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            images: Vec::new(),
            fail_list: false,
            fail_ops: false,
            fail_ids: Vec::new(),
            list_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_image(mut self, id: &str, created: DateTime<Utc>) -> Self {
        self.images
            .push(Image::new(id, &self.region).created_at(created).named(id));
        self
    }

    pub fn with_described_image(mut self, id: &str, description: &str) -> Self {
        self.images.push(
            Image::new(id, &self.region)
                .created_at(at(0))
                .named(id)
                .described(description),
        );
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_ops(mut self) -> Self {
        self.fail_ops = true;
        self
    }

    /// Fail deregistration of one specific image only
    pub fn failing_id(mut self, id: &str) -> Self {
        self.fail_ids.push(id.to_string());
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_ops {
            return Err(anyhow!("{}: operation rejected", self.region));
        }
        Ok(())
    }
}

#[async_trait]
impl RegionClient for MockRegionClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_images(&self, filter: &ListFilter) -> Result<Vec<Image>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(anyhow!("{}: endpoint unreachable", self.region));
        }
        // Reverse so callers cannot rely on backend order
        Ok(self
            .images
            .iter()
            .rev()
            .filter(|image| filter.matches(image))
            .cloned()
            .collect())
    }

    async fn describe_image(&self, image_id: &str) -> Result<Image> {
        self.images
            .iter()
            .find(|image| image.id == image_id)
            .cloned()
            .ok_or_else(|| anyhow!("image {} not found", image_id))
    }

    async fn create_tags(&self, image_ids: &[String], tags: &[Tag], _dry_run: bool) -> Result<()> {
        self.record(Call::CreateTags(image_ids.to_vec(), tags.to_vec()))
    }

    async fn delete_tags(&self, image_ids: &[String], tags: &[Tag], _dry_run: bool) -> Result<()> {
        self.record(Call::DeleteTags(image_ids.to_vec(), tags.to_vec()))
    }

    async fn deregister_image(&self, image_id: &str, _dry_run: bool) -> Result<()> {
        self.record(Call::Deregister(image_id.to_string()))?;
        if self.fail_ids.iter().any(|id| id == image_id) {
            return Err(anyhow!("image {} is in use", image_id));
        }
        Ok(())
    }

    async fn copy_image(&self, input: &CopyImageInput) -> Result<String> {
        self.record(Call::Copy(input.clone()))?;
        if self.fail_ids.iter().any(|r| *r == input.destination_region) {
            return Err(anyhow!("region {} rejected the copy", input.destination_region));
        }
        Ok(format!("{}-copy-{}", input.source_image_id, input.destination_region))
    }
}
