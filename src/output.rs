//! Output rendering
//!
//! Renders a resource directory either as a per-region listing or as a flat
//! JSON array.

use crate::dispatch::ResourceDirectory;
use crate::provider::image::Image;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;

/// How listings are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One block per region
    #[default]
    Simplified,
    /// Flat JSON array, each image carrying its region
    Json,
}

impl FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simplified" | "table" => Ok(Self::Simplified),
            "json" => Ok(Self::Json),
            other => bail!("output mode '{}' is not valid", other),
        }
    }
}

/// Render a directory in the given mode
pub fn render(directory: &ResourceDirectory, mode: OutputMode) -> Result<String> {
    match mode {
        OutputMode::Simplified => render_simplified(directory),
        OutputMode::Json => render_json(directory),
    }
}

fn render_simplified(directory: &ResourceDirectory) -> Result<String> {
    if directory.is_empty() {
        bail!("no images found");
    }

    let mut out = String::new();
    for (region, images) in directory.iter() {
        if images.is_empty() {
            continue;
        }

        let rows: Vec<[String; 4]> = images.iter().map(row).collect();
        let name_width = column_width(&rows, 0, "Name");
        let id_width = column_width(&rows, 1, "ID");
        let state_width = column_width(&rows, 2, "State");

        writeln!(out, "Region: {} ({} images):", region, images.len())?;
        writeln!(
            out,
            "    {:<name_width$}  {:<id_width$}  {:<state_width$}  Tags",
            "Name", "ID", "State"
        )?;

        for (ix, [name, id, state, tags]) in rows.iter().enumerate() {
            let prefix = format!("[{}]", ix + 1);
            writeln!(
                out,
                "{:<4}{:<name_width$}  {:<id_width$}  {:<state_width$}  {}",
                prefix, name, id, state, tags
            )?;
        }
        writeln!(out)?;
    }

    Ok(out)
}

fn row(image: &Image) -> [String; 4] {
    let tags = image
        .tags
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    [
        image.name.clone().unwrap_or_default(),
        image.id.clone(),
        image.state_display(),
        format!("[{}]", tags),
    ]
}

fn column_width(rows: &[[String; 4]], column: usize, header: &str) -> usize {
    rows.iter()
        .map(|r| r[column].chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
}

fn render_json(directory: &ResourceDirectory) -> Result<String> {
    let images = directory.flatten();
    serde_json::to_string_pretty(&images).context("Failed to encode images as JSON")
}
