//! Persisted index snapshot used for warm restarts and debugging.
//!
//! The document maps section ids to full section records minus the body
//! text, plus a metadata block. It is advisory: a correct index can always be
//! rebuilt from the section sources.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::fs;

use super::traits::{Result, SearchError};
use super::types::{Category, ContentQuality, Platform, Section, StructuredContent};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub version: u32,
    pub total_sections: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

/// A section without its `content` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub platform: Platform,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<StructuredContent>,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    pub quality: ContentQuality,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl From<&Section> for SectionRecord {
    fn from(section: &Section) -> Self {
        Self {
            id: section.id.clone(),
            title: section.title.clone(),
            url: section.url.clone(),
            platform: section.platform,
            category: section.category,
            structured_content: section.structured_content.clone(),
            keywords: section.keywords.clone(),
            quality: section.quality,
            last_updated: section.last_updated,
        }
    }
}

impl From<SectionRecord> for Section {
    fn from(record: SectionRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            url: record.url,
            platform: record.platform,
            category: record.category,
            content: String::new(),
            structured_content: record.structured_content,
            keywords: record.keywords,
            quality: record.quality,
            last_updated: record.last_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub metadata: SnapshotMetadata,
    pub sections: BTreeMap<String, SectionRecord>,
}

impl IndexSnapshot {
    pub fn from_sections<'a>(sections: impl IntoIterator<Item = &'a Section>) -> Self {
        let sections: BTreeMap<String, SectionRecord> = sections
            .into_iter()
            .map(|section| (section.id.clone(), SectionRecord::from(section)))
            .collect();

        Self {
            metadata: SnapshotMetadata {
                version: SNAPSHOT_VERSION,
                total_sections: sections.len(),
                last_updated: OffsetDateTime::now_utc(),
            },
            sections,
        }
    }

    pub fn into_sections(self) -> impl Iterator<Item = Section> {
        self.sections.into_values().map(Section::from)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).await?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).await?;
        let snapshot: IndexSnapshot = serde_json::from_str(&json)?;
        if snapshot.metadata.version != SNAPSHOT_VERSION {
            return Err(SearchError::SnapshotVersion {
                found: snapshot.metadata.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }
}
