//! crates/document_insights_core/src/dashboard.rs
//!
//! Buckets an owner's analyzed documents into urgent / action required / informational.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::analysis::{Analysis, RiskLevel};
use crate::domain::{DocumentId, OwnerId};
use crate::ports::{DocumentRepository, PortResult};

/// Number of most recent analyzed documents a dashboard covers.
pub const DASHBOARD_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Urgent,
    ActionRequired,
    Informational,
}

impl Category {
    /// The serialized key, as used in `DashboardSummary`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Urgent => "urgent",
            Category::ActionRequired => "actionRequired",
            Category::Informational => "informational",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Urgent => "Urgent / penalty risk",
            Category::ActionRequired => "Action required",
            Category::Informational => "Informational",
        }
    }
}

/// High risk is urgent; medium risk or any required action needs attention.
pub fn categorize(analysis: Option<&Analysis>) -> Category {
    let Some(analysis) = analysis else {
        return Category::Informational;
    };
    match analysis.risk_level {
        Some(RiskLevel::High) => Category::Urgent,
        Some(RiskLevel::Medium) => Category::ActionRequired,
        _ if analysis.has_required_actions() => Category::ActionRequired,
        _ => Category::Informational,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardEntry {
    pub id: DocumentId,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    pub category: Category,
    pub category_label: &'static str,
    pub risk_level: Option<RiskLevel>,
}

/// Category counts over the returned page only, not the owner's whole history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub informational: usize,
    pub action_required: usize,
    pub urgent: usize,
}

impl DashboardSummary {
    fn record(&mut self, category: Category) {
        match category {
            Category::Urgent => self.urgent += 1,
            Category::ActionRequired => self.action_required += 1,
            Category::Informational => self.informational += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_analyzed: usize,
    pub documents: Vec<DashboardEntry>,
    pub summary: DashboardSummary,
}

#[derive(Clone)]
pub struct DashboardAggregator {
    documents: Arc<dyn DocumentRepository>,
    page_size: usize,
}

impl DashboardAggregator {
    pub fn new(documents: Arc<dyn DocumentRepository>) -> Self {
        Self {
            documents,
            page_size: DASHBOARD_PAGE_SIZE,
        }
    }

    pub async fn build_dashboard(&self, owner_id: &OwnerId) -> PortResult<Dashboard> {
        let records = self
            .documents
            .list_analyzed_by_owner(owner_id, self.page_size)
            .await?;

        let mut summary = DashboardSummary::default();
        let documents: Vec<DashboardEntry> = records
            .into_iter()
            .map(|record| {
                let category = categorize(record.analysis());
                summary.record(category);
                DashboardEntry {
                    risk_level: record.analysis().and_then(|a| a.risk_level),
                    id: record.id,
                    name: record.original_filename,
                    uploaded_at: record.created_at,
                    category,
                    category_label: category.label(),
                }
            })
            .collect();

        Ok(Dashboard {
            total_analyzed: documents.len(),
            documents,
            summary,
        })
    }
}
