//! One refresh cycle: build the board, count, render

use crate::cache::Recompute;
use crate::engine::AggregationEngine;
use crate::formatter::{self, BoardReport};
use async_trait::async_trait;
use board_core::{ExporterConfig, LimitConfig, ResourceRef, Result, Scope};
use board_source::DataSource;
use std::time::Duration;
use tracing::{debug, info};

/// Ties an engine to one project and one counter scope
pub struct BoardExporter<D: DataSource> {
    engine: AggregationEngine<D>,
    project_ref: ResourceRef,
    limits: LimitConfig,
    scope: Scope,
    bug_label: Option<String>,
    developers: Option<u32>,
}

impl<D: DataSource> BoardExporter<D> {
    pub fn new(
        source: D,
        project_id: u64,
        limits: LimitConfig,
        scope: Scope,
        timeout: Duration,
    ) -> Self {
        let project_ref = source.project_ref(project_id);
        Self {
            engine: AggregationEngine::new(source, timeout),
            project_ref,
            limits,
            scope,
            bug_label: None,
            developers: None,
        }
    }

    /// Build an exporter from a validated configuration
    pub fn from_config(source: D, config: &ExporterConfig) -> Result<Self> {
        Ok(Self::new(
            source,
            config.project_id,
            config.limit_config()?,
            config.scope()?,
            config.request_timeout(),
        )
        .with_write_back(config.update_notes)
        .with_bug_label(config.bug_label.clone())
        .with_developers(config.developers))
    }

    pub fn with_write_back(mut self, enabled: bool) -> Self {
        self.engine = self.engine.with_write_back(enabled);
        self
    }

    pub fn with_bug_label(mut self, label: Option<String>) -> Self {
        self.bug_label = label.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn with_developers(mut self, developers: Option<u32>) -> Self {
        self.developers = developers;
        self
    }

    pub fn project_ref(&self) -> &ResourceRef {
        &self.project_ref
    }

    /// Aggregate the board and counters; any failure aborts the cycle
    pub async fn collect(&self) -> Result<BoardReport> {
        let project = self
            .engine
            .build_project(&self.project_ref, &self.limits)
            .await?;
        let counters = self
            .engine
            .collect_counters(&self.scope, self.bug_label.as_deref())
            .await?;
        debug!(
            "Collected {} columns and counters for {}",
            project.columns.len(),
            self.scope
        );

        Ok(BoardReport {
            project,
            counters,
            developers: self.developers,
        })
    }

    pub async fn render(&self) -> Result<String> {
        let report = self.collect().await?;
        let text = formatter::render(&report);
        info!(
            "Rendered {} metric lines for project {}",
            text.lines().count(),
            report.project.id
        );
        Ok(text)
    }
}

#[async_trait]
impl<D: DataSource + 'static> Recompute for BoardExporter<D> {
    async fn recompute(&self) -> Result<String> {
        self.render().await
    }
}
