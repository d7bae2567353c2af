//! Aggregation engine
//!
//! Walks project → columns → cards through a [`DataSource`], derives the
//! per-column state and optionally writes a summary back into each
//! column's annotation card.

use board_core::{
    AuxCounters, BoardError, Column, CountQuery, IssueKind, IssueState, LimitConfig, Project,
    Qualifier, ResourceRef, Result, Scope,
};
use board_source::{wire, DataSource};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Builds board trees and counters from a data source
pub struct AggregationEngine<D: DataSource> {
    source: D,
    timeout: Duration,
    write_back: bool,
}

impl<D: DataSource> AggregationEngine<D> {
    /// Create an engine whose every data source call is bounded by `timeout`
    pub fn new(source: D, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            write_back: true,
        }
    }

    /// Enable or disable writing column summaries into annotation cards
    pub fn with_write_back(mut self, enabled: bool) -> Self {
        self.write_back = enabled;
        self
    }

    async fn bounded<T, F>(&self, operation: impl FnOnce() -> String, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BoardError::Timeout {
                operation: operation(),
                after: self.timeout,
            }),
        }
    }

    async fn fetch(&self, reference: &ResourceRef) -> Result<serde_json::Value> {
        self.bounded(
            || format!("fetch {}", reference),
            self.source.fetch_resource(reference),
        )
        .await
    }

    /// Fetch the whole board eagerly and derive column state.
    ///
    /// Any failed fetch aborts the build; no partial tree is returned.
    pub async fn build_project(
        &self,
        project_ref: &ResourceRef,
        limits: &LimitConfig,
    ) -> Result<Project> {
        let header = wire::project_header(self.fetch(project_ref).await?, project_ref)?;
        let headers = wire::column_headers(self.fetch(&header.columns).await?, &header.columns)?;

        let mut columns = Vec::with_capacity(headers.len());
        for column in headers {
            let cards = wire::cards(self.fetch(&column.cards).await?, &column.cards)?;
            let limit = limits.limit(&column.name);
            columns.push(Column::new(column.name, cards, limit));
        }

        let mut project = Project::new(header.id, header.name, columns)?;
        debug!(
            "Built project {} with {} columns and {} issues",
            project.id,
            project.columns.len(),
            project.total_issues()
        );

        if self.write_back {
            self.write_notes(&mut project).await?;
        }

        Ok(project)
    }

    /// Write each column's status note into its first annotation card
    async fn write_notes(&self, project: &mut Project) -> Result<()> {
        for column in &mut project.columns {
            let note = column.status_note();
            let Some(card) = column.annotation_card() else {
                continue;
            };
            if card.note.as_deref() == Some(note.as_str()) {
                debug!("Note for column {} is up to date", column.name);
                continue;
            }

            let reference = card.reference.clone();
            let content = wire::note_update(&note);
            self.bounded(
                || format!("update {}", reference),
                self.source.update_resource(&reference, &content),
            )
            .await
            .map_err(|e| BoardError::WriteBack {
                column: column.name.clone(),
                reason: e.to_string(),
            })?;

            debug!("Updated note for column {}", column.name);
            if let Some(card) = column.annotation_card_mut() {
                card.note = Some(note);
            }
        }
        Ok(())
    }

    async fn count(&self, query: CountQuery) -> Result<u64> {
        self.bounded(
            || format!("count {}", query),
            self.source.count_matching(&query),
        )
        .await
        .map_err(|e| BoardError::CountQuery {
            query: query.to_string(),
            reason: e.to_string(),
        })
    }

    /// One count query per counter; the first failure aborts
    pub async fn collect_counters(
        &self,
        scope: &Scope,
        bug_label: Option<&str>,
    ) -> Result<AuxCounters> {
        let open_prs = self
            .count(CountQuery::new(
                IssueState::Open,
                IssueKind::PullRequest,
                scope.clone(),
            ))
            .await?;
        let prs_to_review = self
            .count(
                CountQuery::new(IssueState::Open, IssueKind::PullRequest, scope.clone())
                    .with(Qualifier::ReviewRequired),
            )
            .await?;
        let open_issues = self
            .count(CountQuery::new(IssueState::Open, IssueKind::Issue, scope.clone()))
            .await?;
        let closed_issues = self
            .count(CountQuery::new(
                IssueState::Closed,
                IssueKind::Issue,
                scope.clone(),
            ))
            .await?;

        let open_bugs = match bug_label {
            Some(label) => {
                let count = self
                    .count(
                        CountQuery::new(IssueState::Open, IssueKind::Issue, scope.clone())
                            .with(Qualifier::Label(label.to_string())),
                    )
                    .await?;
                Some((label.to_string(), count))
            }
            None => None,
        };

        Ok(AuxCounters {
            scope: scope.clone(),
            open_prs,
            prs_to_review,
            open_issues,
            closed_issues,
            open_bugs,
        })
    }
}
