//! Core type definitions for the board tree and its derived state

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

use crate::{BoardError, Result};

/// Opaque reference to a remote resource (for GitHub, its API URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef(String);

impl ResourceRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A card in a board column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: u64,
    /// Where the card itself lives, used to update its note
    pub reference: ResourceRef,
    pub note: Option<String>,
    /// Linked issue or pull request; `None` for annotation cards
    pub content: Option<ResourceRef>,
}

impl Card {
    /// Annotation cards hold a free-text note instead of linking an issue/PR
    pub fn is_annotation(&self) -> bool {
        self.content.is_none()
    }
}

/// A board column with its cards and configured limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub cards: Vec<Card>,
    pub limit: Option<u32>,
}

impl Column {
    pub fn new(name: impl Into<String>, cards: Vec<Card>, limit: Option<u32>) -> Self {
        Self {
            name: name.into(),
            cards,
            limit,
        }
    }

    /// Number of cards linking an issue or pull request
    pub fn issue_count(&self) -> u32 {
        self.cards.iter().filter(|card| !card.is_annotation()).count() as u32
    }

    pub fn limit_set(&self) -> bool {
        self.limit.is_some()
    }

    pub fn exceeded(&self) -> bool {
        self.limit.is_some_and(|limit| self.issue_count() > limit)
    }

    /// Issues above the limit, 0 when under the limit or unlimited
    pub fn extra_issues(&self) -> u32 {
        self.limit
            .map_or(0, |limit| self.issue_count().saturating_sub(limit))
    }

    /// First annotation card in card order
    pub fn annotation_card(&self) -> Option<&Card> {
        self.cards.iter().find(|card| card.is_annotation())
    }

    pub fn annotation_card_mut(&mut self) -> Option<&mut Card> {
        self.cards.iter_mut().find(|card| card.is_annotation())
    }

    /// Markdown summary written into the annotation card
    pub fn status_note(&self) -> String {
        let count = self.issue_count();
        match self.limit {
            None => format!("**Tasks** `{}`", count),
            Some(limit) if self.exceeded() => format!(
                "**Tasks** `{}/{}`\n\n**Limit exceeded by {}**",
                count,
                limit,
                self.extra_issues()
            ),
            Some(limit) => format!("**Tasks** `{}/{}`", count, limit),
        }
    }
}

/// A project board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub columns: Vec<Column>,
}

impl Project {
    /// Build a project, rejecting duplicate column names
    pub fn new(id: u64, name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(BoardError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            columns,
        })
    }

    pub fn total_issues(&self) -> u32 {
        self.columns.iter().map(Column::issue_count).sum()
    }

    /// Issues in every column strictly between the first and the last
    pub fn wip_issues(&self) -> u32 {
        if self.columns.len() < 3 {
            return 0;
        }
        self.columns[1..self.columns.len() - 1]
            .iter()
            .map(Column::issue_count)
            .sum()
    }
}

/// Work-in-progress limits keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitConfig {
    limits: BTreeMap<String, u32>,
}

impl LimitConfig {
    /// Build from `(column, threshold)` pairs.
    ///
    /// Thresholds of 0 or below mean "no limit" and are dropped. A column
    /// named twice is a configuration error.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut limits = BTreeMap::new();
        for (name, threshold) in entries {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(BoardError::Config(format!(
                    "limit for column '{}' is defined more than once",
                    name
                )));
            }
            if threshold > 0 {
                let threshold = u32::try_from(threshold).map_err(|_| {
                    BoardError::Config(format!("limit for column '{}' is too large", name))
                })?;
                limits.insert(name, threshold);
            } else {
                tracing::debug!("No limit for column '{}' (threshold {})", name, threshold);
            }
        }
        Ok(Self { limits })
    }

    /// Configured limit for a column, by exact name
    pub fn limit(&self, column: &str) -> Option<u32> {
        self.limits.get(column).copied()
    }
}

/// Latest rendered exposition text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub text: String,
    pub produced_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            produced_at: Utc::now(),
        }
    }
}

/// Where auxiliary counters are searched
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Organization(String),
    /// `owner/name`
    Repository(String),
}

impl Scope {
    /// Label key used in exposition lines and search qualifiers
    pub fn key(&self) -> &'static str {
        match self {
            Self::Organization(_) => "org",
            Self::Repository(_) => "repo",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Organization(name) | Self::Repository(name) => name,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.key(), self.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueState {
    Open,
    Closed,
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    Issue,
    PullRequest,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issue => write!(f, "issue"),
            Self::PullRequest => write!(f, "pr"),
        }
    }
}

/// Extra search filters on top of state, kind and scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
    ReviewRequired,
    Label(String),
}

impl std::fmt::Display for Qualifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReviewRequired => write!(f, "review:required"),
            Self::Label(label) if label.contains(char::is_whitespace) => {
                write!(f, "label:\"{}\"", label)
            }
            Self::Label(label) => write!(f, "label:{}", label),
        }
    }
}

/// A filtered count over issues or pull requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountQuery {
    pub state: IssueState,
    pub kind: IssueKind,
    pub scope: Scope,
    pub qualifiers: Vec<Qualifier>,
}

impl CountQuery {
    pub fn new(state: IssueState, kind: IssueKind, scope: Scope) -> Self {
        Self {
            state,
            kind,
            scope,
            qualifiers: Vec::new(),
        }
    }

    pub fn with(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// Search terms, e.g. `["state:open", "type:pr", "org:acme", "review:required"]`
    pub fn terms(&self) -> Vec<String> {
        let mut terms = vec![
            format!("state:{}", self.state),
            format!("type:{}", self.kind),
            self.scope.to_string(),
        ];
        terms.extend(self.qualifiers.iter().map(ToString::to_string));
        terms
    }
}

impl std::fmt::Display for CountQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.terms().join(" "))
    }
}

/// Issue and pull request counters for one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxCounters {
    pub scope: Scope,
    pub open_prs: u64,
    pub prs_to_review: u64,
    pub open_issues: u64,
    pub closed_issues: u64,
    /// `(label, count)` when a bug label is configured
    pub open_bugs: Option<(String, u64)>,
}
