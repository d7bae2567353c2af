//! GitHub project payloads and their mapping into domain types
//!
//! The engine never touches these field names; it calls the mapping
//! functions below and works with [`board_core`] types only.

use board_core::{BoardError, Card, ResourceRef, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct ProjectPayload {
    id: u64,
    name: String,
    columns_url: String,
}

#[derive(Debug, Deserialize)]
struct ColumnPayload {
    name: String,
    cards_url: String,
}

#[derive(Debug, Deserialize)]
struct CardPayload {
    id: u64,
    url: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    content_url: Option<String>,
}

/// Body of a search response
#[derive(Debug, Deserialize)]
pub(crate) struct SearchPayload {
    pub total_count: u64,
}

/// Project identity plus where its columns live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHeader {
    pub id: u64,
    pub name: String,
    pub columns: ResourceRef,
}

/// Column name plus where its cards live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub name: String,
    pub cards: ResourceRef,
}

fn decode<T: DeserializeOwned>(value: Value, resource: &ResourceRef) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| BoardError::fetch(resource.as_str(), format!("malformed payload: {}", e)))
}

pub fn project_header(value: Value, resource: &ResourceRef) -> Result<ProjectHeader> {
    let payload: ProjectPayload = decode(value, resource)?;
    Ok(ProjectHeader {
        id: payload.id,
        name: payload.name,
        columns: ResourceRef::new(payload.columns_url),
    })
}

pub fn column_headers(value: Value, resource: &ResourceRef) -> Result<Vec<ColumnHeader>> {
    let payload: Vec<ColumnPayload> = decode(value, resource)?;
    Ok(payload
        .into_iter()
        .map(|column| ColumnHeader {
            name: column.name,
            cards: ResourceRef::new(column.cards_url),
        })
        .collect())
}

pub fn cards(value: Value, resource: &ResourceRef) -> Result<Vec<Card>> {
    let payload: Vec<CardPayload> = decode(value, resource)?;
    Ok(payload
        .into_iter()
        .map(|card| Card {
            id: card.id,
            reference: ResourceRef::new(card.url),
            note: card.note,
            // GitHub sends no field for notes; older payloads send ""
            content: card
                .content_url
                .filter(|url| !url.is_empty())
                .map(ResourceRef::new),
        })
        .collect())
}

/// Request body replacing a card's note
pub fn note_update(note: &str) -> Value {
    json!({ "note": note })
}

pub(crate) fn search_count(value: Value, resource: &ResourceRef) -> Result<u64> {
    let payload: SearchPayload = decode(value, resource)?;
    Ok(payload.total_count)
}
