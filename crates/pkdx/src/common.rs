//! 📦 Common data structures: the building blocks of pkdx
//!
//! 🎬 COLD OPEN. INT. PROFESSOR'S LAB, 3:47 AM
//!
//! A CSV file sits on disk. Five columns. Hundreds of rows. One of them has an id
//! of "A", because someone hand-edited it in a spreadsheet and did not tell anyone.
//! The workers will find it. The workers will skip it. The workers will not judge.
//!
//! 🧠 Knowledge graph:
//! - `RawRecord`: one CSV line, split into fields, uninterpreted. Travels the distribution channel.
//! - `Pokemon`: the decoded domain record. Travels the result channel.
//! - `Category`: the even/odd predicate on `Pokemon::id`.
//! - `FilterRequest`: what the caller wants. Validated by `FilterRequest::new`.
//! - `PokemonDraft`: a pokemon without an identity yet, waiting for the dex to assign one.
//!
//! 🦆

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DexError, DexResult};

/// 📏 Columns in the backing store: id, number, name, image_url, abilities.
pub const NUM_OF_ATTRIBUTES: usize = 5;

/// 🏷️ The header row written to brand new stores. Readers skip whatever header is there.
pub const HEADER: [&str; NUM_OF_ATTRIBUTES] = ["id", "number", "name", "image_url", "abilities"];

/// 📄 One line of the backing store, split into fields and nothing more.
///
/// `line` is the 1-based line number in the file. It exists for log messages only,
/// because "skipped a row" is useless and "skipped line 42" is a bug report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn new(line: usize, fields: Vec<String>) -> Self {
        Self { line, fields }
    }
}

/// 🎯 A decoded pokemon. The thing callers actually came for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: u64,
    pub number: u64,
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub abilities: Vec<String>,
}

impl Pokemon {
    /// 🖊️ The five columns, in store order, ready for `codec::encode_row`.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.number.to_string(),
            self.name.clone(),
            self.image_url.clone(),
            self.abilities.join(","),
        ]
    }
}

impl TryFrom<&RawRecord> for Pokemon {
    type Error = DexError;

    /// 🔄 Fields → `Pokemon`. Extra trailing fields are tolerated, missing ones are not.
    ///
    /// An empty abilities column decodes to no abilities (not one empty-string ability).
    fn try_from(raw: &RawRecord) -> DexResult<Self> {
        let fields = &raw.fields;
        if fields.len() < NUM_OF_ATTRIBUTES {
            return Err(DexError::Decode(format!(
                "line {}: invalid number of attributes. Provided: {}. Required: {}",
                raw.line,
                fields.len(),
                NUM_OF_ATTRIBUTES
            )));
        }

        let id = fields[0].parse::<u64>().map_err(|_| {
            DexError::Decode(format!(
                "line {}: value '{}' can't be parsed as an id",
                raw.line, fields[0]
            ))
        })?;
        let number = fields[1].parse::<u64>().map_err(|_| {
            DexError::Decode(format!(
                "line {}: value '{}' can't be parsed as a number",
                raw.line, fields[1]
            ))
        })?;

        let abilities = if fields[4].is_empty() {
            Vec::new()
        } else {
            fields[4].split(',').map(str::to_string).collect()
        };

        Ok(Self {
            id,
            number,
            name: fields[2].clone(),
            image_url: fields[3].clone(),
            abilities,
        })
    }
}

/// 🐣 A pokemon that hasn't been given an id yet. `Dex::catch` fixes that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonDraft {
    pub number: u64,
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub abilities: Vec<String>,
}

impl PokemonDraft {
    pub fn with_id(self, id: u64) -> Pokemon {
        Pokemon {
            id,
            number: self.number,
            name: self.name,
            image_url: self.image_url,
            abilities: self.abilities,
        }
    }
}

/// ⚖️ Even or odd. The whole predicate. The entire business logic. Parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Even,
    Odd,
}

impl Category {
    /// ✅ Does this id belong to this category?
    pub fn matches(self, id: u64) -> bool {
        match self {
            Category::Even => id % 2 == 0,
            Category::Odd => id % 2 == 1,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Even => f.write_str("even"),
            Category::Odd => f.write_str("odd"),
        }
    }
}

impl FromStr for Category {
    type Err = DexError;

    fn from_str(s: &str) -> DexResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "even" => Ok(Category::Even),
            "odd" => Ok(Category::Odd),
            other => Err(DexError::InvalidRequest(format!(
                "unknown category '{other}', expected 'even' or 'odd'"
            ))),
        }
    }
}

/// 📨 What the caller wants out of one pipeline run.
///
/// Fields are public on purpose: `FilterRequest::new` is the validated door, but the
/// pipeline itself accepts whatever it's handed and degrades instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRequest {
    pub category: Category,
    pub total_items: usize,
    pub items_per_worker: usize,
}

impl FilterRequest {
    /// 🚪 Build a request, rejecting zero sizes and `total_items < items_per_worker`.
    pub fn new(category: Category, total_items: usize, items_per_worker: usize) -> DexResult<Self> {
        if total_items == 0 || items_per_worker == 0 {
            return Err(DexError::InvalidRequest(format!(
                "items and items_per_worker must be positive. items: {total_items} items_per_worker: {items_per_worker}"
            )));
        }
        if total_items < items_per_worker {
            return Err(DexError::InvalidRequest(format!(
                "items can't be less than items_per_worker. items: {total_items} items_per_worker: {items_per_worker}"
            )));
        }
        Ok(Self {
            category,
            total_items,
            items_per_worker,
        })
    }
}
