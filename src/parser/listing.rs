use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::error::{ListingError, RowError};

static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.b-statistics__table").unwrap());
static TBODY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tbody").unwrap());
static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr.b-statistics__table-row").unwrap());
static CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.b-statistics__table-col").unwrap());

/// Cell positions in a listing row.
const FIRST: usize = 0;
const LAST: usize = 1;
const HEIGHT: usize = 3;
const WEIGHT: usize = 4;
const WINS: usize = 7;
const LOSSES: usize = 8;
const DRAWS: usize = 9;

pub const MIN_CELLS: usize = DRAWS + 1;

/// Text of each data cell, in document order.
pub type RawRow = Vec<String>;

/// Pull every fighter row out of a listing page.
///
/// The `Html` tree is not `Send`, so rows are copied out as owned strings
/// before any of them are handed to workers.
pub fn parse_listing(html: &str) -> Result<Vec<RawRow>, ListingError> {
    let doc = Html::parse_document(html);
    let table = doc.select(&TABLE_SEL).next().ok_or(ListingError::MissingTable)?;
    let body = table.select(&TBODY_SEL).next().ok_or(ListingError::MissingBody)?;

    Ok(body
        .select(&ROW_SEL)
        .map(|row| row.select(&CELL_SEL).map(cell_text).collect())
        .collect())
}

/// Text nodes trimmed individually and concatenated.
fn cell_text(cell: ElementRef) -> String {
    cell.text().map(str::trim).collect()
}

/// A listing row checked once for shape, with named access to its cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub first_name: String,
    pub last_name: String,
    pub height: String,
    pub weight: String,
    pub wins: String,
    pub losses: String,
    pub draws: String,
}

impl ListingRow {
    pub fn from_cells(mut cells: RawRow) -> Result<Self, RowError> {
        if cells.is_empty() {
            return Err(RowError::Empty);
        }
        if cells.len() < MIN_CELLS {
            return Err(RowError::TooFewCells {
                found: cells.len(),
                expected: MIN_CELLS,
            });
        }
        if cells[FIRST].is_empty() || cells[LAST].is_empty() {
            return Err(RowError::MissingName);
        }

        let mut take = |i: usize| std::mem::take(&mut cells[i]);
        Ok(Self {
            first_name: take(FIRST),
            last_name: take(LAST),
            height: take(HEIGHT),
            weight: take(WEIGHT),
            wins: take(WINS),
            losses: take(LOSSES),
            draws: take(DRAWS),
        })
    }
}

/// Whole-number cell, 0 when blank or not a non-negative integer.
pub fn count_or_zero(text: &str) -> u32 {
    text.trim().parse().unwrap_or(0)
}
