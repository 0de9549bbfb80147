use serde::{Deserialize, Serialize};

use super::store::Cursor;

/// One page of an ordered result set, plus the position of its last row when
/// more rows follow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub next: Option<Cursor>,
    pub message: Option<String>,
}

impl<T> Page<T> {
    pub fn from_rows(rows: Vec<T>, next: Option<Cursor>) -> Self {
        let message = if rows.is_empty() {
            Some(String::from("No results"))
        } else {
            None
        };

        Self {
            rows,
            next,
            message,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            rows: vec![],
            next: None,
            message: Some(String::from("No results")),
        }
    }

    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
enum CursorState {
    #[default]
    Fresh,
    More(Cursor),
    Exhausted,
}

/// Tracks the last record of the most recent page of an ordered result set.
#[derive(Debug, Clone, Default)]
pub struct CursorManager {
    state: CursorState,
}

impl CursorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to the beginning; nothing may be loaded until a first page lands.
    pub fn reset(&mut self) {
        self.state = CursorState::Fresh;
    }

    /// Records the end of a page; an empty page means there is nothing further.
    pub fn advance(&mut self, next: Option<Cursor>) {
        self.state = match next {
            Some(cursor) => CursorState::More(cursor),
            None => CursorState::Exhausted,
        };
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match &self.state {
            CursorState::More(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn has_more(&self) -> bool {
        matches!(self.state, CursorState::More(_))
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }
}
