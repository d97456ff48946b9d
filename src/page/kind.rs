//! Known page kinds
//!
//! Pages are classified once, before any stage runs, from a declarative
//! predicate table. The first matching row wins.

use std::fmt;

use crate::html;

/// Pages that carry layout or script patches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Home,
    Chess,
    Sudoku,
    Wordle,
    Minesweeper,
    Other,
}

/// A test over a page's source
#[derive(Debug, Clone, Copy)]
enum Predicate {
    /// Case-insensitive substring of the `<title>` text
    Title(&'static str),
    /// An element with this id is present
    Id(&'static str),
}

impl Predicate {
    fn matches(self, title: Option<&str>, page: &str) -> bool {
        match self {
            Predicate::Title(needle) => {
                title.is_some_and(|t| t.to_lowercase().contains(&needle.to_lowercase()))
            }
            Predicate::Id(id) => {
                page.contains(&format!("id=\"{id}\"")) || page.contains(&format!("id='{id}'"))
            }
        }
    }
}

const PREDICATES: &[(PageKind, &[Predicate])] = &[
    (
        PageKind::Chess,
        &[Predicate::Title("chess"), Predicate::Id("chess-board")],
    ),
    (
        PageKind::Sudoku,
        &[Predicate::Title("sudoku"), Predicate::Id("sudoku-grid")],
    ),
    (
        PageKind::Wordle,
        &[Predicate::Title("wordle"), Predicate::Id("wordle-board")],
    ),
    (
        PageKind::Minesweeper,
        &[Predicate::Title("minesweeper"), Predicate::Id("mine-grid")],
    ),
    (PageKind::Home, &[Predicate::Id("app-grid")]),
];

impl PageKind {
    pub fn classify(page: &str) -> Self {
        let title = html::title(page);
        PREDICATES
            .iter()
            .find(|(_, preds)| preds.iter().any(|p| p.matches(title.as_deref(), page)))
            .map_or(PageKind::Other, |(kind, _)| *kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Home => "home",
            PageKind::Chess => "chess",
            PageKind::Sudoku => "sudoku",
            PageKind::Wordle => "wordle",
            PageKind::Minesweeper => "minesweeper",
            PageKind::Other => "other",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
