//! Page patch registry
//!
//! Layout patches replace CSS Grid layouts with hand-computed flexbox on the
//! pages known to need it. Script patches are string-anchored source edits
//! applied to inline scripts before they are transpiled, since the
//! transpiler's minification would remove the anchor text.

use super::PageKind;

/// Layout override for one known page
#[derive(Debug, Clone, Copy)]
pub struct LayoutPatch {
    pub name: &'static str,
    pub kind: PageKind,

    /// Appended to the last `<style>` block
    pub css: &'static str,

    /// Appended before `</body>`
    pub js: Option<&'static str>,
}

/// Source edit anchored on a literal code fragment
#[derive(Debug, Clone, Copy)]
pub struct ScriptPatch {
    pub name: &'static str,
    pub kind: PageKind,

    /// First occurrence is replaced by `replacement`
    pub anchor: &'static str,
    pub replacement: &'static str,
}

impl ScriptPatch {
    /// Apply to `code`, returning `None` when the anchor is absent
    pub fn apply(&self, code: &str) -> Option<String> {
        code.contains(self.anchor)
            .then(|| code.replacen(self.anchor, self.replacement, 1))
    }
}

pub const LAYOUT_PATCHES: &[LayoutPatch] = &[
    LayoutPatch {
        name: "home-icon-grid",
        kind: PageKind::Home,
        css: "#app-grid{display:flex;flex-wrap:wrap}#app-grid .app-icon{width:25%;margin:0}",
        js: None,
    },
    LayoutPatch {
        name: "chess-board",
        kind: PageKind::Chess,
        css: "#chess-board{display:flex;flex-wrap:wrap;width:100%}#chess-board .square{width:12.5%;height:0;padding-bottom:12.5%;position:relative}",
        js: None,
    },
    LayoutPatch {
        name: "sudoku-grid",
        kind: PageKind::Sudoku,
        css: "#sudoku-grid{display:flex;flex-wrap:wrap}#sudoku-grid .cell{width:11.11%;height:0;padding-bottom:11.11%}",
        js: None,
    },
    LayoutPatch {
        name: "wordle-rows",
        kind: PageKind::Wordle,
        css: "#wordle-board .row{display:flex;justify-content:center}#wordle-board .tile{width:18%;margin:1%}",
        js: None,
    },
    LayoutPatch {
        name: "minesweeper-cells",
        kind: PageKind::Minesweeper,
        css: "#mine-grid{display:flex;flex-wrap:wrap}#mine-grid>*{height:auto}",
        js: Some(
            "(function(){function size(){var b=document.getElementById('mine-grid');if(!b){return}var cols=parseInt(b.getAttribute('data-cols'),10)||9;var cells=b.children;for(var i=0;i<cells.length;i++){cells[i].style.width=(100/cols)+'%'}}document.addEventListener('DOMContentLoaded',size);window.addEventListener('resize',size)})();",
        ),
    },
];

pub const SCRIPT_PATCHES: &[ScriptPatch] = &[ScriptPatch {
    name: "gate-feature-apps",
    kind: PageKind::Home,
    anchor: "function openApp(",
    replacement: "function openApp(name){if(retroIsGated(name)&&!retroGate(name)){return}return openAppUngated.apply(this,arguments)}function openAppUngated(",
}];

pub fn layout_patches_for(kind: PageKind) -> impl Iterator<Item = &'static LayoutPatch> {
    LAYOUT_PATCHES.iter().filter(move |p| p.kind == kind)
}

pub fn script_patches_for(kind: PageKind) -> impl Iterator<Item = &'static ScriptPatch> {
    SCRIPT_PATCHES.iter().filter(move |p| p.kind == kind)
}
