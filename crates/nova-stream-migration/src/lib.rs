//! Loop-to-stream migration for Java method bodies.
//!
//! The crate recognizes imperative loops that have an equivalent stream
//! pipeline and produces the text edits that rewrite them:
//! - [`StreamSource`]: what the loop iterates (collection, array, counting
//!   range, `Stream.iterate`, `BufferedReader.lines()`).
//! - [`TerminalBlock`]: the loop body peeled into intermediate
//!   [`Operation`]s plus the statements left for a terminal operation.
//! - [`find_migration`]: picks the terminal (`collect`, `count`, `anyMatch`,
//!   `forEach`, ...) that expresses the remaining statements.
//! - [`StreamApiMigrationInspection`]: runs all of the above over a file and
//!   reports diagnostics with their fixes.

mod edit;
mod inspection;
mod migration;
mod operation;
mod patterns;
mod pipeline;
mod rewrite;
mod source;
mod terminal_block;

use nova_hir::Body;
use nova_syntax::JavaLanguageLevel;
use serde::{Deserialize, Serialize};

pub use crate::edit::{apply_text_edits, normalize_text_edits, EditError, TextEdit};
pub use crate::inspection::{
    CancellationFlag, MigrationFinding, MigrationFix, StreamApiMigrationInspection,
    STREAM_API_MIGRATION_CODE,
};
pub use crate::migration::{find_migration, Migration, MigrationKind, ReductionOp};
pub use crate::operation::Operation;
pub use crate::pipeline::{PipelineCall, PipelineStep};
pub use crate::source::{Fragment, IterateUpdate, SourceKind, StreamSource};
pub use crate::terminal_block::TerminalBlock;

/// What every extractor needs to know about the code it looks at.
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext<'a> {
    pub body: &'a Body,
    pub level: JavaLanguageLevel,
}

/// Why a migration that matched could not produce its edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrateError {
    #[error("migration invariant violated: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("migration was cancelled")]
    Cancelled,
}

impl From<nova_flow::Cancelled> for MigrateError {
    fn from(_: nova_flow::Cancelled) -> Self {
        MigrateError::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionOptions {
    /// Offer `forEach` for loops that have no better terminal.
    pub suggest_foreach: bool,
    /// Also offer `forEach` when the loop has no intermediate operations.
    pub replace_trivial_foreach: bool,
    pub language_level: JavaLanguageLevel,
    /// Report migrations that do not shorten the code.
    pub report_informational: bool,
}

impl Default for InspectionOptions {
    fn default() -> Self {
        Self {
            suggest_foreach: false,
            replace_trivial_foreach: false,
            language_level: JavaLanguageLevel::JAVA_8,
            report_informational: false,
        }
    }
}

#[cfg(test)]
mod test_support {
    use nova_hir::{Body, ExprId, LocalId, StmtId};
    use nova_syntax::JavaLanguageLevel;

    use crate::{
        apply_text_edits, find_migration, InspectionOptions, Migration, MigrationContext, StreamSource,
        TerminalBlock,
    };

    /// Lowers `body_text` as the body of `m` in a small class.
    pub(crate) fn method(body_text: &str) -> Body {
        let text = format!(
            "class A {{ boolean flag; Object m(java.util.List<String> list) {{ {body_text} }} }}"
        );
        let file = nova_hir::lower_file(&text);
        file.bodies
            .into_iter()
            .find(|b| b.owner_name == "m")
            .expect("method m")
    }

    /// First statement whose text starts with `prefix`.
    pub(crate) fn stmt(body: &Body, prefix: &str) -> StmtId {
        body.stmt_ids()
            .find(|s| body.stmt_text(*s).starts_with(prefix))
            .unwrap_or_else(|| panic!("no statement starting with `{prefix}`"))
    }

    pub(crate) fn local(body: &Body, name: &str) -> LocalId {
        body.local_ids()
            .find(|l| body.local(*l).name == name)
            .unwrap_or_else(|| panic!("no local `{name}`"))
    }

    pub(crate) fn expr(body: &Body, text: &str) -> ExprId {
        body.expr_ids()
            .find(|e| body.expr_text(*e) == text)
            .unwrap_or_else(|| panic!("no expression `{text}`"))
    }

    /// The peeled block of `loop_stmt` at Java 8.
    pub(crate) fn block_for(body: &Body, loop_stmt: StmtId) -> TerminalBlock {
        let source =
            StreamSource::try_create(body, loop_stmt, JavaLanguageLevel::JAVA_8).expect("a stream source");
        let cx = MigrationContext {
            body,
            level: JavaLanguageLevel::JAVA_8,
        };
        TerminalBlock::from(cx, source)
    }

    /// Runs the selected migration on the outermost loop of `body_text` and
    /// returns it with the rewritten method body, whitespace collapsed.
    pub(crate) fn rewrite(body_text: &str) -> Option<(Migration, String)> {
        rewrite_with(body_text, &InspectionOptions::default())
    }

    pub(crate) fn rewrite_with(body_text: &str, options: &InspectionOptions) -> Option<(Migration, String)> {
        let body = method(body_text);
        let loop_stmt = body
            .stmt_ids()
            .filter(|s| body.stmt(*s).is_loop())
            .min_by_key(|s| body.stmt(*s).range().start)
            .expect("a loop");
        let level = options.language_level;
        let source = StreamSource::try_create(&body, loop_stmt, level)?;
        let cx = MigrationContext { body: &body, level };
        let block = TerminalBlock::from(cx, source);
        let migration =
            find_migration(cx, &block, options, &mut nova_flow::never_cancelled).expect("not cancelled")?;
        let edits = migration.migrate(cx, &block).expect("edits");
        let out = apply_text_edits(body.source(), &edits).expect("valid edits");
        let start = out.find("list) {").map_or(0, |i| i + "list) {".len());
        let end = out
            .rfind('}')
            .and_then(|i| out[..i].rfind('}'))
            .unwrap_or(out.len());
        let text = out[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
        Some((migration, text))
    }
}
