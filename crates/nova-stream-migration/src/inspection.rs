//! Reports every loop of a file that can become a stream pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nova_flow::Cancelled;
use nova_hir::{Body, LoweredFile, Stmt, StmtId};
use nova_types::{Diagnostic, Span};
use serde::Serialize;

use crate::edit::{normalize_text_edits, TextEdit};
use crate::migration::{find_migration, Migration};
use crate::source::StreamSource;
use crate::terminal_block::TerminalBlock;
use crate::{InspectionOptions, MigrationContext};

pub const STREAM_API_MIGRATION_CODE: &str = "stream-api-migration";

/// Classes generated pipelines refer to by simple name, with their package.
const IMPORTABLE: &[(&str, &str)] = &[
    ("Collectors", "java.util.stream"),
    ("IntStream", "java.util.stream"),
    ("LongStream", "java.util.stream"),
    ("DoubleStream", "java.util.stream"),
    ("Stream", "java.util.stream"),
    ("Arrays", "java.util"),
    ("Collections", "java.util"),
    ("Function", "java.util.function"),
];

/// Shared flag polled while a file is analyzed.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFix {
    /// `Replace with collect`, as shown to the user.
    pub name: String,
    pub edits: Vec<TextEdit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFinding {
    pub diagnostic: Diagnostic,
    pub migration: Migration,
    /// The fix first, then alternatives (`forEachOrdered`).
    pub fixes: Vec<MigrationFix>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamApiMigrationInspection {
    pub options: InspectionOptions,
}

impl StreamApiMigrationInspection {
    pub fn new(options: InspectionOptions) -> Self {
        Self { options }
    }

    /// Parses `text` and checks it to completion.
    pub fn check_text(&self, text: &str) -> Vec<MigrationFinding> {
        let file = nova_hir::lower_file(text);
        self.check_file(&file, &CancellationFlag::new())
    }

    /// Findings for every loop in `file`, outer loops first within a body.
    ///
    /// Once `cancel` is set the remaining loops are skipped and the findings
    /// collected so far are returned.
    pub fn check_file(&self, file: &LoweredFile, cancel: &CancellationFlag) -> Vec<MigrationFinding> {
        let mut findings = Vec::new();
        for body in &file.bodies {
            let mut loops: Vec<StmtId> = body.stmt_ids().filter(|s| body.stmt(*s).is_loop()).collect();
            loops.sort_by_key(|s| body.stmt(*s).range().start);
            for loop_stmt in loops {
                match self.check_loop(file, body, loop_stmt, cancel) {
                    Ok(Some(finding)) => findings.push(finding),
                    Ok(None) => {}
                    Err(Cancelled) => {
                        tracing::debug!(target: "nova.stream_migration", "inspection cancelled");
                        return findings;
                    }
                }
            }
        }
        findings
    }

    fn check_loop(
        &self,
        file: &LoweredFile,
        body: &Body,
        loop_stmt: StmtId,
        cancel: &CancellationFlag,
    ) -> Result<Option<MigrationFinding>, Cancelled> {
        cancel.check()?;
        let level = self.options.language_level;
        let Some(source) = StreamSource::try_create(body, loop_stmt, level) else {
            return Ok(None);
        };
        let cx = MigrationContext { body, level };
        let tb = TerminalBlock::from(cx, source);
        let Some(migration) = find_migration(cx, &tb, &self.options, &mut || cancel.check())? else {
            return Ok(None);
        };
        if !migration.should_warn && !self.options.report_informational {
            return Ok(None);
        }

        let mut candidates = vec![migration.clone()];
        if !tb.source().is_collection() {
            candidates.extend(migration.ordered());
        }
        let mut fixes = Vec::new();
        for candidate in candidates {
            match candidate.migrate(cx, &tb) {
                Ok(mut edits) => {
                    edits.extend(import_edits(file, &edits));
                    if let Err(err) = normalize_text_edits(body.source(), &mut edits) {
                        tracing::warn!(target: "nova.stream_migration", error = %err, "import edits conflict");
                        continue;
                    }
                    fixes.push(MigrationFix {
                        name: format!("Replace with {}", candidate.replacement),
                        edits,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        target: "nova.stream_migration",
                        owner = %body.owner_name,
                        kind = ?candidate.kind,
                        error = %err,
                        "migration failed"
                    );
                }
            }
        }
        if fixes.is_empty() {
            return Ok(None);
        }

        tracing::debug!(
            target: "nova.stream_migration",
            owner = %body.owner_name,
            replacement = %migration.replacement,
            should_warn = migration.should_warn,
            "loop can be migrated"
        );
        let message = format!("Can be replaced with '{}' call", migration.replacement);
        let span = Some(keyword_range(body, loop_stmt));
        let diagnostic = if migration.should_warn {
            Diagnostic::warning(STREAM_API_MIGRATION_CODE, message, span)
        } else {
            Diagnostic::info(STREAM_API_MIGRATION_CODE, message, span)
        };
        Ok(Some(MigrationFinding {
            diagnostic,
            migration,
            fixes,
        }))
    }
}

/// `for`, `while` or `do` of the loop.
fn keyword_range(body: &Body, loop_stmt: StmtId) -> Span {
    match body.stmt(loop_stmt) {
        Stmt::For { keyword_range, .. } | Stmt::ForEach { keyword_range, .. } | Stmt::While { keyword_range, .. } => {
            *keyword_range
        }
        other => {
            let start = other.range().start;
            Span::new(start, start + "do".len())
        }
    }
}

/// Imports for the classes the edits name and the file does not import yet.
fn import_edits(file: &LoweredFile, edits: &[TextEdit]) -> Vec<TextEdit> {
    let missing: Vec<String> = IMPORTABLE
        .iter()
        .filter(|(name, _)| edits.iter().any(|e| names_class(&e.replacement, name)))
        .filter(|(name, package)| !is_imported(file, package, name))
        .map(|(name, package)| format!("{package}.{name}"))
        .collect();
    if missing.is_empty() {
        return Vec::new();
    }
    let lines: String = missing.iter().map(|path| format!("import {path};")).collect::<Vec<_>>().join("\n");
    let edit = if let Some(last) = file.imports.iter().map(|i| i.range.end).max() {
        TextEdit::insert(last, format!("\n{lines}"))
    } else if let Some(package) = &file.package {
        TextEdit::insert(package.range.end, format!("\n\n{lines}"))
    } else {
        TextEdit::insert(0, format!("{lines}\n\n"))
    };
    vec![edit]
}

fn is_imported(file: &LoweredFile, package: &str, name: &str) -> bool {
    file.package.as_ref().is_some_and(|p| p.name == package)
        || file.imports.iter().any(|import| {
            !import.is_static
                && if import.is_star {
                    import.path == package
                } else {
                    import.path.strip_prefix(package).and_then(|rest| rest.strip_prefix('.')) == Some(name)
                }
        })
}

/// Whether `text` has `name.` as a qualifier of its own, not as the tail of
/// another identifier or qualified name.
fn names_class(text: &str, name: &str) -> bool {
    let needle = format!("{name}.");
    text.match_indices(&needle).any(|(at, _)| {
        text[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '$' || c == '.'))
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use nova_types::Severity;

    use crate::apply_text_edits;

    use super::*;

    const COLLECTING: &str = "import java.util.*;

class A {
    List<String> m(List<String> list) {
        List<String> r = new ArrayList<>();
        for (String s : list) { if (!s.isEmpty()) r.add(s); }
        return r;
    }
}
";

    #[test]
    fn reports_collect_with_import() {
        let findings = StreamApiMigrationInspection::default().check_text(COLLECTING);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.diagnostic.code, STREAM_API_MIGRATION_CODE);
        assert_eq!(finding.diagnostic.severity, Severity::Warning);
        assert_eq!(finding.diagnostic.message, "Can be replaced with 'collect' call");
        let span = finding.diagnostic.span.expect("span");
        assert_eq!(span.slice(COLLECTING), "for");

        assert_eq!(finding.fixes.len(), 1);
        assert_eq!(finding.fixes[0].name, "Replace with collect");
        let fixed = apply_text_edits(COLLECTING, &finding.fixes[0].edits).expect("valid edits");
        assert_eq!(
            fixed,
            "import java.util.*;
import java.util.stream.Collectors;

class A {
    List<String> m(List<String> list) {
        List<String> r = list.stream().filter(s -> !s.isEmpty()).collect(Collectors.toList());
        return r;
    }
}
"
        );
    }

    #[test]
    fn informational_findings_are_opt_in() {
        let text = "class A { void m(String[] arr) { for (String s : arr) { System.out.println(s); } } }";
        assert!(StreamApiMigrationInspection::default().check_text(text).is_empty());

        let inspection = StreamApiMigrationInspection::new(InspectionOptions {
            report_informational: true,
            ..InspectionOptions::default()
        });
        let findings = inspection.check_text(text);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].diagnostic.severity, Severity::Info);
        let names: Vec<&str> = findings[0].fixes.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Replace with forEach", "Replace with forEachOrdered"]);
    }

    #[test]
    fn cancelled_inspection_reports_nothing() {
        let file = nova_hir::lower_file(COLLECTING);
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let findings = StreamApiMigrationInspection::default().check_file(&file, &cancel);
        assert!(findings.is_empty());
    }

    #[test]
    fn existing_imports_are_respected() {
        let text = "package p;

import java.util.*;
import java.util.stream.*;

class A {
    List<String> m(List<String> list) {
        List<String> r = new ArrayList<>();
        for (String s : list) { if (!s.isEmpty()) r.add(s); }
        return r;
    }
}
";
        let findings = StreamApiMigrationInspection::default().check_text(text);
        assert_eq!(findings.len(), 1);
        let fixed = apply_text_edits(text, &findings[0].fixes[0].edits).expect("valid edits");
        assert_eq!(fixed.matches("import ").count(), 2);
    }

    #[test]
    fn class_names_are_matched_as_qualifiers() {
        assert!(names_class("Collectors.toList()", "Collectors"));
        assert!(names_class("x.collect(Collectors.toList())", "Collectors"));
        assert!(!names_class("IntStream.range(0, n)", "Stream"));
        assert!(!names_class("java.util.stream.Stream.of(x)", "Stream"));
    }
}
