//! `collect(Collectors.joining(...))`: a `StringBuilder` the loop appends to.
//!
//! The shapes differ in how they keep the delimiter out of the first
//! iteration: a guard on the builder length, a boolean flag, an index guard,
//! truncating the trailing delimiter after the loop, a delimiter variable
//! rewritten at the end of each iteration, or appending the first element
//! before a loop that starts at one. Appends right before and after the loop
//! become the prefix and suffix.

use nova_flow::{initializer_usage_status, InitializerUsageStatus};
use nova_hir::{AssignOp, BinaryOp, Body, Expr, ExprId, LiteralKind, LocalId, LocalKind, Node, Stmt, StmtId, UnaryOp};
use nova_syntax::LiteralValue;
use nova_types::{JavaType, PrimitiveType};

use crate::edit::TextEdit;
use crate::operation::Operation;
use crate::patterns::{assignment, call_parts, flatten, statement_expr};
use crate::pipeline::map_step;
use crate::rewrite::Rewriter;
use crate::source::{Fragment, SourceKind, StreamSource};
use crate::terminal_block::{is_sole_declarator, TerminalBlock};
use crate::{MigrateError, MigrationContext};

/// Precedence of `+`, as reported by [`Body::precedence`].
const ADDITIVE_PRECEDENCE: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinShape {
    /// `sb.append(a[0]); for (int i = 1; ...) sb.append(",").append(a[i]);`
    CountedLoop,
    /// No delimiter at all.
    Plain,
    /// `if (sb.length() > 0) sb.append(",");`
    LengthGuard,
    /// `if (first) first = false; else sb.append(",");`
    BoolFlag,
    /// `sb.append(s).append(",");` then `sb.setLength(sb.length() - 1)`.
    LengthTruncate,
    /// `sb.append(sep).append(s); sep = ",";`
    DelimiterRewrite,
    /// `if (i > 0) sb.append(",");`
    IndexGuard,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Affixes {
    prefix: Vec<ExprId>,
    suffix: Vec<ExprId>,
    /// Outermost call of the append chain right before the loop.
    before: Option<ExprId>,
    /// Outermost call of the append chain right after the loop.
    after: Option<ExprId>,
    /// `toString()` called directly on `after`.
    combined: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JoiningTerminal {
    shape: JoinShape,
    builder: LocalId,
    main: Vec<ExprId>,
    delimiter: Vec<ExprId>,
    affixes: Affixes,
    /// Statements only the loop needed: flag and delimiter declarations,
    /// the truncation, the append of the first element.
    dead: Vec<StmtId>,
    /// Restart the counting loop at zero.
    from_zero: bool,
}

impl JoiningTerminal {
    fn new(shape: JoinShape, builder: LocalId, main: Vec<ExprId>, delimiter: Vec<ExprId>, affixes: Affixes) -> Self {
        Self {
            shape,
            builder,
            main,
            delimiter,
            affixes,
            dead: Vec::new(),
            from_zero: false,
        }
    }

    pub(crate) fn shape(&self) -> JoinShape {
        self.shape
    }

    /// Every statement the rewrite deletes besides the loop.
    fn dead_statements(&self, body: &Body) -> Vec<StmtId> {
        let mut out = self.dead.clone();
        for call in [self.affixes.before, self.affixes.after].into_iter().flatten() {
            if let Some(Node::Stmt(stmt)) = body.expr_parent(call) {
                if matches!(body.stmt(stmt), Stmt::Expr { .. }) {
                    out.push(stmt);
                }
            }
        }
        out
    }

    /// How the builder initializer relates to the loop once the dead
    /// statements in front of it are gone.
    fn status(&self, body: &Body, tb: &TerminalBlock) -> InitializerUsageStatus {
        let dead = self.dead_statements(body);
        let mut anchor = body.label_wrapped(tb.main_loop());
        while let Some(prev) = body.prev_statement(anchor).filter(|p| dead.contains(p)) {
            anchor = prev;
        }
        initializer_usage_status(body, self.builder, anchor)
    }

    fn render(&self, body: &Body, tb: &TerminalBlock) -> String {
        let mut stream = if self.from_zero {
            tb.source()
                .with_initializer(Fragment::Text("0".to_string()))
                .render(body)
        } else {
            tb.generate(body)
        };
        let var = tb.var();
        let var_type = body.local_type(var);
        let identity = var_type.is_string() && matches!(self.main.as_slice(), [only] if body.is_reference_to(*only, var));
        if !identity {
            stream.extend(map_step(
                &body.local(var).name,
                &var_type,
                &JavaType::string(),
                &join_text(body, &self.main),
                false,
            ));
        }

        let empty = || "\"\"".to_string();
        let text = |parts: &[ExprId]| {
            if parts.is_empty() {
                empty()
            } else {
                join_text(body, parts)
            }
        };
        let args = match (&self.delimiter[..], &self.affixes.prefix[..], &self.affixes.suffix[..]) {
            ([], [], []) => Vec::new(),
            (delimiter, [], []) => vec![text(delimiter)],
            (delimiter, prefix, suffix) => vec![text(delimiter), text(prefix), text(suffix)],
        };
        stream.push("collect", vec![format!("Collectors.joining({})", args.join(", "))]);
        stream.to_string()
    }
}

/// Recognizes a joining terminal, trying the shapes in a fixed order.
pub(crate) fn extract_terminal(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    non_final: Option<&[LocalId]>,
) -> Option<JoiningTerminal> {
    // A limit whose counter stays in the loop body is not a joined part.
    if tb.count_expression().is_some() {
        return None;
    }
    let extractors: [fn(MigrationContext<'_>, &TerminalBlock, Option<&[LocalId]>) -> Option<JoiningTerminal>; 7] = [
        counted_loop,
        plain,
        length_guard,
        bool_flag,
        length_truncate,
        delimiter_rewrite,
        index_guard,
    ];
    let terminal = extractors
        .into_iter()
        .find_map(|extract| extract(cx, tb, non_final).filter(|t| !t.main.is_empty()))?;
    let local = cx.body.local(terminal.builder).kind == LocalKind::Local;
    if local && terminal.status(cx.body, tb) == InitializerUsageStatus::Unknown {
        return None;
    }
    Some(terminal)
}

fn no_non_final(non_final: Option<&[LocalId]>) -> bool {
    non_final.map_or(true, <[LocalId]>::is_empty)
}

fn only_non_final(non_final: Option<&[LocalId]>, local: LocalId) -> bool {
    non_final.map_or(true, |locals| locals == [local])
}

fn counted_loop(cx: MigrationContext<'_>, tb: &TerminalBlock, non_final: Option<&[LocalId]>) -> Option<JoiningTerminal> {
    let body = cx.body;
    if !no_non_final(non_final) {
        return None;
    }
    let [Operation::Source(StreamSource {
        kind: SourceKind::CountingLoop { start, .. },
        var,
        ..
    })] = tb.operations()
    else {
        return None;
    };
    if body.constant_int(start.expr()?) != Some(1) {
        return None;
    }
    let statements = tb.statements();
    let builder = appended_builder(body, *statements.first()?)?;
    let parts = join_parts(body, builder, statements)?;
    let (delimiter, main) = split_left_delimiter(body, &parts);
    if delimiter.is_empty() {
        return None;
    }

    // The element at index zero is appended before the loop.
    let loop_stmt = body.label_wrapped(tb.main_loop());
    let first_stmt = body.prev_statement(loop_stmt)?;
    let (first_call, outermost) = append_chain(body, builder, first_stmt)?;
    let mut first = Vec::new();
    if !chain_parts(body, builder, outermost, &mut first) || first.len() != main.len() {
        return None;
    }
    let same = main
        .iter()
        .zip(&first)
        .all(|(m, f)| squeezed(&text_with_zero(body, *m, *var)) == squeezed(body.expr_text(*f)));
    if !same {
        return None;
    }
    let affixes = affixes(cx, tb, builder, loop_stmt, first_stmt, &[], &[first_call])?;
    let mut terminal = JoiningTerminal::new(JoinShape::CountedLoop, builder, main, delimiter, affixes);
    terminal.dead.push(first_stmt);
    terminal.from_zero = true;
    Some(terminal)
}

fn plain(cx: MigrationContext<'_>, tb: &TerminalBlock, non_final: Option<&[LocalId]>) -> Option<JoiningTerminal> {
    let body = cx.body;
    if !no_non_final(non_final) {
        return None;
    }
    let statements = tb.statements();
    let builder = appended_builder(body, *statements.first()?)?;
    let main = join_parts(body, builder, statements)?;
    let loop_stmt = body.label_wrapped(tb.main_loop());
    let affixes = affixes(cx, tb, builder, loop_stmt, loop_stmt, &[], &[])?;
    Some(JoiningTerminal::new(JoinShape::Plain, builder, main, Vec::new(), affixes))
}

fn length_guard(cx: MigrationContext<'_>, tb: &TerminalBlock, non_final: Option<&[LocalId]>) -> Option<JoiningTerminal> {
    let body = cx.body;
    if !no_non_final(non_final) {
        return None;
    }
    let [guard, rest @ ..] = tb.statements() else {
        return None;
    };
    let Stmt::If {
        condition,
        then_branch,
        else_branch: None,
        ..
    } = body.stmt(*guard)
    else {
        return None;
    };
    let builder = appended_builder(body, *rest.first()?)?;
    if body.local(builder).kind != LocalKind::Local {
        return None;
    }
    let delimiter = join_parts(body, builder, &flatten(body, *then_branch))?;
    constant_of(body, &delimiter)?;
    let prefix_length = prefix_length(cx, *condition, builder)?;
    let main = join_parts(body, builder, rest)?;
    let loop_stmt = body.label_wrapped(tb.main_loop());
    let affixes = affixes(cx, tb, builder, loop_stmt, loop_stmt, &[], &[])?;
    if constant_of(body, &affixes.prefix)?.chars().count() != prefix_length {
        return None;
    }
    Some(JoiningTerminal::new(JoinShape::LengthGuard, builder, main, delimiter, affixes))
}

fn bool_flag(cx: MigrationContext<'_>, tb: &TerminalBlock, non_final: Option<&[LocalId]>) -> Option<JoiningTerminal> {
    let body = cx.body;
    let [guard, rest @ ..] = tb.statements() else {
        return None;
    };
    let Stmt::If {
        condition,
        then_branch,
        else_branch,
        ..
    } = body.stmt(*guard)
    else {
        return None;
    };
    let (flag, negated) = match body.expr(body.skip_parens(*condition)) {
        Expr::Local { local, .. } => (*local, false),
        Expr::Unary {
            op: UnaryOp::Not,
            operand,
            ..
        } => (body.as_local(*operand)?, true),
        _ => return None,
    };
    let data = body.local(flag);
    if data.kind != LocalKind::Local
        || body.local_type(flag) != JavaType::BOOLEAN
        || !is_sole_declarator(body, flag)
        || !only_non_final(non_final, flag)
    {
        return None;
    }
    let Some(LiteralValue::Bool(initial)) = data.initializer.and_then(|init| literal_value(body, init)) else {
        return None;
    };
    let loop_stmt = body.label_wrapped(tb.main_loop());
    let references = body.all_references(flag);
    if references.len() != 2
        || references
            .iter()
            .any(|r| !body.is_within(Node::Expr(*r), Node::Stmt(loop_stmt)))
    {
        return None;
    }

    let is_reset = |stmt: &StmtId| {
        statement_expr(body, *stmt)
            .and_then(|e| assignment(body, e))
            .is_some_and(|(op, lhs, rhs)| {
                op == AssignOp::Assign && body.is_reference_to(lhs, flag) && body.boolean_literal(rhs) == Some(!initial)
            })
    };
    let then_stmts = flatten(body, *then_branch);
    let else_stmts = else_branch.map(|e| flatten(body, e)).unwrap_or_default();
    // The condition holds on the first iteration when the flag still has
    // its initial value.
    let (mut first_only, other_only) = if initial != negated {
        (then_stmts, else_stmts)
    } else {
        (else_stmts, then_stmts)
    };
    let mut rest = rest.to_vec();
    if other_only.iter().any(|s| is_reset(s)) {
        return None;
    }
    match (
        first_only.iter().filter(|s| is_reset(*s)).count(),
        rest.iter().filter(|s| is_reset(*s)).count(),
    ) {
        (1, 0) => first_only.retain(|s| !is_reset(s)),
        (0, 1) => rest.retain(|s| !is_reset(s)),
        _ => return None,
    }

    let first_stmts: Vec<StmtId> = first_only.iter().chain(&rest).copied().collect();
    let other_stmts: Vec<StmtId> = other_only.iter().chain(&rest).copied().collect();
    let builder = appended_builder(body, *first_stmts.first()?)?;
    let (delimiter, main) = first_iteration_split(body, builder, &first_stmts, &other_stmts)?;
    let decl = data.decl?;
    let affixes = affixes(cx, tb, builder, loop_stmt, loop_stmt, &[decl], &[])?;
    let mut terminal = JoiningTerminal::new(JoinShape::BoolFlag, builder, main, delimiter, affixes);
    terminal.dead.push(decl);
    Some(terminal)
}

fn length_truncate(cx: MigrationContext<'_>, tb: &TerminalBlock, non_final: Option<&[LocalId]>) -> Option<JoiningTerminal> {
    let body = cx.body;
    if !no_non_final(non_final) {
        return None;
    }
    let statements = tb.statements();
    let builder = appended_builder(body, *statements.first()?)?;
    if body.local(builder).kind != LocalKind::Local {
        return None;
    }
    let parts = join_parts(body, builder, statements)?;
    let (main, delimiter) = split_right_delimiter(body, &parts);
    let delimiter_length = constant_of(body, &delimiter)?.chars().count();
    if delimiter.is_empty() {
        return None;
    }

    // if (sb.length() > 0) sb.setLength(sb.length() - 1);
    let loop_stmt = body.label_wrapped(tb.main_loop());
    let truncate_stmt = body.next_statement(loop_stmt)?;
    let Stmt::If {
        condition,
        then_branch,
        else_branch: None,
        ..
    } = body.stmt(truncate_stmt)
    else {
        return None;
    };
    let prefix_length = prefix_length(cx, *condition, builder)?;
    let truncation = flatten(body, *then_branch);
    let [truncate] = truncation.as_slice() else {
        return None;
    };
    let call = statement_expr(body, *truncate)?;
    let (Some(receiver), "setLength", [new_length]) = call_parts(body, call)? else {
        return None;
    };
    if !body.is_reference_to(receiver, builder) {
        return None;
    }
    let Expr::Binary {
        op: BinaryOp::Sub,
        lhs,
        rhs,
        ..
    } = body.expr(body.skip_parens(*new_length))
    else {
        return None;
    };
    let truncated = usize::try_from(body.constant_int(*rhs)?).ok()?;
    if !is_length_of(body, *lhs, builder) || truncated != delimiter_length {
        return None;
    }

    let affixes = affixes(cx, tb, builder, truncate_stmt, loop_stmt, &[], &[call])?;
    if constant_of(body, &affixes.prefix)?.chars().count() != prefix_length {
        return None;
    }
    let mut terminal = JoiningTerminal::new(JoinShape::LengthTruncate, builder, main, delimiter, affixes);
    terminal.dead.push(truncate_stmt);
    Some(terminal)
}

fn delimiter_rewrite(cx: MigrationContext<'_>, tb: &TerminalBlock, non_final: Option<&[LocalId]>) -> Option<JoiningTerminal> {
    let body = cx.body;
    let [main_stmts @ .., last] = tb.statements() else {
        return None;
    };
    if main_stmts.is_empty() {
        return None;
    }
    let (AssignOp::Assign, lhs, delimiter) = assignment(body, statement_expr(body, *last)?)? else {
        return None;
    };
    let separator = body.as_local(lhs)?;
    let data = body.local(separator);
    if data.kind != LocalKind::Local
        || !body.local_type(separator).is_string()
        || !is_sole_declarator(body, separator)
        || !only_non_final(non_final, separator)
    {
        return None;
    }
    let initially_empty = data
        .initializer
        .and_then(|init| literal_value(body, init))
        .is_some_and(|v| v == LiteralValue::String(String::new()));
    if !initially_empty || !matches!(literal_value(body, delimiter), Some(LiteralValue::String(_))) {
        return None;
    }
    let loop_stmt = body.label_wrapped(tb.main_loop());
    let references = body.all_references(separator);
    if references.len() != 2
        || references
            .iter()
            .any(|r| !body.is_within(Node::Expr(*r), Node::Stmt(loop_stmt)))
    {
        return None;
    }

    let builder = appended_builder(body, main_stmts[0])?;
    let mut main = join_parts(body, builder, main_stmts)?;
    if !main.first().is_some_and(|part| body.is_reference_to(*part, separator)) {
        return None;
    }
    main.remove(0);
    let decl = data.decl?;
    let affixes = affixes(cx, tb, builder, loop_stmt, loop_stmt, &[decl], &[])?;
    let mut terminal = JoiningTerminal::new(JoinShape::DelimiterRewrite, builder, main, vec![delimiter], affixes);
    terminal.dead.push(decl);
    Some(terminal)
}

fn index_guard(cx: MigrationContext<'_>, tb: &TerminalBlock, non_final: Option<&[LocalId]>) -> Option<JoiningTerminal> {
    let body = cx.body;
    if !no_non_final(non_final) {
        return None;
    }
    let [Operation::Source(StreamSource {
        kind: SourceKind::CountingLoop { start, .. },
        var,
        ..
    })] = tb.operations()
    else {
        return None;
    };
    let [guard, rest @ ..] = tb.statements() else {
        return None;
    };
    let Stmt::If {
        condition,
        then_branch,
        else_branch,
        ..
    } = body.stmt(*guard)
    else {
        return None;
    };
    let then_is_first = index_condition(body, *condition, *var, start.expr()?)?;
    let then_stmts = flatten(body, *then_branch);
    let else_stmts = else_branch.map(|e| flatten(body, e)).unwrap_or_default();
    let (first_only, other_only) = if then_is_first {
        (then_stmts, else_stmts)
    } else {
        (else_stmts, then_stmts)
    };
    let first_stmts: Vec<StmtId> = first_only.iter().chain(rest).copied().collect();
    let other_stmts: Vec<StmtId> = other_only.iter().chain(rest).copied().collect();
    let builder = appended_builder(body, *first_stmts.first()?)?;
    let (delimiter, main) = first_iteration_split(body, builder, &first_stmts, &other_stmts)?;
    let loop_stmt = body.label_wrapped(tb.main_loop());
    let affixes = affixes(cx, tb, builder, loop_stmt, loop_stmt, &[], &[])?;
    Some(JoiningTerminal::new(JoinShape::IndexGuard, builder, main, delimiter, affixes))
}

/// For `i > start`, `i != start` (the other iterations) `Some(false)`; for
/// `i == start` (the first iteration) `Some(true)`.
fn index_condition(body: &Body, condition: ExprId, counter: LocalId, start: ExprId) -> Option<bool> {
    let Expr::Binary { op, lhs, rhs, .. } = body.expr(body.skip_parens(condition)) else {
        return None;
    };
    let is_start = |e: ExprId| {
        body.equivalent(e, start) || body.constant_int(e).is_some_and(|v| body.constant_int(start) == Some(v))
    };
    let op = if body.is_reference_to(*lhs, counter) && is_start(*rhs) {
        *op
    } else if body.is_reference_to(*rhs, counter) && is_start(*lhs) {
        flipped(*op)
    } else {
        return None;
    };
    match op {
        BinaryOp::Gt | BinaryOp::Ne => Some(false),
        BinaryOp::Eq => Some(true),
        _ => None,
    }
}

/// Delimiter and main parts when the other iterations append the delimiter
/// and then what the first iteration appends.
fn first_iteration_split(
    body: &Body,
    builder: LocalId,
    first: &[StmtId],
    other: &[StmtId],
) -> Option<(Vec<ExprId>, Vec<ExprId>)> {
    if first.is_empty() || other.is_empty() {
        return None;
    }
    let first_parts = join_parts(body, builder, first)?;
    let other_parts = join_parts(body, builder, other)?;
    let (delimiter, main) = split_left_delimiter(body, &other_parts);
    let same = main.len() == first_parts.len() && main.iter().zip(&first_parts).all(|(a, b)| body.equivalent(*a, *b));
    same.then_some((delimiter, first_parts))
}

fn flipped(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

fn is_length_of(body: &Body, expr: ExprId, builder: LocalId) -> bool {
    matches!(call_parts(body, expr), Some((Some(r), "length", [])) if body.is_reference_to(r, builder))
}

/// The builder length a guard requires before appending the delimiter:
/// `sb.length() > 2` means a two-character prefix.
fn prefix_length(cx: MigrationContext<'_>, condition: ExprId, builder: LocalId) -> Option<usize> {
    let body = cx.body;
    let condition = body.skip_parens(condition);
    if let Expr::Unary {
        op: UnaryOp::Not,
        operand,
        ..
    } = body.expr(condition)
    {
        let (Some(receiver), "isEmpty", []) = call_parts(body, *operand)? else {
            return None;
        };
        let allowed = cx.level.supports_char_sequence_is_empty() && body.is_reference_to(receiver, builder);
        return allowed.then_some(0);
    }
    let Expr::Binary { op, lhs, rhs, .. } = body.expr(condition) else {
        return None;
    };
    let non_negative = |e: ExprId| body.constant_int(e).filter(|v| *v >= 0);
    let (length, op, size) = match non_negative(*lhs) {
        Some(size) => (*rhs, flipped(*op), size),
        None => (*lhs, *op, non_negative(*rhs)?),
    };
    if !is_length_of(body, length, builder) {
        return None;
    }
    let min = match op {
        BinaryOp::Gt => size + 1,
        BinaryOp::Ge => size,
        _ => return None,
    };
    usize::try_from(min - 1).ok()
}

/// Collects the append chains before and after the loop and checks that
/// the builder is used nowhere the rewrite cannot follow.
///
/// `after` is the statement the suffix append follows, `before` the one
/// the prefix append precedes; `skipped` statements may sit in between.
fn affixes(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    builder: LocalId,
    after: StmtId,
    before: StmtId,
    skipped: &[StmtId],
    allowed: &[ExprId],
) -> Option<Affixes> {
    let body = cx.body;
    let after_chain = body
        .next_statement(after)
        .and_then(|stmt| append_chain(body, builder, stmt));
    let mut previous = body.prev_statement(before);
    while let Some(stmt) = previous.filter(|s| skipped.contains(s)) {
        previous = body.prev_statement(stmt);
    }
    let before_chain = previous.and_then(|stmt| append_chain(body, builder, stmt));

    let mut affixes = Affixes {
        before: before_chain.map(|(_, outermost)| outermost),
        after: after_chain.map(|(_, outermost)| outermost),
        ..Affixes::default()
    };
    let data = body.local(builder);
    if data.kind == LocalKind::Local {
        if !body.is_effectively_final(builder) {
            return None;
        }
        let loop_node = Node::Stmt(body.label_wrapped(tb.main_loop()));
        let surrounder = body.surrounder(loop_node);
        let references: Vec<ExprId> = body
            .all_references(builder)
            .into_iter()
            .filter(|r| !body.is_within(Node::Expr(*r), loop_node))
            .collect();
        if references
            .iter()
            .any(|r| body.surrounder(Node::Expr(*r)) != surrounder)
        {
            return None;
        }
        let mut allowed = allowed.to_vec();
        allowed.extend(before_chain.map(|(first, _)| first));
        allowed.extend(after_chain.map(|(first, _)| first));
        if !references
            .iter()
            .all(|r| is_allowed_reference(body, *r, &allowed))
        {
            let (append, to_string) = combined_to_string(body, &references, affixes.after)?;
            affixes.after = Some(append);
            affixes.combined = Some(to_string);
        }
        affixes.prefix = initializer_parts(body, data.initializer?)?;
    }

    if let Some(before) = affixes.before {
        if !chain_parts(body, builder, before, &mut affixes.prefix) {
            return None;
        }
    }
    if let Some(after) = affixes.after {
        if body.is_referenced(builder, Node::Expr(after)) && !chain_reads_only_root(body, builder, after) {
            return None;
        }
        if !chain_parts(body, builder, after, &mut affixes.suffix) {
            return None;
        }
    }
    Some(affixes)
}

/// Whether the only reference to the builder in `chain` is its receiver.
fn chain_reads_only_root(body: &Body, builder: LocalId, chain: ExprId) -> bool {
    body.references(builder, Node::Expr(chain)).len() == 1
}

/// A use of the builder outside the loop that survives the rewrite.
fn is_allowed_reference(body: &Body, reference: ExprId, allowed: &[ExprId]) -> bool {
    let Some(Node::Expr(parent)) = body.parent_skip_parens(reference) else {
        return false;
    };
    match body.expr(parent) {
        Expr::Call {
            receiver: Some(receiver),
            name,
            args,
            ..
        } if body.skip_parens(*receiver) == reference => {
            allowed.contains(&parent) || (args.is_empty() && matches!(name.as_str(), "toString" | "length"))
        }
        Expr::Binary { op: BinaryOp::Add, .. } => true,
        Expr::Assign { op: AssignOp::Add, .. } => true,
        _ => false,
    }
}

/// `return sb.append(suffix).toString();` as the only use after the loop.
fn combined_to_string(body: &Body, references: &[ExprId], after: Option<ExprId>) -> Option<(ExprId, ExprId)> {
    let ([only], None) = (references, after) else {
        return None;
    };
    let Some(Node::Expr(append)) = body.parent_skip_parens(*only) else {
        return None;
    };
    let (Some(receiver), "append", [_]) = call_parts(body, append)? else {
        return None;
    };
    let Some(Node::Expr(to_string)) = body.parent_skip_parens(append) else {
        return None;
    };
    let (Some(outer), "toString", []) = call_parts(body, to_string)? else {
        return None;
    };
    (body.skip_parens(receiver) == *only && body.skip_parens(outer) == append).then_some((append, to_string))
}

/// Parts a builder starts with: `new StringBuilder("[")`, possibly followed
/// by appends. A capacity argument adds nothing.
fn initializer_parts(body: &Body, init: ExprId) -> Option<Vec<ExprId>> {
    let mut parts = Vec::new();
    let mut current = body.skip_parens(init);
    while let Some((receiver, arg)) = append_call(body, current) {
        parts.push(arg);
        current = body.skip_parens(receiver);
    }
    let Expr::New {
        ty,
        args,
        members: None,
        ..
    } = body.expr(current)
    else {
        return None;
    };
    let class = ty.rsplit('.').next().unwrap_or(ty.as_str());
    if !matches!(class, "StringBuilder" | "StringBuffer") {
        return None;
    }
    match args.as_slice() {
        [] => {}
        [arg] if body.type_of(*arg) == JavaType::INT => {}
        [arg] => parts.push(*arg),
        _ => return None,
    }
    parts.reverse();
    Some(parts)
}

/// `receiver.append(arg)`.
fn append_call(body: &Body, expr: ExprId) -> Option<(ExprId, ExprId)> {
    match call_parts(body, expr)? {
        (Some(receiver), "append", [arg]) => Some((receiver, *arg)),
        _ => None,
    }
}

/// The builder a statement `sb.append(a).append(b);` appends to.
fn appended_builder(body: &Body, stmt: StmtId) -> Option<LocalId> {
    let mut current = statement_expr(body, stmt)?;
    loop {
        let (receiver, _) = append_call(body, current)?;
        let receiver = body.skip_parens(receiver);
        if matches!(body.expr(receiver), Expr::Call { .. }) {
            current = receiver;
            continue;
        }
        let local = body.as_local(receiver)?;
        return body.local_type(local).is_string_builder().then_some(local);
    }
}

/// For a statement appending to `builder`, the innermost append (called on
/// the builder itself) and the outermost one.
fn append_chain(body: &Body, builder: LocalId, stmt: StmtId) -> Option<(ExprId, ExprId)> {
    let outermost = statement_expr(body, stmt)?;
    let mut current = outermost;
    loop {
        let (receiver, _) = append_call(body, current)?;
        let receiver = body.skip_parens(receiver);
        if matches!(body.expr(receiver), Expr::Call { .. }) {
            current = receiver;
        } else {
            return body
                .is_reference_to(receiver, builder)
                .then_some((current, outermost));
        }
    }
}

/// Appends the parts of an append chain on `builder`, innermost first.
fn chain_parts(body: &Body, builder: LocalId, call: ExprId, out: &mut Vec<ExprId>) -> bool {
    let Some((receiver, arg)) = append_call(body, call) else {
        return false;
    };
    let receiver = body.skip_parens(receiver);
    if matches!(body.expr(receiver), Expr::Call { .. }) {
        if !chain_parts(body, builder, receiver, out) {
            return false;
        }
    } else if !body.is_reference_to(receiver, builder) {
        return false;
    }
    concatenation_parts(body, arg, out);
    true
}

fn join_parts(body: &Body, builder: LocalId, statements: &[StmtId]) -> Option<Vec<ExprId>> {
    let mut parts = Vec::new();
    for stmt in statements {
        let expr = statement_expr(body, *stmt)?;
        if !chain_parts(body, builder, expr, &mut parts) {
            return None;
        }
    }
    Some(parts)
}

/// Splits a string concatenation into its operands.
fn concatenation_parts(body: &Body, expr: ExprId, out: &mut Vec<ExprId>) {
    let expr = body.skip_parens(expr);
    if body.type_of(expr).is_string() {
        if let Expr::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
            ..
        } = body.expr(expr)
        {
            concatenation_parts(body, *lhs, out);
            concatenation_parts(body, *rhs, out);
            return;
        }
    }
    out.push(expr);
}

fn literal_value(body: &Body, expr: ExprId) -> Option<LiteralValue> {
    body.constant_value(expr)
}

fn constant_text(body: &Body, expr: ExprId) -> Option<String> {
    match literal_value(body, expr)? {
        LiteralValue::String(s) => Some(s),
        LiteralValue::Char(c) => Some(c.to_string()),
        LiteralValue::Int(v) => Some(v.to_string()),
        LiteralValue::Long(v) => Some(v.to_string()),
        LiteralValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The concatenated value of constant parts.
fn constant_of(body: &Body, parts: &[ExprId]) -> Option<String> {
    parts.iter().map(|p| constant_text(body, *p)).collect()
}

/// Leading constant parts (the delimiter) and the rest.
fn split_left_delimiter(body: &Body, parts: &[ExprId]) -> (Vec<ExprId>, Vec<ExprId>) {
    let split = parts
        .iter()
        .position(|p| constant_text(body, *p).is_none())
        .unwrap_or(parts.len());
    (parts[..split].to_vec(), parts[split..].to_vec())
}

/// The rest and the trailing constant parts (the delimiter).
fn split_right_delimiter(body: &Body, parts: &[ExprId]) -> (Vec<ExprId>, Vec<ExprId>) {
    let split = parts
        .iter()
        .rposition(|p| constant_text(body, *p).is_none())
        .map_or(0, |i| i + 1);
    (parts[..split].to_vec(), parts[split..].to_vec())
}

/// Text of `expr` with the counter replaced by `0`.
fn text_with_zero(body: &Body, expr: ExprId, counter: LocalId) -> String {
    let replacements: Vec<_> = body
        .references(counter, Node::Expr(expr))
        .into_iter()
        .map(|r| (body.expr(r).range(), "0".to_string()))
        .collect();
    body.text_with_replacements(body.expr(expr).range(), &replacements)
}

fn squeezed(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The parts as one `String` expression.
fn join_text(body: &Body, parts: &[ExprId]) -> String {
    let count = parts.len();
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let neighbor_is_string = i > 0 || parts.get(1).is_some_and(|p| body.type_of(*p).is_string());
            part_text(body, *part, count, neighbor_is_string)
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

fn part_text(body: &Body, part: ExprId, count: usize, neighbor_is_string: bool) -> String {
    if let Some((Some(receiver), "charAt", [index])) = call_parts(body, part) {
        if let Some(LiteralValue::Int(k)) = literal_value(body, *index) {
            return format!(
                "{}.substring({}, {})",
                body.text_at_precedence(receiver, 15),
                body.expr_text(*index),
                i64::from(k) + 1
            );
        }
    }
    let ty = body.type_of(part);
    let text = body.expr_text(part);
    let precedence = body.precedence(part);
    if !ty.is_char_sequence() {
        let char_array = ty
            .array_component()
            .is_some_and(|c| c.as_primitive() == Some(PrimitiveType::Char));
        if !neighbor_is_string || char_array {
            if let Expr::Literal {
                kind: LiteralKind::Char,
                ..
            } = body.expr(part)
            {
                return char_literal_as_string(text);
            }
            return format!("String.valueOf({text})");
        }
        if precedence < ADDITIVE_PRECEDENCE || (ty.is_primitive() && precedence == ADDITIVE_PRECEDENCE) {
            return format!("({text})");
        }
        return text.to_string();
    }
    if precedence < ADDITIVE_PRECEDENCE && count > 1 {
        return format!("({text})");
    }
    text.to_string()
}

/// `'x'` as `"x"`.
fn char_literal_as_string(text: &str) -> String {
    if text == "'\"'" {
        return "\"\\\"\"".to_string();
    }
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(text);
    format!("\"{inner}\"")
}

pub(crate) fn migrate(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let terminal = extract_terminal(cx, tb, None)
        .ok_or_else(|| MigrateError::InvariantViolation("loop no longer joins into a builder".to_string()))?;
    tracing::debug!(
        target = "nova.stream_migration",
        shape = ?terminal.shape(),
        "joining terminal"
    );
    let stream = terminal.render(body, tb);
    let builder = terminal.builder;
    let data = body.local(builder);
    let dead = terminal.dead_statements(body);

    let mut rewriter = Rewriter::new(body);
    for stmt in &dead {
        rewriter.delete_stmt(*stmt);
    }
    if let Some(to_string) = terminal.affixes.combined {
        rewriter.replace_expr(to_string, data.name.clone());
    }
    if data.kind != LocalKind::Local {
        rewriter.replace_stmt(tb.main_loop(), format!("{}.append({stream});", data.name));
        return rewriter.finish();
    }

    let status = terminal.status(body, tb);
    if status == InitializerUsageStatus::AtWantedPlace {
        if let Some(init) = data.initializer {
            rewriter.replace_expr(init, "\"\"");
        }
    }
    rewriter.replace_initializer(tb.main_loop(), builder, &stream, status)?;
    rewriter.replace_range(data.ty_range, "String");

    // sb.toString() is the string itself now.
    let loop_node = Node::Stmt(body.label_wrapped(tb.main_loop()));
    for reference in body.all_references(builder) {
        let removed = body.is_within(Node::Expr(reference), loop_node)
            || dead
                .iter()
                .any(|s| body.is_within(Node::Expr(reference), Node::Stmt(*s)));
        if removed {
            continue;
        }
        if let Some(Node::Expr(call)) = body.parent_skip_parens(reference) {
            if matches!(call_parts(body, call), Some((Some(_), "toString", []))) {
                rewriter.replace_expr(call, data.name.clone());
            }
        }
    }
    rewriter.finish()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::{block_for, method, rewrite, rewrite_with, stmt};
    use crate::{InspectionOptions, MigrationContext, MigrationKind};

    use super::*;

    fn shape_of(body_text: &str) -> Option<JoinShape> {
        let body = method(body_text);
        let loop_stmt = stmt(&body, "for");
        let block = block_for(&body, loop_stmt);
        let cx = MigrationContext {
            body: &body,
            level: nova_syntax::JavaLanguageLevel::JAVA_8,
        };
        extract_terminal(cx, &block, None).map(|t| t.shape())
    }

    #[test]
    fn break_on_element_length_is_not_joined() {
        let result = rewrite(
            "StringBuilder sb = new StringBuilder(); \
             for (String s : list) { sb.append(s); if (s.length() > 5) break; } \
             return sb.toString();",
        );
        assert!(!result.is_some_and(|(migration, _)| migration.kind == MigrationKind::Joining));
    }

    #[test]
    fn kept_limit_counter_rejects_joining() {
        let text = "StringBuilder sb = new StringBuilder(); \
                    java.util.List<String> seen = new java.util.ArrayList<>(); \
                    for (String s : list) { sb.append(s); if (seen.size() >= 3) break; } \
                    return sb.toString();";
        let body = method(text);
        let block = block_for(&body, stmt(&body, "for"));
        assert!(block.count_expression().is_some());
        assert_eq!(shape_of(text), None);
    }

    #[test]
    fn length_guarded_delimiter() {
        let (migration, out) = rewrite(
            "StringBuilder sb = new StringBuilder(); \
             for (String s : list) { if (sb.length() > 0) sb.append(\",\"); sb.append(s); } \
             return sb.toString();",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Joining);
        assert_eq!(
            out,
            "String sb = list.stream().collect(Collectors.joining(\",\")); return sb;"
        );
    }

    #[test]
    fn initializer_and_trailing_append_become_prefix_and_suffix() {
        let (_, out) = rewrite(
            "StringBuilder sb = new StringBuilder(\"[\"); \
             for (String s : list) { sb.append(s.trim()); } \
             sb.append(\"]\"); return sb.toString();",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "String sb = list.stream().map(s -> s.trim()).collect(Collectors.joining(\"\", \"[\", \"]\")); return sb;"
        );
    }

    #[test]
    fn first_flag_is_removed() {
        let (_, out) = rewrite(
            "StringBuilder sb = new StringBuilder(); boolean first = true; \
             for (String s : list) { if (first) first = false; else sb.append(\", \"); sb.append(s); } \
             return sb.toString();",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "String sb = list.stream().collect(Collectors.joining(\", \")); return sb;"
        );
    }

    #[test]
    fn trailing_delimiter_truncation() {
        let (_, out) = rewrite(
            "StringBuilder sb = new StringBuilder(); \
             for (String s : list) { sb.append(s).append(\",\"); } \
             if (sb.length() > 0) sb.setLength(sb.length() - 1); \
             return sb.toString();",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "String sb = list.stream().collect(Collectors.joining(\",\")); return sb;"
        );
    }

    #[test]
    fn rewritten_separator_variable() {
        let text = "StringBuilder sb = new StringBuilder(); String sep = \"\"; \
                    for (String s : list) { sb.append(sep).append(s); sep = \";\"; } \
                    return sb.toString();";
        assert_eq!(shape_of(text), Some(JoinShape::DelimiterRewrite));
        let (_, out) = rewrite(text).expect("migrates");
        assert_eq!(
            out,
            "String sb = list.stream().collect(Collectors.joining(\";\")); return sb;"
        );
    }

    #[test]
    fn index_guard_on_counting_loop() {
        let (_, out) = rewrite(
            "StringBuilder sb = new StringBuilder(); \
             for (int i = 0; i < list.size(); i++) { if (i > 0) sb.append(\",\"); sb.append(list.get(i)); } \
             return sb.toString();",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "String sb = IntStream.range(0, list.size()).mapToObj(i -> list.get(i)).collect(Collectors.joining(\",\")); return sb;"
        );
    }

    #[test]
    fn first_element_appended_before_loop() {
        let text = "StringBuilder sb = new StringBuilder(); sb.append(list.get(0)); \
                    for (int i = 1; i < list.size(); i++) { sb.append(\",\").append(list.get(i)); } \
                    return sb.toString();";
        assert_eq!(shape_of(text), Some(JoinShape::CountedLoop));
        let (_, out) = rewrite(text).expect("migrates");
        assert_eq!(
            out,
            "String sb = IntStream.range(0, list.size()).mapToObj(i -> list.get(i)).collect(Collectors.joining(\",\")); return sb;"
        );
    }

    #[test]
    fn combined_suffix_and_to_string() {
        let (_, out) = rewrite(
            "StringBuilder sb = new StringBuilder(); for (String s : list) { sb.append(s); } \
             return sb.append(\"!\").toString();",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "String sb = list.stream().collect(Collectors.joining(\"\", \"\", \"!\")); return sb;"
        );
    }

    #[test]
    fn is_empty_guard_needs_java_15() {
        let text = "StringBuilder sb = new StringBuilder(); \
                    for (String s : list) { if (!sb.isEmpty()) sb.append(\",\"); sb.append(s); } \
                    return sb.toString();";
        let kind = rewrite(text).map(|(migration, _)| migration.kind);
        assert_ne!(kind, Some(MigrationKind::Joining));

        let options = InspectionOptions {
            language_level: nova_syntax::JavaLanguageLevel::JAVA_17,
            ..InspectionOptions::default()
        };
        let (migration, _) = rewrite_with(text, &options).expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Joining);
    }

    #[test]
    fn escaping_builder_is_rejected() {
        assert_eq!(
            shape_of(
                "StringBuilder sb = new StringBuilder(); for (String s : list) { sb.append(s); } \
                 consume(sb); return sb.toString();"
            ),
            None
        );
    }

    #[test]
    fn parts_are_rendered_as_strings() {
        let body = method("int n = 1; char c = 'x'; String t = \"y\"; use(n, 'a', t, n + 1, '\"');");
        let e = |text: &str| crate::test_support::expr(&body, text);
        assert_eq!(join_text(&body, &[e("n")]), "String.valueOf(n)");
        assert_eq!(join_text(&body, &[e("'a'"), e("t")]), "'a' + t");
        assert_eq!(join_text(&body, &[e("t"), e("n + 1")]), "t + (n + 1)");
        assert_eq!(join_text(&body, &[e("'\"'")]), "\"\\\"\"");
    }
}
