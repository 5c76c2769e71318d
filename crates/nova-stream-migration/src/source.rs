//! Recognizing the loop header that starts a pipeline.

use std::borrow::Cow;

use nova_hir::{AssignOp, BinaryOp, Body, Expr, ExprId, LocalId, LocalKind, Node, Stmt, StmtId, UnaryOp};
use nova_syntax::JavaLanguageLevel;
use nova_types::JavaType;

use crate::pipeline::{lambda, PipelineCall};

/// Either an expression of the body or synthesized source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Expr(ExprId),
    Text(String),
}

impl Fragment {
    pub fn text<'a>(&'a self, body: &'a Body) -> Cow<'a, str> {
        match self {
            Fragment::Expr(id) => Cow::Borrowed(body.expr_text(*id)),
            Fragment::Text(text) => Cow::Borrowed(text.as_str()),
        }
    }

    pub fn expr(&self) -> Option<ExprId> {
        match self {
            Fragment::Expr(id) => Some(*id),
            Fragment::Text(_) => None,
        }
    }
}

/// How an iterate source computes the next value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterateUpdate {
    /// `v = expr`
    Assign(ExprId),
    /// `v op= expr`, or `v++` / `v--` when `operand` is `None`.
    Compound { op: BinaryOp, operand: Option<ExprId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Array { array: ExprId },
    Collection { collection: ExprId },
    CountingLoop {
        start: Fragment,
        bound: Fragment,
        inclusive: bool,
    },
    Iterate {
        seed: ExprId,
        condition: Option<ExprId>,
        update: IterateUpdate,
    },
    BufferedReaderLines { reader: ExprId, delete_variable: bool },
}

/// The first operation of every pipeline: where the elements come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    pub kind: SourceKind,
    /// The loop statement the source was recognized from.
    pub loop_stmt: StmtId,
    /// The per-iteration variable.
    pub var: LocalId,
}

impl StreamSource {
    /// Recognizes the loop shapes that can start a stream, in priority order.
    pub fn try_create(body: &Body, loop_stmt: StmtId, level: JavaLanguageLevel) -> Option<StreamSource> {
        if let Some(source) = buffered_reader_lines(body, loop_stmt) {
            return Some(source);
        }
        match body.stmt(loop_stmt) {
            Stmt::For { .. } => {
                counting_loop(body, loop_stmt).or_else(|| iterate(body, loop_stmt, level))
            }
            Stmt::ForEach { .. } => array(body, loop_stmt).or_else(|| collection(body, loop_stmt)),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, SourceKind::Collection { .. })
    }

    pub fn is_buffered_reader(&self) -> bool {
        matches!(self.kind, SourceKind::BufferedReaderLines { .. })
    }

    /// Expressions of the body the rendered source copies.
    pub fn expressions(&self) -> Vec<ExprId> {
        match &self.kind {
            SourceKind::Array { array } => vec![*array],
            SourceKind::Collection { collection } => vec![*collection],
            SourceKind::CountingLoop { start, bound, .. } => {
                [start.expr(), bound.expr()].into_iter().flatten().collect()
            }
            SourceKind::Iterate {
                seed,
                condition,
                update,
            } => {
                let mut out = vec![*seed];
                match update {
                    IterateUpdate::Assign(e) => out.push(*e),
                    IterateUpdate::Compound {
                        operand: Some(e), ..
                    } => out.push(*e),
                    IterateUpdate::Compound { operand: None, .. } => {}
                }
                out.extend(*condition);
                out
            }
            SourceKind::BufferedReaderLines { reader, .. } => vec![*reader],
        }
    }

    #[must_use]
    pub fn with_bound(&self, new_bound: Fragment) -> StreamSource {
        let mut copy = self.clone();
        if let SourceKind::CountingLoop { bound, .. } = &mut copy.kind {
            *bound = new_bound;
        }
        copy
    }

    #[must_use]
    pub fn with_initializer(&self, new_start: Fragment) -> StreamSource {
        let mut copy = self.clone();
        if let SourceKind::CountingLoop { start, .. } = &mut copy.kind {
            *start = new_start;
        }
        copy
    }

    pub fn render(&self, body: &Body) -> PipelineCall {
        let var = body.local(self.var);
        match &self.kind {
            SourceKind::Array { array } => render_array(body, *array),
            SourceKind::Collection { collection } => {
                let mut call = PipelineCall::new(body.text_at_precedence(*collection, 15))
                    .call("stream", Vec::new());
                let name = var.name.as_str();
                let unbox = match body.local_type(self.var).as_primitive() {
                    Some(nova_types::PrimitiveType::Int) => Some("mapToInt"),
                    Some(nova_types::PrimitiveType::Long) => Some("mapToLong"),
                    Some(nova_types::PrimitiveType::Double) => Some("mapToDouble"),
                    _ => None,
                };
                if let Some(unbox) = unbox {
                    call.push(unbox, vec![lambda(name, name)]);
                }
                call
            }
            SourceKind::CountingLoop {
                start,
                bound,
                inclusive,
            } => {
                let class = if body.local_type(self.var) == JavaType::LONG {
                    "LongStream"
                } else {
                    "IntStream"
                };
                let method = if *inclusive { "rangeClosed" } else { "range" };
                PipelineCall::static_call(
                    class,
                    method,
                    vec![start.text(body).into_owned(), bound.text(body).into_owned()],
                )
            }
            SourceKind::Iterate {
                seed,
                condition,
                update,
            } => {
                let ty = body.local_type(self.var);
                let name = var.name.as_str();
                let mut args = vec![body.expr_text(*seed).to_string()];
                if let Some(condition) = condition {
                    args.push(lambda(name, body.expr_text(*condition)));
                }
                args.push(lambda(name, &iterate_next(body, name, &ty, update)));
                PipelineCall::static_call(ty.stream_class(), "iterate", args)
            }
            SourceKind::BufferedReaderLines { reader, .. } => {
                PipelineCall::new(body.text_at_precedence(*reader, 15)).call("lines", Vec::new())
            }
        }
    }

    /// Whether the source tolerates `reference`, a write of `local`.
    pub fn is_write_allowed(&self, body: &Body, local: LocalId, reference: ExprId) -> bool {
        if local != self.var {
            return false;
        }
        let within = |exprs: &[ExprId]| {
            exprs
                .iter()
                .any(|e| body.is_within(Node::Expr(reference), Node::Expr(*e)))
        };
        match (&self.kind, body.stmt(self.loop_stmt)) {
            (
                SourceKind::BufferedReaderLines { .. },
                Stmt::For {
                    condition, update, ..
                },
            ) => within(update) || condition.is_some_and(|c| within(&[c])),
            (SourceKind::BufferedReaderLines { .. }, Stmt::While { condition, .. }) => {
                within(&[*condition])
            }
            (
                SourceKind::CountingLoop { .. } | SourceKind::Iterate { .. },
                Stmt::For { update, .. },
            ) => within(update),
            _ => false,
        }
    }

    pub fn can_reassign_variable(&self, local: LocalId) -> bool {
        match self.kind {
            SourceKind::CountingLoop { .. } | SourceKind::Iterate { .. } => local != self.var,
            _ => true,
        }
    }
}

fn render_array(body: &Body, array: ExprId) -> PipelineCall {
    if let Expr::NewArray {
        elem_ty,
        rank: 1,
        initializer: Some(init),
        ..
    } = body.expr(body.skip_parens(array))
    {
        if let Expr::ArrayInit { elements, .. } = body.expr(*init) {
            if !elements.is_empty() {
                let component = JavaType::parse(elem_ty);
                let args = elements.iter().map(|e| body.expr_text(*e).to_string()).collect();
                let class = component.stream_class();
                let method = if component.is_primitive() {
                    "of".to_string()
                } else {
                    format!("<{}>of", component.display())
                };
                return PipelineCall::static_call(class, &method, args);
            }
        }
    }
    PipelineCall::static_call("Arrays", "stream", vec![body.expr_text(array).to_string()])
}

fn iterate_next(body: &Body, name: &str, ty: &JavaType, update: &IterateUpdate) -> String {
    match update {
        IterateUpdate::Assign(expr) => body.expr_text(*expr).to_string(),
        IterateUpdate::Compound { op, operand } => {
            let (operand_text, operand_ty) = match operand {
                Some(e) => (body.text_at_precedence(*e, op.precedence() + 3), body.type_of(*e)),
                None => ("1".to_string(), JavaType::INT),
            };
            let text = format!("{name} {} {operand_text}", op.as_str());
            let result_ty = match (ty.unboxed(), operand_ty.unboxed()) {
                (Some(a), Some(b)) => a.promote(b).map(JavaType::Primitive),
                _ => None,
            };
            match result_ty {
                Some(result) if !result.same_as(ty) && ty.is_primitive() => {
                    format!("({}) ({text})", ty.display())
                }
                _ => text,
            }
        }
    }
}

// while ((line = reader.readLine()) != null)
// for (String line = reader.readLine(); line != null; line = reader.readLine())
// for (String line; (line = reader.readLine()) != null; )
fn buffered_reader_lines(body: &Body, loop_stmt: StmtId) -> Option<StreamSource> {
    match body.stmt(loop_stmt) {
        Stmt::While { condition, .. } => {
            let (line, reader) = reader_from_condition(body, *condition, loop_stmt)?;
            let data = body.local(line);
            if data.decl.is_none() || data.initializer.is_some_and(|i| !body.is_side_effect_free(i)) {
                return None;
            }
            Some(StreamSource {
                kind: SourceKind::BufferedReaderLines {
                    reader,
                    delete_variable: true,
                },
                loop_stmt,
                var: line,
            })
        }
        Stmt::For {
            init,
            condition,
            update,
            ..
        } => {
            let [decl] = init.as_slice() else {
                return None;
            };
            let Stmt::LocalVar { locals, .. } = body.stmt(*decl) else {
                return None;
            };
            let [line] = locals.as_slice() else {
                return None;
            };
            let condition = (*condition)?;
            if update.is_empty() {
                let (cond_line, reader) = reader_from_condition(body, condition, loop_stmt)?;
                if cond_line != *line {
                    return None;
                }
                return Some(StreamSource {
                    kind: SourceKind::BufferedReaderLines {
                        reader,
                        delete_variable: false,
                    },
                    loop_stmt,
                    var: *line,
                });
            }
            if !only_referenced_within(body, *line, loop_stmt) {
                return None;
            }
            let reader = read_line_receiver(body, body.local(*line).initializer?)?;
            let reader_var = body.as_local(reader)?;
            let Expr::Binary {
                op: BinaryOp::Ne,
                lhs,
                rhs,
                ..
            } = body.expr(body.skip_parens(condition))
            else {
                return None;
            };
            if value_compared_with_null(body, *lhs, *rhs).and_then(|v| body.as_local(v)) != Some(*line) {
                return None;
            }
            let [next] = update.as_slice() else {
                return None;
            };
            let Expr::Assign {
                op: AssignOp::Assign,
                lhs,
                rhs,
                ..
            } = body.expr(*next)
            else {
                return None;
            };
            if !body.is_reference_to(*lhs, *line) {
                return None;
            }
            let next_reader = read_line_receiver(body, *rhs)?;
            if !body.is_reference_to(next_reader, reader_var) {
                return None;
            }
            Some(StreamSource {
                kind: SourceKind::BufferedReaderLines {
                    reader,
                    delete_variable: false,
                },
                loop_stmt,
                var: *line,
            })
        }
        _ => None,
    }
}

/// `(line = reader.readLine()) != null`
fn reader_from_condition(body: &Body, condition: ExprId, loop_stmt: StmtId) -> Option<(LocalId, ExprId)> {
    let Expr::Binary {
        op: BinaryOp::Ne,
        lhs,
        rhs,
        ..
    } = body.expr(body.skip_parens(condition))
    else {
        return None;
    };
    let operand = value_compared_with_null(body, *lhs, *rhs)?;
    let Expr::Assign {
        op: AssignOp::Assign,
        lhs,
        rhs,
        ..
    } = body.expr(body.skip_parens(operand))
    else {
        return None;
    };
    let reader = read_line_receiver(body, *rhs)?;
    let line = body.as_local(*lhs)?;
    if body.local(line).kind != LocalKind::Local || !only_referenced_within(body, line, loop_stmt) {
        return None;
    }
    Some((line, reader))
}

fn read_line_receiver(body: &Body, expr: ExprId) -> Option<ExprId> {
    let Expr::Call {
        receiver: Some(receiver),
        name,
        args,
        ..
    } = body.expr(body.skip_parens(expr))
    else {
        return None;
    };
    if name != "readLine" || !args.is_empty() || !body.type_of(*receiver).is_class("BufferedReader") {
        return None;
    }
    Some(body.skip_parens(*receiver))
}

pub(crate) fn value_compared_with_null(body: &Body, lhs: ExprId, rhs: ExprId) -> Option<ExprId> {
    let is_null = |e: ExprId| matches!(body.type_of(body.skip_parens(e)), JavaType::Null);
    if is_null(rhs) {
        Some(lhs)
    } else if is_null(lhs) {
        Some(rhs)
    } else {
        None
    }
}

fn only_referenced_within(body: &Body, local: LocalId, stmt: StmtId) -> bool {
    body.all_references(local)
        .into_iter()
        .all(|r| body.is_within(Node::Expr(r), Node::Stmt(stmt)))
}

/// The single local declared by a `for` initializer, with its initializer.
fn single_for_local(body: &Body, init: &[StmtId]) -> Option<(LocalId, ExprId)> {
    let [decl] = init else {
        return None;
    };
    let Stmt::LocalVar { locals, .. } = body.stmt(*decl) else {
        return None;
    };
    let [local] = locals.as_slice() else {
        return None;
    };
    Some((*local, body.local(*local).initializer?))
}

// for (int i = a; i < b; i++)
fn counting_loop(body: &Body, loop_stmt: StmtId) -> Option<StreamSource> {
    let Stmt::For {
        init,
        condition,
        update,
        body: loop_body,
        ..
    } = body.stmt(loop_stmt)
    else {
        return None;
    };
    let (counter, start) = single_for_local(body, init)?;
    let counter_ty = body.local_type(counter);
    if counter_ty != JavaType::INT && counter_ty != JavaType::LONG {
        return None;
    }
    let [step] = update.as_slice() else {
        return None;
    };
    if crate::patterns::incremented_local(body, *step) != Some(counter) {
        return None;
    }
    let Expr::Binary { op, lhs, rhs, .. } = body.expr(body.skip_parens((*condition)?)) else {
        return None;
    };
    let (bound, inclusive) = match op {
        BinaryOp::Lt if body.is_reference_to(*lhs, counter) => (*rhs, false),
        BinaryOp::Le if body.is_reference_to(*lhs, counter) => (*rhs, true),
        BinaryOp::Gt if body.is_reference_to(*rhs, counter) => (*lhs, false),
        BinaryOp::Ge if body.is_reference_to(*rhs, counter) => (*lhs, true),
        _ => return None,
    };
    if body.is_referenced(counter, Node::Expr(bound))
        || !body.writes(counter, Node::Stmt(*loop_body)).is_empty()
    {
        return None;
    }
    let bound_ty = body.type_of(bound);
    if bound_ty.is_known() {
        let fits = match bound_ty.unboxed() {
            Some(p) if counter_ty == JavaType::LONG => p.is_integral(),
            Some(p) => p.is_integral() && p != nova_types::PrimitiveType::Long,
            None => false,
        };
        if !fits {
            return None;
        }
    }
    Some(StreamSource {
        kind: SourceKind::CountingLoop {
            start: Fragment::Expr(start),
            bound: Fragment::Expr(bound),
            inclusive,
        },
        loop_stmt,
        var: counter,
    })
}

// for (T v = seed; cond; v = next)
fn iterate(body: &Body, loop_stmt: StmtId, level: JavaLanguageLevel) -> Option<StreamSource> {
    let Stmt::For {
        init,
        condition,
        update,
        ..
    } = body.stmt(loop_stmt)
    else {
        return None;
    };
    if condition.is_some() && !level.supports_iterate_with_predicate() {
        return None;
    }
    let (var, seed) = single_for_local(body, init)?;
    if !body.local_type(var).is_stream_eligible() {
        return None;
    }
    let [step] = update.as_slice() else {
        return None;
    };
    let update = match body.expr(body.skip_parens(*step)) {
        Expr::Assign { op, lhs, rhs, .. } => {
            if !body.is_reference_to(*lhs, var) {
                return None;
            }
            match op.binary_op() {
                None => IterateUpdate::Assign(*rhs),
                Some(op) => IterateUpdate::Compound {
                    op,
                    operand: Some(*rhs),
                },
            }
        }
        Expr::Unary { op, operand, .. } => {
            if !body.is_reference_to(*operand, var) {
                return None;
            }
            let op = match op {
                UnaryOp::PreInc | UnaryOp::PostInc => BinaryOp::Add,
                UnaryOp::PreDec | UnaryOp::PostDec => BinaryOp::Sub,
                _ => return None,
            };
            IterateUpdate::Compound { op, operand: None }
        }
        _ => return None,
    };
    Some(StreamSource {
        kind: SourceKind::Iterate {
            seed,
            condition: *condition,
            update,
        },
        loop_stmt,
        var,
    })
}

// for (T x : array)
fn array(body: &Body, loop_stmt: StmtId) -> Option<StreamSource> {
    let Stmt::ForEach { local, iterable, .. } = body.stmt(loop_stmt) else {
        return None;
    };
    let iterable_ty = body.type_of(*iterable);
    let component = iterable_ty.array_component()?;
    if !component.is_stream_eligible() {
        return None;
    }
    let param_ty = body.local_type(*local);
    if param_ty.is_primitive() && !param_ty.same_as(component) {
        return None;
    }
    Some(StreamSource {
        kind: SourceKind::Array { array: *iterable },
        loop_stmt,
        var: *local,
    })
}

// for (T x : collection)
fn collection(body: &Body, loop_stmt: StmtId) -> Option<StreamSource> {
    let Stmt::ForEach { local, iterable, .. } = body.stmt(loop_stmt) else {
        return None;
    };
    let iterable_ty = body.type_of(*iterable);
    if !iterable_ty.is_collection() || iterable_ty.type_args().is_empty() {
        return None;
    }
    if !body.local_type(*local).is_stream_eligible() {
        return None;
    }
    Some(StreamSource {
        kind: SourceKind::Collection {
            collection: *iterable,
        },
        loop_stmt,
        var: *local,
    })
}
