//! A loop body seen as a chain of stream operations followed by the
//! statements a terminal operation still has to express.
//!
//! Extraction peels one operation at a time off the front of the remaining
//! statements, always producing a new block, until nothing more matches.
//! Two passes then run once: a trailing `if (counter ...) break;` becomes a
//! `limit`, and a membership test guarding an `add` becomes `distinct`.

use nova_hir::{AssignOp, BinaryOp, Body, Expr, ExprId, LocalId, LocalKind, Node, Stmt, StmtId, UnaryOp};

use crate::migration::collect::is_empty_collection_new;
use crate::operation::Operation;
use crate::patterns::{
    assignment, call_parts, flatten, incremented_local, pattern_bindings, single_jump,
    statement_expr,
};
use crate::pipeline::PipelineCall;
use crate::source::{Fragment, StreamSource};
use crate::MigrationContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalBlock {
    ops: Vec<Operation>,
    var: LocalId,
    statements: Vec<StmtId>,
}

impl TerminalBlock {
    /// Builds the block for the loop `source` was recognized from and peels
    /// every operation it can.
    pub fn from(cx: MigrationContext<'_>, source: StreamSource) -> TerminalBlock {
        let statements = cx
            .body
            .stmt(source.loop_stmt)
            .loop_body()
            .map(|body| flatten(cx.body, body))
            .unwrap_or_default();
        let block = TerminalBlock {
            var: source.var,
            ops: vec![Operation::Source(source)],
            statements,
        }
        .extract_all(cx);
        let block = block.extract_limit(cx).unwrap_or(block);
        let block = block.extract_distinct(cx).unwrap_or(block);
        tracing::debug!(
            target = "nova.stream_migration",
            operations = block.ops.len(),
            remaining = block.statements.len(),
            "peeled loop body"
        );
        block
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// The variable holding the current stream element.
    pub fn var(&self) -> LocalId {
        self.var
    }

    pub fn statements(&self) -> &[StmtId] {
        &self.statements
    }

    pub fn source(&self) -> &StreamSource {
        match &self.ops[0] {
            Operation::Source(source) => source,
            _ => unreachable!("a terminal block always starts with its source"),
        }
    }

    /// The loop statement the whole pipeline replaces.
    pub fn main_loop(&self) -> StmtId {
        self.source().loop_stmt
    }

    pub fn has_operations(&self) -> bool {
        self.ops.len() > 1
    }

    pub fn last_operation(&self) -> &Operation {
        &self.ops[self.ops.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn single_statement(&self) -> Option<StmtId> {
        match self.statements.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn single_expression(&self, body: &Body) -> Option<ExprId> {
        statement_expr(body, self.single_statement()?)
    }

    pub fn single_method_call(&self, body: &Body) -> Option<ExprId> {
        self.single_expression(body)
            .filter(|e| matches!(body.expr(*e), Expr::Call { .. }))
    }

    /// The compared expression of a `limit` whose counter stays in the code.
    pub fn count_expression(&self) -> Option<ExprId> {
        match self.last_operation() {
            Operation::Limit {
                count,
                counter: None,
                ..
            } => Some(*count),
            _ => None,
        }
    }

    pub fn is_referenced_in_operations(&self, body: &Body, local: LocalId) -> bool {
        self.intermediate_and_source_expressions()
            .into_iter()
            .any(|e| body.is_referenced(local, Node::Expr(e)))
    }

    pub fn intermediate_and_source_expressions(&self) -> Vec<ExprId> {
        self.ops.iter().flat_map(Operation::expressions).collect()
    }

    /// Whether `expr` reads any stream element variable of this block.
    pub fn depends_on(&self, body: &Body, expr: ExprId) -> bool {
        self.ops
            .iter()
            .map(Operation::var)
            .chain([self.var])
            .any(|var| body.is_referenced(var, Node::Expr(expr)))
    }

    /// The stream expression for the operations, without a terminal call.
    pub fn generate(&self, body: &Body) -> PipelineCall {
        let mut call = self.source().render(body);
        for op in &self.ops[1..] {
            op.render(body, &mut call);
        }
        call
    }

    /// A copy without the last operation, keeping variable and statements.
    #[must_use]
    pub fn without_last_operation(&self) -> TerminalBlock {
        let mut ops = self.ops.clone();
        if ops.len() > 1 {
            ops.pop();
        }
        TerminalBlock {
            ops,
            var: self.var,
            statements: self.statements.clone(),
        }
    }

    fn with(&self, op: Operation, var: LocalId, statements: Vec<StmtId>) -> TerminalBlock {
        let mut ops = self.ops.clone();
        ops.push(op);
        TerminalBlock {
            ops,
            var,
            statements,
        }
    }

    fn replace_last(&self, op: Operation) -> TerminalBlock {
        let mut ops = self.ops.clone();
        if let Some(last) = ops.last_mut() {
            *last = op;
        }
        TerminalBlock {
            ops,
            var: self.var,
            statements: self.statements.clone(),
        }
    }

    fn extract_all(self, cx: MigrationContext<'_>) -> TerminalBlock {
        let mut block = self;
        while let Some(next) = block.extract_operation(cx) {
            block = next;
        }
        block
    }

    fn extract_operation(&self, cx: MigrationContext<'_>) -> Option<TerminalBlock> {
        self.extract_filter(cx)
            .or_else(|| self.extract_flat_map(cx))
            .or_else(|| self.extract_take_while(cx))
            .or_else(|| self.extract_map_declaration(cx))
            .or_else(|| self.extract_map_reassignment(cx))
    }

    // if (cond) { ... }   or   if (cond) continue; ...
    fn extract_filter(&self, cx: MigrationContext<'_>) -> Option<TerminalBlock> {
        let body = cx.body;
        if let [single] = self.statements.as_slice() {
            if let Stmt::If {
                condition,
                then_branch,
                else_branch: None,
                ..
            } = body.stmt(*single)
            {
                return self.with_filter(body, *condition, false, flatten(body, *then_branch));
            }
        }
        let (first, rest) = self.statements.split_first()?;
        let Stmt::If {
            condition,
            then_branch,
            else_branch,
            ..
        } = body.stmt(*first)
        else {
            return None;
        };
        let jump = single_jump(body, *then_branch)?;
        if !matches!(body.stmt(jump), Stmt::Continue { label: None, .. }) {
            return None;
        }
        let mut statements = else_branch.map(|e| flatten(body, e)).unwrap_or_default();
        statements.extend_from_slice(rest);
        self.with_filter(body, *condition, true, statements)
    }

    fn with_filter(
        &self,
        body: &Body,
        condition: ExprId,
        negated: bool,
        statements: Vec<StmtId>,
    ) -> Option<TerminalBlock> {
        let filter = Operation::Filter {
            condition,
            var: self.var,
            negated,
        };
        let used_bindings: Vec<(ExprId, LocalId)> = pattern_bindings(body, condition)
            .into_iter()
            .filter(|(_, binding)| references_any(body, *binding, &statements))
            .collect();
        match used_bindings.as_slice() {
            [] => Some(self.with(filter, self.var, statements)),
            [(instance_of, binding)] => {
                let Expr::InstanceOf { expr, ty, .. } = body.expr(*instance_of) else {
                    return None;
                };
                if !body.is_reference_to(*expr, self.var) || references_any(body, self.var, &statements) {
                    return None;
                }
                let cast = Operation::Map {
                    expr: Fragment::Text(format!("({ty}) {}", body.local(self.var).name)),
                    var: self.var,
                    ty: body.local_type(*binding),
                    out: *binding,
                };
                let filtered = self.with(filter, self.var, Vec::new());
                Some(filtered.with(cast, *binding, statements))
            }
            _ => None,
        }
    }

    // for (...) { for (T inner : src) { ... } }
    fn extract_flat_map(&self, cx: MigrationContext<'_>) -> Option<TerminalBlock> {
        let body = cx.body;
        let [single] = self.statements.as_slice() else {
            return None;
        };
        let nested_body = body.stmt(*single).loop_body()?;
        let source = StreamSource::try_create(body, *single, cx.level)?;
        let statements = flatten(body, nested_body);
        if !body.is_referenced(self.var, Node::Stmt(nested_body)) {
            let inner_var = source.var;
            return Some(self.with(
                Operation::FlatMap {
                    source,
                    var: self.var,
                },
                inner_var,
                statements,
            ));
        }

        // The outer element is still needed: a nested search that breaks on
        // the first match becomes `anyMatch` inside a filter.
        let nested = TerminalBlock {
            var: source.var,
            ops: vec![Operation::Source(source.clone())],
            statements,
        };
        let filtered = nested.extract_filter(cx)?;
        let [_, Operation::Filter {
            condition, negated, ..
        }] = filtered.ops.as_slice()
        else {
            return None;
        };
        let (last, rest) = filtered.statements.split_last()?;
        if !matches!(body.stmt(*last), Stmt::Break { .. })
            || !nova_flow::statement_breaks_loop(body, *last, source.loop_stmt)
            || references_any(body, source.var, rest)
        {
            return None;
        }
        Some(self.with(
            Operation::CompoundFilter {
                condition: *condition,
                negated: *negated,
                var: self.var,
                source,
            },
            self.var,
            rest.to_vec(),
        ))
    }

    // if (cond) break; ...
    fn extract_take_while(&self, cx: MigrationContext<'_>) -> Option<TerminalBlock> {
        let body = cx.body;
        if !cx.level.supports_take_while() {
            return None;
        }
        let (first, rest) = self.statements.split_first()?;
        let Stmt::If {
            condition,
            then_branch,
            else_branch: None,
            ..
        } = body.stmt(*first)
        else {
            return None;
        };
        let jump = single_jump(body, *then_branch)?;
        if !matches!(body.stmt(jump), Stmt::Break { .. })
            || !nova_flow::statement_breaks_loop(body, jump, self.main_loop())
        {
            return None;
        }
        if pattern_bindings(body, *condition)
            .iter()
            .any(|(_, binding)| references_any(body, *binding, rest))
        {
            return None;
        }
        Some(self.with(
            Operation::TakeWhile {
                condition: *condition,
                var: self.var,
            },
            self.var,
            rest.to_vec(),
        ))
    }

    // T mapped = f(x); ...
    fn extract_map_declaration(&self, cx: MigrationContext<'_>) -> Option<TerminalBlock> {
        let body = cx.body;
        let (first, rest) = self.statements.split_first()?;
        let Stmt::LocalVar { locals, .. } = body.stmt(*first) else {
            return None;
        };
        let [local] = locals.as_slice() else {
            return None;
        };
        let initializer = body.local(*local).initializer?;
        let ty = body.local_type(*local);
        if !ty.is_stream_eligible() || references_any(body, self.var, rest) {
            return None;
        }
        Some(self.with(
            Operation::Map {
                expr: Fragment::Expr(initializer),
                var: self.var,
                ty,
                out: *local,
            },
            *local,
            rest.to_vec(),
        ))
    }

    // x = f(x); ...
    fn extract_map_reassignment(&self, cx: MigrationContext<'_>) -> Option<TerminalBlock> {
        let body = cx.body;
        let (first, rest) = self.statements.split_first()?;
        let (op, lhs, rhs) = assignment(body, statement_expr(body, *first)?)?;
        if op != AssignOp::Assign
            || !body.is_reference_to(lhs, self.var)
            || !self.ops.iter().all(|op| op.can_reassign_variable(self.var))
        {
            return None;
        }
        Some(self.with(
            Operation::Map {
                expr: Fragment::Expr(rhs),
                var: self.var,
                ty: body.local_type(self.var),
                out: self.var,
            },
            self.var,
            rest.to_vec(),
        ))
    }

    fn breaks_main_loop(&self, body: &Body, stmt: StmtId) -> bool {
        matches!(body.stmt(stmt), Stmt::Break { .. })
            && nova_flow::statement_breaks_loop(body, stmt, self.main_loop())
    }

    fn extract_limit(&self, cx: MigrationContext<'_>) -> Option<TerminalBlock> {
        let body = cx.body;
        // ...; if (count >= limit) break;
        if let Some((last, rest)) = self.statements.split_last() {
            if let Stmt::If {
                condition,
                then_branch,
                else_branch: None,
                ..
            } = body.stmt(*last)
            {
                if let Some(jump) = single_jump(body, *then_branch) {
                    if self.breaks_main_loop(body, jump) {
                        return self.with_limit(cx, *condition, rest.to_vec());
                    }
                }
            }
        }
        // the whole body was `if (count >= limit) break;`
        if let (
            Operation::Filter {
                condition,
                var,
                negated: false,
            },
            [only],
        ) = (self.last_operation(), self.statements.as_slice())
        {
            if *var == self.var && self.breaks_main_loop(body, *only) {
                let mut without = self.without_last_operation();
                without.statements.clear();
                return without.with_limit(cx, *condition, Vec::new());
            }
        }
        None
    }

    fn with_limit(
        &self,
        cx: MigrationContext<'_>,
        condition: ExprId,
        statements: Vec<StmtId>,
    ) -> Option<TerminalBlock> {
        let body = cx.body;
        let Expr::Binary { op, lhs, rhs, .. } = body.expr(body.skip_parens(condition)) else {
            return None;
        };
        let (count, limit, op) = [(*lhs, *rhs, *op), (*rhs, *lhs, flip(*op))]
            .into_iter()
            .find(|(_, limit, op)| {
                matches!(op, BinaryOp::Eq | BinaryOp::Ge | BinaryOp::Gt)
                    && self.is_loop_invariant(body, *limit)
            })?;
        let count_expr = body.skip_parens(count);
        let increment = incremented_local(body, count_expr).map(|local| {
            let post = matches!(body.expr(count_expr), Expr::Unary { op: UnaryOp::PostInc, .. });
            (post, local)
        });
        if increment.is_none() && !self.is_element_count(body, count_expr) {
            return None;
        }
        let mut delta = i64::from(op == BinaryOp::Gt);
        if matches!(increment, Some((true, _))) {
            delta += 1;
        }
        let counter = increment
            .map(|(_, local)| local)
            .filter(|local| self.is_dedicated_counter(body, *local));
        let block = self.with(
            Operation::Limit {
                var: self.var,
                count,
                limit,
                counter,
                delta,
            },
            self.var,
            statements,
        );
        Some(if counter.is_some() {
            block.extract_all(cx)
        } else {
            block
        })
    }

    fn is_loop_invariant(&self, body: &Body, expr: ExprId) -> bool {
        let main_loop = Node::Stmt(self.main_loop());
        body.is_side_effect_free(expr)
            && body.referenced_locals(Node::Expr(expr)).into_iter().all(|local| {
                local != self.var
                    && self.ops.iter().all(|op| op.var() != local)
                    && body.writes(local, main_loop).is_empty()
            })
    }

    /// A value that grows by one per element reaching the break: a local
    /// counter only ever incremented by one inside the loop, or the `size()`
    /// of a local collection.
    fn is_element_count(&self, body: &Body, count: ExprId) -> bool {
        if let Some((Some(receiver), "size", [])) = call_parts(body, count) {
            return body.as_local(receiver).is_some();
        }
        let Some(local) = body.as_local(count) else {
            return false;
        };
        if body.local(local).kind != LocalKind::Local {
            return false;
        }
        let writes = body.writes(local, Node::Stmt(self.main_loop()));
        !writes.is_empty()
            && writes.iter().all(|write| {
                body.write_of(*write)
                    .is_some_and(|w| incremented_local(body, w) == Some(local))
            })
    }

    /// A zero-initialized local used only as the limit counter.
    fn is_dedicated_counter(&self, body: &Body, local: LocalId) -> bool {
        let data = body.local(local);
        data.kind == LocalKind::Local
            && data.initializer.is_some_and(|init| body.constant_int(init) == Some(0))
            && body.all_references(local).len() == 1
            && is_sole_declarator(body, local)
    }

    fn extract_distinct(&self, cx: MigrationContext<'_>) -> Option<TerminalBlock> {
        let body = cx.body;
        let Operation::Filter {
            condition,
            var,
            negated,
        } = self.last_operation()
        else {
            return None;
        };
        if *var != self.var {
            return None;
        }
        let (Some(target), "add", [added]) = call_parts(body, self.single_expression(body)?)? else {
            return None;
        };
        let target = body.as_local(target)?;
        if !body.is_reference_to(*added, self.var) || !self.is_fresh_collection(body, target) {
            return None;
        }

        let condition = body.skip_parens(*condition);
        let contains = if *negated {
            Some(condition)
        } else {
            match body.expr(condition) {
                Expr::Unary {
                    op: UnaryOp::Not,
                    operand,
                    ..
                } => Some(body.skip_parens(*operand)),
                _ => None,
            }
        };
        if let Some((Some(receiver), "contains", [arg])) = contains.and_then(|c| call_parts(body, c)) {
            if body.is_reference_to(receiver, target) && body.is_reference_to(*arg, self.var) {
                return Some(self.replace_last(Operation::Distinct {
                    var: self.var,
                    helper: None,
                }));
            }
        }

        // if (seen.add(x)) result.add(x);
        if *negated {
            return None;
        }
        let (Some(receiver), "add", [arg]) = call_parts(body, condition)? else {
            return None;
        };
        let helper = body.as_local(receiver)?;
        if helper == target
            || !body.is_reference_to(*arg, self.var)
            || body.all_references(helper).len() != 1
            || !is_sole_declarator(body, helper)
            || !body
                .local(helper)
                .initializer
                .is_some_and(|init| is_empty_collection_new(body, init, Some("HashSet")))
        {
            return None;
        }
        Some(self.replace_last(Operation::Distinct {
            var: self.var,
            helper: Some(helper),
        }))
    }

    fn is_fresh_collection(&self, body: &Body, local: LocalId) -> bool {
        body.local(local)
            .initializer
            .is_some_and(|init| is_empty_collection_new(body, init, None))
            && nova_flow::initializer_usage_status(body, local, self.main_loop())
                != nova_flow::InitializerUsageStatus::Unknown
    }
}

fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

pub(crate) fn references_any(body: &Body, local: LocalId, statements: &[StmtId]) -> bool {
    statements
        .iter()
        .any(|s| body.is_referenced(local, Node::Stmt(*s)))
}

/// Declared alone in its statement, so the whole statement can go.
pub(crate) fn is_sole_declarator(body: &Body, local: LocalId) -> bool {
    body.local(local)
        .decl
        .is_some_and(|decl| matches!(body.stmt(decl), Stmt::LocalVar { locals, .. } if locals.len() == 1))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::{block_for, method, stmt};

    use super::*;

    fn describe(body: &Body, block: &TerminalBlock) -> (String, Vec<String>) {
        let pipeline = block.generate(body).to_string();
        let rest = block
            .statements()
            .iter()
            .map(|s| body.stmt_text(*s).to_string())
            .collect();
        (pipeline, rest)
    }

    #[test]
    fn peels_filters_and_maps_in_order() {
        let body = method(
            "for (String s : list) {\n\
               if (s == null) continue;\n\
               String t = s.trim();\n\
               if (!t.isEmpty()) {\n\
                 int n = t.length();\n\
                 use(n);\n\
               }\n\
             }\n\
             return null;",
        );
        let block = block_for(&body, stmt(&body, "for (String"));
        assert_eq!(
            describe(&body, &block),
            (
                "list.stream().filter(s -> s != null).map(s -> s.trim()).filter(t -> !t.isEmpty()).mapToInt(t -> t.length())".to_string(),
                vec!["use(n);".to_string()]
            )
        );
    }

    #[test]
    fn nested_loop_without_outer_reference_becomes_flat_map() {
        let body = method(
            "java.util.List<java.util.List<String>> lists = null;\n\
             for (java.util.List<String> l : lists) { for (String s : l) { use(s); } }\n\
             return null;",
        );
        let block = block_for(&body, stmt(&body, "for (java.util.List"));
        assert_eq!(
            describe(&body, &block).0,
            "lists.stream().flatMap(l -> l.stream())"
        );
    }

    #[test]
    fn nested_search_with_break_becomes_compound_filter() {
        let body = method(
            "java.util.List<String> other = null;\n\
             for (String s : list) {\n\
               for (String o : other) {\n\
                 if (o.startsWith(s)) { use(s); break; }\n\
               }\n\
             }\n\
             return null;",
        );
        let block = block_for(&body, stmt(&body, "for (String s"));
        assert_eq!(
            describe(&body, &block),
            (
                "list.stream().filter(s -> other.stream().anyMatch(o -> o.startsWith(s)))".to_string(),
                vec!["use(s);".to_string()]
            )
        );
    }

    #[test]
    fn pattern_binding_adds_a_cast() {
        let body = method(
            "java.util.List<Object> objs = null;\n\
             for (Object o : objs) { if (o instanceof String str) { use(str); } }\n\
             return null;",
        );
        let block = block_for(&body, stmt(&body, "for (Object"));
        assert_eq!(
            describe(&body, &block).0,
            "objs.stream().filter(o -> o instanceof String).map(o -> (String) o)"
        );
    }

    #[test]
    fn twenty_nested_ifs_give_twenty_filters() {
        let mut text = String::from("for (String s : list) ");
        for i in 0..20 {
            text.push_str(&format!("if (s.length() != {i}) "));
        }
        text.push_str("use(s); return null;");
        let body = method(&text);
        let block = block_for(&body, stmt(&body, "for (String"));
        assert_eq!(block.operations().len(), 21);
        assert!(block.operations()[1..].iter().all(Operation::is_filter));
        assert_eq!(block.statements().len(), 1);
    }

    #[test]
    fn limit_delta_depends_on_operator_and_increment() {
        for (cmp, limit) in [
            ("++count >= 5", "5"),
            ("++count > 5", "6"),
            ("count++ >= 5", "6"),
            ("count++ > 5", "7"),
            ("++count == 5", "5"),
            ("5 <= ++count", "5"),
            ("5 < count++", "7"),
        ] {
            let body = method(&format!(
                "int count = 0;\n\
                 for (String s : list) {{ use(s); if ({cmp}) break; }}\n\
                 return null;"
            ));
            let block = block_for(&body, stmt(&body, "for (String"));
            assert_eq!(
                describe(&body, &block),
                (
                    format!("list.stream().limit({limit})"),
                    vec!["use(s);".to_string()]
                ),
                "{cmp}"
            );
            assert_eq!(block.count_expression(), None, "{cmp}");
        }
    }

    #[test]
    fn shared_counter_stays_as_count_expression() {
        let body = method(
            "int count = 0;\n\
             for (String s : list) { count++; if (count >= 10) break; }\n\
             return count;",
        );
        let block = block_for(&body, stmt(&body, "for (String"));
        let count = block.count_expression().expect("a count expression");
        assert_eq!(body.expr_text(count), "count");
        assert_eq!(
            describe(&body, &block),
            ("list.stream().limit(10)".to_string(), vec!["count++;".to_string()])
        );
    }

    #[test]
    fn break_on_element_value_is_not_a_limit() {
        for cond in ["s.length() > 5", "s.length() >= limit", "flag"] {
            let body = method(&format!(
                "int limit = 3;\n\
                 for (String s : list) {{ use(s); if ({cond}) break; }}\n\
                 return null;"
            ));
            let block = block_for(&body, stmt(&body, "for (String"));
            assert!(
                !block
                    .operations()
                    .iter()
                    .any(|op| matches!(op, Operation::Limit { .. })),
                "{cond}"
            );
            assert_eq!(block.count_expression(), None, "{cond}");
        }
    }

    #[test]
    fn size_of_local_collection_is_a_limit() {
        let body = method(
            "java.util.List<String> r = new java.util.ArrayList<>();\n\
             for (String s : list) { r.add(s); if (r.size() >= 10) break; }\n\
             return r;",
        );
        let block = block_for(&body, stmt(&body, "for (String"));
        let count = block.count_expression().expect("a count expression");
        assert_eq!(body.expr_text(count), "r.size()");
    }

    #[test]
    fn membership_tests_become_distinct() {
        let body = method(
            "java.util.List<String> result = new java.util.ArrayList<>();\n\
             for (String s : list) { if (!result.contains(s)) result.add(s); }\n\
             return result;",
        );
        let block = block_for(&body, stmt(&body, "for (String"));
        assert_eq!(describe(&body, &block).0, "list.stream().distinct()");

        let body = method(
            "java.util.Set<String> seen = new java.util.HashSet<>();\n\
             java.util.List<String> result = new java.util.ArrayList<>();\n\
             for (String s : list) { if (seen.add(s)) result.add(s); }\n\
             return result;",
        );
        let block = block_for(&body, stmt(&body, "for (String"));
        assert!(matches!(
            block.last_operation(),
            Operation::Distinct { helper: Some(_), .. }
        ));
    }

    #[test]
    fn take_while_needs_java_9() {
        let text = "for (String s : list) { if (s.isEmpty()) break; use(s); } return null;";
        let body = method(text);
        let loop_stmt = stmt(&body, "for (String");
        let block = block_for(&body, loop_stmt);
        assert_eq!(block.operations().len(), 1);

        let source = StreamSource::try_create(&body, loop_stmt, nova_syntax::JavaLanguageLevel::JAVA_9)
            .expect("a source");
        let cx = MigrationContext {
            body: &body,
            level: nova_syntax::JavaLanguageLevel::JAVA_9,
        };
        let block = TerminalBlock::from(cx, source);
        assert_eq!(
            describe(&body, &block).0,
            "list.stream().takeWhile(s -> !s.isEmpty())"
        );
    }
}
