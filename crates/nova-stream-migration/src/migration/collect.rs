//! `collect(...)` terminals: filling a collection or a map, grouping, and
//! the statements right after the loop that post-process the filled result.
//!
//! A fresh target (a local initialized with an empty `new`) gets its
//! initializer replaced by the pipeline. A target that already exists gets
//! `target.addAll(<pipeline>)`. After a fresh collection, the next
//! statements may sort it, copy it into an array, copy it into another
//! collection or wrap it unmodifiable; each is folded into the pipeline
//! when the target is used nowhere else.

use nova_flow::{initializer_usage_status, InitializerUsageStatus};
use nova_hir::{AssignOp, BinaryOp, Body, Expr, ExprId, LambdaBody, LiteralKind, LocalId, LocalKind, Node, Stmt, StmtId};
use nova_types::{JavaType, PrimitiveType};

use crate::edit::TextEdit;
use crate::patterns::{assignment, call_parts, is_static_call, statement_expr, unique_name};
use crate::pipeline::{lambda, map_step, stream_primitive, PipelineCall, PipelineStep};
use crate::rewrite::{is_used_outside, Rewriter};
use crate::terminal_block::{is_sole_declarator, TerminalBlock};
use crate::{MigrateError, MigrationContext};

const COLLECTION_CLASSES: &[&str] = &[
    "ArrayList",
    "LinkedList",
    "ArrayDeque",
    "HashSet",
    "LinkedHashSet",
    "TreeSet",
];
const MAP_CLASSES: &[&str] = &["HashMap", "LinkedHashMap", "TreeMap"];
const LIST_CLASSES: &[&str] = &["ArrayList", "LinkedList"];
const SET_CLASSES: &[&str] = &["HashSet", "LinkedHashSet", "TreeSet"];

/// `java.util.TreeSet<String>` is `TreeSet`.
fn simple_class_name(ty: &str) -> &str {
    let raw = raw_type(ty);
    raw.rsplit('.').next().unwrap_or(raw)
}

/// The type text without its type arguments.
fn raw_type(ty: &str) -> &str {
    ty.split('<').next().unwrap_or(ty).trim()
}

fn new_parts(body: &Body, expr: ExprId) -> Option<(&str, &[ExprId])> {
    match body.expr(body.skip_parens(expr)) {
        Expr::New {
            ty,
            args,
            members: None,
            ..
        } => Some((ty.as_str(), args.as_slice())),
        _ => None,
    }
}

/// An `int` capacity, which does not change what the collection holds.
fn is_capacity(body: &Body, arg: ExprId) -> bool {
    body.type_of(arg).as_primitive() == Some(PrimitiveType::Int)
}

fn is_comparator(body: &Body, arg: ExprId) -> bool {
    let text = body.expr_text(arg);
    matches!(
        body.expr(body.skip_parens(arg)),
        Expr::Lambda { .. } | Expr::MethodRef { .. }
    ) || body.type_of(arg).is_class("Comparator")
        || text.starts_with("Comparator.")
        || text.starts_with("Collections.reverseOrder")
        || text == "String.CASE_INSENSITIVE_ORDER"
}

/// `new X<>()` of a known collection or map class, optionally only of
/// `class`. A capacity, or the comparator of a sorted collection, may be
/// passed; anything else could pre-fill the collection.
pub(crate) fn is_empty_collection_new(body: &Body, expr: ExprId, class: Option<&str>) -> bool {
    let Some((ty, args)) = new_parts(body, expr) else {
        return false;
    };
    let name = simple_class_name(ty);
    if class.is_some_and(|class| class != name)
        || !(COLLECTION_CLASSES.contains(&name) || MAP_CLASSES.contains(&name))
    {
        return false;
    }
    match args {
        [] => true,
        [arg] if name.starts_with("Tree") => is_comparator(body, *arg),
        [arg] => is_capacity(body, *arg),
        _ => false,
    }
}

/// Steps that make a stream hold what a collection of `class` would.
fn intermediate_steps(class: &str) -> Vec<PipelineStep> {
    match class {
        "HashSet" | "LinkedHashSet" => vec![PipelineStep::new("distinct", Vec::new())],
        "TreeSet" => vec![
            PipelineStep::new("distinct", Vec::new()),
            PipelineStep::new("sorted", Vec::new()),
        ],
        _ => Vec::new(),
    }
}

fn supplier(body: &Body, ty: &str, args: &[ExprId]) -> String {
    let raw = raw_type(ty);
    match args {
        [] => format!("{raw}::new"),
        [arg] if is_capacity(body, *arg) => format!("{raw}::new"),
        _ => {
            let args: Vec<&str> = args.iter().map(|a| body.expr_text(*a)).collect();
            format!("() -> new {raw}<>({})", args.join(", "))
        }
    }
}

/// Collector into a collection created like `new ty(args)`, assigned to a
/// variable of type `declared`.
fn collection_collector(body: &Body, ty: &str, args: &[ExprId], declared: Option<&JavaType>) -> String {
    let class = simple_class_name(ty);
    let declared = declared.and_then(|d| d.class_name());
    if args.is_empty() {
        match (class, declared) {
            ("ArrayList", Some("List" | "Collection" | "Iterable")) => {
                return "Collectors.toList()".to_string()
            }
            ("HashSet", Some("Set" | "Collection" | "Iterable")) => return "Collectors.toSet()".to_string(),
            _ => {}
        }
    }
    format!("Collectors.toCollection({})", supplier(body, ty, args))
}

/// A map supplier, unless a plain `HashMap` stands behind a `Map`.
fn map_supplier(body: &Body, ty: &str, args: &[ExprId], declared: &JavaType) -> Option<String> {
    let plain = simple_class_name(ty) == "HashMap" && args.is_empty() && declared.is_class("Map");
    (!plain).then(|| supplier(body, ty, args))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    /// `put`: the later value wins.
    Replace,
    /// `putIfAbsent`: the first value wins.
    Keep,
    /// `merge(k, v, fn)`.
    Function(ExprId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Accumulation {
    /// `target.add(element)`.
    Add { element: ExprId },
    /// `target.addAll(collection)`.
    AddAllCollection { collection: ExprId },
    /// `Collections.addAll(target, elements...)`.
    AddAllElements { elements: Vec<ExprId> },
    /// `target.put(key, value)` and friends.
    ToMap { key: ExprId, value: ExprId, merge: Merge },
    /// `target.computeIfAbsent(key, k -> new X<>()).add(value)`, or the same
    /// spelled with a holder variable.
    Group {
        key: ExprId,
        value: ExprId,
        factory: ExprId,
    },
}

impl Accumulation {
    fn is_collection(&self) -> bool {
        matches!(
            self,
            Accumulation::Add { .. }
                | Accumulation::AddAllCollection { .. }
                | Accumulation::AddAllElements { .. }
        )
    }

    fn expressions(&self) -> Vec<ExprId> {
        match self {
            Accumulation::Add { element } => vec![*element],
            Accumulation::AddAllCollection { collection } => vec![*collection],
            Accumulation::AddAllElements { elements } => elements.clone(),
            Accumulation::ToMap { key, value, merge } => {
                let mut out = vec![*key, *value];
                if let Merge::Function(f) = merge {
                    out.push(*f);
                }
                out
            }
            Accumulation::Group { key, value, .. } => vec![*key, *value],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// A local initialized with the empty `init`; the pipeline becomes its value.
    Fresh {
        local: LocalId,
        init: ExprId,
        status: InitializerUsageStatus,
    },
    /// A collection that already holds elements, or is not a local.
    Existing { receiver: ExprId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sort {
    stmt: StmtId,
    comparator: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RecreateKind {
    /// `target.toArray(new T[0])`; `None` for the untyped `toArray()`.
    ToArray { array_type: Option<String> },
    /// `new X<>(target)`.
    Copy { ty: String },
    /// `Collections.unmodifiableList(target)` and friends.
    Unmodifiable { collector: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Recreate {
    /// The statement handing the recreated value on.
    stmt: StmtId,
    /// The expression the pipeline replaces.
    expr: ExprId,
    kind: RecreateKind,
    /// The type of the variable receiving the recreated value, if any.
    declared: Option<JavaType>,
    /// The local declared by `stmt` alone, which later wrappers may use.
    local: Option<LocalId>,
}

/// A statement after the loop folded into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Wrapper {
    Sort(Sort),
    Recreate(Recreate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CollectTerminal {
    target: Target,
    accumulation: Accumulation,
    /// In statement order. Only a copy into a new local is followed by more.
    wrappers: Vec<Wrapper>,
}

impl CollectTerminal {
    /// Whether the pipeline says nothing a plain loop would not: the loop
    /// variable itself is added, with no operation or wrapper around it.
    pub(crate) fn is_trivial(&self, body: &Body, tb: &TerminalBlock) -> bool {
        !tb.has_operations()
            && self.wrappers.is_empty()
            && matches!(self.accumulation, Accumulation::Add { element } if body.is_reference_to(element, tb.var()))
    }

    pub(crate) fn method_name(&self) -> &'static str {
        match self.final_recreate() {
            Some(Recreate {
                kind: RecreateKind::ToArray { .. },
                ..
            }) => "toArray",
            _ => "collect",
        }
    }

    /// The last recreation, whose value the pipeline produces.
    fn final_recreate(&self) -> Option<&Recreate> {
        self.wrappers.iter().rev().find_map(|wrapper| match wrapper {
            Wrapper::Recreate(recreate) => Some(recreate),
            Wrapper::Sort(_) => None,
        })
    }

    fn init_class<'b>(&self, body: &'b Body) -> Option<(&'b str, &'b [ExprId])> {
        match self.target {
            Target::Fresh { init, .. } => new_parts(body, init),
            Target::Existing { .. } => None,
        }
    }

    fn render(&self, tb: &TerminalBlock, body: &Body) -> Result<String, MigrateError> {
        let var = tb.var();
        let name = &body.local(var).name;
        let var_type = body.local_type(var);
        let mut stream = tb.generate(body);

        match &self.accumulation {
            Accumulation::Add { element } => stream.extend(map_step(
                name,
                &var_type,
                &self.element_type(body),
                body.expr_text(*element),
                body.is_reference_to(*element, var),
            )),
            Accumulation::AddAllCollection { collection } => {
                box_primitive(&mut stream, &var_type);
                let inner = format!("{}.stream()", body.text_at_precedence(*collection, 15));
                stream.push("flatMap", vec![lambda(name, &inner)]);
            }
            Accumulation::AddAllElements { elements } => {
                box_primitive(&mut stream, &var_type);
                let args: Vec<&str> = elements.iter().map(|e| body.expr_text(*e)).collect();
                let inner = format!("Stream.of({})", args.join(", "));
                stream.push("flatMap", vec![lambda(name, &inner)]);
            }
            Accumulation::ToMap { .. } | Accumulation::Group { .. } => {
                box_primitive(&mut stream, &var_type);
            }
        }
        let (local, init) = match self.target {
            Target::Existing { .. } => {
                stream.push("collect", vec!["Collectors.toList()".to_string()]);
                return Ok(stream.to_string());
            }
            Target::Fresh { local, init, .. } => (local, init),
        };
        let (ty, args) = new_parts(body, init).ok_or_else(|| {
            MigrateError::InvariantViolation(format!("`{}` is not a constructor call", body.expr_text(init)))
        })?;
        let mut class = simple_class_name(ty);
        let declared = body.local_type(local);

        for wrapper in &self.wrappers {
            match wrapper {
                Wrapper::Sort(sort) => {
                    let args = sort
                        .comparator
                        .map(|c| body.expr_text(c).to_string())
                        .into_iter()
                        .collect();
                    stream.push("sorted", args);
                }
                Wrapper::Recreate(Recreate {
                    kind: RecreateKind::Copy { ty: copy_ty },
                    ..
                }) => {
                    let copy_class = simple_class_name(copy_ty);
                    stream.extend(copy_steps(class, copy_class));
                    class = copy_class;
                }
                Wrapper::Recreate(_) => {}
            }
        }

        match self.final_recreate() {
            None => {
                let collector = match &self.accumulation {
                    Accumulation::ToMap { key, value, merge } => {
                        let supplier = map_supplier(body, ty, args, &declared);
                        to_map_collector(body, name, *key, *value, *merge, supplier, false)
                    }
                    Accumulation::Group {
                        key,
                        value,
                        factory,
                    } => group_collector(
                        body,
                        tb,
                        (*key, *value, *factory),
                        &declared,
                        map_supplier(body, ty, args, &declared),
                    )?,
                    _ => collection_collector(body, ty, args, Some(&declared)),
                };
                stream.push("collect", vec![collector]);
            }
            Some(recreate) => match &recreate.kind {
                RecreateKind::ToArray { array_type } => {
                    stream.extend(intermediate_steps(class));
                    let args = array_type.iter().map(|t| format!("{t}::new")).collect();
                    stream.push("toArray", args);
                }
                RecreateKind::Copy { ty: copy_ty } => {
                    stream.push(
                        "collect",
                        vec![collection_collector(body, copy_ty, &[], recreate.declared.as_ref())],
                    );
                }
                RecreateKind::Unmodifiable { collector } => {
                    let collector = match &self.accumulation {
                        Accumulation::ToMap { key, value, merge } => {
                            to_map_collector(body, name, *key, *value, *merge, None, true)
                        }
                        _ => {
                            if *collector == "toUnmodifiableList" {
                                stream.extend(intermediate_steps(class));
                            }
                            format!("Collectors.{collector}()")
                        }
                    };
                    stream.push("collect", vec![collector]);
                }
            },
        }
        Ok(stream.to_string())
    }

    /// The element type of the filled collection.
    fn element_type(&self, body: &Body) -> JavaType {
        match self.target {
            Target::Fresh { local, .. } => body.local_type(local).type_arg(0),
            Target::Existing { receiver } => body.type_of(receiver).type_arg(0),
        }
    }
}

/// Steps of `class` a copy into `copy_class` does not already imply.
fn copy_steps(class: &str, copy_class: &str) -> Vec<PipelineStep> {
    intermediate_steps(class)
        .into_iter()
        .filter(|step| match step.name.as_str() {
            "distinct" => !SET_CLASSES.contains(&copy_class),
            _ => !matches!(copy_class, "TreeSet" | "HashSet"),
        })
        .collect()
}

fn box_primitive(stream: &mut PipelineCall, ty: &JavaType) {
    if stream_primitive(ty).is_some() {
        stream.push("boxed", Vec::new());
    }
}

fn merge_function(body: &Body, merge: Merge) -> String {
    let a = unique_name(body, "a");
    let b = unique_name(body, "b");
    match merge {
        Merge::Replace => format!("({a}, {b}) -> {b}"),
        Merge::Keep => format!("({a}, {b}) -> {a}"),
        Merge::Function(f) => body.expr_text(f).to_string(),
    }
}

fn to_map_collector(
    body: &Body,
    var: &str,
    key: ExprId,
    value: ExprId,
    merge: Merge,
    supplier: Option<String>,
    unmodifiable: bool,
) -> String {
    let mut args = vec![
        lambda(var, body.expr_text(key)),
        lambda(var, body.expr_text(value)),
        merge_function(body, merge),
    ];
    if unmodifiable {
        return format!("Collectors.toUnmodifiableMap({})", args.join(", "));
    }
    args.extend(supplier);
    format!("Collectors.toMap({})", args.join(", "))
}

fn group_collector(
    body: &Body,
    tb: &TerminalBlock,
    group: (ExprId, ExprId, ExprId),
    map_type: &JavaType,
    supplier: Option<String>,
) -> Result<String, MigrateError> {
    let (key, value, factory) = group;
    let var = tb.var();
    let name = &body.local(var).name;
    let (ty, args) = new_parts(body, factory).ok_or_else(|| {
        MigrateError::InvariantViolation(format!("`{}` is not a constructor call", body.expr_text(factory)))
    })?;
    let mut downstream = collection_collector(body, ty, args, Some(&map_type.type_arg(1)));
    if !body.is_reference_to(value, var) {
        downstream = format!(
            "Collectors.mapping({}, {downstream})",
            lambda(name, body.expr_text(value))
        );
    }
    let mut parts = vec![lambda(name, body.expr_text(key))];
    parts.extend(supplier);
    parts.push(downstream);
    Ok(format!("Collectors.groupingBy({})", parts.join(", ")))
}

/// `m.computeIfAbsent(key, k -> new X<>())` with an empty collection factory.
fn compute_if_absent(body: &Body, expr: ExprId) -> Option<(ExprId, ExprId, ExprId)> {
    let (Some(map), "computeIfAbsent", [key, function]) = call_parts(body, expr)? else {
        return None;
    };
    let Expr::Lambda {
        body: LambdaBody::Expr(factory),
        params,
        ..
    } = body.expr(body.skip_parens(*function))
    else {
        return None;
    };
    if params.len() != 1 || !is_empty_collection_new(body, *factory, None) {
        return None;
    }
    let (ty, _) = new_parts(body, *factory)?;
    COLLECTION_CLASSES
        .contains(&simple_class_name(ty))
        .then_some((map, *key, *factory))
}

/// Recognizes the accumulating statements, returning the accumulated
/// receiver and what is accumulated.
fn match_accumulation(body: &Body, statements: &[StmtId]) -> Option<(ExprId, Accumulation, Option<LocalId>)> {
    match statements {
        [single] => {
            let call = statement_expr(body, *single)?;
            if is_static_call(body, call, "Collections", &["addAll"]) {
                let (_, _, [target, elements @ ..]) = call_parts(body, call)? else {
                    return None;
                };
                if elements.is_empty() {
                    return None;
                }
                return Some((
                    *target,
                    Accumulation::AddAllElements {
                        elements: elements.to_vec(),
                    },
                    None,
                ));
            }
            let (Some(receiver), name, args) = call_parts(body, call)? else {
                return None;
            };
            let accumulation = match (name, args) {
                ("add", [element]) => {
                    if let Some((map, key, factory)) = compute_if_absent(body, receiver) {
                        return Some((
                            map,
                            Accumulation::Group {
                                key,
                                value: *element,
                                factory,
                            },
                            None,
                        ));
                    }
                    Accumulation::Add { element: *element }
                }
                ("addAll", [collection]) => Accumulation::AddAllCollection {
                    collection: *collection,
                },
                ("put", [key, value]) => Accumulation::ToMap {
                    key: *key,
                    value: *value,
                    merge: Merge::Replace,
                },
                ("putIfAbsent", [key, value]) => Accumulation::ToMap {
                    key: *key,
                    value: *value,
                    merge: Merge::Keep,
                },
                ("merge", [key, value, function]) => Accumulation::ToMap {
                    key: *key,
                    value: *value,
                    merge: Merge::Function(*function),
                },
                _ => return None,
            };
            Some((receiver, accumulation, None))
        }
        // List<T> l = m.computeIfAbsent(k, x -> new ArrayList<>()); l.add(v);
        [decl, add] => {
            let holder = single_declared(body, *decl)?;
            let (map, key, factory) = compute_if_absent(body, body.local(holder).initializer?)?;
            let value = holder_add(body, *add, holder)?;
            Some((map, Accumulation::Group { key, value, factory }, None))
        }
        // List<T> l = m.get(k); if (l == null) { l = new ArrayList<>(); m.put(k, l); } l.add(v);
        [decl, check, add] => {
            let holder = single_declared(body, *decl)?;
            let (Some(map), "get", [key]) = call_parts(body, body.local(holder).initializer?)? else {
                return None;
            };
            let map_local = body.as_local(map)?;
            if !body.is_side_effect_free(*key) {
                return None;
            }
            let factory = null_check_creation(body, *check, holder, map_local, *key)?;
            let value = holder_add(body, *add, holder)?;
            Some((map, Accumulation::Group { key: *key, value, factory }, Some(holder)))
        }
        _ => None,
    }
}

fn single_declared(body: &Body, stmt: StmtId) -> Option<LocalId> {
    match body.stmt(stmt) {
        Stmt::LocalVar { locals, .. } => match locals.as_slice() {
            [only] => Some(*only),
            _ => None,
        },
        _ => None,
    }
}

/// `holder.add(value)` as the holder's only other use.
fn holder_add(body: &Body, stmt: StmtId, holder: LocalId) -> Option<ExprId> {
    let (Some(receiver), "add", [value]) = call_parts(body, statement_expr(body, stmt)?)? else {
        return None;
    };
    (body.is_reference_to(receiver, holder) && !body.is_referenced(holder, Node::Expr(*value))).then_some(*value)
}

/// `if (l == null) { l = new X<>(); m.put(k, l); }`, returning `new X<>()`.
fn null_check_creation(body: &Body, stmt: StmtId, holder: LocalId, map: LocalId, key: ExprId) -> Option<ExprId> {
    let Stmt::If {
        condition,
        then_branch,
        else_branch: None,
        ..
    } = body.stmt(stmt)
    else {
        return None;
    };
    let checked = crate::patterns::compared_with_null(body, *condition, BinaryOp::Eq)?;
    if !body.is_reference_to(checked, holder) {
        return None;
    }
    let [create, put] = body.statements_of(*then_branch)[..] else {
        return None;
    };
    let (AssignOp::Assign, lhs, factory) = assignment(body, statement_expr(body, create)?)? else {
        return None;
    };
    if !body.is_reference_to(lhs, holder) || !is_empty_collection_new(body, factory, None) {
        return None;
    }
    let (Some(receiver), "put", [put_key, put_value]) = call_parts(body, statement_expr(body, put)?)? else {
        return None;
    };
    (body.is_reference_to(receiver, map)
        && body.equivalent(*put_key, key)
        && body.is_reference_to(*put_value, holder))
    .then_some(factory)
}

/// Recognizes a collect terminal in what is left of the loop body.
///
/// `non_final` restricts the locals the loop may write; `None` skips the
/// check for a block that was already accepted.
pub(crate) fn extract_collect_terminal(
    cx: MigrationContext<'_>,
    tb: &TerminalBlock,
    non_final: Option<&[LocalId]>,
) -> Option<CollectTerminal> {
    let body = cx.body;
    let (receiver, accumulation, holder) = match_accumulation(body, tb.statements())?;
    let allowed: &[LocalId] = match &holder {
        Some(holder) => std::slice::from_ref(holder),
        None => &[],
    };
    if non_final.is_some_and(|locals| locals.iter().any(|l| !allowed.contains(l))) {
        return None;
    }
    if tb.depends_on(body, receiver) {
        return None;
    }

    let target = match body.as_local(receiver) {
        Some(local) => {
            let in_parts = accumulation
                .expressions()
                .into_iter()
                .any(|e| body.is_referenced(local, Node::Expr(e)));
            if in_parts || tb.is_referenced_in_operations(body, local) || Some(local) == holder {
                return None;
            }
            fresh_target(body, tb, local, &accumulation)
        }
        None => None,
    };
    let target = match target {
        Some(target) => target,
        // Only plain additions can go into a collection that already exists.
        None if accumulation.is_collection()
            && is_existing_receiver(body, receiver)
            && !reads_target(body, tb, &accumulation, receiver) =>
        {
            Target::Existing { receiver }
        }
        None => return None,
    };

    if let Some(count) = tb.count_expression() {
        // `if (result.size() >= limit) break;`
        let Target::Fresh { local, init, .. } = target else {
            return None;
        };
        let size_of_target = matches!(call_parts(body, count), Some((Some(r), "size", [])) if body.is_reference_to(r, local));
        let is_list = new_parts(body, init).is_some_and(|(ty, _)| LIST_CLASSES.contains(&simple_class_name(ty)));
        if !size_of_target || !is_list || !matches!(accumulation, Accumulation::Add { .. }) {
            return None;
        }
    }

    let mut terminal = CollectTerminal {
        target,
        accumulation,
        wrappers: Vec::new(),
    };
    attach_wrappers(cx, tb, &mut terminal);
    Some(terminal)
}

fn fresh_target(body: &Body, tb: &TerminalBlock, local: LocalId, accumulation: &Accumulation) -> Option<Target> {
    let data = body.local(local);
    let init = data.initializer?;
    if data.kind != LocalKind::Local || !is_empty_collection_new(body, init, None) {
        return None;
    }
    let (ty, _) = new_parts(body, init)?;
    let class = simple_class_name(ty);
    let fits = if accumulation.is_collection() {
        COLLECTION_CLASSES.contains(&class)
    } else {
        MAP_CLASSES.contains(&class)
    };
    let status = initializer_usage_status(body, local, tb.main_loop());
    (fits && status != InitializerUsageStatus::Unknown).then_some(Target::Fresh { local, init, status })
}

fn is_existing_receiver(body: &Body, receiver: ExprId) -> bool {
    match body.expr(body.skip_parens(receiver)) {
        Expr::Local { local, .. } => !body.local_type(*local).is_map(),
        Expr::Name { .. } => true,
        Expr::FieldAccess { receiver, .. } => matches!(body.expr(body.skip_parens(*receiver)), Expr::This { .. }),
        _ => false,
    }
}

/// Whether the pipeline or the added values read the collection being
/// filled. Additions only show up after `addAll`, so such reads would see
/// the collection as it was before the loop.
fn reads_target(body: &Body, tb: &TerminalBlock, accumulation: &Accumulation, receiver: ExprId) -> bool {
    let field = field_name(body, receiver);
    let mut found = false;
    let roots = tb.intermediate_and_source_expressions().into_iter().chain(accumulation.expressions());
    for root in roots {
        body.walk(Node::Expr(root), &mut |node| {
            if let Node::Expr(expr) = node {
                found |= body.equivalent(expr, receiver)
                    || field.is_some() && field_name(body, expr) == field;
            }
            !found
        });
        if found {
            return true;
        }
    }
    false
}

/// `name` or `this.name`.
fn field_name(body: &Body, expr: ExprId) -> Option<&str> {
    match body.expr(body.skip_parens(expr)) {
        Expr::Name { name, .. } => Some(name),
        Expr::FieldAccess { receiver, name, .. }
            if matches!(body.expr(body.skip_parens(*receiver)), Expr::This { .. }) =>
        {
            Some(name)
        }
        _ => None,
    }
}

/// Folds the statements after the loop that post-process a fresh target,
/// for as long as the next statement continues the chain.
fn attach_wrappers(cx: MigrationContext<'_>, tb: &TerminalBlock, terminal: &mut CollectTerminal) {
    let body = cx.body;
    let Target::Fresh { local, .. } = terminal.target else {
        return;
    };
    let Some((ty, _)) = terminal.init_class(body) else {
        return;
    };
    let mut class = simple_class_name(ty).to_string();
    let mut current = local;
    let loop_stmt = body.label_wrapped(tb.main_loop());
    let mut owners = vec![Node::Stmt(loop_stmt)];
    let mut next = body.next_statement(loop_stmt);

    while let Some(stmt) = next {
        if terminal.accumulation.is_collection() && LIST_CLASSES.contains(&class.as_str()) {
            if let Some(sort) = find_sort(body, stmt, current) {
                owners.push(Node::Stmt(sort.stmt));
                terminal.wrappers.push(Wrapper::Sort(sort));
                next = body.next_statement(stmt);
                continue;
            }
        }
        let Some(recreate) = find_recreate(cx, stmt, current, &class, &terminal.accumulation) else {
            return;
        };
        owners.push(Node::Expr(recreate.expr));
        if !is_sole_declarator(body, current) || is_used_outside(body, current, &owners) {
            return;
        }
        let follow = match (&recreate.kind, recreate.local) {
            (RecreateKind::Copy { ty }, Some(copy)) => Some((simple_class_name(ty).to_string(), copy)),
            _ => None,
        };
        terminal.wrappers.push(Wrapper::Recreate(recreate));
        let Some((copy_class, copy)) = follow else {
            return;
        };
        class = copy_class;
        current = copy;
        owners.clear();
        next = body.next_statement(stmt);
    }
}

/// `Collections.sort(r[, cmp])` or `r.sort(cmp)`.
fn find_sort(body: &Body, stmt: StmtId, target: LocalId) -> Option<Sort> {
    let call = statement_expr(body, stmt)?;
    let (receiver, name, args) = call_parts(body, call)?;
    let comparator = if is_static_call(body, call, "Collections", &["sort"]) {
        match args {
            [list] if body.is_reference_to(*list, target) => None,
            [list, cmp] if body.is_reference_to(*list, target) => Some(*cmp),
            _ => return None,
        }
    } else if name == "sort" && receiver.is_some_and(|r| body.is_reference_to(r, target)) {
        match args {
            [cmp] => Some(*cmp),
            _ => return None,
        }
    } else {
        return None;
    };
    let comparator = comparator.filter(|cmp| {
        !matches!(
            body.expr(body.skip_parens(*cmp)),
            Expr::Literal {
                kind: LiteralKind::Null,
                ..
            }
        )
    });
    if comparator.is_some_and(|cmp| body.is_referenced(target, Node::Expr(cmp))) {
        return None;
    }
    Some(Sort { stmt, comparator })
}

/// The value a statement hands on: a returned value, the right side of an
/// assignment, or the initializer of a lone declarator (with that local).
fn handed_on_value(body: &Body, stmt: StmtId) -> Option<(ExprId, Option<JavaType>, Option<LocalId>)> {
    match body.stmt(stmt) {
        Stmt::Return { expr: Some(expr), .. } => Some((*expr, None, None)),
        Stmt::Expr { expr, .. } => {
            let (AssignOp::Assign, lhs, rhs) = assignment(body, *expr)? else {
                return None;
            };
            Some((rhs, body.as_local(lhs).map(|l| body.local_type(l)), None))
        }
        Stmt::LocalVar { locals, .. } => match locals.as_slice() {
            [only] => Some((
                body.local(*only).initializer?,
                Some(body.local_type(*only)),
                Some(*only),
            )),
            _ => None,
        },
        _ => None,
    }
}

fn find_recreate(
    cx: MigrationContext<'_>,
    stmt: StmtId,
    target: LocalId,
    class: &str,
    accumulation: &Accumulation,
) -> Option<Recreate> {
    let body = cx.body;
    let (value, declared, local) = handed_on_value(body, stmt)?;
    let expr = body.skip_parens(value);

    let kind = if let Some((Some(receiver), "toArray", args)) = call_parts(body, expr) {
        if !body.is_reference_to(receiver, target) || !accumulation.is_collection() {
            return None;
        }
        let array_type = match args {
            [] => None,
            [array] => Some(array_type(body, *array, target)?),
            _ => return None,
        };
        RecreateKind::ToArray { array_type }
    } else if let Some((ty, [source])) = new_parts(body, expr) {
        let copy_class = simple_class_name(ty);
        if !body.is_reference_to(*source, target)
            || !accumulation.is_collection()
            || !COLLECTION_CLASSES.contains(&copy_class)
        {
            return None;
        }
        RecreateKind::Copy { ty: ty.to_string() }
    } else if is_static_call(
        body,
        expr,
        "Collections",
        &["unmodifiableList", "unmodifiableSet", "unmodifiableCollection", "unmodifiableMap"],
    ) {
        let (_, name, [wrapped]) = call_parts(body, expr)? else {
            return None;
        };
        if !cx.level.supports_unmodifiable_collectors() || !body.is_reference_to(*wrapped, target) {
            return None;
        }
        let collector = match name {
            "unmodifiableList" | "unmodifiableCollection"
                if LIST_CLASSES.contains(&class) && accumulation.is_collection() =>
            {
                "toUnmodifiableList"
            }
            "unmodifiableSet" if class == "HashSet" && accumulation.is_collection() => "toUnmodifiableSet",
            "unmodifiableMap" if class == "HashMap" && matches!(accumulation, Accumulation::ToMap { .. }) => {
                "toUnmodifiableMap"
            }
            _ => return None,
        };
        if matches!(
            accumulation,
            Accumulation::AddAllCollection { .. } | Accumulation::AddAllElements { .. }
        ) {
            return None;
        }
        RecreateKind::Unmodifiable { collector }
    } else {
        return None;
    };
    Some(Recreate {
        stmt,
        expr,
        kind,
        declared,
        local,
    })
}

/// `new T[0]` or `new T[r.size()]`, giving `T[]`.
fn array_type(body: &Body, array: ExprId, target: LocalId) -> Option<String> {
    let Expr::NewArray {
        elem_ty,
        dims,
        rank,
        initializer: None,
        ..
    } = body.expr(body.skip_parens(array))
    else {
        return None;
    };
    let [dim] = dims.as_slice() else {
        return None;
    };
    let sized = body.constant_int(*dim) == Some(0)
        || matches!(call_parts(body, *dim), Some((Some(r), "size", [])) if body.is_reference_to(r, target));
    sized.then(|| format!("{elem_ty}{}", "[]".repeat(*rank)))
}

pub(crate) fn migrate(cx: MigrationContext<'_>, tb: &TerminalBlock) -> Result<Vec<TextEdit>, MigrateError> {
    let body = cx.body;
    let terminal = extract_collect_terminal(cx, tb, None)
        .ok_or_else(|| MigrateError::InvariantViolation("loop no longer fills a collection".to_string()))?;
    let stream = terminal.render(tb, body)?;
    let loop_stmt = tb.main_loop();
    let mut rewriter = Rewriter::new(body);
    match terminal.target {
        Target::Existing { receiver } => {
            rewriter.replace_stmt(
                loop_stmt,
                format!("{}.addAll({stream});", body.text_at_precedence(receiver, 15)),
            );
        }
        Target::Fresh { local, status, .. } => {
            let last = terminal.final_recreate().map(|recreate| recreate.stmt);
            for wrapper in &terminal.wrappers {
                match wrapper {
                    Wrapper::Sort(sort) => rewriter.delete_stmt(sort.stmt),
                    Wrapper::Recreate(recreate) if Some(recreate.stmt) != last => rewriter.delete_stmt(recreate.stmt),
                    Wrapper::Recreate(_) => {}
                }
            }
            match terminal.final_recreate() {
                None => rewriter.replace_initializer(loop_stmt, local, &stream, status)?,
                Some(recreate) => {
                    rewriter.replace_expr(recreate.expr, stream);
                    rewriter.delete_stmt(loop_stmt);
                    rewriter.delete_local(local)?;
                }
            }
        }
    }
    rewriter.finish()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::{expr, method, rewrite, rewrite_with};
    use crate::{InspectionOptions, MigrationKind};

    use super::*;

    #[test]
    fn empty_collection_constructors() {
        let body = method(
            "Object a = new ArrayList<>(); Object b = new TreeSet<>(String.CASE_INSENSITIVE_ORDER); \
             Object c = new ArrayList<>(list); Object d = new HashMap<String, Integer>(16); \
             Object e = new ArrayList<>() {}; Object f = new StringBuilder();",
        );
        let check = |text: &str| is_empty_collection_new(&body, expr(&body, text), None);
        assert!(check("new ArrayList<>()"));
        assert!(check("new TreeSet<>(String.CASE_INSENSITIVE_ORDER)"));
        assert!(!check("new ArrayList<>(list)"));
        assert!(check("new HashMap<String, Integer>(16)"));
        assert!(!check("new StringBuilder()"));
        assert!(is_empty_collection_new(&body, expr(&body, "new ArrayList<>()"), Some("ArrayList")));
        assert!(!is_empty_collection_new(&body, expr(&body, "new ArrayList<>()"), Some("HashSet")));
    }

    #[test]
    fn filtered_add_becomes_to_list() {
        let (migration, out) = rewrite(
            "List<String> r = new ArrayList<>(); for (String s : list) { if (!s.isEmpty()) r.add(s); } return r;",
        )
        .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Collect);
        assert!(migration.should_warn);
        assert_eq!(
            out,
            "List<String> r = list.stream().filter(s -> !s.isEmpty()).collect(Collectors.toList()); return r;"
        );
    }

    #[test]
    fn sorted_set_keeps_its_class() {
        let (migration, out) = rewrite(
            "Set<String> r = new TreeSet<>(); for (String s : list) { r.add(s.trim()); } return r;",
        )
        .expect("migrates");
        assert!(migration.should_warn);
        assert_eq!(
            out,
            "Set<String> r = list.stream().map(s -> s.trim()).collect(Collectors.toCollection(TreeSet::new)); return r;"
        );
    }

    #[test]
    fn put_becomes_to_map_with_last_value_winning() {
        let (_, out) = rewrite(
            "Map<String, Integer> m = new HashMap<>(); for (String s : list) { m.put(s, s.length()); } return m;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "Map<String, Integer> m = list.stream().collect(Collectors.toMap(s -> s, s -> s.length(), (a, b) -> b)); return m;"
        );
    }

    #[test]
    fn linked_map_gets_a_supplier() {
        let (_, out) = rewrite(
            "Map<String, Integer> m = new LinkedHashMap<>(); for (String s : list) { m.putIfAbsent(s, 1); } return m;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "Map<String, Integer> m = list.stream().collect(Collectors.toMap(s -> s, s -> 1, (a, b) -> a, LinkedHashMap::new)); return m;"
        );
    }

    #[test]
    fn compute_if_absent_becomes_grouping_by() {
        let (_, out) = rewrite(
            "Map<Integer, List<String>> m = new HashMap<>(); \
             for (String s : list) { m.computeIfAbsent(s.length(), k -> new ArrayList<>()).add(s); } return m;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "Map<Integer, List<String>> m = list.stream().collect(Collectors.groupingBy(s -> s.length(), Collectors.toList())); return m;"
        );
    }

    #[test]
    fn legacy_null_check_grouping() {
        let (_, out) = rewrite(
            "Map<Integer, List<String>> m = new HashMap<>(); for (String s : list) { \
             List<String> l = m.get(s.length()); \
             if (l == null) { l = new ArrayList<>(); m.put(s.length(), l); } \
             l.add(s.trim()); } return m;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "Map<Integer, List<String>> m = list.stream().collect(Collectors.groupingBy(s -> s.length(), \
             Collectors.mapping(s -> s.trim(), Collectors.toList()))); return m;"
        );
    }

    #[test]
    fn sort_and_to_array_chain_into_the_pipeline() {
        let (migration, out) = rewrite(
            "List<String> r = new ArrayList<>(); for (String s : list) { if (s.isEmpty()) continue; r.add(s); } \
             Collections.sort(r); return r.toArray(new String[0]);",
        )
        .expect("migrates");
        assert_eq!(migration.replacement, "toArray");
        assert_eq!(
            out,
            "return list.stream().filter(s -> !s.isEmpty()).sorted().toArray(String[]::new);"
        );
    }

    #[test]
    fn later_use_blocks_to_array_but_keeps_sort() {
        let (migration, out) = rewrite(
            "List<String> r = new ArrayList<>(); for (String s : list) { if (s.isEmpty()) continue; r.add(s); } \
             Collections.sort(r, Comparator.reverseOrder()); String[] a = r.toArray(new String[0]); \
             System.out.println(r); return a;",
        )
        .expect("migrates");
        assert_eq!(migration.replacement, "collect");
        assert_eq!(
            out,
            "List<String> r = list.stream().filter(s -> !s.isEmpty()).sorted(Comparator.reverseOrder()).collect(Collectors.toList()); \
             String[] a = r.toArray(new String[0]); System.out.println(r); return a;"
        );
    }

    #[test]
    fn copy_into_hash_set_drops_distinct() {
        let (_, out) = rewrite(
            "Set<String> r = new HashSet<>(); for (String s : list) { if (s.isEmpty()) continue; r.add(s); } \
             Set<String> copy = new HashSet<>(r); return copy;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "Set<String> copy = list.stream().filter(s -> !s.isEmpty()).collect(Collectors.toSet()); return copy;"
        );
    }

    #[test]
    fn consecutive_sorts_all_join_the_pipeline() {
        let (_, out) = rewrite(
            "List<String> r = new ArrayList<>(); for (String s : list) { if (s.isEmpty()) continue; r.add(s); } \
             Collections.sort(r); r.sort(Comparator.comparing(String::length)); return r.toArray(new String[0]);",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "return list.stream().filter(s -> !s.isEmpty()).sorted().sorted(Comparator.comparing(String::length)).toArray(String[]::new);"
        );
    }

    #[test]
    fn copy_into_a_local_continues_the_chain() {
        let (migration, out) = rewrite(
            "Set<String> r = new LinkedHashSet<>(); for (String s : list) { if (s.isEmpty()) continue; r.add(s); } \
             List<String> copy = new ArrayList<>(r); Collections.sort(copy); return copy.toArray(new String[0]);",
        )
        .expect("migrates");
        assert_eq!(migration.replacement, "toArray");
        assert_eq!(
            out,
            "return list.stream().filter(s -> !s.isEmpty()).distinct().sorted().toArray(String[]::new);"
        );

        let (_, out) = rewrite(
            "Set<String> r = new HashSet<>(); for (String s : list) { if (s.isEmpty()) continue; r.add(s); } \
             List<String> copy = new ArrayList<>(r); Collections.sort(copy); System.out.println(copy); return copy;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "List<String> copy = list.stream().filter(s -> !s.isEmpty()).distinct().sorted().collect(Collectors.toList()); \
             System.out.println(copy); return copy;"
        );
    }

    #[test]
    fn unmodifiable_wrapper_needs_java_10() {
        let text = "List<String> r = new ArrayList<>(); for (String s : list) { if (s.isEmpty()) continue; r.add(s); } \
                    return Collections.unmodifiableList(r);";
        let (_, out) = rewrite(text).expect("migrates");
        assert!(out.ends_with("return Collections.unmodifiableList(r);"));

        let options = InspectionOptions {
            language_level: nova_syntax::JavaLanguageLevel::JAVA_11,
            ..InspectionOptions::default()
        };
        let (_, out) = rewrite_with(text, &options).expect("migrates");
        assert_eq!(
            out,
            "return list.stream().filter(s -> !s.isEmpty()).collect(Collectors.toUnmodifiableList());"
        );
    }

    #[test]
    fn prefilled_target_receives_add_all() {
        let (_, out) = rewrite(
            "List<String> r = new ArrayList<>(); r.add(\"x\"); for (String s : list) { if (s.isEmpty()) continue; r.add(s); } return r;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "List<String> r = new ArrayList<>(); r.add(\"x\"); r.addAll(list.stream().filter(s -> !s.isEmpty()).collect(Collectors.toList())); return r;"
        );
    }

    #[test]
    fn mapped_add_is_worth_a_warning() {
        let (migration, out) = rewrite(
            "List<String> r = new ArrayList<>(); for (String s : list) { r.add(s.trim()); } return r;",
        )
        .expect("migrates");
        assert!(migration.should_warn);
        assert_eq!(
            out,
            "List<String> r = list.stream().map(s -> s.trim()).collect(Collectors.toList()); return r;"
        );
    }

    #[test]
    fn field_target_read_by_the_pipeline_is_not_collected() {
        for text in [
            "for (String s : list) { if (!result.contains(s)) result.add(s); } return null;",
            "for (String s : list) { if (!this.result.contains(s)) this.result.add(s); } return null;",
            "for (String s : list) { if (s.length() > result.size()) result.add(s); } return null;",
        ] {
            let kind = rewrite(text).map(|(migration, _)| migration.kind);
            assert_ne!(kind, Some(MigrationKind::Collect), "{text}");
        }

        let (migration, out) = rewrite("for (String s : list) { if (!s.isEmpty()) result.add(s); } return null;")
            .expect("migrates");
        assert_eq!(migration.kind, MigrationKind::Collect);
        assert_eq!(
            out,
            "result.addAll(list.stream().filter(s -> !s.isEmpty()).collect(Collectors.toList())); return null;"
        );
    }

    #[test]
    fn size_limit_on_the_target_becomes_limit() {
        let (_, out) = rewrite(
            "List<String> r = new ArrayList<>(); for (String s : list) { if (s.isEmpty()) continue; r.add(s); if (r.size() >= 10) break; } return r;",
        )
        .expect("migrates");
        assert_eq!(
            out,
            "List<String> r = list.stream().filter(s -> !s.isEmpty()).limit(10).collect(Collectors.toList()); return r;"
        );
    }

    #[test]
    fn plain_add_all_shape_is_left_alone() {
        assert_eq!(
            rewrite("List<String> r = new ArrayList<>(); for (String s : list) { r.add(s); } return r;"),
            None
        );
    }
}
