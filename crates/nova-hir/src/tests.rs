use pretty_assertions::assert_eq;

use crate::{lower_file, Body, Expr, ExprId, LocalId, LocalKind, Node, Stmt, StmtId};
use nova_syntax::LiteralValue;
use nova_types::JavaType;

fn body_of(text: &str) -> Body {
    let file = lower_file(text);
    assert!(file.errors.is_empty(), "{:?}", file.errors);
    file.bodies.into_iter().next().expect("a method body")
}

fn method(body_text: &str) -> Body {
    body_of(&format!("class A {{ int f; void m(java.util.List<String> list) {{ {body_text} }} }}"))
}

fn local(body: &Body, name: &str) -> LocalId {
    body.local_ids()
        .find(|id| body.local(*id).name == name)
        .unwrap_or_else(|| panic!("no local `{name}`"))
}

fn root_stmts(body: &Body) -> Vec<StmtId> {
    body.statements_of(body.root)
}

fn expr_stmt(body: &Body, stmt: StmtId) -> ExprId {
    match body.stmt(stmt) {
        Stmt::Expr { expr, .. } => *expr,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

fn initializer(body: &Body, name: &str) -> ExprId {
    body.local(local(body, name))
        .initializer
        .expect("local has an initializer")
}

#[test]
fn resolves_locals_and_leaves_fields_unresolved() {
    let body = method("int x = 1; x = f + x;");
    let stmts = root_stmts(&body);
    let Expr::Assign { lhs, rhs, .. } = body.expr(expr_stmt(&body, stmts[1])) else {
        panic!("expected assignment");
    };
    assert!(body.is_reference_to(*lhs, local(&body, "x")));
    let Expr::Binary { lhs: f, .. } = body.expr(*rhs) else {
        panic!("expected binary");
    };
    assert!(matches!(body.expr(*f), Expr::Name { name, .. } if name == "f"));
}

#[test]
fn parameters_and_loop_variables_are_locals() {
    let body = method("for (String s : list) { s.length(); }");
    let list = body.params[0];
    assert_eq!(body.local(list).kind, LocalKind::Param);
    let s = local(&body, "s");
    assert_eq!(body.local(s).kind, LocalKind::ForEach);
    assert_eq!(body.local_type(s), JavaType::string());
    assert_eq!(body.all_references(list).len(), 1);
}

#[test]
fn var_types_are_inferred() {
    let body = method("var n = list.size(); for (var s : list) { }");
    assert_eq!(body.local_type(local(&body, "n")), JavaType::INT);
    assert!(body.local_type(local(&body, "s")).is_string());
}

#[test]
fn writes_and_effective_finality() {
    let body = method("int a = 0; int b = 0; b++; int c; c = 3; int d; for (;;) { d = 1; }");
    assert!(body.is_effectively_final(local(&body, "a")));
    assert!(!body.is_effectively_final(local(&body, "b")));
    assert!(body.is_effectively_final(local(&body, "c")));
    assert!(!body.is_effectively_final(local(&body, "d")));
    assert_eq!(body.writes(local(&body, "b"), Node::Stmt(body.root)).len(), 1);
}

#[test]
fn surrounder_is_the_innermost_lambda_or_class() {
    let body = method(
        "int x = 0; Runnable r = () -> { int y = x; }; \
         Object o = new Object() { void g() { int z = 1; } };",
    );
    let x = local(&body, "x");
    let y = local(&body, "y");
    let z = local(&body, "z");
    assert_eq!(body.local(x).owner, None);
    let Some(Node::Expr(lambda)) = body.local(y).owner else {
        panic!("expected lambda owner");
    };
    assert!(matches!(body.expr(lambda), Expr::Lambda { .. }));
    let Some(Node::Expr(anon)) = body.local(z).owner else {
        panic!("expected anonymous class owner");
    };
    assert!(matches!(body.expr(anon), Expr::New { members: Some(_), .. }));

    let y_init = initializer(&body, "y");
    assert_eq!(body.surrounder(Node::Expr(y_init)), Some(Node::Expr(lambda)));
}

#[test]
fn type_inference_table() {
    let body = method(
        "int[] arr = new int[3]; java.util.Map<String, Integer> m = new java.util.HashMap<>(); \
         var a = arr.length; var b = \"s\" + 1; var c = 1L + 2; var d = m.get(\"k\"); \
         var e = list.get(0).charAt(0); var g = (double) a; var h = a > 2;",
    );
    assert_eq!(body.type_of(initializer(&body, "a")), JavaType::INT);
    assert_eq!(body.type_of(initializer(&body, "b")), JavaType::string());
    assert_eq!(body.type_of(initializer(&body, "c")), JavaType::LONG);
    assert_eq!(
        body.type_of(initializer(&body, "d")).class_name(),
        Some("Integer")
    );
    assert_eq!(body.type_of(initializer(&body, "e")), JavaType::CHAR);
    assert_eq!(body.type_of(initializer(&body, "g")), JavaType::DOUBLE);
    assert_eq!(body.type_of(initializer(&body, "h")), JavaType::BOOLEAN);
}

#[test]
fn constants_fold_through_final_locals() {
    let body = method(
        "final String sep = \",\"; String both = sep + ' ' + 1; \
         int max = Integer.MIN_VALUE; int neg = -2147483648; int mutable = 1; mutable++; \
         int copy = mutable;",
    );
    assert_eq!(
        body.constant_value(initializer(&body, "both")),
        Some(LiteralValue::String(", 1".to_string()))
    );
    assert_eq!(body.constant_int(initializer(&body, "max")), Some(i64::from(i32::MIN)));
    assert_eq!(body.constant_int(initializer(&body, "neg")), Some(i64::from(i32::MIN)));
    assert_eq!(body.constant_value(initializer(&body, "copy")), None);
}

#[test]
fn side_effects_and_equivalence() {
    let body = method(
        "int i = 0; var a = list.get(i); var b = list.get((i)); var c = list.remove(i); \
         var d = i++; var e = list.size() + 1;",
    );
    assert!(body.is_side_effect_free(initializer(&body, "a")));
    assert!(!body.is_side_effect_free(initializer(&body, "c")));
    assert!(!body.is_side_effect_free(initializer(&body, "d")));
    assert!(body.is_side_effect_free(initializer(&body, "e")));
    assert!(body.equivalent(initializer(&body, "a"), initializer(&body, "b")));
    assert!(!body.equivalent(initializer(&body, "a"), initializer(&body, "c")));
}

#[test]
fn negation_text() {
    let body = method(
        "var a = s == null; var b = !(x.isEmpty()); var c = p && q; var d = x.isEmpty(); var e = i < 3;",
    );
    assert_eq!(body.negated_text(initializer(&body, "a")), "s != null");
    assert_eq!(body.negated_text(initializer(&body, "b")), "x.isEmpty()");
    assert_eq!(body.negated_text(initializer(&body, "c")), "!(p && q)");
    assert_eq!(body.negated_text(initializer(&body, "d")), "!x.isEmpty()");
    assert_eq!(body.negated_text(initializer(&body, "e")), "i >= 3");
}

#[test]
fn siblings_skip_labels() {
    let body = method("int a = 0; outer: for (;;) { break outer; } a++;");
    let stmts = root_stmts(&body);
    let Stmt::Labeled { body: for_stmt, .. } = body.stmt(stmts[1]) else {
        panic!("expected labeled statement");
    };
    assert_eq!(body.prev_statement(*for_stmt), Some(stmts[0]));
    assert_eq!(body.next_statement(*for_stmt), Some(stmts[2]));
}

#[test]
fn opaque_statements_keep_references() {
    let body = method("int n = 0; assert n > 0 : \"n\";");
    let n = local(&body, "n");
    let refs = body.all_references(n);
    assert_eq!(refs.len(), 1);
    assert!(body.is_write(refs[0]));
}

#[test]
fn replacements_splice_source_text() {
    let body = method("var a = x.charAt(k) + y;");
    let init = initializer(&body, "a");
    let Expr::Binary { lhs, .. } = body.expr(init) else {
        panic!("expected binary");
    };
    let text = body.text_with_replacements(
        body.expr(init).range(),
        &[(body.expr(*lhs).range(), "x.substring(k, k + 1)".to_string())],
    );
    assert_eq!(text, "x.substring(k, k + 1) + y");
}
