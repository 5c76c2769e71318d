use nova_hir::{lower_file, Expr, LambdaBody, LocalKind, Stmt};
use pretty_assertions::assert_eq;

#[test]
fn lowers_one_body_per_member_with_code() {
    let file = lower_file(
        "class A {\n\
           int f = 1;\n\
           int g;\n\
           A() { }\n\
           static { }\n\
           abstract void h();\n\
           void m() { }\n\
           class Inner { void n() { } }\n\
         }",
    );
    let names: Vec<&str> = file.bodies.iter().map(|b| b.owner_name.as_str()).collect();
    assert_eq!(names, vec!["f", "A", "<init>", "m", "n"]);
}

#[test]
fn lambda_bodies_and_parameters() {
    let file = lower_file("class A { void m() { run((a, b) -> { return a; }); } }");
    let body = &file.bodies[0];
    let lambda = body
        .exprs
        .iter()
        .find_map(|(_, e)| match e {
            Expr::Lambda { params, body, .. } => Some((params.clone(), body.clone())),
            _ => None,
        })
        .expect("lambda");
    assert_eq!(lambda.0.len(), 2);
    assert_eq!(body.local(lambda.0[0]).kind, LocalKind::LambdaParam);
    let LambdaBody::Block(block) = lambda.1 else {
        panic!("expected block body");
    };
    let stmts = body.statements_of(block);
    let Stmt::Return { expr: Some(value), .. } = body.stmt(stmts[0]) else {
        panic!("expected return");
    };
    assert!(body.is_reference_to(*value, lambda.0[0]));
}

#[test]
fn parents_link_back_to_the_root() {
    let file = lower_file("class A { void m(int[] xs) { for (int x : xs) { if (x > 0) use(x); } } }");
    let body = &file.bodies[0];
    let x = body
        .local_ids()
        .find(|id| body.local(*id).name == "x")
        .expect("loop variable");
    for reference in body.all_references(x) {
        let stmt = body.enclosing_stmt(nova_hir::Node::Expr(reference)).expect("statement");
        assert!(body.is_within(nova_hir::Node::Stmt(stmt), nova_hir::Node::Stmt(body.root)));
    }
    assert_eq!(body.all_references(x).len(), 2);
}

#[test]
fn local_class_fields_shadow_outer_locals() {
    let file = lower_file(
        "class A { void m() { int v = 0; class L { int v; void g() { v++; } } v = 1; } }",
    );
    let body = &file.bodies[0];
    let v = body
        .local_ids()
        .find(|id| body.local(*id).name == "v")
        .expect("local v");
    assert_eq!(body.all_references(v).len(), 1);
}
