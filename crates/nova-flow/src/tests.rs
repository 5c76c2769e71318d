use pretty_assertions::assert_eq;

use nova_hir::{lower_file, Body, LocalId, Stmt, StmtId};

use crate::{
    break_target, continue_target, find_exit_points, initializer_usage_status, never_cancelled,
    next_return_statement, statement_breaks_loop, used_variables, Cancelled,
    InitializerUsageStatus,
};

fn method(body_text: &str) -> Body {
    let file = lower_file(&format!(
        "class A {{ boolean flag; Object m(java.util.List<String> list) {{ {body_text} }} }}"
    ));
    assert!(file.errors.is_empty(), "{:?}", file.errors);
    file.bodies.into_iter().next().expect("a method body")
}

/// The innermost statement whose text starts with `prefix`.
fn stmt(body: &Body, prefix: &str) -> StmtId {
    body.stmt_ids()
        .filter(|id| body.stmt_text(*id).starts_with(prefix))
        .min_by_key(|id| body.stmt(*id).range().len())
        .unwrap_or_else(|| panic!("no statement starting with `{prefix}`"))
}

fn local(body: &Body, name: &str) -> LocalId {
    body.local_ids()
        .find(|id| body.local(*id).name == name)
        .unwrap_or_else(|| panic!("no local `{name}`"))
}

fn loop_body(body: &Body, loop_stmt: StmtId) -> Vec<StmtId> {
    let inner = body.stmt(loop_stmt).loop_body().expect("a loop");
    body.statements_of(inner)
}

#[test]
fn exit_points_skip_nested_jumps_and_lambdas() {
    let body = method(
        "for (String s : list) {\n\
           if (s == null) continue;\n\
           if (s.isEmpty()) break;\n\
           for (int i = 0; i < 3; i++) { if (i == 1) break; }\n\
           Runnable r = () -> { return; };\n\
           if (flag) return s;\n\
         }\n\
         return null;",
    );
    let outer = stmt(&body, "for (String");
    let exits = find_exit_points(&body, &loop_body(&body, outer), &mut never_cancelled)
        .expect("not cancelled");
    let texts: Vec<&str> = exits.iter().map(|id| body.stmt_text(*id)).collect();
    assert_eq!(texts, vec!["continue;", "break;", "return s;"]);
}

#[test]
fn caught_throws_stay_inside() {
    let body = method(
        "for (String s : list) {\n\
           try { throw new IllegalStateException(); } catch (RuntimeException e) { }\n\
           if (s.isEmpty()) throw new IllegalArgumentException();\n\
         }\n\
         return null;",
    );
    let outer = stmt(&body, "for (String");
    let exits = find_exit_points(&body, &loop_body(&body, outer), &mut never_cancelled)
        .expect("not cancelled");
    assert_eq!(exits.len(), 1);
    assert!(body.stmt_text(exits[0]).contains("IllegalArgumentException"));
}

#[test]
fn cancellation_aborts_the_search() {
    let body = method("for (String s : list) { if (s == null) continue; } return null;");
    let outer = stmt(&body, "for (String");
    let result = find_exit_points(&body, &loop_body(&body, outer), &mut || Err(Cancelled));
    assert_eq!(result, Err(Cancelled));
    assert_eq!(used_variables(&body, outer, &mut || Err(Cancelled)), Err(Cancelled));
}

#[test]
fn labeled_jumps_resolve_to_the_labeled_loop() {
    let body = method(
        "outer: for (String s : list) {\n\
           for (int i = 0; i < 3; i++) {\n\
             if (i == 0) continue outer;\n\
             if (i == 1) break outer;\n\
             switch (i) { case 2: break; default: }\n\
           }\n\
         }\n\
         return null;",
    );
    let outer = stmt(&body, "for (String");
    let inner = stmt(&body, "for (int");
    assert_eq!(continue_target(&body, stmt(&body, "continue outer")), Some(outer));
    assert_eq!(break_target(&body, stmt(&body, "break outer")), Some(outer));
    assert!(statement_breaks_loop(&body, stmt(&body, "break outer"), outer));
    let switch_break = stmt(&body, "break;");
    assert!(matches!(
        break_target(&body, switch_break).map(|id| body.stmt(id)),
        Some(Stmt::Switch { .. })
    ));
    assert!(!statement_breaks_loop(&body, switch_break, inner));
}

#[test]
fn next_return_follows_trailing_if_branches() {
    let body = method(
        "if (flag) {\n\
           for (String s : list) { if (s.isEmpty()) return s; }\n\
         }\n\
         return \"none\";",
    );
    let loop_stmt = stmt(&body, "for (String");
    let next = next_return_statement(&body, loop_stmt).expect("a return after the loop");
    assert_eq!(body.stmt_text(next), "return \"none\";");

    let body = method("for (String s : list) { } list.clear(); return null;");
    assert_eq!(next_return_statement(&body, stmt(&body, "for (String")), None);
}

#[test]
fn initializer_usage_classification() {
    let body = method(
        "java.util.List<String> a = new java.util.ArrayList<>();\n\
         int b = 0;\n\
         java.util.List<String> c = new java.util.ArrayList<>();\n\
         java.util.List<String> d = new java.util.ArrayList<>();\n\
         final int e = 0;\n\
         System.out.println(b + c.size());\n\
         consume(d);\n\
         for (String s : list) { a.add(s); }\n\
         return null;",
    );
    let loop_stmt = stmt(&body, "for (String");
    let status = |name: &str| initializer_usage_status(&body, local(&body, name), loop_stmt);
    assert_eq!(status("a"), InitializerUsageStatus::AtWantedPlaceOnly);
    assert_eq!(status("b"), InitializerUsageStatus::AtWantedPlace);
    assert_eq!(status("c"), InitializerUsageStatus::AtWantedPlace);
    assert_eq!(status("d"), InitializerUsageStatus::Unknown);
    assert_eq!(status("e"), InitializerUsageStatus::Unknown);
    assert_eq!(status("s"), InitializerUsageStatus::Unknown);

    let body = method("int count = 0; for (String s : list) { count++; } return count;");
    let loop_stmt = stmt(&body, "for (String");
    assert_eq!(
        initializer_usage_status(&body, local(&body, "count"), loop_stmt),
        InitializerUsageStatus::DeclaredJustBefore
    );
}

#[test]
fn used_variables_lists_each_local_once() {
    let body = method(
        "int total = 0;\n\
         for (String s : list) { total += s.length() + total; }\n\
         return total;",
    );
    let loop_stmt = stmt(&body, "for (String");
    let inner = body.stmt(loop_stmt).loop_body().expect("a loop");
    let names: Vec<String> = used_variables(&body, inner, &mut never_cancelled)
        .expect("not cancelled")
        .into_iter()
        .map(|id| body.local(id).name.clone())
        .collect();
    assert_eq!(names, vec!["total".to_string(), "s".to_string()]);
}
