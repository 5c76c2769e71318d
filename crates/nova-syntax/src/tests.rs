use pretty_assertions::assert_eq;

use crate::{
    parse, parse_block, parse_expression, AssignOp, BinaryOp, Expr, LambdaBody, MemberDecl, Stmt,
    UnaryOp,
};
use nova_types::Span;

fn method_body(text: &str) -> Vec<Stmt> {
    let parsed = parse(text);
    assert!(parsed.errors().is_empty(), "{:?}", parsed.errors());
    let unit = parsed.compilation_unit();
    let MemberDecl::Method(method) = &unit.types[0].body.members[0] else {
        panic!("expected a method");
    };
    method
        .body
        .as_ref()
        .expect("method body")
        .statements
        .clone()
}

fn expr(text: &str) -> Expr {
    parse_expression(text, 0).expect("expression should parse")
}

#[test]
fn parses_class_with_members() {
    let parsed = parse(
        "package a.b;\nimport java.util.*;\nimport static java.util.stream.Collectors.toList;\n\
         public class Foo<T> extends Bar implements Baz {\n\
           private final List<String> names = new ArrayList<>();\n\
           Foo(int x) { }\n\
           @Override public String toString() { return \"\"; }\n\
           static { }\n\
           abstract void run() throws Exception;\n\
           enum Kind { A, B(1) { }, C; int f; }\n\
         }",
    );
    assert!(parsed.errors().is_empty(), "{:?}", parsed.errors());
    let unit = parsed.compilation_unit();
    assert_eq!(unit.package.as_ref().map(|p| p.name.as_str()), Some("a.b"));
    assert_eq!(unit.imports.len(), 2);
    assert!(unit.imports[0].is_star);
    assert!(unit.imports[1].is_static);

    let members = &unit.types[0].body.members;
    assert_eq!(members.len(), 6);
    let MemberDecl::Field(field) = &members[0] else {
        panic!("expected field");
    };
    assert!(field.modifiers.is_final);
    assert_eq!(field.ty.text, "List<String>");
    assert!(matches!(members[1], MemberDecl::Constructor(_)));
    assert!(matches!(members[3], MemberDecl::Initializer(_)));
    let MemberDecl::Method(run) = &members[4] else {
        panic!("expected method");
    };
    assert!(run.body.is_none());
    assert!(matches!(members[5], MemberDecl::Type(_)));
}

#[test]
fn parses_loops_and_locals() {
    let stmts = method_body(
        "class A { void m(List<String> list) {\n\
           for (String s : list) { System.out.println(s); }\n\
           for (int i = 0, j = 1; i < 10; i++, j--) ;\n\
           Map<String, List<Integer>> m = new HashMap<>();\n\
           int[] arr = {1, 2};\n\
           while (true) break;\n\
           do { } while (false);\n\
         } }",
    );
    assert_eq!(stmts.len(), 6);

    let Stmt::ForEach(each) = &stmts[0] else {
        panic!("expected foreach");
    };
    assert_eq!(each.name, "s");
    assert_eq!(each.ty.text, "String");
    assert!(matches!(each.iterable, Expr::Name(_)));

    let Stmt::For(for_stmt) = &stmts[1] else {
        panic!("expected for");
    };
    let Stmt::LocalVar(init) = &for_stmt.init[0] else {
        panic!("expected local init");
    };
    assert_eq!(init.declarators.len(), 2);
    assert_eq!(for_stmt.update.len(), 2);
    assert!(matches!(*for_stmt.body, Stmt::Empty(_)));

    let Stmt::LocalVar(map) = &stmts[2] else {
        panic!("expected local");
    };
    assert_eq!(map.ty.text, "Map<String, List<Integer>>");

    let Stmt::LocalVar(arr) = &stmts[3] else {
        panic!("expected local");
    };
    assert!(matches!(
        arr.declarators[0].initializer,
        Some(Expr::ArrayInit(_))
    ));
    assert!(matches!(stmts[4], Stmt::While(_)));
    assert!(matches!(stmts[5], Stmt::Do(_)));
}

#[test]
fn keyword_range_covers_loop_keyword() {
    let text = "class A { void m() { while (x) {} } }";
    let stmts = method_body(text);
    let Stmt::While(stmt) = &stmts[0] else {
        panic!("expected while");
    };
    assert_eq!(stmt.keyword_range.slice(text), "while");
}

#[test]
fn binary_precedence_and_shift_gluing() {
    let Expr::Binary(or) = expr("a || b && c == d + e * f") else {
        panic!("expected binary");
    };
    assert_eq!(or.op, BinaryOp::Or);
    let Expr::Binary(and) = &*or.rhs else {
        panic!("expected binary");
    };
    assert_eq!(and.op, BinaryOp::And);

    let Expr::Binary(shift) = expr("a >>> 2 >= b >> 1") else {
        panic!("expected binary");
    };
    assert_eq!(shift.op, BinaryOp::Ge);
    let Expr::Binary(lhs) = &*shift.lhs else {
        panic!("expected binary");
    };
    assert_eq!(lhs.op, BinaryOp::UShr);

    let Expr::Assign(assign) = expr("x >>= 3") else {
        panic!("expected assignment");
    };
    assert_eq!(assign.op, AssignOp::Shr);
}

#[test]
fn casts_lambdas_and_parens() {
    assert!(matches!(expr("(String) o"), Expr::Cast(_)));
    assert!(matches!(expr("(int) -x"), Expr::Cast(_)));
    assert!(matches!(expr("(a) - b"), Expr::Binary(_)));
    assert!(matches!(expr("(List<String>) o"), Expr::Cast(_)));
    assert!(matches!(expr("(a < b)"), Expr::Paren(_)));

    let Expr::Lambda(lambda) = expr("(a, b) -> a + b") else {
        panic!("expected lambda");
    };
    assert_eq!(lambda.params.len(), 2);
    assert!(matches!(lambda.body, LambdaBody::Expr(_)));

    let Expr::Lambda(lambda) = expr("s -> { return s; }") else {
        panic!("expected lambda");
    };
    assert!(matches!(lambda.body, LambdaBody::Block(_)));
}

#[test]
fn postfix_chains() {
    let Expr::MethodCall(call) = expr("list.stream().map(String::length).toArray(int[]::new)")
    else {
        panic!("expected call");
    };
    assert_eq!(call.name, "toArray");
    assert!(matches!(call.args[0], Expr::MethodRef(_)));

    assert!(matches!(expr("a[i]++"), Expr::Unary(u) if u.op == UnaryOp::PostInc));
    assert!(matches!(expr("String.class"), Expr::ClassLiteral(_)));
    assert!(matches!(expr("new int[n]"), Expr::NewArray(_)));
    assert!(matches!(expr("new Foo() { }"), Expr::New(n) if n.body.is_some()));
    assert!(matches!(expr("x instanceof String s"), Expr::InstanceOf(i) if i.binding.is_some()));
    assert!(matches!(expr("c ? 1 : 2"), Expr::Conditional(_)));
}

#[test]
fn parse_block_uses_file_offsets() {
    let block = parse_block("{ x++; }", 100);
    assert_eq!(block.range, Span::new(100, 108));
    assert_eq!(block.statements[0].range(), Span::new(102, 106));
}

#[test]
fn recovers_from_garbage() {
    let parsed = parse("class A { void m() { int x = ; foo(; } void n() { return; } }");
    assert!(!parsed.errors().is_empty());
    let members = &parsed.compilation_unit().types[0].body.members;
    assert_eq!(members.len(), 2);
}

#[test]
fn labeled_statements_and_switch() {
    let stmts = method_body(
        "class A { void m() {\n\
           outer: for (;;) { continue outer; }\n\
           switch (k) { case 1: case 2: a(); break; default: b(); }\n\
           switch (k) { case A, B -> a(); default -> { b(); } }\n\
         } }",
    );
    let Stmt::Labeled(labeled) = &stmts[0] else {
        panic!("expected label");
    };
    assert_eq!(labeled.label, "outer");
    let Stmt::Switch(switch) = &stmts[1] else {
        panic!("expected switch");
    };
    assert_eq!(switch.groups.len(), 3);
    let Stmt::Switch(arrow) = &stmts[2] else {
        panic!("expected switch");
    };
    assert!(arrow.groups[0].is_arrow);
    assert_eq!(arrow.groups[0].labels.len(), 2);
}
