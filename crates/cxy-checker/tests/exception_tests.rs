//! Tests for result types, raise lowering, the catch operator and
//! exception propagation.

mod pipeline;

use pipeline::{compile, compile_expecting_errors};

#[test]
fn result_returning_function_with_catch_produces_the_success_type() {
    let c = compile(
        "func div(a: i32, b: i32) : i32 | Exception {\n\
         if (b == 0) { raise \"div by zero\"; }\n\
         return a / b;\n\
         }\n\
         func main() { var r = div(10, 0) catch { yield -1; }; }",
    );
    assert_eq!(c.var_type("r"), "i32");
}

#[test]
fn catch_block_yield_must_match_the_success_type() {
    let c = compile_expecting_errors(
        "func div(a: i32, b: i32) : i32 | Exception { return a / b; }\n\
         func main() { var r = div(1, 2) catch { yield \"nope\"; }; }",
    );
    assert!(c.has_error_containing("yields"));
}

#[test]
fn uncaught_result_call_in_a_plain_function_is_an_error() {
    let c = compile_expecting_errors(
        "func div(a: i32, b: i32) : i32 | Exception { return a / b; }\n\
         func main() { var r = div(1, 2); }",
    );
    assert!(c.has_error_containing("may raise"));
}

#[test]
fn uncaught_result_call_propagates_inside_a_result_function() {
    let c = compile(
        "func div(a: i32, b: i32) : i32 | Exception { return a / b; }\n\
         func twice(a: i32) : i32 | Exception { var v = div(a, 2); return v; }",
    );
    // The forwarding site keeps the success type.
    assert_eq!(c.var_type("v"), "i32");
}

#[test]
fn raise_in_a_function_without_a_result_type_is_an_error() {
    let c = compile_expecting_errors("func f() { raise \"boom\"; }");
    // The lowered raise returns an exception where void is declared.
    assert!(c.log.error_count() >= 1);
}

#[test]
fn exception_declaration_compiles_to_a_raisable_class() {
    let c = compile(
        "exception NotFound(k: string) => `key ${k}`;\n\
         func find(k: string) : i32 | Exception {\n\
         raise NotFound(k);\n\
         }\n\
         func main() { var r = find(\"a\") catch { yield 0; }; }",
    );
    assert_eq!(c.var_type("r"), "i32");
    // The lowered class derives the builtin exception base.
    let class = c.find_decl("NotFound").expect("lowered class");
    let class_ty = c.module.node_types[&class];
    assert!(c.types.is_exception(class_ty));
}

#[test]
fn raising_a_plain_string_goes_through_the_exception_constructor() {
    let c = compile(
        "func f() : i32 | Exception { raise \"oops\"; }\n\
         func main() { var r = f() catch { yield 1; }; }",
    );
    assert_eq!(c.var_type("r"), "i32");
}

#[test]
fn catch_on_a_non_result_value_is_an_error() {
    let c = compile_expecting_errors(
        "func g() : i32 { return 1; }\nfunc main() { var r = g() catch { yield 0; }; }",
    );
    assert!(c.has_error_containing("result-typed"));
}

#[test]
fn catch_block_may_itself_raise() {
    // A raise inside the catch block checks against the enclosing
    // function's return type like any other raise.
    let c = compile(
        "func inner() : i32 | Exception { raise \"a\"; }\n\
         func outer() : i32 | Exception {\n\
         var v = inner() catch { raise \"b\"; };\n\
         return v;\n\
         }",
    );
    assert_eq!(c.var_type("v"), "i32");
}

#[test]
fn yield_outside_a_catch_block_is_an_error() {
    let c = compile_expecting_errors("func f() { yield 1; }");
    assert!(c.has_error_containing("only valid inside a catch block"));
}
