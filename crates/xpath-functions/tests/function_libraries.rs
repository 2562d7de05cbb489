mod common;

use common::{as_bool, as_string, ctx, err_code, strings};
use rstest::rstest;
use std::sync::Arc;
use xpath_functions::consts::EXT_NS;
use xpath_functions::engine::library::UserFunction;
use xpath_functions::xdm::{AtomicType, Occurrence, SequenceType};
use xpath_functions::{
    DynamicContextBuilder, ErrorCode, ExecutableFunctionLibrary, ExpandedName,
    FunctionLibraryList, SimpleNode, StaticContext, StaticContextBuilder, VendorFunctionLibrary,
    XdmAtomicValue, XdmItem, compile_xpath,
};

const MY_NS: &str = "urn:example:my";

fn static_ctx() -> StaticContext {
    StaticContextBuilder::new()
        .with_namespace("my", MY_NS)
        .with_namespace("ext", EXT_NS)
        .build()
}

fn string_param(local: &str) -> (ExpandedName, SequenceType) {
    (
        ExpandedName::new(None, local),
        SequenceType::atomic(AtomicType::String, Occurrence::ExactlyOne),
    )
}

#[test]
fn count_binds_with_integer_result_type() {
    let s = ExpandedName::new(None, "s");
    let sc = StaticContextBuilder::new().with_variable(s).build();
    let e = compile_xpath::<SimpleNode>("count($s)", &sc, &FunctionLibraryList::standard()).unwrap();
    assert!(!e.expr().is_literal());
    assert_eq!(
        e.expr().static_type(),
        SequenceType::atomic(AtomicType::Integer, Occurrence::ExactlyOne)
    );
}

#[rstest]
#[case("count((), (), ())", "function count() cannot be called with three arguments (expected 1)")]
#[case("contains('a')", "function contains() cannot be called with one argument (expected 2 or 3)")]
#[case("cont('a')", "unknown function fn:cont()")]
#[case("xs:integer('1', '2')", "cannot be called with two arguments (expected 1)")]
#[case("xs:nonsense('1')", "unknown function")]
fn binding_errors_are_static(#[case] expr: &str, #[case] message: &str) {
    let err = compile_xpath::<SimpleNode>(expr, &StaticContext::default(), &FunctionLibraryList::standard())
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);
    assert!(err.is_static());
    assert!(err.message.contains(message), "{}", err.message);
}

#[rstest]
#[case("xs:integer('42')", "42")]
#[case("xs:double('1e2')", "100")]
#[case("xs:boolean('1')", "true")]
#[case("xs:string(12.50)", "12.5")]
#[case("xs:date('2020-02-29')", "2020-02-29")]
fn constructor_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(expr), expected);
}

#[test]
fn constructor_of_empty_is_empty() {
    assert!(strings("xs:integer(())").is_empty());
    assert_eq!(err_code("xs:integer('x')"), ErrorCode::FORG0001);
}

#[test]
fn literal_calls_fold_but_context_calls_do_not() {
    let libs = FunctionLibraryList::<SimpleNode>::standard();
    let sc = StaticContext::default();
    let folded = compile_xpath("string-length(concat('ab', 'cd'))", &sc, &libs).unwrap();
    assert_eq!(folded.expr().as_atomic_literal(), Some(&XdmAtomicValue::Integer(4)));
    let kept = compile_xpath("string-length()", &sc, &libs).unwrap();
    assert!(!kept.expr().is_literal());
    let kept = compile_xpath("position()", &sc, &libs).unwrap();
    assert!(!kept.expr().is_literal());
}

#[test]
fn folding_failure_surfaces_at_run_time() {
    let libs = FunctionLibraryList::<SimpleNode>::standard();
    let e = compile_xpath("exactly-one((1, 2))", &StaticContext::default(), &libs).unwrap();
    assert!(!e.expr().is_literal());
    assert_eq!(e.evaluate(&ctx()).unwrap_err().code_enum(), ErrorCode::FORG0005);
}

#[test]
fn user_functions_are_bound_after_system_functions() {
    let user = Arc::new(ExecutableFunctionLibrary::<SimpleNode>::new());
    let libs = FunctionLibraryList::standard().with_user_functions(user.clone());
    let sc = static_ctx();
    let shout = UserFunction::compile(
        ExpandedName::ns(MY_NS, "shout"),
        vec![string_param("s")],
        SequenceType::atomic(AtomicType::String, Occurrence::ExactlyOne),
        "concat(upper-case($s), '!')",
        &sc,
        &libs,
    )
    .unwrap();
    user.add_function(shout).unwrap();
    assert_eq!(user.len(), 1);

    let e = compile_xpath("my:shout('hey')", &sc, &libs).unwrap();
    let out = e.evaluate(&ctx()).unwrap();
    assert_eq!(out, vec![XdmItem::Atomic(XdmAtomicValue::from("HEY!"))]);

    let err = compile_xpath("my:shout()", &sc, &libs).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);
    assert!(err.message.contains("expected 1"), "{}", err.message);

    let err = compile_xpath("my:whisper('a')", &sc, &libs).unwrap_err();
    assert!(err.message.contains("unknown function"), "{}", err.message);
}

#[test]
fn user_function_arguments_are_coerced() {
    let user = Arc::new(ExecutableFunctionLibrary::<SimpleNode>::new());
    let libs = FunctionLibraryList::standard().with_user_functions(user.clone());
    let sc = static_ctx();
    user.add_function(
        UserFunction::compile(
            ExpandedName::ns(MY_NS, "len"),
            vec![string_param("s")],
            SequenceType::atomic(AtomicType::Integer, Occurrence::ExactlyOne),
            "string-length($s)",
            &sc,
            &libs,
        )
        .unwrap(),
    )
    .unwrap();
    let e = compile_xpath("my:len(xs:untypedAtomic('four'))", &sc, &libs).unwrap();
    assert_eq!(
        e.evaluate(&ctx()).unwrap(),
        vec![XdmItem::Atomic(XdmAtomicValue::Integer(4))]
    );
    let err = compile_xpath("my:len(())", &sc, &libs)
        .and_then(|e| e.evaluate(&ctx()))
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[test]
fn vendor_functions_and_standard_extensions() {
    let mut vendor = VendorFunctionLibrary::<SimpleNode>::with_standard_extensions();
    vendor
        .register_ns(MY_NS, "twice", 1, |_ctx, args| {
            let mut out = args[0].clone();
            out.extend(args[0].iter().cloned());
            Ok(out)
        })
        .unwrap();
    let libs = FunctionLibraryList::standard().with_vendor_functions(Arc::new(vendor));
    let sc = static_ctx();

    let e = compile_xpath("count(my:twice((1, 2, 3)))", &sc, &libs).unwrap();
    assert_eq!(
        e.evaluate(&ctx()).unwrap(),
        vec![XdmItem::Atomic(XdmAtomicValue::Integer(6))]
    );

    let e = compile_xpath("string-join(ext:analyze-string('a1b22', '[0-9]+'), '|')", &sc, &libs)
        .unwrap();
    assert_eq!(
        e.evaluate(&ctx()).unwrap(),
        vec![XdmItem::Atomic(XdmAtomicValue::from("a|1|b|22"))]
    );
}

#[test]
fn reserved_namespaces_cannot_be_extended() {
    let mut vendor = VendorFunctionLibrary::<SimpleNode>::new();
    let err = vendor
        .register_ns(xpath_functions::consts::FNS, "count", 2, |_ctx, _args| Ok(Vec::new()))
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);
}

#[rstest]
#[case("function-available('concat')", true)]
#[case("function-available('fn:count', 1)", true)]
#[case("function-available('count', 2)", false)]
#[case("function-available('xs:date', 1)", true)]
#[case("function-available('xs:date', 2)", false)]
#[case("function-available('no-such-function')", false)]
fn function_available(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(expr), expected);
}

#[test]
fn function_available_sees_the_whole_chain() {
    let libs = FunctionLibraryList::<SimpleNode>::standard()
        .with_vendor_functions(Arc::new(VendorFunctionLibrary::with_standard_extensions()));
    let sc = static_ctx();
    let e = compile_xpath(
        "(function-available('ext:regex-groups', 2), function-available('ext:regex-groups', 4))",
        &sc,
        &libs,
    )
    .unwrap();
    assert!(e.expr().is_literal());
    assert_eq!(
        e.evaluate(&ctx()).unwrap(),
        vec![
            XdmItem::Atomic(XdmAtomicValue::Boolean(true)),
            XdmItem::Atomic(XdmAtomicValue::Boolean(false)),
        ]
    );

    let name = ExpandedName::new(None, "name");
    let sc = StaticContextBuilder::new()
        .with_namespace("ext", EXT_NS)
        .with_variable(name.clone())
        .build();
    let libs = Arc::new(libs);
    let e = compile_xpath::<SimpleNode>("function-available($name)", &sc, &libs).unwrap();
    let dyn_ctx = DynamicContextBuilder::new()
        .with_functions(libs.clone())
        .with_variable(name, vec![XdmItem::Atomic(XdmAtomicValue::from("ext:analyze-string"))])
        .build();
    assert!(e.effective_boolean_value(&dyn_ctx).unwrap());
}
