mod common;

use common::{as_bool, as_string, err_code, strings};
use rstest::rstest;
use std::sync::Arc;
use xpath_functions::engine::decimal_format::{DecimalFormatManager, DecimalFormatSymbols};
use xpath_functions::{
    ErrorCode, ExpandedName, FunctionLibraryList, SimpleNode, StaticContext, StaticContextBuilder,
    compile_xpath,
};

#[rstest]
#[case("translate('bar', 'abc', 'ABC')", "BAr")]
#[case("translate('--aaa--', 'abc-', 'ABC')", "AAA")]
#[case("translate('--aaa--', '-', '')", "aaa")]
#[case("translate('abcdabc', 'abc', 'AB')", "ABdAB")]
#[case("translate('aaa', 'aa', 'xy')", "xxx")]
#[case("translate((), 'a', 'b')", "")]
#[case("translate('h\u{e9}llo', '\u{e9}', 'e')", "hello")]
fn translate(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(expr), expected);
}

#[rstest]
#[case("format-number(1234567.5, '#,##0.00')", "1,234,567.50")]
#[case("format-number(12, '000')", "012")]
#[case("format-number(-6, '000;(000)')", "(006)")]
#[case("format-number(-6, '000')", "-006")]
#[case("format-number(0.25, '#%')", "25%")]
#[case("format-number(2.5, '#')", "2")]
#[case("format-number(3.5, '#')", "4")]
#[case("format-number((), '#')", "NaN")]
#[case("format-number(xs:double('NaN'), '#')", "NaN")]
#[case("format-number(xs:double('-INF'), '#;(#)')", "(Infinity)")]
#[case("format-number(0, '#')", "0")]
fn format_number(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(expr), expected);
}

#[rstest]
#[case("format-number(1, '#.#.#')")]
#[case("format-number(1, '#;#;#')")]
#[case("format-number(1, 'abc')")]
#[case("format-number(1, '#.00,')")]
fn literal_pictures_are_checked_at_compile_time(#[case] expr: &str) {
    let err = compile_xpath::<SimpleNode>(expr, &StaticContext::default(), &FunctionLibraryList::standard())
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FODF1310);
    assert!(err.is_static());
}

#[test]
fn bad_picture_fails_statically_even_for_empty_value() {
    let err = compile_xpath::<SimpleNode>(
        "format-number((), '#.#.#')",
        &StaticContext::default(),
        &FunctionLibraryList::standard(),
    )
    .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FODF1310);
}

#[test]
fn named_decimal_format() {
    let mut formats = DecimalFormatManager::new();
    formats
        .register(
            Some(ExpandedName::new(None, "de")),
            DecimalFormatSymbols {
                decimal_separator: ',',
                grouping_separator: '.',
                ..DecimalFormatSymbols::default()
            },
        )
        .unwrap();
    let sc = StaticContextBuilder::new()
        .with_decimal_formats(Arc::new(formats))
        .build();
    let libs = FunctionLibraryList::<SimpleNode>::standard();
    let e = compile_xpath("format-number(1234.5, '#.##0,00', 'de')", &sc, &libs).unwrap();
    let out = e.evaluate(&common::ctx()).unwrap();
    assert_eq!(
        out,
        vec![xpath_functions::XdmItem::Atomic("1.234,50".into())]
    );
    let err = compile_xpath("format-number(1, '#', 'fr')", &sc, &libs).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FODF1280);
}

#[rstest]
#[case("matches('abracadabra', '^a.*a$')", true)]
#[case("matches('abracadabra', 'ABRA', 'i')", true)]
#[case("matches('abracadabra', '^bra')", false)]
#[case("matches((), 'a')", false)]
#[case("contains('tattoo', 'tat')", true)]
#[case("contains('abc', ())", true)]
#[case("starts-with('Hello', 'hE', 'urn:xpath-functions:collation:simple-case')", true)]
#[case("ends-with('tattoo', 'tat')", false)]
#[case("matches('ab', 'a#b', 'x')", false)]
#[case("matches('a#b', 'a # b', 'x')", true)]
#[case("matches('hello world', 'hello [ ] world', 'x')", true)]
#[case("matches('helloworld', 'hello world', 'x')", true)]
fn boolean_string_functions(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(expr), expected);
}

#[rstest]
#[case("replace('abracadabra', 'bra', '*')", "a*cada*")]
#[case("replace('abracadabra', 'a(.)', 'a$1$1')", "abbraccaddabbra")]
#[case("replace('darted', '^(.*?)d(.*)$', '$1c$2')", "carted")]
#[case("substring-before('tattoo', 'attoo')", "t")]
#[case("substring-after('tattoo', 'tat')", "too")]
#[case("substring('motor car', 6)", " car")]
#[case("substring('12345', 1.5, 2.6)", "234")]
#[case("normalize-space('  a   b  ')", "a b")]
#[case("string-join(('a', 'b', 'c'), '-')", "a-b-c")]
#[case("codepoints-to-string((72, 105))", "Hi")]
#[case("upper-case('abCd0')", "ABCD0")]
#[case("replace('a#b', '#', '-', 'x')", "a-b")]
#[case("replace('a b c', 'b c', 'X', 'x')", "a b c")]
fn string_results(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(expr), expected);
}

#[test]
fn tokenize_splits_on_pattern() {
    assert_eq!(strings("tokenize('The cat sat', '\\s+')"), vec!["The", "cat", "sat"]);
    assert_eq!(strings("tokenize('1, 15, 24', ',\\s*')"), vec!["1", "15", "24"]);
    assert!(strings("tokenize((), 'a')").is_empty());
}

#[rstest]
#[case("matches('a', '(')", ErrorCode::FORX0002)]
#[case("matches('a', 'a', 'k')", ErrorCode::FORX0001)]
#[case("replace('a', 'x*', 'y')", ErrorCode::FORX0003)]
#[case("tokenize('a', 'x?')", ErrorCode::FORX0003)]
#[case("replace('a', 'a', '$')", ErrorCode::FORX0004)]
fn literal_regex_errors_are_static(#[case] expr: &str, #[case] code: ErrorCode) {
    let err = compile_xpath::<SimpleNode>(expr, &StaticContext::default(), &FunctionLibraryList::standard())
        .unwrap_err();
    assert_eq!(err.code_enum(), code);
    assert!(err.is_static());
}

#[test]
fn regex_from_variable_fails_at_run_time() {
    let p = ExpandedName::new(None, "p");
    let ctx = xpath_functions::DynamicContextBuilder::<SimpleNode>::new()
        .with_variable(p, vec![xpath_functions::XdmItem::Atomic("(".into())])
        .build();
    let err = xpath_functions::evaluate_expr::<SimpleNode>("matches('a', $p)", &ctx).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORX0002);
    assert!(!err.is_static());
}

#[test]
fn unknown_collation_is_rejected() {
    assert_eq!(err_code("compare('a', 'b', 'urn:nope')"), ErrorCode::FOCH0002);
}
