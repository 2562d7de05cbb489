mod common;

use common::{as_string, err_code, single, strings};
use rstest::rstest;
use xpath_functions::{ErrorCode, XdmAtomicValue};

#[test]
fn sum_of_empty_is_zero_but_avg_of_empty_is_empty() {
    assert_eq!(single("sum(())"), XdmAtomicValue::Integer(0));
    assert!(strings("avg(())").is_empty());
    assert!(strings("sum((), ())").is_empty());
    assert_eq!(as_string("sum((), 'none')"), "none");
}

#[rstest]
#[case("sum((1, 2, 3))", "6")]
#[case("sum((1, 2.5))", "3.5")]
#[case("sum((1, xs:untypedAtomic('2')))", "3")]
#[case("avg((1, 2, 3, 4))", "2.5")]
#[case("sum((1, xs:double('NaN'), 3))", "NaN")]
#[case("sum((xs:dayTimeDuration('PT1H'), xs:dayTimeDuration('PT30M')))", "PT1H30M")]
#[case("avg((xs:yearMonthDuration('P1Y'), xs:yearMonthDuration('P2Y')))", "P1Y6M")]
fn sums_and_averages(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(expr), expected);
}

fn numeric(expr: &str) -> f64 {
    as_string(expr).parse().unwrap()
}

#[rstest]
#[case("(1, 2, 3)")]
#[case("(1, 2, 4)")]
#[case("(1.5, 2.25, -4)")]
#[case("(xs:double('0.5'), 2, 7.25)")]
#[case("(xs:float('1.5'), 2.5)")]
#[case("(xs:untypedAtomic('3'), 9)")]
#[case("(10)")]
fn sum_is_average_times_count(#[case] seq: &str) {
    let sum = numeric(&format!("sum({seq})"));
    let avg = numeric(&format!("avg({seq})"));
    let count = numeric(&format!("count({seq})"));
    assert!((avg * count - sum).abs() <= 1e-9 * sum.abs().max(1.0), "{seq}: {avg} * {count} != {sum}");
}

#[test]
fn untyped_values_sum_as_doubles() {
    assert_eq!(single("sum((1, xs:untypedAtomic('2')))"), XdmAtomicValue::Double(3.0));
}

#[rstest]
#[case("sum((1, xs:date('2020-01-01')))")]
#[case("sum(('a', 'b'))")]
#[case("sum((xs:dayTimeDuration('PT1H'), 1))")]
#[case("avg((xs:yearMonthDuration('P1Y'), xs:dayTimeDuration('PT1H')))")]
fn mixed_inputs_are_rejected(#[case] expr: &str) {
    assert_eq!(err_code(expr), ErrorCode::FORG0006);
}

#[rstest]
#[case("count(())", 0)]
#[case("count((1, 'a', 2.5))", 3)]
#[case("count(subsequence((1, 2, 3, 4), 2))", 3)]
fn count_items(#[case] expr: &str, #[case] expected: i64) {
    assert_eq!(single(expr), XdmAtomicValue::Integer(expected));
}

#[rstest]
#[case("min((3, 1, 2))", "1")]
#[case("max((3, 1.5, 2))", "3")]
#[case("max(('apple', 'Banana'))", "apple")]
#[case("min((1, xs:double('NaN')))", "NaN")]
fn min_and_max(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(expr), expected);
}

#[test]
fn max_promotes_to_common_numeric_type() {
    assert_eq!(single("max((1, xs:double('2')))"), XdmAtomicValue::Double(2.0));
}
