//! Behavioural tests for descriptor filter evaluation.

use openbounds_core::{ComparisonOp, FilterClause, FilterExpression, FilterOperator, Properties};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use std::cell::RefCell;

fn properties(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, found {other}"),
    }
}

fn active_park(combinator: FilterOperator) -> FilterExpression {
    FilterExpression::new(
        vec![
            FilterClause::new("status", ComparisonOp::Eq, json!("active")),
            FilterClause::new("kind", ComparisonOp::Eq, json!("park")),
        ],
        combinator,
    )
}

#[fixture]
fn filter() -> RefCell<Option<FilterExpression>> {
    RefCell::new(None)
}

#[fixture]
fn outcome() -> RefCell<Option<bool>> {
    RefCell::new(None)
}

fn evaluate(
    filter: &RefCell<Option<FilterExpression>>,
    outcome: &RefCell<Option<bool>>,
    feature: &Properties,
) {
    let matched = filter
        .borrow()
        .as_ref()
        .expect("filter prepared")
        .matches(feature);
    *outcome.borrow_mut() = Some(matched);
}

#[given("a filter requiring an active park joined by and")]
fn and_filter(#[from(filter)] filter: &RefCell<Option<FilterExpression>>) {
    *filter.borrow_mut() = Some(active_park(FilterOperator::And));
}

#[given("a filter requiring an active park joined by or")]
fn or_filter(#[from(filter)] filter: &RefCell<Option<FilterExpression>>) {
    *filter.borrow_mut() = Some(active_park(FilterOperator::Or));
}

#[when("I evaluate an active road")]
fn evaluate_active_road(
    #[from(filter)] filter: &RefCell<Option<FilterExpression>>,
    #[from(outcome)] outcome: &RefCell<Option<bool>>,
) {
    let feature = properties(json!({"status": "active", "kind": "road"}));
    evaluate(filter, outcome, &feature);
}

#[when("I evaluate a feature without status or kind")]
fn evaluate_bare_feature(
    #[from(filter)] filter: &RefCell<Option<FilterExpression>>,
    #[from(outcome)] outcome: &RefCell<Option<bool>>,
) {
    let feature = properties(json!({"name": "unnamed"}));
    evaluate(filter, outcome, &feature);
}

#[then("the feature is retained")]
fn feature_retained(#[from(outcome)] outcome: &RefCell<Option<bool>>) {
    assert_eq!(*outcome.borrow(), Some(true), "expected the feature to match");
}

#[then("the feature is rejected")]
fn feature_rejected(#[from(outcome)] outcome: &RefCell<Option<bool>>) {
    assert_eq!(*outcome.borrow(), Some(false), "expected the feature to be dropped");
}

#[scenario(path = "tests/features/filter.feature", index = 0)]
fn scenario_and_filter(filter: RefCell<Option<FilterExpression>>, outcome: RefCell<Option<bool>>) {
    let _ = (filter, outcome);
}

#[scenario(path = "tests/features/filter.feature", index = 1)]
fn scenario_or_filter(filter: RefCell<Option<FilterExpression>>, outcome: RefCell<Option<bool>>) {
    let _ = (filter, outcome);
}

#[scenario(path = "tests/features/filter.feature", index = 2)]
fn scenario_missing_properties(
    filter: RefCell<Option<FilterExpression>>,
    outcome: RefCell<Option<bool>>,
) {
    let _ = (filter, outcome);
}
