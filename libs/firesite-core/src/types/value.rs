use serde_json::Value;
use std::cmp::Ordering;

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 4,
    }
}

/// Total order over field values: missing/null, booleans, numbers, strings,
/// then arrays and objects (all equal to each other). With `fold_case`,
/// strings compare case-insensitively.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>, fold_case: bool) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) if fold_case => a.to_lowercase().cmp(&b.to_lowercase()),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_fold_case_on_request() {
        let (a, b) = (json!("apple"), json!("Banana"));
        assert_eq!(compare_values(Some(&a), Some(&b), true), Ordering::Less);
        assert_eq!(compare_values(Some(&a), Some(&b), false), Ordering::Greater);
        assert_eq!(
            compare_values(Some(&json!("ABC")), Some(&json!("abc")), true),
            Ordering::Equal
        );
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(
            compare_values(Some(&json!(9)), Some(&json!(10.5)), true),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&json!(2)), Some(&json!(2.0)), true),
            Ordering::Equal
        );
    }

    #[test]
    fn mixed_types_follow_rank() {
        let values = [json!(null), json!(false), json!(3), json!("x"), json!([1])];
        for pair in values.windows(2) {
            assert_eq!(
                compare_values(Some(&pair[0]), Some(&pair[1]), true),
                Ordering::Less
            );
        }
        assert_eq!(compare_values(None, Some(&json!(null)), true), Ordering::Equal);
        assert_eq!(
            compare_values(Some(&json!({"a": 1})), Some(&json!([2])), true),
            Ordering::Equal
        );
    }
}
