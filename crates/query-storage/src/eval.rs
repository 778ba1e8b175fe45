//! Evaluation of structured requests over JSON rows
//!
//! Clause order follows SQL: filters and text search, then grouping and
//! aggregation, then ordering, limit and finally projection.

use query_core::{
    AggregateFunction, Filter, FilterOp, OrderBy, QueryRequest, SelectItem, StoreResult,
    TextSearch, UpstreamError,
};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Postgres error code for malformed text search input
const SYNTAX_ERROR: &str = "42601";

/// Answer `request` from `rows`
pub fn evaluate(request: &QueryRequest, mut rows: Vec<Value>) -> StoreResult {
    rows.retain(|row| request.filters.iter().all(|f| matches_filter(row, f)));

    if let Some(search) = &request.text_search {
        let tokens = parse_search_query(&search.query)?;
        rows.retain(|row| matches_search(row, search, &tokens));
    }

    if request.is_aggregate() {
        rows = aggregate(&request.select, &rows);
    }

    sort_rows(&mut rows, &request.order);

    if let Some(limit) = request.limit {
        rows.truncate(limit);
    }

    if !request.is_aggregate() {
        rows = project(&request.select, rows);
    }

    Ok(Value::Array(rows))
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

/// Compare two values of the same kind; `None` for nulls and mixed kinds
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total order used for sorting: nulls sort after every other value, mixed
/// kinds sort by kind
fn sort_order(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Array(_) => 3,
            Value::Object(_) => 4,
            Value::Null => 5,
        }
    }

    compare_values(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

fn matches_filter(row: &Value, filter: &Filter) -> bool {
    let value = field(row, &filter.column);
    if filter.op == FilterOp::Eq && value.is_null() {
        return filter.value.is_null();
    }

    match compare_values(value, &filter.value) {
        Some(ordering) => match filter.op {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
        },
        None => filter.op == FilterOp::Eq && value == &filter.value,
    }
}

/// Split a `tok:* & tok:*` expression into lowercase prefixes
fn parse_search_query(query: &str) -> Result<Vec<String>, UpstreamError> {
    let tokens: Vec<String> = query
        .split('&')
        .map(|token| token.trim().trim_end_matches('*').trim_end_matches(':'))
        .map(str::to_lowercase)
        .collect();

    if tokens.is_empty() || tokens.iter().any(|t| t.is_empty()) {
        return Err(
            UpstreamError::new(format!("syntax error in tsquery: \"{}\"", query))
                .with_code(SYNTAX_ERROR),
        );
    }
    Ok(tokens)
}

/// Every token must prefix some word of the searched columns
fn matches_search(row: &Value, search: &TextSearch, tokens: &[String]) -> bool {
    let words: Vec<String> = search
        .columns
        .iter()
        .filter_map(|column| match field(row, column) {
            Value::String(text) => Some(text.to_lowercase()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .flat_map(|text| {
            text.split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    tokens
        .iter()
        .all(|token| words.iter().any(|word| word.starts_with(token.as_str())))
}

fn sort_rows(rows: &mut [Value], order: &[OrderBy]) {
    if order.is_empty() {
        return;
    }

    rows.sort_by(|a, b| {
        for key in order {
            let ordering = sort_order(field(a, &key.column), field(b, &key.column));
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn project(select: &[SelectItem], rows: Vec<Value>) -> Vec<Value> {
    if select.is_empty() || select.contains(&SelectItem::All) {
        return rows;
    }

    rows.into_iter()
        .map(|row| {
            let mut projected = Map::new();
            for item in select {
                if let SelectItem::Column { name } = item {
                    projected.insert(name.clone(), field(&row, name).clone());
                }
            }
            Value::Object(projected)
        })
        .collect()
}

/// Group by the plain columns of `select` and fold each aggregate
///
/// Groups keep first-seen order. Without group columns the result is a
/// single row, even over no input.
fn aggregate(select: &[SelectItem], rows: &[Value]) -> Vec<Value> {
    let group_columns: Vec<&str> = select
        .iter()
        .filter_map(|item| match item {
            SelectItem::Column { name } => Some(name.as_str()),
            _ => None,
        })
        .collect();

    let mut groups: Vec<(Vec<Value>, Vec<&Value>)> = Vec::new();
    for row in rows {
        let key: Vec<Value> = group_columns
            .iter()
            .map(|column| field(row, column).clone())
            .collect();
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    if group_columns.is_empty() && groups.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut out = Map::new();
            for (column, value) in group_columns.iter().zip(key) {
                out.insert(column.to_string(), value);
            }
            for item in select {
                if let SelectItem::Aggregate {
                    field: column,
                    function,
                    alias,
                } = item
                {
                    out.insert(alias.clone(), fold(*function, column, &members));
                }
            }
            Value::Object(out)
        })
        .collect()
}

fn fold(function: AggregateFunction, column: &str, rows: &[&Value]) -> Value {
    if function == AggregateFunction::Count && column == "*" {
        return Value::from(rows.len());
    }

    let values: Vec<&Value> = rows
        .iter()
        .map(|row| field(row, column))
        .filter(|v| !v.is_null())
        .collect();

    match function {
        AggregateFunction::Count => Value::from(values.len()),
        AggregateFunction::Sum => sum(&values).unwrap_or(Value::Null),
        AggregateFunction::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                float(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        AggregateFunction::Min => extreme(&values, Ordering::Less),
        AggregateFunction::Max => extreme(&values, Ordering::Greater),
    }
}

/// Integer sum while every input is an integer, float sum otherwise
fn sum(values: &[&Value]) -> Option<Value> {
    if values.is_empty() {
        return None;
    }

    let integers: Option<Vec<i64>> = values.iter().map(|v| v.as_i64()).collect();
    if let Some(integers) = integers {
        if let Some(total) = integers.iter().try_fold(0i64, |acc, n| acc.checked_add(*n)) {
            return Some(Value::from(total));
        }
    }

    let total: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
    Some(float(total))
}

fn extreme(values: &[&Value], wanted: Ordering) -> Value {
    values
        .iter()
        .copied()
        .fold(None::<&Value>, |best, value| match best {
            Some(current) if compare_values(value, current) != Some(wanted) => Some(current),
            _ => Some(value),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_core::TextSearchConfig;
    use serde_json::json;

    fn bills() -> Vec<Value> {
        vec![
            json!({"id": 1, "doctor": "mehta", "amount": 300, "paid": true,  "issued_on": "2024-01-03"}),
            json!({"id": 2, "doctor": "iyer",  "amount": 150, "paid": false, "issued_on": "2024-01-09"}),
            json!({"id": 3, "doctor": "mehta", "amount": 450, "paid": true,  "issued_on": "2024-02-01"}),
            json!({"id": 4, "doctor": "iyer",  "amount": null, "paid": true, "issued_on": "2024-02-11"}),
        ]
    }

    fn ids(result: StoreResult) -> Vec<i64> {
        match result.unwrap() {
            Value::Array(rows) => rows.iter().filter_map(|r| r["id"].as_i64()).collect(),
            other => panic!("expected rows, got {}", other),
        }
    }

    #[test]
    fn test_filters() {
        let request = QueryRequest::new("bills")
            .eq("paid", true)
            .gte("issued_on", "2024-01-01")
            .lte("issued_on", "2024-01-31");
        assert_eq!(ids(evaluate(&request, bills())), vec![1]);

        let request = QueryRequest::new("bills").gt("amount", 150);
        assert_eq!(ids(evaluate(&request, bills())), vec![1, 3]);

        // Nulls never satisfy a comparison
        let request = QueryRequest::new("bills").lt("amount", 1000);
        assert_eq!(ids(evaluate(&request, bills())), vec![1, 2, 3]);

        let request = QueryRequest::new("bills").eq("amount", Value::Null);
        assert_eq!(ids(evaluate(&request, bills())), vec![4]);
    }

    #[test]
    fn test_order_limit_projection() {
        let request = QueryRequest::new("bills")
            .select("id, doctor")
            .order("doctor", true)
            .order("id", false)
            .limit(3);

        let rows = evaluate(&request, bills()).unwrap();
        assert_eq!(
            rows,
            json!([
                {"id": 4, "doctor": "iyer"},
                {"id": 2, "doctor": "iyer"},
                {"id": 3, "doctor": "mehta"}
            ])
        );
    }

    #[test]
    fn test_nulls_sort_last_ascending() {
        let request = QueryRequest::new("bills").order("amount", true);
        assert_eq!(ids(evaluate(&request, bills())), vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_text_search() {
        let patients = vec![
            json!({"id": 1, "full_name": "John Smith", "phone": "98450 11111"}),
            json!({"id": 2, "full_name": "Joanna Smithers", "phone": null}),
            json!({"id": 3, "full_name": "Jo Brown", "phone": "98450 22222"}),
        ];
        let columns = vec!["full_name".to_string(), "phone".to_string()];

        let request =
            QueryRequest::new("patients").text_search(columns.clone(), "jo:* & smi:*", TextSearchConfig::Simple);
        assert_eq!(ids(evaluate(&request, patients.clone())), vec![1, 2]);

        let request =
            QueryRequest::new("patients").text_search(columns.clone(), "22222:*", TextSearchConfig::Simple);
        assert_eq!(ids(evaluate(&request, patients.clone())), vec![3]);

        let request = QueryRequest::new("patients").text_search(columns, " & ", TextSearchConfig::Simple);
        let err = evaluate(&request, patients).unwrap_err();
        assert_eq!(err.code.as_deref(), Some(SYNTAX_ERROR));
    }

    #[test]
    fn test_grouped_aggregates() {
        let request = QueryRequest::new("bills")
            .column("doctor")
            .aggregate("amount", AggregateFunction::Sum, None)
            .aggregate("amount", AggregateFunction::Avg, None)
            .aggregate("id", AggregateFunction::Count, Some("bills".to_string()))
            .aggregate("amount", AggregateFunction::Max, None)
            .order("sum_amount", false);

        let rows = evaluate(&request, bills()).unwrap();
        assert_eq!(
            rows,
            json!([
                {"doctor": "mehta", "sum_amount": 750, "avg_amount": 375.0, "bills": 2, "max_amount": 450},
                {"doctor": "iyer", "sum_amount": 150, "avg_amount": 150.0, "bills": 2, "max_amount": 150}
            ])
        );
    }

    #[test]
    fn test_ungrouped_aggregate_over_nothing() {
        let request = QueryRequest::new("bills")
            .gt("amount", 10_000)
            .aggregate("*", AggregateFunction::Count, Some("total".to_string()))
            .aggregate("amount", AggregateFunction::Min, None);

        let rows = evaluate(&request, bills()).unwrap();
        assert_eq!(rows, json!([{"total": 0, "min_amount": null}]));
    }

    #[test]
    fn test_float_sum() {
        let rows = vec![json!({"fee": 10}), json!({"fee": 2.5})];
        let request = QueryRequest::new("fees").aggregate("fee", AggregateFunction::Sum, None);
        assert_eq!(evaluate(&request, rows).unwrap(), json!([{"sum_fee": 12.5}]));
    }
}
