//! Test case table in the CSV layout the design and execution services exchange.
//!
//! List-valued columns (steps, expected results) are joined with commas inside
//! a single quoted field. A case's expected element travels in the `Test Data`
//! column as `expect:<key>`.

use crate::domain::TestCase;

pub const CASE_HEADER: [&str; 9] = [
    "Test Case ID",
    "Requirement ID",
    "Test Name",
    "Test Objective",
    "Preconditions",
    "Test Steps",
    "Expected Results",
    "Test Data",
    "Test Environment",
];

const EXPECT_PREFIX: &str = "expect:";

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn split_list(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Render cases as CSV with a header row
pub fn format_cases(cases: &[TestCase]) -> String {
    let mut out = CASE_HEADER.join(",");
    out.push('\n');
    for case in cases {
        let test_data = case
            .expected_element
            .as_ref()
            .map(|e| format!("{}{}", EXPECT_PREFIX, e))
            .unwrap_or_default();
        let steps = case.steps.join(",");
        let expected = case.expected_results.join(",");
        let row: [&str; 9] = [
            &case.id,
            "",
            &case.name,
            &case.objective,
            "",
            &steps,
            &expected,
            &test_data,
            "web browser",
        ];
        let fields: Vec<String> = row.iter().map(|f| quote(f)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Split CSV text into records, honoring quoted fields with embedded commas,
/// doubled quotes and newlines.
fn records(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => row.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            (c, _) => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows.retain(|r| r.iter().any(|f| !f.trim().is_empty()));
    rows
}

/// Parse a CSV test case table.
///
/// Columns are located by header name; a missing `Test Case ID` or `Test Name`
/// column is an error, other columns are optional.
pub fn parse_cases(text: &str) -> Result<Vec<TestCase>, String> {
    let mut rows = records(text).into_iter();
    let header = rows.next().ok_or_else(|| "empty test case table".to_string())?;
    let col = |name: &str| header.iter().position(|h| h.trim() == name);

    let id_col = col("Test Case ID").ok_or_else(|| "missing 'Test Case ID' column".to_string())?;
    let name_col = col("Test Name").ok_or_else(|| "missing 'Test Name' column".to_string())?;
    let data_col = col("Test Data");
    let objective_col = col("Test Objective");
    let steps_col = col("Test Steps");
    let expected_col = col("Expected Results");

    let get = |row: &[String], idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i)).map(|s| s.trim().to_string()).unwrap_or_default()
    };

    Ok(rows
        .map(|row| {
            let data = get(&row, data_col);
            TestCase {
                id: get(&row, Some(id_col)),
                name: get(&row, Some(name_col)),
                objective: get(&row, objective_col),
                steps: split_list(&get(&row, steps_col)),
                expected_results: split_list(&get(&row, expected_col)),
                expected_element: data
                    .strip_prefix(EXPECT_PREFIX)
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty()),
            }
        })
        .collect())
}
