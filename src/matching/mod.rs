//! Normalization & Matching
//!
//! Makes free-text assignment fields comparable despite inconsistent source
//! formatting: `"1st Year"`, `"1st"`, `"Year 1"` and `"1"` all reduce to the
//! canonical key `"1"`.
//!
//! All functions here are pure and total. Matching fails closed: a record
//! with a missing field, or an empty accepted set, never matches.

use std::collections::HashSet;

use serde_json::Value;

#[cfg(test)]
mod proptest;

/// Filler substrings removed during normalization, longest first.
const FILLER_TOKENS: [&str; 8] = ["division", "div", "year", "yr", "st", "nd", "rd", "th"];

/// Field names that may hold a year (or years) assignment.
pub const YEAR_FIELDS: [&str; 6] = ["Year", "year", "years", "Years", "yearsTaught", "classYear"];

/// Field names that may hold a division (or divisions) assignment.
pub const DIVISION_FIELDS: [&str; 5] = ["Division", "division", "divisions", "Divisions", "div"];

// =============================================================================
// Normalization
// =============================================================================

/// Canonical comparison key for a free-text field.
///
/// Lowercases, drops all whitespace, then strips filler tokens until none
/// remain, so the result is a fixed point: `normalize(normalize(s)) ==
/// normalize(s)`.
pub fn normalize(value: &str) -> String {
    let mut canonical: String = value
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    loop {
        let mut changed = false;
        for token in FILLER_TOKENS {
            if canonical.contains(token) {
                canonical = canonical.replace(token, "");
                changed = true;
            }
        }
        if !changed {
            return canonical;
        }
    }
}

/// Normalize a JSON value; numbers are rendered first, anything else that is
/// not a string yields an empty key.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::String(s) => normalize(s),
        Value::Number(n) => normalize(&n.to_string()),
        _ => String::new(),
    }
}

/// First run of ASCII digits in `value`, if any.
pub fn extract_leading_number(value: &str) -> Option<String> {
    let start = value.find(|c: char| c.is_ascii_digit())?;
    Some(
        value[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect(),
    )
}

/// A raw field value paired with its canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedAssignmentKey {
    pub raw: String,
    pub canonical: String,
}

impl NormalizedAssignmentKey {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let canonical = normalize(&raw);
        Self { raw, canonical }
    }

    /// Numeric fallback key
    pub fn leading_number(&self) -> Option<String> {
        extract_leading_number(&self.raw)
    }
}

// =============================================================================
// Field Shapes
// =============================================================================

/// Flatten a field that may be an array, a map of index to value, a single
/// scalar, or absent. Nulls are dropped; order is preserved.
pub fn to_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        Value::Object(map) => map.values().filter(|v| !v.is_null()).cloned().collect(),
        scalar => vec![scalar.clone()],
    }
}

/// Like [`to_list`], keeping only string and numeric entries as text.
pub fn to_string_list(value: &Value) -> Vec<String> {
    to_list(value)
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// First non-null field among `aliases`.
pub fn lookup_field<'a>(record: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let map = record.as_object()?;
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .find(|v| !v.is_null())
}

/// Text values of the first present alias, flattened.
pub fn field_strings(record: &Value, aliases: &[&str]) -> Vec<String> {
    lookup_field(record, aliases)
        .map(to_string_list)
        .unwrap_or_default()
}

// =============================================================================
// Matching
// =============================================================================

/// Accepted year keys: each value contributes its canonical form and its
/// leading number.
pub fn canonical_years<I, S>(values: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut accepted = HashSet::new();
    for value in values {
        let value = value.as_ref();
        let canonical = normalize(value);
        if !canonical.is_empty() {
            accepted.insert(canonical);
        }
        if let Some(number) = extract_leading_number(value) {
            accepted.insert(number);
        }
    }
    accepted
}

/// Accepted division keys. Divisions are letters, so there is no numeric
/// fallback.
pub fn canonical_divisions<I, S>(values: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| normalize(v.as_ref()))
        .filter(|c| !c.is_empty())
        .collect()
}

/// Does a candidate year/division pair fall inside the accepted sets?
///
/// The year matches on its canonical form or, failing that, its leading
/// number. The division must match on its canonical form. Empty candidate
/// fields and empty accepted sets never match.
pub fn matches(
    candidate_year: &str,
    candidate_division: &str,
    accepted_years: &HashSet<String>,
    accepted_divisions: &HashSet<String>,
) -> bool {
    if accepted_years.is_empty() || accepted_divisions.is_empty() {
        return false;
    }

    let year = normalize(candidate_year);
    let division = normalize(candidate_division);
    if year.is_empty() || division.is_empty() {
        return false;
    }

    let year_ok = accepted_years.contains(&year)
        || extract_leading_number(candidate_year).is_some_and(|n| accepted_years.contains(&n));

    year_ok && accepted_divisions.contains(&division)
}

/// The years and divisions a person is assigned to, as accepted key sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentScope {
    pub years: HashSet<String>,
    pub divisions: HashSet<String>,
}

impl AssignmentScope {
    /// Build a scope from raw year and division values.
    pub fn new<Y, D, S, T>(years: Y, divisions: D) -> Self
    where
        Y: IntoIterator<Item = S>,
        D: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            years: canonical_years(years),
            divisions: canonical_divisions(divisions),
        }
    }

    /// Read a scope from a person record's year and division fields.
    pub fn from_record(record: &Value) -> Self {
        Self::new(
            field_strings(record, &YEAR_FIELDS),
            field_strings(record, &DIVISION_FIELDS),
        )
    }

    /// A scope with no years or no divisions matches nothing.
    pub fn is_empty(&self) -> bool {
        self.years.is_empty() || self.divisions.is_empty()
    }

    /// Does any year/division pair of `record` fall inside this scope?
    pub fn matches_record(&self, record: &Value) -> bool {
        if self.is_empty() {
            return false;
        }
        let years = field_strings(record, &YEAR_FIELDS);
        let divisions = field_strings(record, &DIVISION_FIELDS);

        years.iter().any(|year| {
            divisions
                .iter()
                .any(|division| matches(year, division, &self.years, &self.divisions))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_normalize_equivalent_year_forms() {
        assert_eq!(normalize("1st Year"), "1");
        assert_eq!(normalize("1 year"), "1");
        assert_eq!(normalize("Year1"), "1");
        assert_eq!(normalize("  2ND  YR "), "2");
        assert_eq!(normalize("3rd"), "3");
        assert_eq!(normalize("4th Year"), "4");
    }

    #[test]
    fn test_normalize_divisions() {
        assert_eq!(normalize("Division A"), "a");
        assert_eq!(normalize("div B"), "b");
        assert_eq!(normalize("C"), "c");
    }

    #[test]
    fn test_normalize_strips_to_fixed_point() {
        // Removing "st" exposes "year"; that must be stripped as well.
        assert_eq!(normalize("yestar"), normalize(&normalize("yestar")));
        assert_eq!(normalize("yestar"), "");
    }

    #[test]
    fn test_normalize_value_shapes() {
        assert_eq!(normalize_value(&json!("2nd Year")), "2");
        assert_eq!(normalize_value(&json!(3)), "3");
        assert_eq!(normalize_value(&json!(null)), "");
        assert_eq!(normalize_value(&json!({ "a": 1 })), "");
    }

    #[test]
    fn test_extract_leading_number() {
        assert_eq!(extract_leading_number("Year 12").as_deref(), Some("12"));
        assert_eq!(extract_leading_number("2nd").as_deref(), Some("2"));
        assert_eq!(extract_leading_number("FY"), None);
        assert_eq!(extract_leading_number(""), None);
    }

    #[test]
    fn test_normalized_assignment_key() {
        let key = NormalizedAssignmentKey::new("Year 2");
        assert_eq!(key.canonical, "2");
        assert_eq!(key.leading_number().as_deref(), Some("2"));
        assert_eq!(key.raw, "Year 2");
    }

    #[test]
    fn test_to_list_shapes() {
        assert_eq!(to_list(&json!(["1st", null, "2nd"])), vec![json!("1st"), json!("2nd")]);
        assert_eq!(
            to_list(&json!({ "0": "A", "1": "B" })),
            vec![json!("A"), json!("B")]
        );
        assert_eq!(to_list(&json!("A")), vec![json!("A")]);
        assert!(to_list(&json!(null)).is_empty());
    }

    #[test]
    fn test_lookup_field_aliases() {
        let record = json!({ "year": null, "Years": ["1st"], "Division": "A" });

        assert_eq!(lookup_field(&record, &YEAR_FIELDS), Some(&json!(["1st"])));
        assert_eq!(field_strings(&record, &DIVISION_FIELDS), vec!["A".to_string()]);
        assert!(lookup_field(&json!("not an object"), &YEAR_FIELDS).is_none());
    }

    #[test]
    fn test_matches_year_fallback_to_number() {
        let years = canonical_years(["Year 1"]);
        let divisions = canonical_divisions(["A"]);

        assert!(matches("1st Year", "A", &years, &divisions));
        assert!(matches("1", "Division A", &years, &divisions));
        assert!(!matches("2nd", "A", &years, &divisions));
    }

    #[test]
    fn test_matches_uses_leading_number_of_candidate() {
        // Canonical forms disagree ("1sem" vs "1") but the numbers agree.
        let years = set(&["1"]);
        let divisions = set(&["a"]);
        assert!(matches("1 sem", "A", &years, &divisions));
    }

    #[test]
    fn test_division_has_no_numeric_fallback() {
        let years = set(&["1"]);
        let divisions = canonical_divisions(["A1"]);
        assert!(!matches("1", "A2", &years, &divisions));
    }

    #[test]
    fn test_matches_fails_closed() {
        let empty = HashSet::new();
        assert!(!matches("1st", "A", &empty, &empty));
        assert!(!matches("", "", &empty, &empty));
        assert!(!matches("1st", "A", &set(&["1"]), &empty));

        let years = set(&["1"]);
        let divisions = set(&["a"]);
        assert!(!matches("", "A", &years, &divisions));
        assert!(!matches("1", "", &years, &divisions));
    }

    #[test]
    fn test_teacher_scope_scenario() {
        let teacher = json!({ "years": ["1st", "2nd"], "divisions": { "0": "A" } });
        let scope = AssignmentScope::from_record(&teacher);

        assert!(scope.matches_record(&json!({ "Year": "2nd Year", "Division": "A" })));
        assert!(!scope.matches_record(&json!({ "Year": "3rd", "Division": "A" })));
        assert!(!scope.matches_record(&json!({ "Year": "1st", "Division": "B" })));
        assert!(!scope.matches_record(&json!({ "Year": "1st" })));
    }

    #[test]
    fn test_empty_scope_matches_nothing() {
        let scope = AssignmentScope::from_record(&json!({ "name": "no assignments" }));
        assert!(scope.is_empty());
        assert!(!scope.matches_record(&json!({ "Year": "", "Division": "" })));
        assert!(!scope.matches_record(&json!({ "Year": "1", "Division": "A" })));
    }

    #[test]
    fn test_faculty_scope_accepts_student() {
        let faculty = AssignmentScope::from_record(&json!({
            "yearsTaught": ["2nd Year", "3rd Year"],
            "divisions": ["A", "B"]
        }));

        assert!(faculty.matches_record(&json!({ "Year": "2nd", "Division": "B" })));
        assert!(!faculty.matches_record(&json!({ "Year": "1st", "Division": "B" })));
    }
}
