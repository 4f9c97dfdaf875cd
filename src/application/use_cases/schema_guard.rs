//! Schema Guard for generated DAX
//!
//! Every query produced by the generation collaborator is checked here
//! before it may reach the execution API. Deny by default: only the four
//! whitelisted column references, the two fixed measure aliases, and a
//! small set of structural DAX functions may appear. A rejected query is
//! never executed.

use crate::domain::usage_schema::UsageSchema;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

/// Structural functions the reference template and its legal adaptations
/// may use. Anything else (new aggregations, table constructors) violates
/// the no-structural-deviation rule.
const ALLOWED_FUNCTIONS: &[&str] = &[
    "SUMMARIZECOLUMNS",
    "FILTER",
    "VALUES",
    "KEEPFILTERS",
    "COUNT",
    "DISTINCTCOUNT",
];

#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
        }
    }

    pub fn add_error(&mut self, code: &str, message: &str) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

pub struct SchemaGuard {
    column_re: Regex,
    function_re: Regex,
}

impl Default for SchemaGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaGuard {
    pub fn new() -> Self {
        // `'Report views'[UserId]` or `Dates[Date]` style references.
        let column_re = Regex::new(r"(?:'[^']+'|[A-Za-z_][A-Za-z0-9_]*)\s*\[[^\]]+\]")
            .expect("column reference pattern compiles");
        // Function names are case-insensitive to the DAX engine, so the
        // match must be too or `averagex(` slips past the allowlist.
        let function_re =
            Regex::new(r"(?i)\b([A-Za-z][A-Za-z]+)\s*\(").expect("function pattern compiles");
        Self {
            column_re,
            function_re,
        }
    }

    /// Validate a DAX string against the whitelist and structural rules.
    pub fn validate(&self, dax: &str) -> ValidationResult {
        let mut result = ValidationResult::valid();

        let trimmed = dax.trim();
        if trimmed.is_empty() {
            result.add_error("EMPTY_QUERY", "Generated query is empty");
            return result;
        }

        if !trimmed.to_uppercase().starts_with("EVALUATE") {
            result.add_error(
                "NOT_A_QUERY",
                "Generated DAX does not start with an EVALUATE statement",
            );
        }

        // 1. Every table-column reference must be one of the four
        //    whitelisted identifiers, exact spelling and case.
        let whitelist = UsageSchema::whitelisted_columns();
        for m in self.column_re.find_iter(dax) {
            let reference = normalize_reference(m.as_str());
            if !whitelist.contains(&reference.as_str()) {
                result.add_error(
                    "NAME_NOT_WHITELISTED",
                    &format!(
                        "Reference '{}' is outside the usage metrics schema. Allowed: {:?}",
                        reference, whitelist
                    ),
                );
            }
        }

        // 2. Both measure aliases must be present, under their exact names.
        for alias in UsageSchema::measure_aliases() {
            if !dax.contains(&format!("\"{}\"", alias)) {
                result.add_error(
                    "MISSING_MEASURE",
                    &format!("Measure alias \"{}\" is missing; both measures are always computed", alias),
                );
            }
        }

        // 3. No aggregation functions beyond the two fixed ones, no
        //    structural rewrites via other table functions.
        for caps in self.function_re.captures_iter(dax) {
            if let Some(name) = caps.get(1) {
                let name = name.as_str().to_uppercase();
                if !ALLOWED_FUNCTIONS.contains(&name.as_str()) {
                    result.add_error(
                        "FORBIDDEN_FUNCTION",
                        &format!("Function '{}' deviates from the reference query structure", name),
                    );
                }
            }
        }

        if dax.contains("--") || dax.contains("//") || dax.contains("/*") {
            result.add_warning("Generated DAX contains comments");
        }

        if !result.is_valid {
            warn!(errors = ?result.errors, "schema guard rejected generated DAX");
        }
        result
    }
}

/// Collapse whitespace between table name and bracket so `Dates [Date]`
/// compares equal to `Dates[Date]`.
fn normalize_reference(raw: &str) -> String {
    match raw.find('[') {
        Some(idx) => {
            let (table, column) = raw.split_at(idx);
            format!("{}{}", table.trim_end(), column)
        }
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::usage_schema::DEFAULT_REFERENCE_TEMPLATE;

    #[test]
    fn reference_template_passes() {
        let guard = SchemaGuard::new();
        let result = guard.validate(DEFAULT_REFERENCE_TEMPLATE);
        assert!(result.is_valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn adapted_query_with_filter_passes() {
        let guard = SchemaGuard::new();
        let dax = "EVALUATE\nSUMMARIZECOLUMNS(\n    Reports[ReportName],\n    FILTER(VALUES(Reports[ReportName]), Reports[ReportName] = \"Sales Dashboard\"),\n    \"CountReportId\", COUNT('Report views'[ReportId]),\n    \"DistinctCountUserId\", DISTINCTCOUNT('Report views'[UserId])\n)";
        let result = guard.validate(dax);
        assert!(result.is_valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn unknown_table_is_rejected() {
        let guard = SchemaGuard::new();
        let dax = "EVALUATE\nSUMMARIZECOLUMNS(\n    Users[Email],\n    \"CountReportId\", COUNT('Report views'[ReportId]),\n    \"DistinctCountUserId\", DISTINCTCOUNT('Report views'[UserId])\n)";
        let result = guard.validate(dax);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.code == "NAME_NOT_WHITELISTED"));
    }

    #[test]
    fn misspelled_column_is_rejected() {
        let guard = SchemaGuard::new();
        let dax = "EVALUATE\nSUMMARIZECOLUMNS(\n    Dates[date],\n    \"CountReportId\", COUNT('Report views'[ReportId]),\n    \"DistinctCountUserId\", DISTINCTCOUNT('Report views'[UserId])\n)";
        let result = guard.validate(dax);
        assert!(!result.is_valid);
    }

    #[test]
    fn dropped_measure_is_rejected() {
        let guard = SchemaGuard::new();
        let dax = "EVALUATE\nSUMMARIZECOLUMNS(\n    Reports[ReportName],\n    \"CountReportId\", COUNT('Report views'[ReportId])\n)";
        let result = guard.validate(dax);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.code == "MISSING_MEASURE"));
    }

    #[test]
    fn foreign_aggregation_is_rejected() {
        let guard = SchemaGuard::new();
        let dax = "EVALUATE\nSUMMARIZECOLUMNS(\n    Reports[ReportName],\n    \"CountReportId\", COUNT('Report views'[ReportId]),\n    \"DistinctCountUserId\", DISTINCTCOUNT('Report views'[UserId]),\n    \"Avg\", AVERAGE('Report views'[ReportId])\n)";
        let result = guard.validate(dax);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.code == "FORBIDDEN_FUNCTION"));
    }

    #[test]
    fn lowercase_foreign_aggregation_is_rejected() {
        let guard = SchemaGuard::new();
        let dax = "EVALUATE\nSUMMARIZECOLUMNS(\n    Reports[ReportName],\n    \"CountReportId\", COUNT('Report views'[ReportId]),\n    \"DistinctCountUserId\", DISTINCTCOUNT('Report views'[UserId]),\n    \"Avg\", averagex('Report views', 'Report views'[ReportId])\n)";
        let result = guard.validate(dax);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.code == "FORBIDDEN_FUNCTION"));
    }

    #[test]
    fn lowercase_allowed_functions_still_pass() {
        let guard = SchemaGuard::new();
        let dax = "evaluate\nsummarizecolumns(\n    Reports[ReportName],\n    filter(values(Reports[ReportName]), Reports[ReportName] = \"Sales Dashboard\"),\n    \"CountReportId\", count('Report views'[ReportId]),\n    \"DistinctCountUserId\", distinctcount('Report views'[UserId])\n)";
        let result = guard.validate(dax);
        assert!(result.is_valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn empty_output_is_rejected() {
        let guard = SchemaGuard::new();
        assert!(!guard.validate("   ").is_valid);
    }
}
