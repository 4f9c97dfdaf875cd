//! Schema description for the Power BI usage metrics model.
//!
//! The model is a fixed star schema with exactly four queryable columns and
//! two derived measures. The column list is a hard whitelist: no generated
//! query may ever reference a table or column outside it, under any other
//! spelling or casing.

use serde::{Deserialize, Serialize};

/// `Dates[Date]` — the time axis, one row per calendar day.
pub const COL_DATE: &str = "Dates[Date]";
/// `Reports[ReportName]` — display name of a report.
pub const COL_REPORT_NAME: &str = "Reports[ReportName]";
/// `'Report views'[UserId]` — the viewing user, one row per view event.
pub const COL_USER_ID: &str = "'Report views'[UserId]";
/// `'Report views'[ReportId]` — the viewed report, one row per view event.
pub const COL_REPORT_ID: &str = "'Report views'[ReportId]";

/// Total view events.
pub const MEASURE_COUNT_VIEWS: &str = "CountReportId";
/// Distinct viewing users.
pub const MEASURE_DISTINCT_USERS: &str = "DistinctCountUserId";

pub const MEASURE_COUNT_VIEWS_EXPR: &str = "COUNT('Report views'[ReportId])";
pub const MEASURE_DISTINCT_USERS_EXPR: &str = "DISTINCTCOUNT('Report views'[UserId])";

/// Immutable schema description, loaded once at startup and shared by
/// reference. `version` lets the context file evolve without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSchema {
    pub version: u32,
    /// Free-text description handed to the LLM as system context.
    pub description: String,
    /// The fixed DAX skeleton every adaptation starts from.
    pub reference_template: String,
}

impl UsageSchema {
    /// All whitelisted column identifiers, exact spelling.
    pub fn whitelisted_columns() -> [&'static str; 4] {
        [COL_DATE, COL_REPORT_NAME, COL_USER_ID, COL_REPORT_ID]
    }

    /// Both measure aliases. They are always computed together: the
    /// explanation step needs total views and unique users side by side.
    pub fn measure_aliases() -> [&'static str; 2] {
        [MEASURE_COUNT_VIEWS, MEASURE_DISTINCT_USERS]
    }
}

impl Default for UsageSchema {
    fn default() -> Self {
        Self {
            version: 1,
            description: DEFAULT_DESCRIPTION.to_string(),
            reference_template: DEFAULT_REFERENCE_TEMPLATE.to_string(),
        }
    }
}

pub const DEFAULT_DESCRIPTION: &str = "\
You are a DAX assistant for a Power BI usage metrics dataset.

The data model contains exactly three tables and four usable columns:
  - Dates[Date]: one row per calendar day
  - Reports[ReportName]: display name of each report
  - 'Report views'[UserId]: the user who viewed a report (one row per view)
  - 'Report views'[ReportId]: the report that was viewed (one row per view)

Two derived measures exist and must always be computed together:
  - \"CountReportId\" = COUNT('Report views'[ReportId])  (total views)
  - \"DistinctCountUserId\" = DISTINCTCOUNT('Report views'[UserId])  (unique users)

No other table, column, or measure exists. Never invent names, never rename
these, never change their casing.";

pub const DEFAULT_REFERENCE_TEMPLATE: &str = "\
EVALUATE
SUMMARIZECOLUMNS(
    Dates[Date],
    Reports[ReportName],
    \"CountReportId\", COUNT('Report views'[ReportId]),
    \"DistinctCountUserId\", DISTINCTCOUNT('Report views'[UserId])
)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_mentions_only_whitelisted_names() {
        let schema = UsageSchema::default();
        assert!(schema.reference_template.contains(COL_DATE));
        assert!(schema.reference_template.contains(COL_REPORT_NAME));
        assert!(schema.reference_template.contains(MEASURE_COUNT_VIEWS));
        assert!(schema.reference_template.contains(MEASURE_DISTINCT_USERS));
    }

    #[test]
    fn whitelist_is_exactly_four_columns_two_measures() {
        assert_eq!(UsageSchema::whitelisted_columns().len(), 4);
        assert_eq!(UsageSchema::measure_aliases().len(), 2);
    }
}
