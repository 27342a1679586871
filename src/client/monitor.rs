//! Monitor operations.

use serde::{Deserialize, Serialize};

use super::warehouse::SuccessResult;
use super::{Operation, Uuid};

/// One comparison of a comparison rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRuleComparisonInput {
    /// Comparison operator, e.g. `GT`.
    pub operator: String,
    /// Threshold the query result is compared against.
    pub threshold: f64,
    /// Kind of comparison, e.g. `SOURCE_TARGET_DELTA`.
    pub comparison_type: String,
    /// Whether the threshold is relative.
    pub is_threshold_relative: bool,
}

/// Scheduling of a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfigInput {
    /// `LOOSE`, `FIXED`, `DYNAMIC` or `MANUAL`.
    pub schedule_type: String,
}

/// `createOrUpdateComparisonRule`
pub struct CreateOrUpdateComparisonRule;

/// Variables of [`CreateOrUpdateComparisonRule`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateComparisonRuleVariables {
    /// Rule to update, null to create one.
    pub custom_rule_uuid: Option<Uuid>,
    /// Description.
    pub description: String,
    /// Comparisons evaluated on every run.
    pub comparisons: Vec<CustomRuleComparisonInput>,
    /// Shape of the query results.
    pub query_result_type: String,
    /// Connection of the source query, null for the default one.
    pub source_connection_id: Option<Uuid>,
    /// Warehouse of the source query.
    pub source_dw_id: Uuid,
    /// Source query.
    pub source_sql_query: String,
    /// Connection of the target query, null for the default one.
    pub target_connection_id: Option<Uuid>,
    /// Warehouse of the target query.
    pub target_dw_id: Uuid,
    /// Target query.
    pub target_sql_query: String,
    /// Schedule.
    pub schedule_config: ScheduleConfigInput,
}

/// Data of [`CreateOrUpdateComparisonRule`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateComparisonRuleData {
    /// The result.
    pub create_or_update_comparison_rule: ComparisonRuleResult,
}

/// Result of [`CreateOrUpdateComparisonRule`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRuleResult {
    /// The stored rule.
    pub custom_rule: CustomRule,
}

/// A custom rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRule {
    /// Rule identifier.
    pub uuid: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Rule type.
    #[serde(default)]
    pub rule_type: Option<String>,
}

impl Operation for CreateOrUpdateComparisonRule {
    const DOCUMENT: &'static str = "mutation createOrUpdateComparisonRule($comparisons: [CustomRuleComparisonInput!]!, $customRuleUuid: UUID, $description: String!, $queryResultType: QueryResultType, $scheduleConfig: ScheduleConfigInput!, $sourceConnectionId: UUID, $sourceDwId: UUID!, $sourceSqlQuery: String!, $targetConnectionId: UUID, $targetDwId: UUID!, $targetSqlQuery: String!) { createOrUpdateComparisonRule(comparisons: $comparisons, customRuleUuid: $customRuleUuid, description: $description, queryResultType: $queryResultType, scheduleConfig: $scheduleConfig, sourceConnectionId: $sourceConnectionId, sourceDwId: $sourceDwId, sourceSqlQuery: $sourceSqlQuery, targetConnectionId: $targetConnectionId, targetDwId: $targetDwId, targetSqlQuery: $targetSqlQuery) { customRule { uuid, description, ruleType } } }";
    type Variables = CreateOrUpdateComparisonRuleVariables;
    type Data = CreateOrUpdateComparisonRuleData;
}

/// `deleteMonitor`
pub struct DeleteMonitor;

/// Variables of [`DeleteMonitor`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMonitorVariables {
    /// Monitor to delete.
    pub monitor_id: Uuid,
}

/// Data of [`DeleteMonitor`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMonitorData {
    /// The result.
    pub delete_monitor: SuccessResult,
}

impl Operation for DeleteMonitor {
    const DOCUMENT: &'static str = "mutation deleteMonitor($monitorId: UUID!) { deleteMonitor(monitorId: $monitorId) { success } }";
    type Variables = DeleteMonitorVariables;
    type Data = DeleteMonitorData;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::operation_name;
    use serde_json::json;

    #[test]
    fn test_comparison_rule_variables_are_camel_case() {
        let variables = CreateOrUpdateComparisonRuleVariables {
            custom_rule_uuid: None,
            description: "rows match".to_string(),
            comparisons: vec![CustomRuleComparisonInput {
                operator: "GT".to_string(),
                threshold: 0.5,
                comparison_type: "SOURCE_TARGET_DELTA".to_string(),
                is_threshold_relative: false,
            }],
            query_result_type: "ROW_COUNT".to_string(),
            source_connection_id: None,
            source_dw_id: Uuid::new("dw1").unwrap(),
            source_sql_query: "select 1".to_string(),
            target_connection_id: None,
            target_dw_id: Uuid::new("dw2").unwrap(),
            target_sql_query: "select 2".to_string(),
            schedule_config: ScheduleConfigInput {
                schedule_type: "MANUAL".to_string(),
            },
        };

        let value = serde_json::to_value(variables).unwrap();
        assert!(value["customRuleUuid"].is_null());
        assert_eq!(value["sourceDwId"], "dw1");
        assert_eq!(value["comparisons"][0]["comparisonType"], "SOURCE_TARGET_DELTA");
        assert_eq!(value["scheduleConfig"], json!({"scheduleType": "MANUAL"}));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(
            operation_name(CreateOrUpdateComparisonRule::DOCUMENT),
            Some("createOrUpdateComparisonRule")
        );
        assert_eq!(operation_name(DeleteMonitor::DOCUMENT), Some("deleteMonitor"));
    }
}
