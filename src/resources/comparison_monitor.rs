//! `montecarlo_comparison_monitor`
//!
//! A custom rule comparing the result of a source query with a target query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{from_state, required_uuid, to_state, Resource};
use crate::client::monitor::{
    CreateOrUpdateComparisonRule, CreateOrUpdateComparisonRuleVariables, CustomRuleComparisonInput,
    DeleteMonitor, DeleteMonitorVariables, ScheduleConfigInput,
};
use crate::client::{MonteCarloClient, MonteCarloClientExt, Uuid};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema, Validator};
use crate::types::{Applied, ReadResult};

const TYPE_NAME: &str = "montecarlo_comparison_monitor";

const OPERATORS: [&str; 9] = ["EQ", "NEQ", "LT", "LTE", "GT", "GTE", "IS_NULL", "IS_NOT_NULL", "AUTO"];
const COMPARISON_TYPES: [&str; 8] = [
    "THRESHOLD",
    "DYNAMIC_THRESHOLD",
    "CHANGE",
    "FRESHNESS",
    "ABSOLUTE_VOLUME",
    "GROWTH_VOLUME",
    "QUERY_PERFORMANCE",
    "SOURCE_TARGET_DELTA",
];
const QUERY_RESULT_TYPES: [&str; 3] = ["SINGLE_NUMERIC", "ROW_COUNT", "LABELED_NUMERICS"];
const SCHEDULE_TYPES: [&str; 4] = ["LOOSE", "FIXED", "DYNAMIC", "MANUAL"];

/// A comparison monitor.
pub struct ComparisonMonitor;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Model {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    comparisons: Comparison,
    #[serde(default)]
    query_result_type: Option<String>,
    #[serde(default)]
    source: Query,
    #[serde(default)]
    target: Query,
    #[serde(default)]
    schedule_config: ScheduleConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Comparison {
    #[serde(default)]
    operator: Option<String>,
    #[serde(default)]
    threshold_value: Option<f64>,
    #[serde(default)]
    comparison_type: Option<String>,
    #[serde(default)]
    is_threshold_relative: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Query {
    #[serde(default)]
    warehouse_uuid: Option<String>,
    #[serde(default)]
    sql_query: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ScheduleConfig {
    #[serde(default)]
    schedule_type: Option<String>,
}

impl Model {
    fn variables(&self, rule: Option<Uuid>) -> Result<CreateOrUpdateComparisonRuleVariables, ProviderError> {
        let comparison = CustomRuleComparisonInput {
            operator: self.comparisons.operator.clone().unwrap_or_default(),
            threshold: self.comparisons.threshold_value.unwrap_or_default(),
            comparison_type: self.comparisons.comparison_type.clone().unwrap_or_default(),
            is_threshold_relative: self.comparisons.is_threshold_relative.unwrap_or(false),
        };

        Ok(CreateOrUpdateComparisonRuleVariables {
            custom_rule_uuid: rule,
            description: self.description.clone().unwrap_or_default(),
            comparisons: vec![comparison],
            query_result_type: self.query_result_type.clone().unwrap_or_default(),
            source_connection_id: None,
            source_dw_id: required_uuid(self.source.warehouse_uuid.as_deref(), "source.warehouse_uuid")?,
            source_sql_query: self.source.sql_query.clone().unwrap_or_default(),
            target_connection_id: None,
            target_dw_id: required_uuid(self.target.warehouse_uuid.as_deref(), "target.warehouse_uuid")?,
            target_sql_query: self.target.sql_query.clone().unwrap_or_default(),
            schedule_config: ScheduleConfigInput {
                schedule_type: self.schedule_config.schedule_type.clone().unwrap_or_default(),
            },
        })
    }
}

fn query_block() -> NestedBlock {
    NestedBlock::required(
        Block::new()
            .with_attribute("warehouse_uuid", Attribute::required_string())
            .with_attribute("sql_query", Attribute::required_string()),
    )
}

#[async_trait]
impl Resource for ComparisonMonitor {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("uuid", Attribute::computed_string())
            .with_attribute(
                "description",
                Attribute::required_string().with_validator(Validator::length_at_least(1)),
            )
            .with_attribute(
                "query_result_type",
                Attribute::required_string().with_validator(Validator::one_of(QUERY_RESULT_TYPES)),
            )
            .with_block(
                "comparisons",
                NestedBlock::required(
                    Block::new()
                        .with_attribute(
                            "operator",
                            Attribute::required_string().with_validator(Validator::one_of(OPERATORS)),
                        )
                        .with_attribute("threshold_value", Attribute::required_float64())
                        .with_attribute(
                            "comparison_type",
                            Attribute::required_string()
                                .with_validator(Validator::one_of(COMPARISON_TYPES)),
                        )
                        .with_attribute(
                            "is_threshold_relative",
                            Attribute::optional_bool().with_default(json!(false)),
                        ),
                ),
            )
            .with_block("source", query_block())
            .with_block("target", query_block())
            .with_block(
                "schedule_config",
                NestedBlock::required(Block::new().with_attribute(
                    "schedule_type",
                    Attribute::required_string().with_validator(Validator::one_of(SCHEDULE_TYPES)),
                )),
            )
    }

    async fn create(
        &self,
        client: &dyn MonteCarloClient,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let mut model: Model = from_state(planned)?;
        let data = client
            .mutate::<CreateOrUpdateComparisonRule>(model.variables(None)?)
            .await?;

        let rule = data.create_or_update_comparison_rule.custom_rule;
        info!(resource_type = TYPE_NAME, uuid = %rule.uuid, "Comparison monitor created");
        model.uuid = Some(rule.uuid);
        model.comparisons.is_threshold_relative.get_or_insert(false);
        Ok(Applied::new(to_state(&model)?))
    }

    async fn read(
        &self,
        _client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<ReadResult, ProviderError> {
        // No rule lookup is exposed, the recorded state stands.
        let model: Model = from_state(state)?;
        Ok(ReadResult::found(to_state(&model)?))
    }

    async fn update(
        &self,
        client: &dyn MonteCarloClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Applied, ProviderError> {
        let model: Model = from_state(planned)?;
        let uuid = required_uuid(model.uuid.as_deref(), "uuid")?;
        client
            .mutate::<CreateOrUpdateComparisonRule>(model.variables(Some(uuid))?)
            .await?;
        Ok(Applied::new(to_state(&model)?))
    }

    async fn delete(
        &self,
        client: &dyn MonteCarloClient,
        state: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let model: Model = from_state(state)?;
        let data = client
            .mutate::<DeleteMonitor>(DeleteMonitorVariables {
                monitor_id: required_uuid(model.uuid.as_deref(), "uuid")?,
            })
            .await?;

        if data.delete_monitor.success {
            Ok(Vec::new())
        } else {
            Ok(vec![Diagnostic::warning(
                "MC client 'DeleteMonitor' mutation - success = false, monitor probably already \
                 doesn't exists. This resource will continue with its deletion",
            )])
        }
    }
}
