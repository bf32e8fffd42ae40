//! Condition evaluation against the metric buffer

use super::buffer::MetricBuffer;
use super::types::AlertCondition;
use std::time::SystemTime;

/// One condition together with the value it was compared against
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<'a> {
    pub condition: &'a AlertCondition,
    /// Aggregated window value; `None` when the window had no samples
    pub value: Option<f64>,
    pub holds: bool,
}

/// Evaluates threshold conditions over windowed aggregates
pub struct ConditionEvaluator<'a> {
    buffer: &'a MetricBuffer,
    now: SystemTime,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(buffer: &'a MetricBuffer, now: SystemTime) -> Self {
        Self { buffer, now }
    }

    /// Observe a single condition. Missing data never holds.
    pub fn observe<'c>(&self, condition: &'c AlertCondition) -> Observation<'c> {
        let value = self.buffer.query(
            &condition.metric,
            condition.duration,
            condition.aggregation,
            self.now,
        );
        let holds = value.is_some_and(|v| condition.holds_for(v));
        Observation {
            condition,
            value,
            holds,
        }
    }

    /// Evaluate a single condition
    pub fn evaluate(&self, condition: &AlertCondition) -> bool {
        self.observe(condition).holds
    }

    /// AND of all conditions. An empty list never holds.
    pub fn all_hold(&self, conditions: &[AlertCondition]) -> bool {
        !conditions.is_empty() && conditions.iter().all(|c| self.evaluate(c))
    }

    /// Observe every condition, or `None` as soon as one fails
    pub fn observe_all<'c>(&self, conditions: &'c [AlertCondition]) -> Option<Vec<Observation<'c>>> {
        if conditions.is_empty() {
            return None;
        }
        let mut observations = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let observation = self.observe(condition);
            if !observation.holds {
                return None;
            }
            observations.push(observation);
        }
        Some(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::types::{Aggregation, Operator};
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn avg_gt(metric: &str, threshold: f64) -> AlertCondition {
        AlertCondition::new(
            metric,
            Operator::Gt,
            threshold,
            Duration::from_secs(300),
            Aggregation::Avg,
        )
    }

    #[test]
    fn test_high_values_trigger() {
        let mut buffer = MetricBuffer::default();
        for i in 0..3 {
            buffer.record("cpu", 10.0, at(1_000 + i * 60));
        }
        let evaluator = ConditionEvaluator::new(&buffer, at(1_120));
        assert!(evaluator.evaluate(&avg_gt("cpu", 5.0)));
    }

    #[test]
    fn test_low_values_do_not_trigger() {
        let mut buffer = MetricBuffer::default();
        for i in 0..3 {
            buffer.record("cpu", 1.0, at(1_000 + i * 60));
        }
        let evaluator = ConditionEvaluator::new(&buffer, at(1_120));
        assert!(!evaluator.evaluate(&avg_gt("cpu", 5.0)));
    }

    #[test]
    fn test_missing_data_is_false() {
        let buffer = MetricBuffer::default();
        let evaluator = ConditionEvaluator::new(&buffer, at(1_000));
        let condition = avg_gt("cpu", 5.0);
        let observation = evaluator.observe(&condition);
        assert_eq!(observation.value, None);
        assert!(!observation.holds);

        let below = AlertCondition::new(
            "cpu",
            Operator::Lt,
            5.0,
            Duration::from_secs(60),
            Aggregation::Count,
        );
        assert!(!evaluator.evaluate(&below));
    }

    #[test]
    fn test_conditions_are_and_combined() {
        let mut buffer = MetricBuffer::default();
        buffer.record("cpu", 90.0, at(1_000));
        buffer.record("mem", 10.0, at(1_000));
        let evaluator = ConditionEvaluator::new(&buffer, at(1_000));

        let both = vec![avg_gt("cpu", 80.0), avg_gt("mem", 80.0)];
        assert!(!evaluator.all_hold(&both));
        assert!(evaluator.observe_all(&both).is_none());

        let one = vec![avg_gt("cpu", 80.0)];
        assert!(evaluator.all_hold(&one));
        let observed = evaluator.observe_all(&one).unwrap();
        assert_eq!(observed[0].value, Some(90.0));
    }

    #[test]
    fn test_empty_condition_list_never_holds() {
        let buffer = MetricBuffer::default();
        let evaluator = ConditionEvaluator::new(&buffer, at(1_000));
        assert!(!evaluator.all_hold(&[]));
    }
}
