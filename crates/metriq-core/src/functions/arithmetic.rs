//! `sum` and `mul`: combine every input series into one

use super::Function;
use crate::error::Result;
use crate::query::evaluator::check_operand_count;
use crate::query::math::combine;
use crate::query::{Argument, MathOp};
use crate::series::SeriesMap;

pub(super) fn arithmetic(op: MathOp, args: &[Argument], input: SeriesMap) -> Result<SeriesMap> {
    check_operand_count(op, input.len())?;

    // `sum(false)` zero-fills gaps instead of averaging neighbours
    let use_average = !matches!(args.first(), Some(Argument::Boolean(false)));

    let combined = combine(op, input.into_iter().collect(), use_average)?;
    let name = if op == MathOp::Multiply {
        Function::Multiply.name()
    } else {
        Function::Sum.name()
    };

    Ok(combined
        .into_iter()
        .map(|(id, values)| (id.with_label(name), values))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{context, id, list};
    use crate::models::MetricId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sum_with_gap_averaging() {
        let input = context(vec![
            (id("host1"), list(&[(0, 1.0), (1, 2.0), (2, 3.0)])),
            (id("host2"), list(&[(0, 10.0), (2, 30.0)])),
        ]);
        let result = arithmetic(MathOp::Add, &[], input).unwrap();

        let expected_id = MetricId::new("host1+host2", "cpu", "load").with_label("sum");
        assert_eq!(result.get(&expected_id).unwrap().double_values(), vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_sum_with_zero_fill() {
        let input = context(vec![
            (id("host1"), list(&[(0, 1.0), (1, 2.0), (2, 3.0)])),
            (id("host2"), list(&[(0, 10.0), (2, 30.0)])),
        ]);
        let result = arithmetic(MathOp::Add, &[Argument::Boolean(false)], input).unwrap();
        assert_eq!(result.values().next().unwrap().double_values(), vec![11.0, 2.0, 33.0]);
    }

    #[test]
    fn test_mul() {
        let input = context(vec![
            (id("a"), list(&[(0, 2.0), (1, 3.0)])),
            (id("b"), list(&[(0, 4.0), (1, 5.0)])),
            (id("c"), list(&[(0, 0.5), (1, 2.0)])),
        ]);
        let result = arithmetic(MathOp::Multiply, &[], input).unwrap();

        let (result_id, values) = result.iter().next().unwrap();
        assert_eq!(result_id.device, "a*b*c");
        assert_eq!(result_id.label.as_deref(), Some("mul"));
        assert_eq!(values.double_values(), vec![4.0, 30.0]);
    }

    #[test]
    fn test_single_series_is_rejected() {
        let input = context(vec![(id("a"), list(&[(0, 2.0)]))]);
        assert_eq!(
            arithmetic(MathOp::Add, &[], input).unwrap_err().to_string(),
            "Trying to perform + on a single value"
        );
    }
}
