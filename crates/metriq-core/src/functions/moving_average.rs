//! `mavg`: rolling mean primed with the history before the query window

use std::collections::VecDeque;

use super::{FunctionContext, Function};
use crate::error::{Error, Result};
use crate::models::MetricValue;
use crate::query::{Argument, TimeUnit};
use crate::series::{MetricValueList, SeriesMap};
use crate::time::MS_PER_MINUTE;

pub(super) fn moving_average(args: &[Argument], ctx: &FunctionContext<'_>, input: SeriesMap) -> Result<SeriesMap> {
    let window = window_size(args, ctx.evaluator.config().moving_average_window)?;
    let history_ms = i64::try_from(window).unwrap_or(i64::MAX / MS_PER_MINUTE) * MS_PER_MINUTE;

    let mut ret = SeriesMap::new();
    for (id, values) in input {
        let new_id = id.with_label(Function::MovingAverage.name());
        if values.is_empty() {
            ret.insert(new_id, values);
            continue;
        }

        let history = ctx
            .evaluator
            .reader()
            .read_metric(&id.unlabelled(), ctx.start - history_ms, ctx.start)?;
        let mut rolling = RollingMean::new(window);
        for value in history.values() {
            rolling.push(value.value);
        }

        let averaged: Vec<MetricValue> = values
            .values()
            .iter()
            .map(|value| {
                let mean = rolling.mean().unwrap_or(value.value);
                rolling.push(value.value);
                value.with_value(mean)
            })
            .collect();

        ret.insert(new_id, MetricValueList::from_values(averaged)?);
    }

    Ok(ret)
}

/// Window length in samples (one per minute)
pub(super) fn window_size(args: &[Argument], default: usize) -> Result<usize> {
    let size = match args {
        [] => return Ok(default),
        [Argument::Number(n)] => n.as_i64(),
        [Argument::RelativeTime(t)] => (t.millis() / TimeUnit::Minutes.millis()).abs(),
        [_] => {
            return Err(Error::parse(
                "Moving average takes either a number or a relative time as an argument",
            ))
        }
        _ => return Err(Error::parse("Moving average takes either one or zero arguments")),
    };

    usize::try_from(size)
        .ok()
        .filter(|size| *size >= 2)
        .ok_or_else(|| Error::parse("Moving average window size is too small"))
}

/// Mean of the last `capacity` pushed values
struct RollingMean {
    capacity: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            window: VecDeque::with_capacity(capacity),
            sum: 0.0,
        }
    }

    fn push(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }
        self.window.push_back(value);
        self.sum += value;
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self) -> Option<f64> {
        (!self.window.is_empty()).then(|| self.sum / self.window.len() as f64)
    }
}
