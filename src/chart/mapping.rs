use chrono::{NaiveDateTime, TimeDelta};
use kurbo::Point;

use super::extract::ChartBounds;
use crate::config::ChartLayout;
use crate::error::{Axis, DigitizeError};
use crate::series::DomainPoint;

/// Round with ties toward positive infinity (`-0.5` becomes `0`, `2.5` becomes `3`).
fn round_half_up(v: f64) -> f64 {
    // `v + 0.5` can itself round up, so compare the exact fractional part instead.
    let floor = v.floor();
    if v - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

/// Linear map of `value` from `[in_min, in_max]` onto `[out_min, out_max]`, rounded.
pub fn scale(
    value: f64,
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
    axis: Axis,
) -> Result<f64, DigitizeError> {
    let span = in_max - in_min;
    if span == 0.0 || !span.is_finite() {
        return Err(DigitizeError::DegenerateChart { axis });
    }
    Ok(round_half_up((value - in_min) * (out_max - out_min) / span + out_min))
}

/// Pixel-to-domain mapping for one chart.
#[derive(Debug, Clone)]
pub struct AxisMapper {
    bounds: ChartBounds,
    origin: NaiveDateTime,
    span_ms: f64,
    y_max: f64,
}

impl AxisMapper {
    pub fn new(bounds: ChartBounds, layout: &ChartLayout) -> Self {
        let origin = layout.x_date_min.and_time(chrono::NaiveTime::MIN);
        let end = layout.x_date_max.and_time(chrono::NaiveTime::MIN);
        AxisMapper {
            bounds,
            origin,
            span_ms: (end - origin).num_milliseconds() as f64,
            y_max: layout.y_max as f64,
        }
    }

    /// Pixel x across the chart width onto the reporting window.
    pub fn timestamp(&self, x: f64) -> Result<NaiveDateTime, DigitizeError> {
        let b = &self.bounds;
        let offset = scale(x, b.x, b.x + b.width, 0.0, self.span_ms, Axis::Time)?;
        Ok(self.origin + TimeDelta::milliseconds(offset as i64))
    }

    /// Pixel y onto a percentage in `[-y_max, +y_max]`.
    ///
    /// The chart floor maps to `+y_max`; the vertical span is first scaled onto
    /// `[0, 2 * y_max]` and then subtracted from `y_max`.
    pub fn value(&self, y: f64) -> Result<i64, DigitizeError> {
        let b = &self.bounds;
        let scaled = scale(y, b.y, b.y + b.height, 0.0, 2.0 * self.y_max, Axis::Value)?;
        Ok((self.y_max - scaled) as i64)
    }

    pub fn map_point(&self, p: Point) -> Result<DomainPoint, DigitizeError> {
        Ok(DomainPoint {
            timestamp: self.timestamp(p.x)?,
            value: self.value(p.y)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn mapper() -> AxisMapper {
        let bounds = ChartBounds {
            x: 10.0,
            y: 100.0,
            width: 420.0,
            height: 40.0,
        };
        AxisMapper::new(bounds, &ChartLayout::default())
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn endpoints_map_to_configured_range() {
        let m = mapper();
        assert_eq!(m.timestamp(10.0).unwrap(), at(2020, 2, 16, 0));
        assert_eq!(m.timestamp(430.0).unwrap(), at(2020, 3, 29, 0));
        assert_eq!(m.value(100.0).unwrap(), 80);
        assert_eq!(m.value(140.0).unwrap(), -80);
    }

    #[test]
    fn midpoint_maps_to_domain_midpoint() {
        let m = mapper();
        // 42-day window: the midpoint is 21 days after the start.
        assert_eq!(m.timestamp(220.0).unwrap(), at(2020, 3, 8, 0));
        assert_eq!(m.value(120.0).unwrap(), 0);
    }

    #[test]
    fn value_rounds_ties_upward() {
        assert_eq!(scale(0.5, 0.0, 1.0, 0.0, 1.0, Axis::Value).unwrap(), 1.0);
        assert_eq!(scale(-0.5, 0.0, 1.0, 0.0, 1.0, Axis::Value).unwrap(), 0.0);
        assert_eq!(scale(2.5, 0.0, 10.0, 0.0, 10.0, Axis::Value).unwrap(), 3.0);
        assert_eq!(scale(-2.5, 0.0, 10.0, 0.0, 10.0, Axis::Value).unwrap(), -2.0);
        // Largest double below one half stays below it.
        assert_eq!(scale(0.49999999999999994, 0.0, 1.0, 0.0, 1.0, Axis::Value).unwrap(), 0.0);
        assert_eq!(round_half_up(-0.49999999999999994), 0.0);
        // 10 px into a 40 px span is 40 on the [0, 160] scale.
        assert_eq!(mapper().value(110.0).unwrap(), 40);
    }

    #[test]
    fn zero_extent_is_degenerate() {
        assert!(matches!(
            scale(1.0, 5.0, 5.0, 0.0, 1.0, Axis::Time),
            Err(DigitizeError::DegenerateChart { axis: Axis::Time })
        ));

        let flat = AxisMapper::new(
            ChartBounds {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 0.0,
            },
            &ChartLayout::default(),
        );
        assert!(flat.timestamp(50.0).is_ok());
        assert!(matches!(
            flat.value(0.0),
            Err(DigitizeError::DegenerateChart { axis: Axis::Value })
        ));
    }
}
