//! State Accident Map
//! Filters one year's accidents to a state and plots their coordinates.
//!
//! Layout:
//! 1. Base map: frame plus a graticule scaled to the state's longitude/latitude ranges
//! 2. One small marker per accident with both coordinates present
//!
//! No text is drawn, so rendering does not depend on system fonts.

use crate::config::MapStyle;
use crate::data::loader::{require_columns, DataLoader};
use crate::error::{FarsError, Result};
use image::{ImageFormat, RgbImage};
use plotters::prelude::{
    BitMapBackend, ChartBuilder, Circle, Color, IntoDrawingArea, PathElement, RGBColor, Rectangle,
    BLACK, WHITE,
};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

pub const STATE_COLUMN: &str = "STATE";
pub const LONGITUDE_COLUMN: &str = "LONGITUD";
pub const LATITUDE_COLUMN: &str = "LATITUDE";

/// Longitudes above this value mark a missing coordinate.
pub const LONGITUDE_SENTINEL: f64 = 900.0;
/// Latitudes above this value mark a missing coordinate.
pub const LATITUDE_SENTINEL: f64 = 90.0;

const GRID: RGBColor = RGBColor(200, 200, 200);
const GRID_STEPS: usize = 6;

/// Rendered accident map for one state and year.
#[derive(Debug, Clone)]
pub struct StateMap {
    pub state: i32,
    pub image: RgbImage,
    pub points: usize,
    pub longitude_range: (f64, f64),
    pub latitude_range: (f64, f64),
}

impl StateMap {
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum MapOutcome {
    Plotted(StateMap),
    /// The state has no accident rows; nothing was drawn.
    NoAccidents,
    /// Rows exist but every one lacks a usable coordinate pair; nothing was drawn.
    NoValidCoordinates { accidents: usize },
}

impl MapOutcome {
    pub fn map(&self) -> Option<&StateMap> {
        match self {
            MapOutcome::Plotted(map) => Some(map),
            _ => None,
        }
    }
}

/// Read `year`, validate `state` against it and plot the state's accidents.
pub fn map_state(
    loader: &DataLoader,
    style: &MapStyle,
    state: i32,
    year: i32,
) -> Result<MapOutcome> {
    let df = loader.read_year(year)?;
    let accidents = state_accidents(&df, state)?;
    debug!(state, year, rows = accidents.height(), "filtered state accidents");
    plot_accidents(&accidents, state, style)
}

/// Rows of `df` belonging to `state`.
///
/// Fails with [`FarsError::InvalidState`] when `state` never occurs in `STATE`.
pub fn state_accidents(df: &DataFrame, state: i32) -> Result<DataFrame> {
    require_columns(df, &[STATE_COLUMN])?;
    let states = df.column(STATE_COLUMN)?.cast(&DataType::Int32)?;
    if !states.i32()?.into_iter().flatten().any(|s| s == state) {
        return Err(FarsError::InvalidState(state));
    }

    let filtered = df
        .clone()
        .lazy()
        .filter(col(STATE_COLUMN).cast(DataType::Int32).eq(lit(state)))
        .collect()?;
    Ok(filtered)
}

/// New frame with sentinel longitudes (> 900) and latitudes (> 90) set to null.
pub fn clean_coordinates(df: &DataFrame) -> Result<DataFrame> {
    require_columns(df, &[LONGITUDE_COLUMN, LATITUDE_COLUMN])?;
    let cleaned = df
        .clone()
        .lazy()
        .with_columns([
            mask_above(LONGITUDE_COLUMN, LONGITUDE_SENTINEL),
            mask_above(LATITUDE_COLUMN, LATITUDE_SENTINEL),
        ])
        .collect()?;
    Ok(cleaned)
}

fn mask_above(name: &str, sentinel: f64) -> Expr {
    let value = col(name).cast(DataType::Float64);
    when(value.clone().gt(lit(sentinel)))
        .then(lit(NULL).cast(DataType::Float64))
        .otherwise(value)
        .alias(name)
}

/// `(longitude, latitude)` pairs where both values are present.
pub fn coordinate_points(df: &DataFrame) -> Result<Vec<(f64, f64)>> {
    let lon = df.column(LONGITUDE_COLUMN)?.cast(&DataType::Float64)?;
    let lat = df.column(LATITUDE_COLUMN)?.cast(&DataType::Float64)?;
    let points = lon
        .f64()?
        .into_iter()
        .zip(lat.f64()?)
        .filter_map(|pair| match pair {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        })
        .collect();
    Ok(points)
}

/// Clean and plot an already state-filtered frame.
pub fn plot_accidents(accidents: &DataFrame, state: i32, style: &MapStyle) -> Result<MapOutcome> {
    if accidents.height() == 0 {
        info!(state, "no accidents to plot");
        return Ok(MapOutcome::NoAccidents);
    }

    let cleaned = clean_coordinates(accidents)?;
    let (Some(longitude_range), Some(latitude_range)) = (
        value_range(&cleaned, LONGITUDE_COLUMN)?,
        value_range(&cleaned, LATITUDE_COLUMN)?,
    ) else {
        info!(state, accidents = accidents.height(), "no valid coordinates to plot");
        return Ok(MapOutcome::NoValidCoordinates {
            accidents: accidents.height(),
        });
    };

    let points = coordinate_points(&cleaned)?;
    if points.is_empty() {
        info!(state, accidents = accidents.height(), "no valid coordinates to plot");
        return Ok(MapOutcome::NoValidCoordinates {
            accidents: accidents.height(),
        });
    }

    let image = render(&points, longitude_range, latitude_range, style)?;
    info!(state, points = points.len(), "rendered state map");

    Ok(MapOutcome::Plotted(StateMap {
        state,
        image,
        points: points.len(),
        longitude_range,
        latitude_range,
    }))
}

/// Min and max over the non-null values of a column.
fn value_range(df: &DataFrame, name: &str) -> Result<Option<(f64, f64)>> {
    let values = df.column(name)?.cast(&DataType::Float64)?;
    let range = values
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });
    Ok(range)
}

fn render(
    points: &[(f64, f64)],
    (lon_min, lon_max): (f64, f64),
    (lat_min, lat_max): (f64, f64),
    style: &MapStyle,
) -> Result<RgbImage> {
    let (width, height) = (style.width.max(1), style.height.max(1));
    let mut buffer = vec![0u8; width as usize * height as usize * 3];

    let (x_lo, x_hi) = padded(lon_min, lon_max);
    let (y_lo, y_hi) = padded(lat_min, lat_max);
    let [r, g, b] = style.point_color;
    let marker = RGBColor(r, g, b);

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(style.margin)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(render_error)?;

        // Graticule
        let mut lines: Vec<Vec<(f64, f64)>> = Vec::new();
        for x in grid_positions(x_lo, x_hi) {
            lines.push(vec![(x, y_lo), (x, y_hi)]);
        }
        for y in grid_positions(y_lo, y_hi) {
            lines.push(vec![(x_lo, y), (x_hi, y)]);
        }
        chart
            .draw_series(lines.into_iter().map(|line| PathElement::new(line, GRID)))
            .map_err(render_error)?;

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x_lo, y_lo), (x_hi, y_hi)],
                BLACK.stroke_width(1),
            )))
            .map_err(render_error)?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), style.point_size, marker.filled())),
            )
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| FarsError::Render("bitmap buffer size mismatch".to_string()))
}

fn render_error<E: std::fmt::Display>(err: E) -> FarsError {
    FarsError::Render(err.to_string())
}

/// Pad a range by 4% on both sides; a near-zero-width range gets half a degree.
fn padded(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    let min_span = (min.abs().max(max.abs()) * 1e-9).max(1e-9);
    if span < min_span {
        return (min - 0.5, max + 0.5);
    }
    let pad = span * 0.04;
    (min - pad, max + pad)
}

/// Evenly spaced grid positions within `lo..=hi`, at most `2 * GRID_STEPS + 1` of them.
fn grid_positions(lo: f64, hi: f64) -> Vec<f64> {
    let step = nice_step(hi - lo, GRID_STEPS);
    if !step.is_finite() || step <= 0.0 {
        return Vec::new();
    }
    let start = (lo / step).ceil() * step;
    let count = ((hi - start) / step).floor();
    if !count.is_finite() || count < 0.0 {
        return Vec::new();
    }
    let count = (count as usize).min(GRID_STEPS * 2);
    (0..=count)
        .map(|i| start + i as f64 * step)
        .filter(|v| *v <= hi)
        .collect()
}

fn nice_step(range: f64, target_steps: usize) -> f64 {
    let raw_step = range / target_steps as f64;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let normalized = raw_step / magnitude;

    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };

    nice * magnitude
}
