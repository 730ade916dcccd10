//! PNG summaries of experiment records.
//!
//! Images carry geometry only: cells, borders, tick marks and lines.

use std::collections::BTreeMap;
use std::path::Path;

use plotters::prelude::*;

use crate::tx::{ArtifactError, Tx};

/// Cells per grid row.
pub const GRID_COLUMNS: usize = 100;
const CELL_PX: i32 = 20;
const MARGIN_PX: i32 = 70;
/// Column tick spacing.
const TICK_EVERY: usize = 10;
const TICK_PX: i32 = 10;

/// Upper bound of the drop plot's y axis.
pub const DROP_PLOT_Y_MAX: u32 = 200;

fn render_error(path: &Path) -> impl Fn(String) -> ArtifactError + '_ {
    move |message| ArtifactError::Render {
        path: path.to_path_buf(),
        message,
    }
}

/// Draw one cell per flag, row-major, white for `true` and red for
/// `false`.
pub fn draw_grid(cells: &[bool], path: &Path) -> Result<(), ArtifactError> {
    let err = render_error(path);
    let rows = cells.len().div_ceil(GRID_COLUMNS) as i32;
    let width = GRID_COLUMNS as i32 * CELL_PX + 2 * MARGIN_PX;
    let height = rows * CELL_PX + 2 * MARGIN_PX;

    let root = BitMapBackend::new(path, (width as u32, height as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| err(e.to_string()))?;

    for col in (0..=GRID_COLUMNS).step_by(TICK_EVERY) {
        let x = col as i32 * CELL_PX + MARGIN_PX;
        root.draw(&PathElement::new(
            vec![(x, MARGIN_PX - TICK_PX), (x, MARGIN_PX)],
            BLACK,
        ))
        .map_err(|e| err(e.to_string()))?;
    }
    for row in 0..=rows {
        let y = row * CELL_PX + MARGIN_PX;
        root.draw(&PathElement::new(
            vec![(MARGIN_PX - TICK_PX, y), (MARGIN_PX, y)],
            BLACK,
        ))
        .map_err(|e| err(e.to_string()))?;
    }

    for (i, ok) in cells.iter().enumerate() {
        let x = (i % GRID_COLUMNS) as i32 * CELL_PX + MARGIN_PX;
        let y = (i / GRID_COLUMNS) as i32 * CELL_PX + MARGIN_PX;
        let corners = [(x, y), (x + CELL_PX, y + CELL_PX)];
        let fill = if *ok { WHITE } else { RED };
        root.draw(&Rectangle::new(corners, fill.filled()))
            .map_err(|e| err(e.to_string()))?;
        root.draw(&Rectangle::new(corners, BLACK.stroke_width(1)))
            .map_err(|e| err(e.to_string()))?;
    }

    root.present().map_err(|e| err(e.to_string()))?;
    Ok(())
}

/// Count of records per second whose send status is not success, for every
/// second from the earliest to the latest record. The x value is seconds
/// since the earliest record.
pub fn drops_per_second(txs: &[Tx]) -> Vec<(i64, u32)> {
    let seconds: Vec<i64> = txs.iter().map(|tx| tx.timestamp.div_euclid(1000)).collect();
    let (Some(&min), Some(&max)) = (seconds.iter().min(), seconds.iter().max()) else {
        return Vec::new();
    };
    let mut drops: BTreeMap<i64, u32> = BTreeMap::new();
    for (tx, second) in txs.iter().zip(&seconds) {
        if !tx.send_status.is_success() {
            *drops.entry(*second).or_default() += 1;
        }
    }
    (min..=max)
        .map(|second| (second - min, drops.get(&second).copied().unwrap_or(0)))
        .collect()
}

/// Plot `series` with a dashed horizontal reference line at `capacity`.
pub fn plot_drops(series: &[(i64, u32)], capacity: u32, path: &Path) -> Result<(), ArtifactError> {
    let err = render_error(path);
    let x_max = series.last().map(|(x, _)| *x).unwrap_or(0).max(1);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| err(e.to_string()))?;
    let root = root.margin(40, 40, 40, 40);

    let mut chart = ChartBuilder::on(&root)
        .build_cartesian_2d(0i64..x_max, 0u32..DROP_PLOT_Y_MAX)
        .map_err(|e| err(e.to_string()))?;

    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0, DROP_PLOT_Y_MAX), (0, 0), (x_max, 0)],
            BLACK,
        )))
        .map_err(|e| err(e.to_string()))?;

    let dash = (x_max / 60).max(1);
    chart
        .draw_series((0..x_max).step_by((2 * dash) as usize).map(|start| {
            PathElement::new(
                vec![(start, capacity), ((start + dash).min(x_max), capacity)],
                BLACK,
            )
        }))
        .map_err(|e| err(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(
            series.iter().map(|(x, y)| (*x, (*y).min(DROP_PLOT_Y_MAX))),
            BLUE,
        ))
        .map_err(|e| err(e.to_string()))?;

    root.present().map_err(|e| err(e.to_string()))?;
    Ok(())
}
