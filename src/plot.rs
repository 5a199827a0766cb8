//! Head-pose comparison plots.
//!
//! Each input is an OpenFace CSV with `timestamp`, `pose_Tx`, `pose_Ty` and
//! `pose_Tz` columns. The plot is a grid with one column per input and one
//! row per translation axis; every chart has a fixed y range so columns can
//! be compared by eye.

use crate::{
    constants::{PLOT_COLUMNS, PLOT_TIME_COLUMN, PLOT_Y_LIMITS},
    utils::{comparison_plot_name, safe_cast::f64_to_i32_clamp},
    Error, Result,
};
use log::info;
use opencv::{
    core::{Mat, Point, Rect, Scalar, Size, Vector, CV_8UC3},
    imgcodecs,
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8, LINE_AA},
    prelude::*,
};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

/// Series colors, cycled per input: blue, red, green, cyan, magenta, yellow, black (BGR)
pub const SERIES_COLORS: [(f64, f64, f64); 7] = [
    (255.0, 0.0, 0.0),
    (0.0, 0.0, 255.0),
    (0.0, 128.0, 0.0),
    (191.0, 191.0, 0.0),
    (191.0, 0.0, 191.0),
    (0.0, 191.0, 191.0),
    (0.0, 0.0, 0.0),
];

const AXIS_NAMES: [&str; 3] = ["X", "Y", "Z"];
const MARGIN_LEFT: i32 = 60;
const MARGIN_RIGHT: i32 = 15;
const MARGIN_TOP: i32 = 30;
const MARGIN_BOTTOM: i32 = 45;
const TICK_COUNT: usize = 5;

/// Head translation over time for one recording
#[derive(Debug, Clone, PartialEq)]
pub struct HeadPoseSeries {
    /// Base name of the source file
    pub name: String,
    pub timestamp: Vec<f64>,
    /// `pose_Tx`, `pose_Ty`, `pose_Tz`
    pub translation: [Vec<f64>; 3],
}

impl HeadPoseSeries {
    /// Read the plotted columns from an OpenFace CSV. Header names are
    /// matched after trimming whitespace; other columns are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or a cell is not numeric
    pub fn from_reader<R: io::Read>(name: &str, reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let column = |wanted: &str| {
            headers
                .iter()
                .position(|h| h == wanted)
                .ok_or_else(|| Error::InvalidInput(format!("{name}: missing column {wanted}")))
        };
        let time_idx = column(PLOT_TIME_COLUMN)?;
        let axis_idx = [column(PLOT_COLUMNS[0])?, column(PLOT_COLUMNS[1])?, column(PLOT_COLUMNS[2])?];

        let mut series = Self {
            name: name.to_string(),
            timestamp: Vec::new(),
            translation: [Vec::new(), Vec::new(), Vec::new()],
        };
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let cell = |idx: usize| -> Result<f64> {
                let text = record.get(idx).unwrap_or_default();
                text.parse().map_err(|_| {
                    Error::InvalidInput(format!("{name}: row {}: not a number: {text:?}", line + 1))
                })
            };
            series.timestamp.push(cell(time_idx)?);
            for (values, &idx) in series.translation.iter_mut().zip(&axis_idx) {
                values.push(cell(idx)?);
            }
        }
        Ok(series)
    }

    /// Load a CSV file, naming the series after the file stem
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading head pose data from {}", path.display());
        let name = path
            .file_stem()
            .map_or_else(|| "series".to_string(), |s| s.to_string_lossy().into_owned());
        Self::from_reader(&name, File::open(path)?)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }

    /// Chart title for translation axis `axis` (0 = X)
    #[must_use]
    pub fn title(&self, axis: usize) -> String {
        format!("{} - {} Coordinate", self.name, AXIS_NAMES.get(axis).copied().unwrap_or("?"))
    }
}

/// Linear map from a data interval onto a pixel interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMap {
    pub data: (f64, f64),
    pub pixels: (f64, f64),
}

impl AxisMap {
    #[must_use]
    pub fn new(data: (f64, f64), pixels: (f64, f64)) -> Self {
        Self { data, pixels }
    }

    #[must_use]
    pub fn map(&self, value: f64) -> f64 {
        let span = self.data.1 - self.data.0;
        if span == 0.0 {
            return (self.pixels.0 + self.pixels.1) / 2.0;
        }
        self.pixels.0 + (value - self.data.0) / span * (self.pixels.1 - self.pixels.0)
    }
}

/// Data range of the time axis; a single instant or no data gets a unit-wide range
#[must_use]
pub fn time_range(timestamps: &[f64]) -> (f64, f64) {
    let finite = timestamps.iter().copied().filter(|t| t.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));
    if min > max {
        (0.0, 1.0)
    } else if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

/// `count` evenly spaced values from `min` to `max` inclusive
#[must_use]
#[allow(clippy::cast_precision_loss)] // Tick counts are tiny
pub fn ticks(min: f64, max: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![min],
        _ => (0..count)
            .map(|i| min + (max - min) * i as f64 / (count - 1) as f64)
            .collect(),
    }
}

fn tick_label(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn pixel(value: f64) -> i32 {
    f64_to_i32_clamp(value, -1_000_000, 1_000_000)
}

fn put_text(canvas: &mut Mat, text: &str, origin: Point, scale: f64, color: Scalar) -> Result<()> {
    imgproc::put_text(canvas, text, origin, FONT_HERSHEY_SIMPLEX, scale, color, 1, LINE_AA, false)?;
    Ok(())
}

fn text_width(text: &str, scale: f64) -> Result<i32> {
    let mut baseline = 0;
    Ok(imgproc::get_text_size(text, FONT_HERSHEY_SIMPLEX, scale, 1, &mut baseline)?.width)
}

/// Draw one chart into `cell`
fn draw_chart(
    canvas: &mut Mat,
    cell: Rect,
    series: &HeadPoseSeries,
    axis: usize,
    color: Scalar,
) -> Result<()> {
    let black = Scalar::all(0.0);
    let grid = Scalar::all(220.0);
    let area = Rect::new(
        cell.x + MARGIN_LEFT,
        cell.y + MARGIN_TOP,
        (cell.width - MARGIN_LEFT - MARGIN_RIGHT).max(1),
        (cell.height - MARGIN_TOP - MARGIN_BOTTOM).max(1),
    );
    let (y_min, y_max) = PLOT_Y_LIMITS[axis];
    let x_range = time_range(&series.timestamp);
    let x_map = AxisMap::new(x_range, (f64::from(area.x), f64::from(area.x + area.width)));
    let y_map = AxisMap::new((y_min, y_max), (f64::from(area.y + area.height), f64::from(area.y)));

    for value in ticks(y_min, y_max, TICK_COUNT) {
        let y = pixel(y_map.map(value));
        imgproc::line(canvas, Point::new(area.x, y), Point::new(area.x + area.width, y), grid, 1, LINE_8, 0)?;
        let label = tick_label(value);
        let x = area.x - 5 - text_width(&label, 0.35)?;
        put_text(canvas, &label, Point::new(x, y + 4), 0.35, black)?;
    }
    for value in ticks(x_range.0, x_range.1, TICK_COUNT) {
        let x = pixel(x_map.map(value));
        imgproc::line(canvas, Point::new(x, area.y), Point::new(x, area.y + area.height), grid, 1, LINE_8, 0)?;
        let label = tick_label(value);
        let half = text_width(&label, 0.35)? / 2;
        put_text(canvas, &label, Point::new(x - half, area.y + area.height + 14), 0.35, black)?;
    }
    imgproc::rectangle(canvas, area, black, 1, LINE_8, 0)?;

    // Data, clipped to the plot area
    let values = &series.translation[axis];
    let points: Vec<Point> = series
        .timestamp
        .iter()
        .zip(values)
        .filter(|(t, v)| t.is_finite() && v.is_finite())
        .map(|(&t, &v)| Point::new(pixel(x_map.map(t)), pixel(y_map.map(v))))
        .collect();
    for pair in points.windows(2) {
        let (mut a, mut b) = (pair[0], pair[1]);
        if imgproc::clip_line(area, &mut a, &mut b)? {
            imgproc::line(canvas, a, b, color, 1, LINE_AA, 0)?;
        }
    }

    let title = series.title(axis);
    let title_x = cell.x + (cell.width - text_width(&title, 0.45)?) / 2;
    put_text(canvas, &title, Point::new(title_x.max(cell.x), cell.y + 20), 0.45, black)?;

    let x_label = "Timestamp";
    let x_label_x = area.x + (area.width - text_width(x_label, 0.4)?) / 2;
    put_text(canvas, x_label, Point::new(x_label_x, cell.y + cell.height - 8), 0.4, black)?;

    let column = PLOT_COLUMNS[axis];
    let y_label = column.split('_').nth(1).unwrap_or(column);
    put_text(canvas, y_label, Point::new(cell.x + 4, area.y + area.height / 2), 0.4, black)?;

    // Legend
    let legend_width = text_width(column, 0.35)? + 40;
    let legend = Rect::new(area.x + area.width - legend_width - 6, area.y + 6, legend_width, 18);
    imgproc::rectangle(canvas, legend, Scalar::all(255.0), -1, LINE_8, 0)?;
    imgproc::rectangle(canvas, legend, grid, 1, LINE_8, 0)?;
    let sample_y = legend.y + legend.height / 2;
    imgproc::line(
        canvas,
        Point::new(legend.x + 5, sample_y),
        Point::new(legend.x + 28, sample_y),
        color,
        2,
        LINE_AA,
        0,
    )?;
    put_text(canvas, column, Point::new(legend.x + 33, sample_y + 4), 0.35, black)?;
    Ok(())
}

/// Render the 3 × N comparison grid, `cell` pixels per chart
///
/// # Errors
///
/// Returns an error if there is nothing to plot or drawing fails
pub fn render_comparison(series: &[HeadPoseSeries], cell: Size) -> Result<Mat> {
    if series.is_empty() {
        return Err(Error::InvalidInput("No head pose series to plot".to_string()));
    }
    if cell.width <= MARGIN_LEFT + MARGIN_RIGHT || cell.height <= MARGIN_TOP + MARGIN_BOTTOM {
        return Err(Error::InvalidInput(format!("Plot cell {}x{} is too small", cell.width, cell.height)));
    }
    let columns = i32::try_from(series.len())
        .map_err(|_| Error::InvalidInput(format!("Too many series: {}", series.len())))?;

    let mut canvas = Mat::new_rows_cols_with_default(cell.height * 3, cell.width * columns, CV_8UC3, Scalar::all(255.0))?;
    for (col, data) in (0..columns).zip(series) {
        info!("Plotting {} ({} samples)", data.name, data.len());
        let (b, g, r) = SERIES_COLORS[usize::try_from(col).unwrap_or_default() % SERIES_COLORS.len()];
        let color = Scalar::new(b, g, r, 0.0);
        for (row, axis) in (0..3).zip(0..PLOT_COLUMNS.len()) {
            let area = Rect::new(col * cell.width, row * cell.height, cell.width, cell.height);
            draw_chart(&mut canvas, area, data, axis, color)?;
        }
    }
    Ok(canvas)
}

/// Load every CSV, render the grid and save it as
/// `<base1>__vs__<base2>...__headpose.png` in `output_dir`
///
/// # Errors
///
/// Returns an error if an input cannot be loaded or the image cannot be written
pub fn compare_head_pose<P: AsRef<Path>>(inputs: &[P], output_dir: &Path, cell: Size) -> Result<PathBuf> {
    let series = inputs.iter().map(HeadPoseSeries::load).collect::<Result<Vec<_>>>()?;
    let canvas = render_comparison(&series, cell)?;

    let output = output_dir.join(comparison_plot_name(inputs));
    let output_str = output
        .to_str()
        .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 output path: {}", output.display())))?;
    if !imgcodecs::imwrite(output_str, &canvas, &Vector::new())? {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("cannot write {}", output.display()),
        )));
    }
    info!("Plot saved to {}", output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "frame, timestamp, confidence, pose_Tx, pose_Ty, pose_Tz\n\
                          1, 0.000, 0.98, 10.5, -20.0, 600.0\n\
                          2, 0.033, 0.97, 11.0, -21.5, 610.0\n\
                          3, 0.067, 0.97, 12.5, -22.0, 605.5\n";

    fn sample() -> HeadPoseSeries {
        HeadPoseSeries::from_reader("clip", SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_reads_columns_with_padded_headers() {
        let series = sample();
        assert_eq!(series.len(), 3);
        assert_eq!(series.timestamp, vec![0.0, 0.033, 0.067]);
        assert_eq!(series.translation[0], vec![10.5, 11.0, 12.5]);
        assert_eq!(series.translation[2], vec![600.0, 610.0, 605.5]);
    }

    #[test]
    fn test_missing_column() {
        let text = "timestamp,pose_Tx,pose_Ty\n0,1,2\n";
        let result = HeadPoseSeries::from_reader("clip", text.as_bytes());
        assert!(matches!(result, Err(Error::InvalidInput(msg)) if msg.contains("pose_Tz")));
    }

    #[test]
    fn test_non_numeric_cell() {
        let text = "timestamp,pose_Tx,pose_Ty,pose_Tz\n0,1,2,abc\n";
        assert!(HeadPoseSeries::from_reader("clip", text.as_bytes()).is_err());
    }

    #[test]
    fn test_titles() {
        let series = sample();
        assert_eq!(series.title(0), "clip - X Coordinate");
        assert_eq!(series.title(2), "clip - Z Coordinate");
    }

    #[test]
    fn test_axis_map_inverts_y() {
        let y = AxisMap::new((-500.0, 500.0), (300.0, 100.0));
        assert!((y.map(-500.0) - 300.0).abs() < 1e-9);
        assert!((y.map(500.0) - 100.0).abs() < 1e-9);
        assert!((y.map(0.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_range_edge_cases() {
        assert_eq!(time_range(&[]), (0.0, 1.0));
        assert_eq!(time_range(&[2.0]), (1.5, 2.5));
        assert_eq!(time_range(&[3.0, 1.0, f64::NAN, 2.0]), (1.0, 3.0));
    }

    #[test]
    fn test_ticks() {
        assert_eq!(ticks(-500.0, 500.0, 5), vec![-500.0, -250.0, 0.0, 250.0, 500.0]);
        assert_eq!(ticks(0.0, 1500.0, 1), vec![0.0]);
        assert!(ticks(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_render_grid_size() {
        let series = vec![sample(), sample()];
        let canvas = render_comparison(&series, Size::new(500, 333)).unwrap();
        assert_eq!(canvas.cols(), 1000);
        assert_eq!(canvas.rows(), 999);
    }

    #[test]
    fn test_render_requires_series() {
        assert!(render_comparison(&[], Size::new(500, 333)).is_err());
        assert!(render_comparison(&[sample()], Size::new(10, 10)).is_err());
    }
}
