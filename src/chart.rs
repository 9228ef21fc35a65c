//! Eight-panel PNG dashboard drawn with plotters' bitmap backend.
//!
//! Layout, top to bottom: title band; A (2/3) + B (1/3); C, D, E in thirds;
//! F (2/3) + G (1/3); H across the full width.

use std::path::Path;

use anyhow::anyhow;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontStyle, register_font};

use crate::queries::{BleedingHeatmap, PerioRiskGroup, QueryResults, TreatmentRevenue};
use crate::stats::{BoxSummary, format_currency};
use crate::table::EMPTY_CELL;
use crate::vocabulary::{RiskCategory, Sex};

pub const WIDTH: u32 = 2400;
pub const HEIGHT: u32 = 3000;
const TITLE_BAND: i32 = 140;

const FONT: &str = "sans-serif";
const FONT_REGULAR: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
const FONT_BOLD: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

const PALETTE: [RGBColor; 7] = [
    RGBColor(0x2E, 0x86, 0xAB),
    RGBColor(0xA2, 0x3B, 0x72),
    RGBColor(0xF1, 0x8F, 0x01),
    RGBColor(0xC7, 0x3E, 0x1D),
    RGBColor(0x3B, 0x1F, 0x2B),
    RGBColor(0x44, 0xBB, 0xA4),
    RGBColor(0xE9, 0x4F, 0x37),
];
const BACKGROUND: RGBColor = RGBColor(0xF8, 0xF9, 0xFA);
const INK: RGBColor = RGBColor(0x1A, 0x1A, 0x2E);
const MUTED: RGBColor = RGBColor(0x55, 0x55, 0x55);
const NO_DATA_FILL: RGBColor = RGBColor(0xE9, 0xEC, 0xEF);

/// YlOrRd colour stops, low to high.
const HEAT_STOPS: [RGBColor; 5] = [
    RGBColor(0xFF, 0xFF, 0xCC),
    RGBColor(0xFE, 0xD9, 0x76),
    RGBColor(0xFD, 0x8D, 0x3C),
    RGBColor(0xE3, 0x1A, 0x1C),
    RGBColor(0x80, 0x00, 0x26),
];

type DrawResult<DB> = Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

/// Render the dashboard for `results` to a PNG at `path`
///
/// The parent directory must already exist.
pub fn render(results: &QueryResults, patients: usize, path: &Path) -> anyhow::Result<()> {
    register_fonts()?;

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    draw_dashboard(&root, results, patients)
        .map_err(|err| anyhow!("failed to draw chart {}: {err}", path.display()))?;
    root.present()
        .map_err(|err| anyhow!("failed to write chart {}: {err}", path.display()))?;
    Ok(())
}

fn register_fonts() -> anyhow::Result<()> {
    for (style, bytes) in [(FontStyle::Normal, FONT_REGULAR), (FontStyle::Bold, FONT_BOLD)] {
        register_font(FONT, style, bytes)
            .map_err(|_| anyhow!("embedded {FONT} font is not a valid font"))?;
    }
    Ok(())
}

fn font(size: f64) -> FontDesc<'static> {
    (FONT, size).into_font()
}

fn text(size: f64) -> TextStyle<'static> {
    font(size).color(&INK)
}

fn caption(size: f64) -> FontDesc<'static> {
    font(size).style(FontStyle::Bold)
}

fn anchored(style: TextStyle<'static>, h: HPos, v: VPos) -> TextStyle<'static> {
    style.pos(Pos::new(h, v))
}

/// Axis label for a category slot, blank between slots.
///
/// Category axes run over `-0.5..n - 0.5` in f64 so that slot `i` sits at
/// `i`; key points that do not land on a slot get no label.
fn slot_label(labels: &[String], value: f64) -> String {
    let slot = value.round();
    if (value - slot).abs() > 1e-6 || slot < 0.0 {
        return String::new();
    }
    labels.get(slot as usize).cloned().unwrap_or_default()
}

/// Tick label for count axes: whole numbers only.
fn whole_number_label(value: f64) -> String {
    if (value - value.round()).abs() > 1e-6 {
        return String::new();
    }
    format!("{:.0}", value)
}

/// Requesting `2n + 1` key points keeps every integer slot among them.
fn slot_key_points(slots: usize) -> usize {
    2 * slots + 1
}

fn slot_range(slots: usize) -> std::ops::Range<f64> {
    -0.5..(slots.max(1) as f64 - 0.5)
}

fn value_range(max: f64, headroom: f64) -> std::ops::Range<f64> {
    0.0..(max.max(1.0) * headroom)
}

fn draw_dashboard<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    results: &QueryResults,
    patients: usize,
) -> DrawResult<DB> {
    root.fill(&BACKGROUND)?;
    let (title, body) = root.split_vertically(TITLE_BAND);
    draw_title(&title, patients)?;

    let rows = body.split_evenly((4, 1));
    let (width, _) = body.dim_in_pixel();
    let two_thirds = (width * 2 / 3) as i32;

    let (a, b) = rows[0].split_horizontally(two_thirds);
    draw_diagnosis_prevalence(&a, results)?;
    draw_revenue_share(&b, results)?;

    let thirds = rows[1].split_evenly((1, 3));
    draw_depth_boxes(
        &thirds[0],
        "Probing depth vs smoking",
        ["Non-smoker", "Smoker"],
        &results.perio_risk,
        |group| group.smoker,
        PALETTE[0],
    )?;
    draw_depth_boxes(
        &thirds[1],
        "Probing depth vs diabetes",
        ["No diabetes", "Diabetes"],
        &results.perio_risk,
        |group| group.diabetic,
        PALETTE[1],
    )?;
    draw_insurance_visits(&thirds[2], results)?;

    let (f, g) = rows[2].split_horizontally(two_thirds);
    draw_age_brackets(&f, results)?;
    draw_average_cost(&g, results)?;

    draw_heatmap(&rows[3], &results.bleeding_heatmap)?;
    Ok(())
}

fn draw_title<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, patients: usize) -> DrawResult<DB> {
    let (width, _) = area.dim_in_pixel();
    let center = width as i32 / 2;
    area.draw(&Text::new(
        format!("Dental Clinical Analysis — Anonymous Data (n={patients})"),
        (center, 55),
        anchored(caption(52.0).color(&INK), HPos::Center, VPos::Center),
    ))?;
    area.draw(&Text::new(
        "Synthetic dataset | SQLite + Rust",
        (center, 108),
        anchored(font(28.0).color(&MUTED), HPos::Center, VPos::Center),
    ))?;
    Ok(())
}

/// A: horizontal bars of diagnosis counts, most frequent on top.
fn draw_diagnosis_prevalence<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    results: &QueryResults,
) -> DrawResult<DB> {
    let rows = &results.diagnosis_prevalence;
    let n = rows.len();
    let max = rows.iter().map(|r| r.total).max().unwrap_or(0) as f64;
    let labels: Vec<String> = rows.iter().rev().map(|r| r.condition.to_string()).collect();
    let slot = |i: usize| (n - 1 - i) as f64;

    let mut chart = ChartBuilder::on(area)
        .caption("Diagnosis prevalence", caption(34.0))
        .margin(24)
        .x_label_area_size(70)
        .y_label_area_size(200)
        .build_cartesian_2d(value_range(max, 1.15), slot_range(n))?;
    chart.plotting_area().fill(&WHITE)?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(slot_key_points(n))
        .y_label_formatter(&|v| slot_label(&labels, *v))
        .x_label_formatter(&|v| whole_number_label(*v))
        .x_desc("Cases")
        .label_style(text(22.0))
        .axis_desc_style(text(24.0))
        .draw()?;

    chart.draw_series(rows.iter().enumerate().map(|(i, r)| {
        let y = slot(i);
        Rectangle::new(
            [(0.0, y - 0.35), (r.total as f64, y + 0.35)],
            PALETTE[i % PALETTE.len()].filled(),
        )
    }))?;
    chart.draw_series(rows.iter().enumerate().map(|(i, r)| {
        EmptyElement::at((r.total as f64, slot(i)))
            + Text::new(
                format!("{:.1}%", r.percentage),
                (10, 0),
                anchored(text(22.0), HPos::Left, VPos::Center),
            )
    }))?;
    Ok(())
}

/// Slices under this share of revenue are named in a footnote instead of on
/// the pie.
const MIN_LABELLED_SHARE: f64 = 0.03;

/// One pie wedge, angles in degrees counter-clockwise from the x axis.
#[derive(Debug, Clone, PartialEq)]
struct PieSlice {
    label: String,
    share: f64,
    start: f64,
    sweep: f64,
}

impl PieSlice {
    fn middle(&self) -> f64 {
        self.start + self.sweep / 2.0
    }

    fn labelled(&self) -> bool {
        self.share >= MIN_LABELLED_SHARE
    }
}

fn pie_slices(rows: &[TreatmentRevenue], first_angle: f64) -> Vec<PieSlice> {
    let total: i64 = rows.iter().map(|r| r.total_revenue_cents).sum();
    if total <= 0 {
        return Vec::new();
    }
    let mut start = first_angle;
    rows.iter()
        .map(|row| {
            let share = row.total_revenue_cents as f64 / total as f64;
            let slice = PieSlice {
                label: row.treatment.to_string(),
                share,
                start,
                sweep: share * 360.0,
            };
            start += slice.sweep;
            slice
        })
        .collect()
}

/// B: pie of each treatment's share of total revenue.
fn draw_revenue_share<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    results: &QueryResults,
) -> DrawResult<DB> {
    let area = area.titled("Revenue share by treatment", caption(34.0))?;
    let (width, height) = area.dim_in_pixel();
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let radius = f64::from(width.min(height)) * 0.33;

    let slices = pie_slices(&results.revenue_by_treatment, 140.0);
    if slices.is_empty() {
        return draw_no_data(&area);
    }

    let point = |angle: f64, r: f64| {
        let rad = angle.to_radians();
        ((cx + r * rad.cos()) as i32, (cy - r * rad.sin()) as i32)
    };

    let mut footnote = Vec::new();
    for (i, slice) in slices.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let steps = slice.sweep.ceil().max(2.0) as usize;
        let mut wedge = vec![(cx as i32, cy as i32)];
        wedge.extend(
            (0..=steps).map(|s| point(slice.start + slice.sweep * s as f64 / steps as f64, radius)),
        );
        area.draw(&Polygon::new(wedge, color.filled()))?;

        if !slice.labelled() {
            footnote.push((color, slice));
            continue;
        }
        let middle = slice.middle();
        area.draw(&Text::new(
            format!("{:.1}%", slice.share * 100.0),
            point(middle, radius * 0.68),
            anchored(caption(20.0).color(&WHITE), HPos::Center, VPos::Center),
        ))?;
        let outside = if middle.to_radians().cos() >= 0.0 { HPos::Left } else { HPos::Right };
        area.draw(&Text::new(
            slice.label.clone(),
            point(middle, radius * 1.08),
            anchored(text(20.0), outside, VPos::Center),
        ))?;
    }

    // thin slices: swatch plus name along the bottom edge
    let y = height as i32 - 40;
    let mut x = 30;
    for (color, slice) in footnote {
        area.draw(&Rectangle::new([(x, y - 9), (x + 18, y + 9)], color.filled()))?;
        let label = format!("{} {:.1}%", slice.label, slice.share * 100.0);
        let advance = 40 + 11 * label.chars().count() as i32;
        area.draw(&Text::new(
            label,
            (x + 26, y),
            anchored(text(20.0), HPos::Left, VPos::Center),
        ))?;
        x += advance;
    }
    Ok(())
}

fn draw_no_data<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>) -> DrawResult<DB> {
    let (width, height) = area.dim_in_pixel();
    area.draw(&Text::new(
        "no data",
        (width as i32 / 2, height as i32 / 2),
        anchored(text(26.0), HPos::Center, VPos::Center),
    ))
}

/// C and D: box plots of the group mean probing depths, split by one flag.
fn draw_depth_boxes<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    labels: [&str; 2],
    groups: &[PerioRiskGroup],
    flag: impl Fn(&PerioRiskGroup) -> bool,
    color: RGBColor,
) -> DrawResult<DB> {
    let samples: [Vec<f64>; 2] = [false, true].map(|wanted| {
        groups
            .iter()
            .filter(|g| flag(g) == wanted)
            .map(|g| g.mean_probing_depth)
            .collect()
    });
    let all = samples.iter().flatten().copied();
    let (lo, hi) = all.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let y_range = if lo.is_finite() { (lo - 0.5).max(0.0)..hi + 0.5 } else { 0.0..8.0 };
    let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();

    let mut chart = ChartBuilder::on(area)
        .caption(title, caption(32.0))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(slot_range(2), y_range.clone())?;
    chart.plotting_area().fill(&WHITE)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(slot_key_points(2))
        .x_label_formatter(&|v| slot_label(&labels, *v))
        .y_desc("Probing depth (mm)")
        .label_style(text(22.0))
        .axis_desc_style(text(24.0))
        .draw()?;

    for (i, sample) in samples.iter().enumerate() {
        let x = i as f64;
        let Some(summary) = BoxSummary::from_values(sample) else {
            chart.draw_series(std::iter::once(Text::new(
                "no data",
                (x, (y_range.start + y_range.end) / 2.0),
                anchored(text(22.0), HPos::Center, VPos::Center),
            )))?;
            continue;
        };

        chart.draw_series([
            Rectangle::new([(x - 0.25, summary.q1), (x + 0.25, summary.q3)], color.mix(0.7).filled()),
            Rectangle::new([(x - 0.25, summary.q1), (x + 0.25, summary.q3)], INK.stroke_width(2)),
        ])?;
        chart.draw_series(
            [
                vec![(x, summary.q1), (x, summary.lower_whisker)],
                vec![(x, summary.q3), (x, summary.upper_whisker)],
                vec![(x - 0.12, summary.lower_whisker), (x + 0.12, summary.lower_whisker)],
                vec![(x - 0.12, summary.upper_whisker), (x + 0.12, summary.upper_whisker)],
            ]
            .into_iter()
            .map(|line| PathElement::new(line, INK.stroke_width(2))),
        )?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x - 0.25, summary.median), (x + 0.25, summary.median)],
            PALETTE[2].stroke_width(4),
        )))?;
        chart.draw_series(
            summary
                .outliers
                .iter()
                .map(|v| Circle::new((x, *v), 6, INK.stroke_width(2))),
        )?;
    }
    Ok(())
}

/// E: visits per insurance, annotated with visits per patient.
fn draw_insurance_visits<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    results: &QueryResults,
) -> DrawResult<DB> {
    let rows = &results.visits_by_insurance;
    let n = rows.len();
    let max = rows.iter().map(|r| r.total_visits).max().unwrap_or(0) as f64;
    let labels: Vec<String> = rows.iter().map(|r| r.insurance.to_string()).collect();

    let mut chart = ChartBuilder::on(area)
        .caption("Visits by insurance type", caption(32.0))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(slot_range(n), value_range(max, 1.2))?;
    chart.plotting_area().fill(&WHITE)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(slot_key_points(n))
        .x_label_formatter(&|v| slot_label(&labels, *v))
        .y_label_formatter(&|v| whole_number_label(*v))
        .y_desc("Visits")
        .label_style(text(20.0))
        .axis_desc_style(text(24.0))
        .draw()?;

    chart.draw_series(rows.iter().enumerate().map(|(i, r)| {
        let x = i as f64;
        Rectangle::new(
            [(x - 0.35, 0.0), (x + 0.35, r.total_visits as f64)],
            PALETTE[i % PALETTE.len()].filled(),
        )
    }))?;
    chart.draw_series(rows.iter().enumerate().map(|(i, r)| {
        EmptyElement::at((i as f64, r.total_visits as f64))
            + Text::new(
                format!("{:.2}×", r.visits_per_patient),
                (0, -8),
                anchored(text(22.0), HPos::Center, VPos::Bottom),
            )
    }))?;
    Ok(())
}

/// F: probing depth and bleeding ÷ 20 side by side per age bracket.
fn draw_age_brackets<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    results: &QueryResults,
) -> DrawResult<DB> {
    let rows = &results.age_brackets;
    let n = rows.len();
    let max = rows
        .iter()
        .flat_map(|r| [r.mean_probing_depth, r.mean_bleeding_pct / 20.0])
        .fold(0.0, f64::max);
    let labels: Vec<String> = rows.iter().map(|r| r.bracket.to_string()).collect();

    let mut chart = ChartBuilder::on(area)
        .caption("Periodontal indicators by age bracket", caption(34.0))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(slot_range(n), value_range(max, 1.25))?;
    chart.plotting_area().fill(&WHITE)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(slot_key_points(n))
        .x_label_formatter(&|v| slot_label(&labels, *v))
        .y_desc("Value")
        .label_style(text(22.0))
        .axis_desc_style(text(24.0))
        .draw()?;

    let depth_color = PALETTE[0];
    let bleeding_color = PALETTE[2];
    chart
        .draw_series(rows.iter().enumerate().map(|(i, r)| {
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x, r.mean_probing_depth)], depth_color.filled())
        }))?
        .label("Probing depth (mm)")
        .legend(move |(x, y)| Rectangle::new([(x, y - 8), (x + 20, y + 8)], depth_color.filled()));
    chart
        .draw_series(rows.iter().enumerate().map(|(i, r)| {
            let x = i as f64;
            Rectangle::new(
                [(x, 0.0), (x + 0.35, r.mean_bleeding_pct / 20.0)],
                bleeding_color.filled(),
            )
        }))?
        .label("Bleeding % (÷20)")
        .legend(move |(x, y)| {
            Rectangle::new([(x, y - 8), (x + 20, y + 8)], bleeding_color.filled())
        });
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.9))
        .border_style(&INK)
        .label_font(text(22.0))
        .draw()?;
    Ok(())
}

/// G: average cost per treatment, cheapest at the bottom.
fn draw_average_cost<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    results: &QueryResults,
) -> DrawResult<DB> {
    let mut rows: Vec<_> = results.revenue_by_treatment.iter().collect();
    rows.sort_by(|a, b| a.average_cost.total_cmp(&b.average_cost));
    let n = rows.len();
    let max = rows.iter().map(|r| r.average_cost).fold(0.0, f64::max);
    let labels: Vec<String> = rows.iter().map(|r| r.treatment.to_string()).collect();

    let mut chart = ChartBuilder::on(area)
        .caption("Average cost per treatment (MXN)", caption(30.0))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(160)
        .build_cartesian_2d(value_range(max, 1.45), slot_range(n))?;
    chart.plotting_area().fill(&WHITE)?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_labels(4)
        .y_labels(slot_key_points(n))
        .y_label_formatter(&|v| slot_label(&labels, *v))
        .x_label_formatter(&|v| format_currency(*v))
        .x_desc("MXN")
        .label_style(text(20.0))
        .axis_desc_style(text(24.0))
        .draw()?;

    chart.draw_series(rows.iter().enumerate().map(|(i, r)| {
        let y = i as f64;
        Rectangle::new(
            [(0.0, y - 0.35), (r.average_cost, y + 0.35)],
            PALETTE[i % PALETTE.len()].filled(),
        )
    }))?;
    chart.draw_series(rows.iter().enumerate().map(|(i, r)| {
        EmptyElement::at((r.average_cost, i as f64))
            + Text::new(
                format_currency(r.average_cost),
                (8, 0),
                anchored(text(20.0), HPos::Left, VPos::Center),
            )
    }))?;
    Ok(())
}

/// Linear interpolation across the YlOrRd stops, `t` in `0..=1`.
fn heat_color(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0) * (HEAT_STOPS.len() - 1) as f64;
    let lower = (t.floor() as usize).min(HEAT_STOPS.len() - 2);
    let frac = t - lower as f64;
    let (a, b) = (HEAT_STOPS[lower], HEAT_STOPS[lower + 1]);
    let mix = |x: u8, y: u8| (f64::from(x) + (f64::from(y) - f64::from(x)) * frac).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Position of `value` in the colour scale, 0.5 when all cells are equal.
fn heat_position(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo { (value - lo) / (hi - lo) } else { 0.5 }
}

/// H: mean bleeding % per risk category and sex, with a colour bar.
fn draw_heatmap<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    heatmap: &BleedingHeatmap,
) -> DrawResult<DB> {
    let (width, _) = area.dim_in_pixel();
    let (grid, bar) = area.split_horizontally(width as i32 - 240);
    let range = heatmap.value_range();

    let rows = RiskCategory::COUNT;
    let columns = Sex::COUNT;
    // first risk category on top
    let row_labels: Vec<String> = RiskCategory::ALL.iter().rev().map(|r| r.to_string()).collect();
    let column_labels: Vec<String> = Sex::ALL.iter().map(|s| s.to_string()).collect();

    let mut chart = ChartBuilder::on(&grid)
        .caption("Bleeding on probing (%) by risk factor and sex", caption(34.0))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(230)
        .build_cartesian_2d(slot_range(columns), slot_range(rows))?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(slot_key_points(columns))
        .x_label_formatter(&|v| slot_label(&column_labels, *v))
        .y_labels(slot_key_points(rows))
        .y_label_formatter(&|v| slot_label(&row_labels, *v))
        .label_style(text(24.0))
        .draw()?;

    let cells: Vec<(f64, f64, Option<f64>)> = heatmap
        .rows()
        .enumerate()
        .flat_map(|(r, (_, values))| {
            let y = (rows - 1 - r) as f64;
            values.iter().enumerate().map(move |(c, value)| (c as f64, y, *value))
        })
        .collect();

    chart.draw_series(cells.iter().map(|&(x, y, value)| {
        let fill = match (value, range) {
            (Some(v), Some(range)) => heat_color(heat_position(v, range)),
            _ => NO_DATA_FILL,
        };
        let mut cell = Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], fill.filled());
        cell.set_margin(2, 2, 2, 2);
        cell
    }))?;
    chart.draw_series(cells.iter().map(|&(x, y, value)| {
        let (label, color) = match (value, range) {
            (Some(v), Some(range)) if heat_position(v, range) > 0.6 => (format!("{v:.1}"), WHITE),
            (Some(v), _) => (format!("{v:.1}"), INK),
            (None, _) => (EMPTY_CELL.to_string(), MUTED),
        };
        Text::new(
            label,
            (x, y),
            anchored(caption(30.0).color(&color), HPos::Center, VPos::Center),
        )
    }))?;

    if let Some((lo, hi)) = range {
        draw_color_bar(&bar, lo, hi)?;
    }
    Ok(())
}

fn draw_color_bar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    lo: f64,
    hi: f64,
) -> DrawResult<DB> {
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 1.0, hi + 1.0) };
    let mut chart = ChartBuilder::on(area)
        .margin_top(80)
        .margin_bottom(84)
        .margin_right(24)
        .y_label_area_size(110)
        .build_cartesian_2d(0.0..1.0, lo..hi)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .y_labels(6)
        .y_desc("% bleeding")
        .label_style(text(20.0))
        .axis_desc_style(text(22.0))
        .draw()?;

    const STEPS: usize = 100;
    let step = (hi - lo) / STEPS as f64;
    chart.draw_series((0..STEPS).map(|i| {
        let y = lo + step * i as f64;
        Rectangle::new(
            [(0.0, y), (1.0, y + step)],
            heat_color(i as f64 / (STEPS - 1) as f64).filled(),
        )
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::mock_dataset;
    use crate::store::Store;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

    fn mock_results() -> QueryResults {
        let mut store = Store::open().unwrap();
        store.populate(&mock_dataset()).unwrap();
        QueryResults::collect(&store).unwrap()
    }

    #[test]
    fn test_slot_label() {
        let labels = vec!["M".to_string(), "F".to_string()];
        assert_eq!(slot_label(&labels, 0.0), "M");
        assert_eq!(slot_label(&labels, 1.000_000_1), "F");
        assert_eq!(slot_label(&labels, 0.5), "");
        assert_eq!(slot_label(&labels, -0.5), "");
        assert_eq!(slot_label(&labels, 2.0), "");
    }

    #[test]
    fn test_slot_range_never_empty() {
        assert_eq!(slot_range(0), -0.5..0.5);
        assert_eq!(slot_range(1), -0.5..0.5);
        assert_eq!(slot_range(4), -0.5..3.5);
    }

    #[test]
    fn test_whole_number_label() {
        assert_eq!(whole_number_label(20.0), "20");
        assert_eq!(whole_number_label(0.0), "0");
        assert_eq!(whole_number_label(2.999_999_9), "3");
        assert_eq!(whole_number_label(2.5), "");
    }

    #[test]
    fn test_pie_slices_footnote_thin_shares() {
        // Prophylaxis earns 600.50 of 20,220.80
        let slices = pie_slices(&mock_results().revenue_by_treatment, 140.0);
        let labelled: Vec<_> = slices
            .iter()
            .map(|s| (s.label.as_str(), s.labelled()))
            .collect();
        assert_eq!(
            labelled,
            vec![("Implant", true), ("Filling", true), ("Prophylaxis", false)]
        );
        assert!(slices[2].share < MIN_LABELLED_SHARE);

        assert_eq!(slices[0].start, 140.0);
        for w in slices.windows(2) {
            assert!((w[0].start + w[0].sweep - w[1].start).abs() < 1e-9);
        }
        let sweep: f64 = slices.iter().map(|s| s.sweep).sum();
        assert!((sweep - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_pie_slices_without_revenue() {
        assert!(pie_slices(&[], 140.0).is_empty());
    }

    #[test]
    fn test_heat_color_endpoints() {
        assert_eq!(heat_color(0.0), HEAT_STOPS[0]);
        assert_eq!(heat_color(1.0), HEAT_STOPS[4]);
        assert_eq!(heat_color(0.5), HEAT_STOPS[2]);
        assert_eq!(heat_color(-3.0), HEAT_STOPS[0]);
        assert_eq!(heat_position(30.0, (10.0, 50.0)), 0.5);
        assert_eq!(heat_position(30.0, (30.0, 30.0)), 0.5);
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        render(&mock_results(), 3, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&PNG_SIGNATURE));
    }

    #[test]
    fn test_render_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let results = QueryResults::collect(&Store::open().unwrap()).unwrap();
        render(&results, 0, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_render_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("chart.png");
        let err = render(&mock_results(), 3, &path).unwrap_err();
        assert!(err.to_string().contains("chart"));
        assert!(!path.exists());
    }
}
