//! Chart rendering with plotters (PNG through the bitmap backend)
//!
//! Text is drawn with a bundled DejaVu Sans registered as `sans-serif`, so
//! rendering does not depend on fonts installed on the host.

use crate::evaluation::PredictionSet;
use plotters::prelude::*;
use plotters::style::register_font;
use std::error::Error;
use std::path::Path;
use std::sync::OnceLock;

type PlotResult = std::result::Result<(), Box<dyn Error>>;

static SANS_SERIF: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/fonts/DejaVuSans.ttf"
));

static FONT_REGISTERED: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Register the bundled font on first use
fn ensure_font() -> PlotResult {
    FONT_REGISTERED
        .get_or_init(|| {
            register_font("sans-serif", FontStyle::Normal, SANS_SERIF)
                .map_err(|_| "bundled sans-serif font could not be parsed".to_string())
        })
        .clone()
        .map_err(Into::into)
}

const SIZE: (u32, u32) = (1000, 600);
const RESIDUAL_SIZE: (u32, u32) = (1000, 400);
const POINT_COLOR: RGBColor = RGBColor(255, 140, 0);
const RESIDUAL_COLOR: RGBColor = RGBColor(128, 0, 128);
const BAR_COLOR: RGBColor = RGBColor(70, 130, 180);
const GUIDE_COLOR: RGBColor = RGBColor(90, 90, 90);

/// `(min, max)` of a slice padded by 5% of the span (at least 1.0 overall)
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    (lo - pad, hi + pad)
}

/// Predicted against actual yield with the identity line
pub fn scatter_plot(path: &Path, set: &PredictionSet, title: &str) -> PlotResult {
    ensure_font()?;
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_lo, x_hi) = padded_range(set.actual.iter().copied());
    let (y_lo, y_hi) = padded_range(set.predicted.iter().copied());

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc("Produtividade Real (ton/ha)")
        .y_desc("Produtividade Prevista (ton/ha)")
        .draw()?;

    chart.draw_series(
        set.actual
            .iter()
            .zip(set.predicted.iter())
            .map(|(&a, &p)| Circle::new((a, p), 4, POINT_COLOR.mix(0.7).filled())),
    )?;

    let (lo, hi) = set
        .actual
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo.is_finite() && hi.is_finite() {
        chart.draw_series(DashedLineSeries::new(
            vec![(lo, lo), (hi, hi)],
            10,
            6,
            BLACK.stroke_width(2),
        ))?;
    }

    root.present()?;
    Ok(())
}

/// Residual (`actual - predicted`) against actual yield with a zero line
pub fn residual_plot(path: &Path, set: &PredictionSet, title: &str) -> PlotResult {
    ensure_font()?;
    let root = BitMapBackend::new(path, RESIDUAL_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let residuals = set.residuals();
    let (x_lo, x_hi) = padded_range(set.actual.iter().copied());
    let (y_lo, y_hi) = padded_range(residuals.iter().copied().chain(std::iter::once(0.0)));

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc("Produtividade Real (ton/ha)")
        .y_desc("Erro (Resíduo)")
        .draw()?;

    chart.draw_series(
        set.actual
            .iter()
            .zip(residuals.iter())
            .map(|(&a, &r)| Circle::new((a, r), 4, RESIDUAL_COLOR.mix(0.7).filled())),
    )?;
    chart.draw_series(LineSeries::new(vec![(x_lo, 0.0), (x_hi, 0.0)], &GUIDE_COLOR))?;

    root.present()?;
    Ok(())
}

/// Vertical bars, one per labelled value
pub fn bar_chart(
    path: &Path,
    labels: &[String],
    values: &[f64],
    title: &str,
    x_desc: &str,
    y_desc: &str,
) -> PlotResult {
    ensure_font()?;
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (lo, hi) = padded_range(values.iter().copied().chain(std::iter::once(0.0)));
    let n = values.len() as i32;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((0..(n - 1).max(1)).into_segmented(), lo.min(0.0)..hi)?;

    let label_of = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .x_labels(labels.len().max(1))
        .x_label_formatter(&label_of)
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BAR_COLOR.filled())
            .margin(10)
            .data(values.iter().enumerate().map(|(i, &v)| (i as i32, v))),
    )?;

    root.present()?;
    Ok(())
}

/// Horizontal bars of relative feature importance, largest on top
pub fn importance_chart(path: &Path, importances: &[(String, f64)], title: &str) -> PlotResult {
    let mut sorted = importances.to_vec();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    ensure_font()?;
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let max = sorted.iter().map(|(_, v)| *v).fold(0.0, f64::max).max(1e-9);
    let n = sorted.len() as i32;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(180)
        .build_cartesian_2d(0.0..max * 1.1, (0..(n - 1).max(1)).into_segmented())?;

    let label_of = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => sorted
            .get(*i as usize)
            .map(|(name, _)| name.clone())
            .unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Importância Relativa")
        .y_labels(sorted.len().max(1))
        .y_label_formatter(&label_of)
        .draw()?;

    chart.draw_series(
        Histogram::horizontal(&chart)
            .style(BAR_COLOR.filled())
            .margin(8)
            .data(sorted.iter().enumerate().map(|(i, (_, v))| (i as i32, *v))),
    )?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range([1.0, 3.0].into_iter()), (0.5, 3.5));
        let (lo, hi) = padded_range([0.0, 100.0].into_iter());
        assert_eq!((lo, hi), (-5.0, 105.0));
        assert_eq!(padded_range(std::iter::empty()), (0.0, 1.0));
    }

    #[test]
    fn test_charts_render_png_with_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("barras.png");
        bar_chart(
            &path,
            &["2020".to_string(), "2021".to_string()],
            &[1.5, -0.3],
            "MAE por Ano",
            "Ano de Teste",
            "Erro Absoluto Médio (ton/ha)",
        )
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        ensure_font().unwrap();
    }
}
