//! Renders a stored call session as four stacked line charts, one per
//! [`Metric`], with one line per participant.
//!
//! Samples are plotted against their position in the series rather than
//! their timestamp, and the x axis is labelled assuming clients report every
//! [`SAMPLE_INTERVAL`] seconds.

use crate::{
    log_store::{
        LogStore,
        StoreError,
    },
    session::{
        CallSession,
        Metric,
    },
};
use image::{
    codecs::png::PngEncoder,
    ExtendedColorType,
    ImageEncoder as _,
};
use plotters::{
    coord::Shift,
    prelude::*,
    style::register_font,
};
use std::sync::OnceLock;
use strum::IntoEnumIterator as _;

/// Seconds between two samples of the same participant.
pub const SAMPLE_INTERVAL: usize = 15;

pub const CHART_SIZE: (u32, u32) = (1600, 1000);

const MAX_X_LABELS: usize = 20;

const FONT_FAMILY: &str = "sans-serif";
const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Load(#[from] StoreError),
    #[error("Failed to draw chart: {0}")]
    Draw(eyre::Report),
    #[error("Failed to encode chart as PNG: {0}")]
    Encode(#[from] image::ImageError),
}

impl RenderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RenderError::Load(err) if err.is_not_found())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesLine {
    pub label: String,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub metric: Metric,
    pub lines: Vec<SeriesLine>,
}

impl Panel {
    /// Loss panels always span 0 to 100 percent, bitrate panels start at zero
    /// and leave some headroom above the largest value.
    pub fn y_range(&self) -> (i64, i64) {
        if self.metric.is_packet_loss() {
            return (0, 100);
        }
        let values = self.lines.iter().flat_map(|line| line.values.iter().copied());
        let (min, max) = values.fold((0, 0), |(min, max), v| (v.min(min), v.max(max)));
        (min, (max + max / 10).max(1))
    }
}

/// The data of a chart, aligned and ordered, before any drawing happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartData {
    pub panels: Vec<Panel>,
    /// Length of the longest series across all panels.
    pub max_len: usize,
}

impl ChartData {
    pub fn from_session(session: &CallSession) -> Self {
        let panels = Metric::iter()
            .map(|metric| Panel {
                metric,
                lines: session
                    .participants
                    .iter()
                    .enumerate()
                    .map(|(index, participant)| SeriesLine {
                        label: format!("Participant {}", index + 1),
                        values: participant.series(metric).values().copied().collect(),
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();

        let max_len = panels
            .iter()
            .flat_map(|panel| panel.lines.iter().map(|line| line.values.len()))
            .max()
            .unwrap_or(0);

        Self { panels, max_len }
    }

    /// `0, 15, 30, …` with one label per sample index plus a closing one.
    pub fn x_tick_labels(&self) -> Vec<String> {
        (0..=self.max_len).map(|i| (i * SAMPLE_INTERVAL).to_string()).collect()
    }

    pub fn render_png(&self) -> Result<Vec<u8>, RenderError> {
        let (width, height) = CHART_SIZE;
        let mut pixels = vec![0u8; width as usize * height as usize * 3];
        self.draw(&mut pixels).map_err(RenderError::Draw)?;

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(&pixels, width, height, ExtendedColorType::Rgb8)?;
        Ok(png)
    }

    fn draw(&self, pixels: &mut [u8]) -> eyre::Result<()> {
        register_chart_font()?;
        let root = BitMapBackend::with_buffer(pixels, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let areas = root.split_evenly((self.panels.len().max(1), 1));
        for (panel, area) in self.panels.iter().zip(areas.iter()) {
            self.draw_panel(panel, area)?;
        }
        root.present()?;
        Ok(())
    }

    fn draw_panel(&self, panel: &Panel, area: &DrawingArea<BitMapBackend<'_>, Shift>) -> eyre::Result<()> {
        let x_end = self.max_len.saturating_sub(1).max(1) as i64;
        let (y_start, y_end) = panel.y_range();
        let x_labels = self.x_tick_labels().len().min(MAX_X_LABELS);
        let y_labels = if panel.metric.is_packet_loss() { 11 } else { 10 };

        let mut chart = ChartBuilder::on(area)
            .caption(panel.metric.to_string(), (FONT_FAMILY, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0i64..x_end, y_start..y_end)?;

        chart
            .configure_mesh()
            .x_desc("Time in Seconds")
            .y_desc(panel.metric.unit())
            .x_labels(x_labels)
            .y_labels(y_labels)
            .x_label_formatter(&|x| (x * SAMPLE_INTERVAL as i64).to_string())
            .draw()?;

        for (index, line) in panel.lines.iter().enumerate() {
            let color = PALETTE[index % PALETTE.len()];
            let points = line.values.iter().enumerate().map(|(x, y)| (x as i64, *y));
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))?
                .label(line.label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        if !panel.lines.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }
        Ok(())
    }
}

/// Makes the bundled font available to plotters, which has no font of its own.
fn register_chart_font() -> eyre::Result<()> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let registered = *REGISTERED.get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, FONT_DATA).is_ok());
    eyre::ensure!(registered, "bundled chart font could not be loaded");
    Ok(())
}

/// Loads session `id` from `store` and renders it as a PNG image.
#[instrument(level = "debug", skip(store))]
pub fn render_session_chart(store: &LogStore, id: &str) -> Result<Vec<u8>, RenderError> {
    let session = store.load(id)?;
    let chart = ChartData::from_session(&session);
    debug!(
        participants = session.participant_count(),
        max_len = chart.max_len,
        "rendering call session chart"
    );
    chart.render_png()
}
