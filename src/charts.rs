//! Per-SKU trend charts.
//!
//! Charts are emitted as standalone SVG documents: one line chart per
//! SKU, x = observation time, y = organic position with the axis
//! inverted so that rank 1 sits at the top — a falling line means the
//! card is losing ground.

use chrono::{DateTime, Utc};

use crate::models::format_minute;

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 48.0;

/// Render the position-over-time series of one SKU as an SVG document.
///
/// The series must be in chronological order (ascending timestamps), as
/// produced by `report::build_export`.
pub fn render_series_svg(sku: &str, series: &[(DateTime<Utc>, i64)]) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let min_pos = series.iter().map(|(_, p)| *p).min().unwrap_or(1);
    let max_pos = series.iter().map(|(_, p)| *p).max().unwrap_or(1);
    let t0 = series.first().map(|(t, _)| t.timestamp()).unwrap_or(0);
    let t1 = series.last().map(|(t, _)| t.timestamp()).unwrap_or(0);

    let x_coord = |ts: i64| -> f64 {
        if t1 == t0 {
            MARGIN_LEFT + plot_w / 2.0
        } else {
            MARGIN_LEFT + (ts - t0) as f64 / (t1 - t0) as f64 * plot_w
        }
    };

    let points: Vec<(f64, f64)> = series
        .iter()
        .map(|(t, p)| (x_coord(t.timestamp()), y_coord(*p, min_pos, max_pos)))
        .collect();

    let polyline: String = points
        .iter()
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect::<Vec<_>>()
        .join(" ");

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" \
         viewBox=\"0 0 {w} {h}\" font-family=\"sans-serif\">\n",
        w = WIDTH,
        h = HEIGHT
    ));
    svg.push_str(&format!(
        "  <rect width=\"{}\" height=\"{}\" fill=\"white\"/>\n",
        WIDTH, HEIGHT
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.1}\" y=\"24\" font-size=\"16\">Positions for {}</text>\n",
        MARGIN_LEFT,
        escape_text(sku)
    ));

    // Axes
    svg.push_str(&format!(
        "  <line x1=\"{l:.1}\" y1=\"{t:.1}\" x2=\"{l:.1}\" y2=\"{b:.1}\" stroke=\"#888\"/>\n",
        l = MARGIN_LEFT,
        t = MARGIN_TOP,
        b = MARGIN_TOP + plot_h
    ));
    svg.push_str(&format!(
        "  <line x1=\"{l:.1}\" y1=\"{b:.1}\" x2=\"{r:.1}\" y2=\"{b:.1}\" stroke=\"#888\"/>\n",
        l = MARGIN_LEFT,
        b = MARGIN_TOP + plot_h,
        r = MARGIN_LEFT + plot_w
    ));

    // Inverted y labels: best rank at the top edge
    svg.push_str(&format!(
        "  <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"end\">{}</text>\n",
        MARGIN_LEFT - 6.0,
        MARGIN_TOP + 4.0,
        min_pos
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"end\">{}</text>\n",
        MARGIN_LEFT - 6.0,
        MARGIN_TOP + plot_h + 4.0,
        max_pos
    ));

    if let (Some((first, _)), Some((last, _))) = (series.first(), series.last()) {
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\">{}</text>\n",
            MARGIN_LEFT,
            HEIGHT - 16.0,
            format_minute(first)
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"end\">{}</text>\n",
            MARGIN_LEFT + plot_w,
            HEIGHT - 16.0,
            format_minute(last)
        ));
    }

    if points.len() > 1 {
        svg.push_str(&format!(
            "  <polyline fill=\"none\" stroke=\"#2563eb\" stroke-width=\"2\" points=\"{}\"/>\n",
            polyline
        ));
    }
    for (x, y) in &points {
        svg.push_str(&format!(
            "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"#2563eb\"/>\n",
            x, y
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// Screen y for an organic position. Lower (better) positions map to the
/// top of the plot; a degenerate range centers the single value.
fn y_coord(position: i64, min_pos: i64, max_pos: i64) -> f64 {
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    if max_pos == min_pos {
        return MARGIN_TOP + plot_h / 2.0;
    }
    MARGIN_TOP + (position - min_pos) as f64 / (max_pos - min_pos) as f64 * plot_h
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn series() -> Vec<(DateTime<Utc>, i64)> {
        vec![
            (Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(), 1),
            (Utc.with_ymd_and_hms(2025, 6, 1, 14, 0, 0).unwrap(), 25),
            (Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap(), 50),
        ]
    }

    #[test]
    fn better_ranks_sit_higher_on_the_chart() {
        // Screen y grows downward, so rank 1 must have the smallest y.
        assert!(y_coord(1, 1, 50) < y_coord(25, 1, 50));
        assert!(y_coord(25, 1, 50) < y_coord(50, 1, 50));
    }

    #[test]
    fn single_point_series_renders_without_a_line() {
        let svg = render_series_svg("NL-PJ-BK-0924", &series()[..1]);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<circle"));
        assert!(!svg.contains("<polyline"));
    }

    #[test]
    fn multi_point_series_renders_a_polyline() {
        let svg = render_series_svg("NL-PJ-BK-0924", &series());
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("Positions for NL-PJ-BK-0924"));
        assert!(svg.contains("2025-06-01 10:00"));
        assert!(svg.contains("2025-06-01 18:00"));
    }
}
