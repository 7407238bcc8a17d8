//! Inspect report types and terminal formatting.
//!
//! The report is plain data: `Display` renders the boxed terminal view and
//! `Serialize` backs `--output json`.

use serde::Serialize;
use std::fmt;

/// Characters between the left and right border of a section box.
const BOX_WIDTH: usize = 59;

/// The result of inspecting a record.
#[derive(Clone, Debug, Serialize)]
pub struct InspectReport {
    /// Record-level metadata.
    pub summary: SummarySection,
    /// One entry per channel, in storage order.
    pub channels: Vec<ChannelStats>,
    /// Display options for formatting.
    #[serde(skip)]
    pub(crate) bar_width: usize,
}

/// Record-level metadata.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SummarySection {
    /// Name of the format the record was loaded from.
    pub format: String,
    pub sampling_rate: f64,
    pub channels: usize,
    pub samples_per_channel: usize,
    /// Record length in seconds.
    pub duration_secs: f64,
    /// Counts per millivolt.
    pub adu_gain: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_names: Option<String>,
    /// Channel slots the source declared, filled or not.
    pub allocated_channels: usize,
    /// Sample count the source reported.
    pub number_of_points: usize,
    /// Kind of retained vendor document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Amplitude statistics for one channel, in ADC counts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelStats {
    pub index: usize,
    pub label: String,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub mean: Option<f64>,
    /// Population standard deviation; only computed on request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    /// Peak-to-peak amplitude in millivolts.
    pub peak_to_peak_mv: Option<f64>,
}

impl ChannelStats {
    fn span(&self) -> i64 {
        match (self.min, self.max) {
            (Some(min), Some(max)) => max as i64 - min as i64,
            _ => 0,
        }
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Header
        writeln!(f)?;
        writeln!(f, "╭─────────────────────────────────────────────────────────────╮")?;
        writeln!(f, "│                 📈  ECG Record Inspection                   │")?;
        writeln!(f, "╰─────────────────────────────────────────────────────────────╯")?;
        writeln!(f)?;

        self.fmt_summary(f)?;
        writeln!(f)?;

        self.fmt_channels(f)?;

        Ok(())
    }
}

impl InspectReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;

        section_top(f, "Summary")?;
        blank(f)?;
        row(f, &format!("  Format:          {}", s.format))?;
        row(f, &format!("  Sampling rate:   {} Hz", s.sampling_rate))?;
        row(f, &format!("  Channels:        {:>8}", format_number(s.channels)))?;
        row(
            f,
            &format!("  Samples/channel: {:>8}", format_number(s.samples_per_channel)),
        )?;
        row(f, &format!("  Duration:        {:>8.2} s", s.duration_secs))?;
        row(f, &format!("  ADU gain:        {:>8} counts/mV", s.adu_gain))?;
        if s.allocated_channels != s.channels {
            row(
                f,
                &format!("  Allocated:       {:>8} channel(s)", s.allocated_channels),
            )?;
        }
        if s.number_of_points != s.channels * s.samples_per_channel {
            row(
                f,
                &format!("  Points reported: {:>8}", format_number(s.number_of_points)),
            )?;
        }
        if let Some(payload) = &s.payload {
            row(f, &format!("  Payload:         {}", payload))?;
        }
        blank(f)?;
        match &s.lead_names {
            Some(names) => row(
                f,
                &format!("  Leads: {}", truncate_label(names, BOX_WIDTH - 10)),
            )?,
            None => row(f, "  Leads: (none)")?,
        }
        blank(f)?;
        section_bottom(f)
    }

    fn fmt_channels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section_top(f, &format!("Channels ({})", self.channels.len()))?;
        blank(f)?;

        if self.channels.iter().all(|c| c.min.is_none()) {
            row(f, "  No samples found.")?;
        } else {
            row(f, "  Lead        min      max     mean     p-p mV")?;
            let max_span = self.channels.iter().map(ChannelStats::span).max().unwrap_or(0);
            for channel in &self.channels {
                let (Some(min), Some(max), Some(mean)) = (channel.min, channel.max, channel.mean)
                else {
                    row(f, &format!("  {:<6}  (empty)", truncate_label(&channel.label, 6)))?;
                    continue;
                };
                let bar = render_bar(channel.span(), max_span, self.bar_width);
                row(
                    f,
                    &format!(
                        "  {:<6} {:>8} {:>8} {:>8.1} {:>8.3}  {}",
                        truncate_label(&channel.label, 6),
                        min,
                        max,
                        mean,
                        channel.peak_to_peak_mv.unwrap_or(0.0),
                        bar
                    ),
                )?;
                if let Some(std_dev) = channel.std_dev {
                    row(f, &format!("         std dev {:>8.2}", std_dev))?;
                }
            }
        }

        blank(f)?;
        section_bottom(f)
    }
}

fn section_top(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    let used = title.chars().count() + 3;
    writeln!(f, "┌─ {} {}┐", title, "─".repeat(BOX_WIDTH.saturating_sub(used)))
}

fn section_bottom(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "└{}┘", "─".repeat(BOX_WIDTH))
}

fn blank(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    row(f, "")
}

/// Write one boxed line, padding `content` to the box width.
fn row(f: &mut fmt::Formatter<'_>, content: &str) -> fmt::Result {
    let padding = BOX_WIDTH.saturating_sub(content.chars().count() + 1);
    writeln!(f, "│ {}{}│", content, " ".repeat(padding))
}

/// Format a number with thousands separators.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Render a horizontal bar using Unicode block characters.
fn render_bar(value: i64, max_value: i64, width: usize) -> String {
    if max_value <= 0 || width == 0 {
        return String::new();
    }

    let filled = ((value.max(0) as u128 * width as u128) / max_value as u128) as usize;
    let filled = filled.min(width);

    "█".repeat(filled) + &"░".repeat(width - filled)
}

/// Truncate a label to fit in the display column.
fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        label.to_string()
    } else {
        let kept: String = label.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
