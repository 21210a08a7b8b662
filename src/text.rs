//! Legend-driven text rendering.
//!
//! A [`TextReporter`] turns each [`Report`] into one line of text built from a *legend*: a
//! template with named placeholders such as `{done}`, `{eta}` or `{progress_bar}`. The legend
//! is compiled once, on the first report, into a [`CompiledLegend`]; later changes to the
//! options of *that* instance have no effect, so configure before use.
//!
//! # Placeholders
//!
//! | token             | value                                          |
//! |-------------------|------------------------------------------------|
//! | `{now}`           | snapshot time, `YYYY-MM-DD HH:MM:SS`           |
//! | `{started_at}`    | start time, same format                        |
//! | `{dt}`            | time since previous report, whole milliseconds |
//! | `{total}`         | total items                                    |
//! | `{done}`          | items done                                     |
//! | `{left}`          | items left (may be negative)                   |
//! | `{ratio}`         | `done / total`, float                          |
//! | `{percent_int}`   | integer percent                                |
//! | `{percent_float}` | percent, float                                 |
//! | `{elapsed}`       | time since start, whole seconds                |
//! | `{eta}`           | estimated time left, whole seconds, never < 0  |
//! | `{rps_avg}`       | average items per second, float                |
//! | `{rps_inst}`      | items per second since previous report, float  |
//! | `{rpm}`           | average items per minute, float                |
//! | `{progress_bar}`  | `[####----]`                                   |
//!
//! Float placeholders use the configured precision. Anything else in braces is copied
//! through untouched.
//!
//! # Line clearing
//!
//! Legends usually end in `\r` so each report overwrites the previous one in a terminal.
//! When a line is shorter than its predecessor it is padded with spaces (before the trailing
//! `\r`/`\n`) so no stale characters remain.

use std::{
    fmt::{self, Write as _},
    io::{self, BufWriter, Write},
    sync::Arc,
    time::Duration,
};

use compact_str::CompactString;
use parking_lot::Mutex;
use tracing::trace;

use crate::{progress::Report, reporter::Reporter};

/// Default legend, e.g.
/// `[2023-12-02 13:01:21] - working (39/360) done 10%, RPS 9.74, elapsed 4s, ETA 32s`.
pub const LEGEND_DEFAULT: &str =
    "[{now}] - working ({done}/{total}) done {percent_int}%, RPS {rps_avg}, elapsed {elapsed}, ETA {eta}\r";

/// Legend with a progress bar, e.g. `[#####-----] 50%, 9.80 RPS, 5s ETA`.
pub const LEGEND_PROGRESS_BAR: &str = "{progress_bar} {percent_int}%, {rps_avg} RPS, {eta} ETA\r";

/// Decimal digits for float placeholders.
pub const DEFAULT_FLOAT_PRECISION: usize = 2;

/// Progress bar width, brackets included.
pub const DEFAULT_PROGRESS_BAR_WIDTH: usize = 80;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Plain configuration of a [`TextReporter`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TextOptions {
    /// Template of one report line.
    pub legend: CompactString,
    /// Decimal digits for float placeholders.
    pub float_precision: usize,
    /// Width of `{progress_bar}`, including the two brackets.
    pub progress_bar_width: usize,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            legend: CompactString::const_new(LEGEND_DEFAULT),
            float_precision: DEFAULT_FLOAT_PRECISION,
            progress_bar_width: DEFAULT_PROGRESS_BAR_WIDTH,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placeholder {
    Now,
    StartedAt,
    Dt,
    Total,
    Done,
    Left,
    Ratio,
    PercentInt,
    PercentFloat,
    Elapsed,
    Eta,
    RpsAvg,
    RpsInst,
    Rpm,
    ProgressBar,
}

impl Placeholder {
    const ALL: [Self; 15] = [
        Self::Now,
        Self::StartedAt,
        Self::Dt,
        Self::Total,
        Self::Done,
        Self::Left,
        Self::Ratio,
        Self::PercentInt,
        Self::PercentFloat,
        Self::Elapsed,
        Self::Eta,
        Self::RpsAvg,
        Self::RpsInst,
        Self::Rpm,
        Self::ProgressBar,
    ];

    const fn token(self) -> &'static str {
        match self {
            Self::Now => "{now}",
            Self::StartedAt => "{started_at}",
            Self::Dt => "{dt}",
            Self::Total => "{total}",
            Self::Done => "{done}",
            Self::Left => "{left}",
            Self::Ratio => "{ratio}",
            Self::PercentInt => "{percent_int}",
            Self::PercentFloat => "{percent_float}",
            Self::Elapsed => "{elapsed}",
            Self::Eta => "{eta}",
            Self::RpsAvg => "{rps_avg}",
            Self::RpsInst => "{rps_inst}",
            Self::Rpm => "{rpm}",
            Self::ProgressBar => "{progress_bar}",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(CompactString),
    Field(Placeholder),
}

/// A legend parsed into literal text and placeholder slots, with the float precision
/// baked in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledLegend {
    segments: Vec<Segment>,
    float_precision: usize,
}

impl CompiledLegend {
    /// Parses `legend`. Unknown `{...}` sequences stay literal.
    #[must_use]
    pub fn compile(legend: &str, float_precision: usize) -> Self {
        let mut segments = Vec::new();
        let mut literal = CompactString::default();
        let mut rest = legend;

        while let Some(pos) = rest.find('{') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match Placeholder::ALL.into_iter().find(|p| tail.starts_with(p.token())) {
                Some(placeholder) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(placeholder));
                    rest = &tail[placeholder.token().len()..];
                }
                None => {
                    literal.push('{');
                    rest = &tail[1..];
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            segments,
            float_precision,
        }
    }

    /// Substitutes `report` into the legend. `progress_bar_width` is only consulted when
    /// the legend contains `{progress_bar}`.
    #[must_use]
    pub fn render(&self, report: &Report, progress_bar_width: usize) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            // Writing into a String cannot fail.
            let _ = match segment {
                Segment::Literal(text) => out.write_str(text),
                Segment::Field(placeholder) => {
                    self.write_field(&mut out, *placeholder, report, progress_bar_width)
                }
            };
        }
        out
    }

    fn write_field(
        &self,
        out: &mut String,
        placeholder: Placeholder,
        report: &Report,
        progress_bar_width: usize,
    ) -> fmt::Result {
        let precision = self.float_precision;
        match placeholder {
            Placeholder::Now => write!(out, "{}", report.now.format(TIMESTAMP_FORMAT)),
            Placeholder::StartedAt => {
                write!(out, "{}", report.started_at.format(TIMESTAMP_FORMAT))
            }
            Placeholder::Dt => out.write_str(&format_duration(round_duration(
                report.dt,
                Duration::from_millis(1),
            ))),
            Placeholder::Total => write!(out, "{}", report.total),
            Placeholder::Done => write!(out, "{}", report.done),
            Placeholder::Left => write!(out, "{}", report.left),
            Placeholder::Ratio => write!(out, "{:.*}", precision, report.ratio),
            Placeholder::PercentInt => write!(out, "{}", report.percent_int),
            Placeholder::PercentFloat => write!(out, "{:.*}", precision, report.percent_float),
            Placeholder::Elapsed => out.write_str(&format_duration(round_duration(
                report.elapsed,
                Duration::from_secs(1),
            ))),
            Placeholder::Eta => {
                // Negative once done > total; display clamps to zero.
                let eta = report.eta.to_std().unwrap_or_default();
                out.write_str(&format_duration(round_duration(eta, Duration::from_secs(1))))
            }
            Placeholder::RpsAvg => write!(out, "{:.*}", precision, report.rps_avg),
            Placeholder::RpsInst => write!(out, "{:.*}", precision, report.rps_inst),
            Placeholder::Rpm => write!(out, "{:.*}", precision, report.rpm_avg),
            Placeholder::ProgressBar => {
                out.write_str(&render_progress_bar(report.ratio, progress_bar_width))
            }
        }
    }
}

/// Draws `[###---]` spanning `width` characters, brackets included.
///
/// Returns an empty string when `width <= 2`. Negative ratios draw an empty bar, ratios
/// above 1 a full one.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn render_progress_bar(ratio: f64, width: usize) -> String {
    let inner = width.saturating_sub(2);
    if inner == 0 {
        return String::new();
    }

    let ratio = ratio.max(0.0);
    let fill = ((ratio * inner as f64) as usize).min(inner);

    let mut bar = String::with_capacity(width);
    bar.push('[');
    bar.extend(std::iter::repeat_n('#', fill));
    bar.extend(std::iter::repeat_n('-', inner - fill));
    bar.push(']');
    bar
}

/// Rounds `d` to the nearest multiple of `unit`, halves away from zero.
fn round_duration(d: Duration, unit: Duration) -> Duration {
    let unit = unit.as_nanos();
    if unit == 0 {
        return d;
    }
    let rounded = (d.as_nanos() + unit / 2) / unit * unit;
    Duration::from_nanos(u64::try_from(rounded).unwrap_or(u64::MAX))
}

/// Compact duration text: `0s`, `250ms`, `1.5s`, `4s`, `1m2s`, `1h0m5s`.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_owned();
    }

    let nanos = d.subsec_nanos();
    if d < Duration::from_secs(1) {
        return if nanos < 1_000 {
            format!("{nanos}ns")
        } else if nanos < 1_000_000 {
            with_fraction(nanos / 1_000, nanos % 1_000, 3, "µs")
        } else {
            with_fraction(nanos / 1_000_000, nanos % 1_000_000, 6, "ms")
        };
    }

    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    out.push_str(&with_fraction(seconds, u64::from(nanos), 9, "s"));
    out
}

fn with_fraction(
    whole: impl fmt::Display,
    frac: impl Into<u64>,
    digits: usize,
    unit: &str,
) -> String {
    let frac = frac.into();
    if frac == 0 {
        return format!("{whole}{unit}");
    }
    let frac = format!("{frac:0digits$}");
    format!("{whole}.{}{unit}", frac.trim_end_matches('0'))
}

/// Byte sink shared by every reporter copy derived from the same configuration.
#[derive(Clone, Default)]
enum Sink {
    #[default]
    Stderr,
    Shared(Arc<Mutex<Box<dyn Write + Send>>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stderr => io::stderr().write(buf),
            Self::Shared(inner) => inner.lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stderr => io::stderr().flush(),
            Self::Shared(inner) => inner.lock().flush(),
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stderr => f.write_str("Stderr"),
            Self::Shared(_) => f.write_str("Shared"),
        }
    }
}

/// Reporter writing one legend-formatted line per report.
///
/// Each `with_*` method returns a new, independent reporter carrying a copy of the
/// configuration, so one base configuration can seed many trackers. Runtime state (the
/// compiled legend, the buffered writer, the previous line length) is never copied.
///
/// Output goes to stderr unless [`with_output`](Self::with_output) says otherwise. Write and
/// flush errors are dropped.
#[derive(Debug)]
pub struct TextReporter {
    options: TextOptions,
    output: Sink,

    compiled: Option<CompiledLegend>,
    writer: Option<BufWriter<Sink>>,
    last_line_len: usize,
}

impl TextReporter {
    /// Creates a reporter with [`LEGEND_DEFAULT`], writing to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::from_options(TextOptions::default())
    }

    /// Creates a reporter from a full option set, writing to stderr.
    #[must_use]
    pub fn from_options(options: TextOptions) -> Self {
        Self {
            options,
            output: Sink::Stderr,
            compiled: None,
            writer: None,
            last_line_len: 0,
        }
    }

    /// Returns the configuration of this reporter.
    #[must_use]
    pub const fn options(&self) -> &TextOptions {
        &self.options
    }

    /// Returns a copy using `legend`.
    #[must_use]
    pub fn with_legend(&self, legend: impl Into<CompactString>) -> Self {
        let mut ret = self.clone();
        ret.options.legend = legend.into();
        ret
    }

    /// Returns a copy printing floats with `float_precision` decimals.
    #[must_use]
    pub fn with_float_precision(&self, float_precision: usize) -> Self {
        let mut ret = self.clone();
        ret.options.float_precision = float_precision;
        ret
    }

    /// Returns a copy writing to `output`.
    #[must_use]
    pub fn with_output<W: Write + Send + 'static>(&self, output: W) -> Self {
        let mut ret = self.clone();
        ret.output = Sink::Shared(Arc::new(Mutex::new(Box::new(output))));
        ret
    }

    /// Returns a copy drawing `{progress_bar}` `width` characters wide.
    #[must_use]
    pub fn with_progress_bar_width(&self, width: usize) -> Self {
        let mut ret = self.clone();
        ret.options.progress_bar_width = width;
        ret
    }

    /// Formats `report` with this reporter's legend, without line-clearing padding.
    ///
    /// Compiles the legend on first use.
    pub fn render(&mut self, report: &Report) -> String {
        let options = &self.options;
        self.compiled
            .get_or_insert_with(|| {
                CompiledLegend::compile(&options.legend, options.float_precision)
            })
            .render(report, options.progress_bar_width)
    }

    fn emit(&mut self, parts: &[&str]) {
        let output = &self.output;
        let writer = self
            .writer
            .get_or_insert_with(|| BufWriter::new(output.clone()));

        let result = parts
            .iter()
            .try_for_each(|part| writer.write_all(part.as_bytes()))
            .and_then(|()| writer.flush());
        if let Err(err) = result {
            trace!(%err, "dropping progress output error");
        }
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TextReporter {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            output: self.output.clone(),
            compiled: None,
            writer: None,
            last_line_len: 0,
        }
    }
}

impl Reporter for TextReporter {
    fn report(&mut self, report: &Report) {
        let line = self.render(report);

        let body = line.trim_end_matches(['\r', '\n']);
        let tail = &line[body.len()..];
        let len = body.chars().count();
        let padding = " ".repeat(self.last_line_len.saturating_sub(len));
        self.last_line_len = len;

        self.emit(&[body, &padding, tail]);
    }

    fn finalize(&mut self) {
        self.emit(&["\n"]);
    }
}
