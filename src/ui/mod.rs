mod theme;

use crate::domain::{
    ContentMatch, EvictionPlan, FileWarning, ParsedLogLine, SearchResults, TimeWindow,
};
use crate::infra::SearchOutput;
use humansize::{DECIMAL, format_size};
use regex::Regex;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::LazyLock;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use theme::paint;

static TIMESTAMP_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[([0-9]{2}/[0-9]{2}/[0-9]{4}\s*,\s*[0-9]{1,2}:[0-9]{2}:[0-9]{2}\.[0-9]{3}\s*[AaPp][Mm])\s*\]",
    )
    .expect("timestamp highlight pattern is valid")
});

// `] %    cmd` -> `] % cmd`
static PROMPT_SPACING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\]\s+)%\s+").expect("prompt spacing pattern is valid")
});

const DISPLAY_MINUTE: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour repr:12]:[minute] [period]");
const DISPLAY_SECOND: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const ISO_MILLIS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

/// Where rendered results end up; only the screen gets cleanup and color.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RenderTarget {
    Screen { color: bool },
    File,
}

pub fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}

pub fn should_color_stdout() -> bool {
    color_allowed() && io::stdout().is_terminal()
}

pub fn should_color_stderr() -> bool {
    color_allowed() && io::stderr().is_terminal()
}

fn color_allowed() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    !std::env::var("TERM").is_ok_and(|term| term == "dumb")
}

pub fn header(color: bool) -> String {
    format!(
        "{} - {}",
        paint("termlogs", theme::TITLE, color),
        paint("iTerm session log parser", theme::SUBTITLE, color)
    )
}

pub fn format_error(message: &str, color: bool) -> String {
    paint(&format!("error: {message}"), theme::ERROR, color)
}

pub fn format_display_minute(value: PrimitiveDateTime) -> String {
    value
        .format(DISPLAY_MINUTE)
        .unwrap_or_else(|_| value.to_string())
}

pub fn format_display_second(value: PrimitiveDateTime) -> String {
    value
        .format(DISPLAY_SECOND)
        .unwrap_or_else(|_| value.to_string())
}

fn format_iso_millis(value: PrimitiveDateTime) -> String {
    value.format(ISO_MILLIS).unwrap_or_else(|_| value.to_string())
}

pub fn collapse_prompt_spacing(line: &str) -> String {
    PROMPT_SPACING_RE.replace_all(line, "$1% ").into_owned()
}

pub fn highlight_timestamp(line: &str, color: bool) -> String {
    if !color {
        return line.to_string();
    }
    let bracket = theme::BRACKET;
    let stamp = theme::TIMESTAMP;
    let reset = theme::RESET;
    TIMESTAMP_PREFIX_RE
        .replace(line, format!("{bracket}[{stamp}$1{reset}{bracket}]{reset}"))
        .into_owned()
}

fn render_line(line: &str, target: RenderTarget) -> String {
    match target {
        RenderTarget::Screen { color } => highlight_timestamp(&collapse_prompt_spacing(line), color),
        RenderTarget::File => line.to_string(),
    }
}

fn write_section_header(out: &mut impl Write, path: &Path) -> io::Result<bool> {
    if !write_line(out, "")? {
        return Ok(false);
    }
    write_line(out, &format!("=== {} ===", path.display()))
}

pub fn write_time_results(
    out: &mut impl Write,
    results: &SearchResults<ParsedLogLine>,
    target: RenderTarget,
) -> io::Result<bool> {
    for (path, lines) in results {
        if !write_section_header(out, path)? {
            return Ok(false);
        }
        for line in lines {
            if !write_line(out, &render_line(&line.raw_text, target))? {
                return Ok(false);
            }
        }
        if !write_line(out, "")? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn write_content_results(
    out: &mut impl Write,
    results: &SearchResults<ContentMatch>,
    target: RenderTarget,
) -> io::Result<bool> {
    for (path, matches) in results {
        if !write_section_header(out, path)? {
            return Ok(false);
        }
        for (index, found) in matches.iter().enumerate() {
            if index > 0 && !write_line(out, "--")? {
                return Ok(false);
            }
            let block = found
                .before
                .iter()
                .chain(std::iter::once(&found.line))
                .chain(found.after.iter());
            for line in block {
                if !write_line(out, &render_line(line, target))? {
                    return Ok(false);
                }
            }
        }
        if !write_line(out, "")? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn write_warnings(
    err: &mut impl Write,
    warnings: &[FileWarning],
    color: bool,
) -> io::Result<bool> {
    for warning in warnings {
        let line = format!("warning: {}: {}", warning.path.display(), warning.message);
        if !write_line(err, &paint(&line, theme::WARNING, color))? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn format_plan(plan: &EvictionPlan) -> Vec<String> {
    plan.files
        .iter()
        .map(|file| {
            format!(
                "  {}  (created: {}, size: {})",
                file.path.display(),
                format_display_second(file.created),
                format_size(file.size_bytes, DECIMAL)
            )
        })
        .collect()
}

pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

#[derive(Serialize)]
struct TimeReport<'a> {
    window: WindowReport,
    files: Vec<FileReport<'a>>,
    warnings: Vec<WarningReport>,
}

#[derive(Serialize)]
struct WindowReport {
    start: String,
    end: String,
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: String,
    lines: Vec<LineReport<'a>>,
}

#[derive(Serialize)]
struct LineReport<'a> {
    timestamp: String,
    text: &'a str,
}

#[derive(Serialize)]
struct WarningReport {
    path: String,
    message: String,
}

pub fn time_results_json(
    window: &TimeWindow,
    output: &SearchOutput<ParsedLogLine>,
) -> serde_json::Result<String> {
    let report = TimeReport {
        window: WindowReport {
            start: format_iso_millis(window.start),
            end: format_iso_millis(window.end),
        },
        files: output
            .results
            .iter()
            .map(|(path, lines)| FileReport {
                path: path.display().to_string(),
                lines: lines
                    .iter()
                    .map(|line| LineReport {
                        timestamp: format_iso_millis(line.timestamp),
                        text: &line.raw_text,
                    })
                    .collect(),
            })
            .collect(),
        warnings: output
            .warnings
            .iter()
            .map(|warning| WarningReport {
                path: warning.path.display().to_string(),
                message: warning.message.clone(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&report)
}
