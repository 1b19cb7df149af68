use crate::domain::{
    BYTES_PER_MB, ContentMatcher, ContextError, ContextLines, DEFAULT_CONTEXT_LINES, DateRange,
    EvictionPlan, FileWarning, MatcherError, WindowError, build_time_window, parse_basic_date,
};
use crate::infra::{
    CleanError, CleanOutcome, CleanPrompt, ConfigError, DEFAULT_MAX_MB, DeletionSummary,
    RecoverableDelete, ResolveTrashDirError, ScanError, clean_log_dir,
    find_logs_by_date_range, find_logs_by_threshold, resolve_log_dir, resolve_trash_dir,
    search_content, search_time_window,
};
use crate::ui::{
    RenderTarget, format_bytes, format_display_minute, format_plan, should_color_stderr,
    should_color_stdout, time_results_json, write_content_results, write_line,
    write_time_results, write_warnings,
};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

const DEFAULT_RANGE_HOURS: u32 = 1;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Command(CliCommand),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OutputOptions {
    pub screen: bool,
    pub output: Option<PathBuf>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Time {
        dir: Option<String>,
        year: Option<i32>,
        month: Option<u8>,
        day: Option<u8>,
        hour: String,
        range_hours: u32,
        json: bool,
        output: OutputOptions,
    },
    Clean {
        dir: Option<String>,
        max_mb: i64,
    },
    Search {
        dir: Option<String>,
        pattern: String,
        is_regex: bool,
        ignore_case: bool,
        start: Option<String>,
        end: Option<String>,
        ahead: Option<usize>,
        behind: Option<usize>,
        surround: Option<usize>,
        output: OutputOptions,
    },
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("missing subcommand (expected time, clean, or string)")]
    MissingSubcommand,

    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("missing required flag: {0}")]
    MissingRequiredFlag(&'static str),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("--json cannot be combined with --screen or --output")]
    ConflictingOutput,
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("could not get session logs directory: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid time value: {0}")]
    Window(#[from] WindowError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error("could not locate trash directory: {0}")]
    Trash(#[from] ResolveTrashDirError),

    #[error("failed to encode results: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write results file {path}: {source}")]
    ResultsFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cleanup incomplete: {failed} of {planned} planned files were not moved to trash")]
    IncompleteCleanup { failed: usize, planned: usize },

    #[error(transparent)]
    WriteOutput(#[from] io::Error),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut iter = args.iter().skip(1);
    let Some(subcommand) = iter.next() else {
        return Err(CliParseError::MissingSubcommand);
    };

    match subcommand.as_str() {
        "time" => parse_time_command(iter),
        "clean" => parse_clean_command(iter),
        "string" => parse_search_command(iter),
        _ if subcommand.starts_with('-') => Err(CliParseError::UnknownFlag(subcommand.to_string())),
        _ => Err(CliParseError::UnknownSubcommand(subcommand.to_string())),
    }
}

fn parse_time_command<'a>(
    mut args: impl Iterator<Item = &'a String>,
) -> Result<CliInvocation, CliParseError> {
    let mut dir: Option<String> = None;
    let mut year: Option<i32> = None;
    let mut month: Option<u8> = None;
    let mut day: Option<u8> = None;
    let mut hour: Option<String> = None;
    let mut range_hours = DEFAULT_RANGE_HOURS;
    let mut json = false;
    let mut output = OutputOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dir" => dir = Some(next_value(&mut args, "--dir")?.to_string()),
            "--year" | "-y" => year = Some(parse_flag("--year", next_value(&mut args, "--year")?)?),
            "--month" | "-m" => {
                month = Some(parse_flag("--month", next_value(&mut args, "--month")?)?);
            }
            "--day" | "-d" => day = Some(parse_flag("--day", next_value(&mut args, "--day")?)?),
            "--hour" | "-t" => hour = Some(next_value(&mut args, "--hour")?.to_string()),
            "--range" | "-r" => {
                range_hours = parse_flag("--range", next_value(&mut args, "--range")?)?;
            }
            "--screen" | "-l" => output.screen = true,
            "--output" | "-o" => {
                output.output = Some(PathBuf::from(next_value(&mut args, "--output")?));
            }
            "--json" => json = true,
            _ if arg.starts_with('-') => return Err(CliParseError::UnknownFlag(arg.to_string())),
            _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
        }
    }

    let Some(hour) = hour else {
        return Err(CliParseError::MissingRequiredFlag("--hour"));
    };
    if json && (output.screen || output.output.is_some()) {
        return Err(CliParseError::ConflictingOutput);
    }

    Ok(CliInvocation::Command(CliCommand::Time {
        dir,
        year,
        month,
        day,
        hour,
        range_hours,
        json,
        output,
    }))
}

fn parse_clean_command<'a>(
    mut args: impl Iterator<Item = &'a String>,
) -> Result<CliInvocation, CliParseError> {
    let mut dir: Option<String> = None;
    let mut max_mb = DEFAULT_MAX_MB;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dir" => dir = Some(next_value(&mut args, "--dir")?.to_string()),
            "--max-mb" => max_mb = parse_flag("--max-mb", next_value(&mut args, "--max-mb")?)?,
            _ if arg.starts_with('-') => return Err(CliParseError::UnknownFlag(arg.to_string())),
            _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
        }
    }

    Ok(CliInvocation::Command(CliCommand::Clean { dir, max_mb }))
}

fn parse_search_command<'a>(
    mut args: impl Iterator<Item = &'a String>,
) -> Result<CliInvocation, CliParseError> {
    let mut dir: Option<String> = None;
    let mut pattern: Option<String> = None;
    let mut is_regex = false;
    let mut ignore_case = false;
    let mut start: Option<String> = None;
    let mut end: Option<String> = None;
    let mut ahead: Option<usize> = None;
    let mut behind: Option<usize> = None;
    let mut surround: Option<usize> = None;
    let mut output = OutputOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dir" => dir = Some(next_value(&mut args, "--dir")?.to_string()),
            "--string" | "-s" => pattern = Some(next_value(&mut args, "--string")?.to_string()),
            "--is-regex" | "-r" => is_regex = true,
            "--ignore-case" | "-i" => ignore_case = true,
            "--start" => start = Some(next_value(&mut args, "--start")?.to_string()),
            "--end" => end = Some(next_value(&mut args, "--end")?.to_string()),
            "--ahead" | "-a" => {
                ahead = Some(parse_flag("--ahead", next_value(&mut args, "--ahead")?)?);
            }
            "--behind" | "-b" => {
                behind = Some(parse_flag("--behind", next_value(&mut args, "--behind")?)?);
            }
            "--surround" => {
                surround = Some(parse_flag("--surround", next_value(&mut args, "--surround")?)?);
            }
            "--screen" | "-l" => output.screen = true,
            "--output" | "-o" => {
                output.output = Some(PathBuf::from(next_value(&mut args, "--output")?));
            }
            _ if arg.starts_with('-') => return Err(CliParseError::UnknownFlag(arg.to_string())),
            _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
        }
    }

    let Some(pattern) = pattern else {
        return Err(CliParseError::MissingRequiredFlag("--string"));
    };

    Ok(CliInvocation::Command(CliCommand::Search {
        dir,
        pattern,
        is_regex,
        ignore_case,
        start,
        end,
        ahead,
        behind,
        surround,
        output,
    }))
}

fn next_value<'a>(
    args: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a String, CliParseError> {
    args.next()
        .ok_or_else(|| CliParseError::MissingFlagValue(flag.to_string()))
}

fn parse_flag<T: FromStr>(flag: &str, value: &str) -> Result<T, CliParseError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| CliParseError::InvalidFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
}

pub fn run(command: CliCommand) -> Result<(), CliRunError> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let stderr = io::stderr();
    let mut err = stderr.lock();
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let colors = Colors {
        stdout: should_color_stdout(),
        stderr: should_color_stderr(),
    };
    let result = run_command(command, &mut out, &mut err, &mut input, colors);
    match out.flush() {
        Err(error) if error.kind() != io::ErrorKind::BrokenPipe => Err(error.into()),
        _ => result,
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Colors {
    pub stdout: bool,
    pub stderr: bool,
}

pub fn run_command(
    command: CliCommand,
    out: &mut impl Write,
    err: &mut impl Write,
    input: &mut impl BufRead,
    colors: Colors,
) -> Result<(), CliRunError> {
    match command {
        CliCommand::Time {
            dir,
            year,
            month,
            day,
            hour,
            range_hours,
            json,
            output,
        } => {
            let today = OffsetDateTime::now_local()
                .unwrap_or_else(|_| OffsetDateTime::now_utc())
                .date();
            let window = build_time_window(
                year.unwrap_or(today.year()),
                month.unwrap_or(u8::from(today.month())),
                day.unwrap_or(today.day()),
                &hour,
                range_hours,
            )?;
            let log_dir = resolve_log_dir(dir.as_deref())?;

            write_line(
                err,
                &format!(
                    "Searching session logs for {} to {}...",
                    format_display_minute(window.start),
                    format_display_minute(window.end)
                ),
            )?;
            let scan = find_logs_by_threshold(&log_dir, window.start, window.end)?;
            write_line(err, &format!("Found {} matching files.", scan.files.len()))?;

            let paths: Vec<PathBuf> = scan.files.iter().map(|file| file.path.clone()).collect();
            let mut results = search_time_window(&paths, &window);
            results.warnings = [scan.warnings, results.warnings].concat();
            tracing::debug!(lines = results.match_count(), "time window search finished");

            if json {
                write_line(out, &time_results_json(&window, &results)?)?;
            } else if results.results.is_empty() {
                write_line(err, "No matching log lines found.")?;
            } else if output.screen {
                write_time_results(out, &results.results, RenderTarget::Screen {
                    color: colors.stdout,
                })?;
            } else {
                let path = write_results_file(output.output, |file| {
                    write_time_results(file, &results.results, RenderTarget::File)
                })?;
                write_line(out, &format!("Results written to {}", path.display()))?;
            }

            write_warnings(err, &results.warnings, colors.stderr)?;
            write_warning_count(err, results.warnings.len())?;
            Ok(())
        }
        CliCommand::Clean { dir, max_mb } => {
            let log_dir = resolve_log_dir(dir.as_deref())?;
            let trash = resolve_trash_dir()?;
            tracing::debug!(trash = %trash.root().display(), "resolved trash directory");
            run_clean(&log_dir, max_mb, out, err, input, &trash, colors)
        }
        CliCommand::Search {
            dir,
            pattern,
            is_regex,
            ignore_case,
            start,
            end,
            ahead,
            behind,
            surround,
            output,
        } => {
            let context = ContextLines::resolve(ahead, behind, surround)?;
            let matcher = ContentMatcher::new(&pattern, is_regex, ignore_case)?;
            let range = DateRange {
                start: start.as_deref().map(parse_basic_date).transpose()?,
                end: end.as_deref().map(parse_basic_date).transpose()?,
            };
            let log_dir = resolve_log_dir(dir.as_deref())?;

            let scan = find_logs_by_date_range(&log_dir, &range)?;
            write_line(err, &format!("Searching {} session logs...", scan.files.len()))?;
            let paths: Vec<PathBuf> = scan.files.iter().map(|file| file.path.clone()).collect();
            let mut results = search_content(&paths, &matcher, context);
            results.warnings = [scan.warnings, results.warnings].concat();

            if results.results.is_empty() {
                write_line(err, "No results found.")?;
            } else {
                write_line(
                    err,
                    &format!(
                        "Found {} matches in {} files.",
                        results.match_count(),
                        results.results.len()
                    ),
                )?;
                if output.screen {
                    write_content_results(out, &results.results, RenderTarget::Screen {
                        color: colors.stdout,
                    })?;
                } else {
                    let path = write_results_file(output.output, |file| {
                        write_content_results(file, &results.results, RenderTarget::File)
                    })?;
                    write_line(out, &format!("Results written to {}", path.display()))?;
                }
            }

            write_warnings(err, &results.warnings, colors.stderr)?;
            write_warning_count(err, results.warnings.len())?;
            Ok(())
        }
    }
}

fn write_warning_count(err: &mut impl Write, warnings: usize) -> io::Result<bool> {
    if warnings == 0 {
        return Ok(true);
    }
    write_line(err, &format!("warnings: {warnings}"))
}

fn default_results_path() -> PathBuf {
    std::env::temp_dir().join(format!("termlogs-{}.txt", Uuid::new_v4()))
}

fn write_results_file(
    path: Option<PathBuf>,
    render: impl FnOnce(&mut BufWriter<File>) -> io::Result<bool>,
) -> Result<PathBuf, CliRunError> {
    let path = path.unwrap_or_else(default_results_path);
    let to_error = |source: io::Error| CliRunError::ResultsFile {
        path: path.display().to_string(),
        source,
    };

    let file = File::create(&path).map_err(to_error)?;
    let mut writer = BufWriter::new(file);
    render(&mut writer).map_err(to_error)?;
    writer.flush().map_err(to_error)?;
    Ok(path)
}

pub fn run_clean(
    log_dir: &Path,
    max_mb: i64,
    out: &mut impl Write,
    err: &mut impl Write,
    input: &mut impl BufRead,
    trash: &impl RecoverableDelete,
    colors: Colors,
) -> Result<(), CliRunError> {
    let outcome = {
        let mut prompt = TerminalPrompt {
            input: &mut *input,
            out: &mut *err,
        };
        clean_log_dir(log_dir, max_mb, &mut prompt, trash)?
    };

    let warnings = outcome.warnings();
    write_warnings(err, warnings, colors.stderr)?;
    write_warning_count(err, warnings.len())?;

    match outcome {
        CleanOutcome::UnderBudget {
            total_bytes,
            budget_bytes,
            ..
        } => {
            write_line(
                out,
                &format!(
                    "Session log files use {} ({}), under the {} MB limit; no cleanup needed.",
                    format_bytes(total_bytes),
                    format_mb(total_bytes),
                    budget_bytes / BYTES_PER_MB
                ),
            )?;
            Ok(())
        }
        CleanOutcome::ScanDeclined { .. } | CleanOutcome::PlanDeclined { .. } => {
            write_line(out, "Cleanup cancelled.")?;
            Ok(())
        }
        CleanOutcome::Cleaned { plan, summary, .. } => {
            report_deletions(out, err, &summary)?;
            let planned = plan.files.len();
            let failed = planned.saturating_sub(summary.trashed.len());
            write_line(
                out,
                &format!(
                    "Cleanup complete: {} of {planned} files moved to trash.",
                    summary.trashed.len()
                ),
            )?;
            if !summary.is_complete() {
                return Err(CliRunError::IncompleteCleanup { failed, planned });
            }
            Ok(())
        }
    }
}

fn report_deletions(
    out: &mut impl Write,
    err: &mut impl Write,
    summary: &DeletionSummary,
) -> io::Result<()> {
    for (path, _target) in &summary.trashed {
        write_line(out, &format!("Moved to trash: {}", path.display()))?;
    }
    for (path, message) in &summary.failed {
        write_line(
            err,
            &format!("Error moving to trash: {} - {message}", path.display()),
        )?;
    }
    if summary.skipped_outside_log_dir > 0 {
        write_line(
            err,
            &format!(
                "Skipped {} files outside the session log directory.",
                summary.skipped_outside_log_dir
            ),
        )?;
    }
    Ok(())
}

fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB as f64)
}

/// y/N prompts on a terminal. Anything but `y`/`yes`, including EOF, declines.
struct TerminalPrompt<'a, R: BufRead, W: Write> {
    input: &'a mut R,
    out: &'a mut W,
}

impl<R: BufRead, W: Write> TerminalPrompt<'_, R, W> {
    fn ask(&mut self, question: &str) -> bool {
        if write!(self.out, "{question} [y/N]: ").is_err() || self.out.flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) | Err(_) => {
                let _ = writeln!(self.out);
                false
            }
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        }
    }
}

impl<R: BufRead, W: Write> CleanPrompt for TerminalPrompt<'_, R, W> {
    fn confirm_scan(
        &mut self,
        total_bytes: u64,
        budget_bytes: u64,
        skipped: &[FileWarning],
    ) -> bool {
        let _ = writeln!(
            self.out,
            "Total session log files size: {} ({})",
            format_bytes(total_bytes),
            format_mb(total_bytes)
        );
        if !skipped.is_empty() {
            let _ = writeln!(
                self.out,
                "{} unreadable entries are not counted; they are listed after cleanup.",
                skipped.len()
            );
        }
        self.ask(&format!(
            "Total size exceeds {} MB. Review and delete oldest files?",
            budget_bytes / BYTES_PER_MB
        ))
    }

    fn confirm_plan(&mut self, plan: &EvictionPlan) -> bool {
        let _ = writeln!(self.out, "\nThe following .log files will be moved to trash:");
        for line in format_plan(plan) {
            let _ = writeln!(self.out, "{line}");
        }
        let _ = writeln!(
            self.out,
            "Reclaims {}, leaving {}.",
            format_bytes(plan.reclaimed_bytes()),
            format_bytes(plan.remaining_bytes())
        );
        self.ask("\nProceed with moving these files to trash?")
    }
}

pub fn help_text(name: &str) -> String {
    format!(
        "{name} - search and prune terminal session logs\n\n\
USAGE:\n\
  {name} time -t HOUR [-y YEAR] [-m MONTH] [-d DAY] [-r HOURS] [--dir DIR] [-l | -o FILE | --json]\n\
  {name} clean [--max-mb N] [--dir DIR]\n\
  {name} string -s PATTERN [-r] [-i] [--start MMDDYYYY] [--end MMDDYYYY] [-a N] [-b N | --surround N] [--dir DIR] [-l | -o FILE]\n\
  {name} --help | --version\n\n\
TIME FLAGS:\n\
  -t, --hour HOUR     Starting hour on a 12-hour clock (2PM, 1AM, 12AM)\n\
  -y, --year YEAR     Four-digit year (default: current year)\n\
  -m, --month MONTH   Month 1-12 (default: current month)\n\
  -d, --day DAY       Day of month (default: today)\n\
  -r, --range HOURS   Hours to search past the starting hour, 1-72 (default: {DEFAULT_RANGE_HOURS})\n\
  --json              Print results as JSON\n\n\
CLEAN FLAGS:\n\
  --max-mb N          Size the .log files may use before the oldest are trashed (default: {DEFAULT_MAX_MB})\n\n\
STRING FLAGS:\n\
  -s, --string TEXT   Text or regex to search for\n\
  -r, --is-regex      Interpret TEXT as a regex\n\
  -i, --ignore-case   Match case-insensitively\n\
  --start MMDDYYYY    Only files touched on or after this day\n\
  --end MMDDYYYY      Only files touched on or before this day\n\
  -a, --ahead N       Lines to show after each match (default: {DEFAULT_CONTEXT_LINES})\n\
  -b, --behind N      Lines to show before each match (default: {DEFAULT_CONTEXT_LINES})\n\
  --surround N        Lines to show on both sides (excludes --ahead/--behind)\n\n\
OUTPUT:\n\
  -l, --screen        Print results instead of writing a results file\n\
  -o, --output FILE   Results file path (default: a new file in the temp directory)\n\n\
DIRECTORY:\n\
  --dir DIR           Session log directory (overrides the config file)\n\n\
CONFIG:\n\
  ~/.termlogs         INI file; [settings] session_logs_path = /path/to/logs\n\n\
ENV:\n\
  TERMLOGS_CONFIG     Override the config file path\n\
  TERMLOGS_TRASH_DIR  Override the trash directory used by clean\n\
  TERMLOGS_LOG        Log filter for diagnostics (default: error)\n"
    )
}
