use crate::domain::{FileWarning, ParsedLogLine, SearchResults, TimeWindow, parse_log_line};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default)]
pub struct SearchOutput<T> {
    pub results: SearchResults<T>,
    pub warnings: Vec<FileWarning>,
}

impl<T> SearchOutput<T> {
    pub fn match_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }
}

/// Streams each file in order and keeps the lines whose timestamp falls in `window`.
pub fn search_time_window(files: &[PathBuf], window: &TimeWindow) -> SearchOutput<ParsedLogLine> {
    let mut output = SearchOutput {
        results: SearchResults::new(),
        warnings: Vec::new(),
    };

    for path in files {
        match scan_log_file(path, window) {
            Ok(lines) if lines.is_empty() => {
                tracing::debug!(path = %path.display(), "no lines in window");
            }
            Ok(lines) => {
                tracing::debug!(path = %path.display(), matches = lines.len(), "lines in window");
                output.results.insert(path.clone(), lines);
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "skipping unreadable log file");
                output.warnings.push(FileWarning {
                    path: path.clone(),
                    message: error.to_string(),
                });
            }
        }
    }

    output
}

pub fn scan_log_file(path: &Path, window: &TimeWindow) -> io::Result<Vec<ParsedLogLine>> {
    let file = File::open(path)?;
    filter_lines_in_window(BufReader::new(file), window)
}

pub fn filter_lines_in_window(
    mut reader: impl BufRead,
    window: &TimeWindow,
) -> io::Result<Vec<ParsedLogLine>> {
    let mut kept = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let Some(parsed) = parse_log_line(&line) else {
            continue;
        };
        if window.contains(parsed.timestamp) {
            kept.push(parsed);
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;
    use time::macros::datetime;

    fn one_pm_window() -> TimeWindow {
        TimeWindow {
            start: datetime!(2025-01-01 13:00),
            end: datetime!(2025-01-01 14:00),
        }
    }

    #[test]
    fn keeps_only_lines_in_window() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("a.log");
        fs::write(
            &path,
            "[01/01/2025, 1:00:00.000 PM] hello\n[01/01/2025, 3:00:00.000 PM] world\n",
        )
        .expect("write");

        let output = search_time_window(&[path.clone()], &one_pm_window());
        let lines: Vec<&str> = output.results[&path]
            .iter()
            .map(|line| line.raw_text.as_str())
            .collect();
        assert_eq!(lines, vec!["[01/01/2025, 1:00:00.000 PM] hello"]);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn window_end_is_exclusive() {
        let input = "[01/01/2025, 1:00:00.000 PM] start\n\
                     [01/01/2025, 1:59:59.999 PM] last\n\
                     [01/01/2025, 2:00:00.000 PM] end\n";
        let kept = filter_lines_in_window(Cursor::new(input), &one_pm_window()).expect("filter");
        let texts: Vec<&str> = kept.iter().map(|line| line.raw_text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "[01/01/2025, 1:00:00.000 PM] start",
                "[01/01/2025, 1:59:59.999 PM] last"
            ]
        );
    }

    #[test]
    fn malformed_lines_never_appear() {
        let input = "garbage\n\
                     [1/1/2025, 1:30:00.000 PM] short date\n\
                     [01/01/2025, 1:30:00.000 QM] bad meridiem\n\
                     \n\
                     [01/01/2025, 1:30:00.000 PM] ok\n";
        let kept = filter_lines_in_window(Cursor::new(input), &one_pm_window()).expect("filter");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].raw_text, "[01/01/2025, 1:30:00.000 PM] ok");
    }

    #[test]
    fn files_without_matches_are_omitted_and_order_is_by_path() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        let c = dir.path().join("c.log");
        fs::write(&a, "[01/01/2025, 1:10:00.000 PM] a\n").expect("write");
        fs::write(&b, "[01/01/2025, 9:10:00.000 AM] b\n").expect("write");
        fs::write(&c, "[01/01/2025, 1:20:00.000 PM] c\n").expect("write");

        let output = search_time_window(&[a.clone(), b.clone(), c.clone()], &one_pm_window());
        let keys: Vec<&PathBuf> = output.results.keys().collect();
        assert_eq!(keys, vec![&a, &c]);
        assert!(!output.results.contains_key(&b));
        assert_eq!(output.match_count(), 2);
    }

    #[test]
    fn unreadable_files_become_warnings() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("gone.log");
        let ok = dir.path().join("ok.log");
        fs::write(&ok, "[01/01/2025, 1:10:00.000 PM] ok\n").expect("write");
        let binary = dir.path().join("binary.log");
        fs::write(&binary, [0xff, 0xfe, b'\n']).expect("write");

        let output = search_time_window(&[binary.clone(), missing.clone(), ok.clone()], &one_pm_window());
        assert_eq!(output.results.len(), 1);
        assert!(output.results.contains_key(&ok));
        let warned: Vec<&PathBuf> = output.warnings.iter().map(|w| &w.path).collect();
        assert_eq!(warned, vec![&binary, &missing]);
    }
}
