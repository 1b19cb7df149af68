use crate::domain::{ContentMatch, ContentMatcher, ContextLines, FileWarning, SearchResults};
use crate::infra::SearchOutput;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

pub fn search_content(
    files: &[PathBuf],
    matcher: &ContentMatcher,
    context: ContextLines,
) -> SearchOutput<ContentMatch> {
    let mut output = SearchOutput {
        results: SearchResults::new(),
        warnings: Vec::new(),
    };

    for path in files {
        let matches = File::open(path)
            .and_then(|file| find_matches(BufReader::new(file), matcher, context));
        match matches {
            Ok(matches) if matches.is_empty() => {}
            Ok(matches) => {
                tracing::debug!(path = %path.display(), matches = matches.len(), "content matches");
                output.results.insert(path.clone(), matches);
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

struct PendingMatch {
    found: ContentMatch,
    remaining_after: usize,
}

/// Single forward pass; at most `context.behind` earlier lines are retained.
pub fn find_matches(
    mut reader: impl BufRead,
    matcher: &ContentMatcher,
    context: ContextLines,
) -> io::Result<Vec<ContentMatch>> {
    let mut found = Vec::new();
    let mut pending: VecDeque<PendingMatch> = VecDeque::new();
    let mut behind: VecDeque<String> = VecDeque::with_capacity(context.behind);
    let mut buf = String::new();
    let mut line_number = 0u64;

    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_number += 1;
        let line = buf.trim_end_matches(['\r', '\n']).to_string();

        for open in pending.iter_mut() {
            open.found.after.push(line.clone());
            open.remaining_after -= 1;
        }
        while pending.front().is_some_and(|open| open.remaining_after == 0) {
            if let Some(done) = pending.pop_front() {
                found.push(done.found);
            }
        }

        if matcher.is_match(&line) {
            let hit = ContentMatch {
                line_number,
                line: line.clone(),
                before: behind.iter().cloned().collect(),
                after: Vec::new(),
            };
            if context.ahead == 0 {
                found.push(hit);
            } else {
                pending.push_back(PendingMatch {
                    found: hit,
                    remaining_after: context.ahead,
                });
            }
        }

        if context.behind > 0 {
            if behind.len() == context.behind {
                behind.pop_front();
            }
            behind.push_back(line);
        }
    }

    found.extend(pending.into_iter().map(|open| open.found));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn lines(count: usize) -> String {
        (1..=count).map(|n| format!("line {n}\n")).collect()
    }

    fn context(behind: usize, ahead: usize) -> ContextLines {
        ContextLines { behind, ahead }
    }

    #[test]
    fn captures_context_on_both_sides() {
        let matcher = ContentMatcher::new("line 5", false, false).expect("matcher");
        let found =
            find_matches(Cursor::new(lines(9)), &matcher, context(2, 3)).expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line_number, 5);
        assert_eq!(found[0].before, vec!["line 3", "line 4"]);
        assert_eq!(found[0].after, vec!["line 6", "line 7", "line 8"]);
    }

    #[test]
    fn context_is_clipped_at_file_edges() {
        let matcher = ContentMatcher::new(r"line [13]$", true, false).expect("matcher");
        let found =
            find_matches(Cursor::new(lines(3)), &matcher, context(5, 5)).expect("search");
        assert_eq!(found.len(), 2);
        assert!(found[0].before.is_empty());
        assert_eq!(found[0].after, vec!["line 2", "line 3"]);
        assert_eq!(found[1].before, vec!["line 1", "line 2"]);
        assert!(found[1].after.is_empty());
    }

    #[test]
    fn overlapping_matches_keep_their_own_context_in_order() {
        let matcher = ContentMatcher::new(r"line [45]$", true, false).expect("matcher");
        let found =
            find_matches(Cursor::new(lines(7)), &matcher, context(1, 2)).expect("search");
        let numbers: Vec<u64> = found.iter().map(|m| m.line_number).collect();
        assert_eq!(numbers, vec![4, 5]);
        assert_eq!(found[0].after, vec!["line 5", "line 6"]);
        assert_eq!(found[1].before, vec!["line 4"]);
        assert_eq!(found[1].after, vec!["line 6", "line 7"]);
    }

    #[test]
    fn zero_context_returns_bare_matches() {
        let matcher = ContentMatcher::new("LINE 2", false, true).expect("matcher");
        let found =
            find_matches(Cursor::new(lines(3)), &matcher, context(0, 0)).expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, "line 2");
        assert!(found[0].before.is_empty() && found[0].after.is_empty());
    }

    #[test]
    fn search_content_groups_by_file_and_skips_empty() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        fs::write(&a, "% git push\n").expect("write");
        fs::write(&b, "% ls\n").expect("write");
        let missing = dir.path().join("missing.log");

        let matcher = ContentMatcher::new("git", false, false).expect("matcher");
        let output = search_content(&[a.clone(), b.clone(), missing.clone()], &matcher, context(0, 0));
        assert_eq!(output.results.keys().collect::<Vec<_>>(), vec![&a]);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].path, missing);
    }
}
