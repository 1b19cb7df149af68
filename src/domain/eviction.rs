use crate::domain::{EvictionPlan, FileMetadata};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

pub fn total_size_bytes(files: &[FileMetadata]) -> u64 {
    files.iter().map(|file| file.size_bytes).sum()
}

pub fn sort_oldest_first(files: &mut [FileMetadata]) {
    files.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));
}

/// Picks the shortest oldest-first prefix of `files` whose removal brings
/// `total_bytes` down to `budget_bytes` or below.
///
/// `total_bytes` is the size observed before the operator confirmed the
/// cleanup; `files` is the fresh listing to choose from.
pub fn plan_eviction(
    mut files: Vec<FileMetadata>,
    total_bytes: u64,
    budget_bytes: u64,
) -> EvictionPlan {
    sort_oldest_first(&mut files);

    let mut running = total_bytes;
    let mut selected = Vec::new();
    for file in files {
        if running <= budget_bytes {
            break;
        }
        running = running.saturating_sub(file.size_bytes);
        selected.push(file);
    }

    EvictionPlan {
        files: selected,
        total_bytes,
        budget_bytes,
    }
}
