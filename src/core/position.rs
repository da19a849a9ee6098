use std::collections::HashMap;

use crate::core::diff::{ChangeKind, FileDiff};

/// Maps a new-file line number to its 1-based position within the file's diff
/// body. The review API addresses inline comments by this position, counted
/// over every line of every hunk of the file, not by file line number.
pub type LinePositionMap = HashMap<usize, usize>;

/// Builds the position map for one file.
///
/// Every change advances the position counter, whatever its kind; removed
/// lines occupy a position too even though they have no new-file line number.
/// When overlapping chunks repeat a context line, the first occurrence wins.
pub fn build_position_map(file: &FileDiff) -> LinePositionMap {
    let mut map = LinePositionMap::new();
    let mut position = 0usize;

    for chunk in &file.chunks {
        for change in &chunk.changes {
            position += 1;
            if matches!(change.kind, ChangeKind::Added | ChangeKind::Context) {
                if let Some(new_line) = change.new_line {
                    map.entry(new_line).or_insert(position);
                }
            }
        }
    }

    map
}
