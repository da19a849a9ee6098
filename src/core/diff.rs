use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One file's worth of a unified diff, as served by the GitHub API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    /// Target ("new side") path of the file.
    pub path: String,
    pub chunks: Vec<DiffChunk>,
    pub is_deleted: bool,
    pub is_binary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffChunk {
    /// Raw `@@` hunk header, kept verbatim for prompt rendering.
    pub header: String,
    pub changes: Vec<DiffChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffChange {
    pub kind: ChangeKind,
    /// Defined for Removed and Context changes.
    pub old_line: Option<usize>,
    /// Defined for Added and Context changes.
    pub new_line: Option<usize>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Context,
}

/// Parses the raw diff text returned by `GET .../pulls/{n}` with the
/// `application/vnd.github.diff` media type.
pub fn parse_diff(diff_text: &str) -> Result<Vec<FileDiff>> {
    let lines: Vec<&str> = diff_text.lines().collect();
    let mut files = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("diff --git")
            || (lines[i].starts_with("--- ")
                && i + 1 < lines.len()
                && lines[i + 1].starts_with("+++ "))
        {
            files.push(parse_file(&lines, &mut i)?);
        } else {
            i += 1;
        }
    }

    Ok(files)
}

fn parse_file(lines: &[&str], i: &mut usize) -> Result<FileDiff> {
    let mut path = if lines[*i].starts_with("diff --git") {
        let p = path_from_git_header(lines[*i])?;
        *i += 1;
        p
    } else {
        String::new()
    };
    let mut is_deleted = false;
    let mut is_binary = false;
    let mut chunks = Vec::new();

    while *i < lines.len() {
        let line = lines[*i];
        if line.starts_with("diff --git") {
            break;
        }
        if line.starts_with("@@") {
            chunks.push(parse_chunk(lines, i)?);
            continue;
        }
        if line.starts_with("deleted file mode") {
            is_deleted = true;
        } else if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
            is_binary = true;
        } else if let Some(target) = line.strip_prefix("+++ ") {
            let target = target.split('\t').next().unwrap_or(target).trim();
            if target == "/dev/null" {
                is_deleted = true;
            } else {
                path = target.trim_start_matches("b/").to_string();
            }
        } else if line.starts_with("--- ") && !chunks.is_empty() {
            // Header of the next file in a git-header-less diff.
            break;
        }
        *i += 1;
    }

    Ok(FileDiff {
        path,
        chunks,
        is_deleted,
        is_binary,
    })
}

fn path_from_git_header(line: &str) -> Result<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() >= 4 {
        Ok(parts[3].trim_start_matches("b/").to_string())
    } else {
        anyhow::bail!("invalid diff header: {}", line)
    }
}

fn parse_chunk(lines: &[&str], i: &mut usize) -> Result<DiffChunk> {
    let header = lines[*i];
    let (old_start, new_start) = parse_chunk_header(header)?;
    *i += 1;

    let mut changes = Vec::new();
    let mut old_line = old_start;
    let mut new_line = new_start;

    while *i < lines.len() {
        let line = lines[*i];
        if line.starts_with("@@")
            || line.starts_with("diff --git")
            || line.starts_with("--- ")
            || line.starts_with("+++ ")
        {
            break;
        }
        if line.starts_with('\\') {
            // "\ No newline at end of file"
            *i += 1;
            continue;
        }

        let change = match line.chars().next() {
            Some('+') => {
                let n = new_line;
                new_line += 1;
                DiffChange {
                    kind: ChangeKind::Added,
                    old_line: None,
                    new_line: Some(n),
                    content: line[1..].to_string(),
                }
            }
            Some('-') => {
                let n = old_line;
                old_line += 1;
                DiffChange {
                    kind: ChangeKind::Removed,
                    old_line: Some(n),
                    new_line: None,
                    content: line[1..].to_string(),
                }
            }
            _ => {
                let content = line.strip_prefix(' ').unwrap_or(line);
                let (o, n) = (old_line, new_line);
                old_line += 1;
                new_line += 1;
                DiffChange {
                    kind: ChangeKind::Context,
                    old_line: Some(o),
                    new_line: Some(n),
                    content: content.to_string(),
                }
            }
        };
        changes.push(change);
        *i += 1;
    }

    Ok(DiffChunk {
        header: header.to_string(),
        changes,
    })
}

fn parse_chunk_header(header: &str) -> Result<(usize, usize)> {
    let re = regex::Regex::new(r"@@ -(\d+)(?:,\d+)? \+(\d+)(?:,\d+)? @@")?;
    let caps = re
        .captures(header)
        .ok_or_else(|| anyhow::anyhow!("invalid hunk header: {}", header))?;
    let old_start = caps.get(1).unwrap().as_str().parse()?;
    let new_start = caps.get(2).unwrap().as_str().parse()?;
    Ok((old_start, new_start))
}
