//! Idempotent text edits.
//!
//! The string functions return `Some(new_content)` only when something has to
//! change, so applying an edit twice never alters the file a second time.
//! [`FileEditor`] applies them to files on disk, through `sudo tee` when the
//! file belongs to root and we do not.

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use crate::host::Host;

fn split_lines(content: &str) -> Vec<String> {
    content.lines().map(|s| s.to_string()).collect()
}

fn join_lines(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn strip_comment(line: &str) -> &str {
    line.trim_start().trim_start_matches('#').trim()
}

fn is_active(line: &str) -> bool {
    !line.trim_start().starts_with('#')
}

/// Append `line` unless an active line already contains `marker`.
pub fn ensure_line_present(content: &str, marker: &str, line: &str) -> Option<String> {
    if content.lines().any(|l| is_active(l) && l.contains(marker)) {
        return None;
    }
    let mut lines = split_lines(content);
    lines.push(line.to_string());
    Some(join_lines(&lines))
}

/// Prepend `line` unless an active line already contains `marker`.
pub fn ensure_line_prepended(content: &str, marker: &str, line: &str) -> Option<String> {
    if content.lines().any(|l| is_active(l) && l.contains(marker)) {
        return None;
    }
    let mut lines = vec![line.to_string()];
    lines.extend(split_lines(content));
    Some(join_lines(&lines))
}

/// Make `line` the only active line starting with `key`.
///
/// A differing assignment is rewritten where it stands and later duplicates
/// are dropped. With `before`, the result sits above the first active line
/// containing that text (for example the line sourcing oh-my-zsh, after which
/// the assignment would have no effect).
pub fn ensure_assignment(
    content: &str,
    key: &str,
    line: &str,
    before: Option<&str>,
) -> Option<String> {
    let assigns = |l: &str| is_active(l) && l.trim_start().starts_with(key);
    let anchor_in = |lines: &[String]| {
        before.and_then(|text| {
            lines
                .iter()
                .position(|l| is_active(l) && !assigns(l.as_str()) && l.contains(text))
        })
    };

    let lines = split_lines(content);
    let keyed: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| assigns(l.as_str()))
        .map(|(i, _)| i)
        .collect();
    let anchor = anchor_in(&lines);
    if keyed.len() == 1
        && lines[keyed[0]].trim() == line.trim()
        && anchor.is_none_or(|a| keyed[0] < a)
    {
        return None;
    }

    let mut slot = None;
    let mut rest = Vec::with_capacity(lines.len() + 1);
    for (i, l) in lines.into_iter().enumerate() {
        if keyed.first() == Some(&i) {
            slot = Some(rest.len());
        }
        if !assigns(l.as_str()) {
            rest.push(l);
        }
    }
    let at = match (slot, anchor_in(&rest)) {
        (Some(s), Some(a)) => s.min(a),
        (Some(s), None) => s,
        (None, Some(a)) => a,
        (None, None) => rest.len(),
    };
    rest.insert(at, line.to_string());
    Some(join_lines(&rest))
}

/// Whether `pattern` appears as an active (uncommented) line.
pub fn is_uncommented(content: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    content.lines().any(|l| l.trim() == pattern)
}

/// Uncomment the first commented line equal to `pattern`. If the pattern is
/// neither active nor commented out, it is appended.
pub fn ensure_uncommented(content: &str, pattern: &str) -> Option<String> {
    if is_uncommented(content, pattern) {
        return None;
    }
    let pattern = pattern.trim();
    let mut lines = split_lines(content);
    match lines
        .iter()
        .position(|l| l.trim_start().starts_with('#') && strip_comment(l) == pattern)
    {
        Some(idx) => lines[idx] = pattern.to_string(),
        None => lines.push(pattern.to_string()),
    }
    Some(join_lines(&lines))
}

fn section_name(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

fn key_value(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Read `key` from `[section]` of an INI-style file such as wsl.conf.
pub fn ini_value(content: &str, section: &str, key: &str) -> Option<String> {
    let mut current: Option<&str> = None;
    for line in content.lines() {
        if let Some(name) = section_name(line) {
            current = Some(name);
            continue;
        }
        if current == Some(section)
            && let Some((k, v)) = key_value(line)
            && k == key
        {
            return Some(v.to_string());
        }
    }
    None
}

/// Set `key=value` inside `[section]`, replacing an existing value and
/// creating the section at the end of the file if needed.
pub fn ensure_ini_value(content: &str, section: &str, key: &str, value: &str) -> Option<String> {
    if ini_value(content, section, key).as_deref() == Some(value) {
        return None;
    }

    let entry = format!("{}={}", key, value);
    let mut lines = split_lines(content);
    let mut in_section = false;
    let mut section_end: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(name) = section_name(line) {
            in_section = name == section;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((k, _)) = key_value(line)
            && k == key
        {
            lines[i] = entry;
            return Some(join_lines(&lines));
        }
        if !line.trim().is_empty() {
            section_end = Some(i);
        }
    }

    if let Some(end) = section_end {
        lines.insert(end + 1, entry);
    } else if let Some(header) = lines
        .iter()
        .position(|l| section_name(l) == Some(section))
    {
        lines.insert(header + 1, entry);
    } else {
        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(format!("[{}]", section));
        lines.push(entry);
    }
    Some(join_lines(&lines))
}

/// How files outside the current user's reach get written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    /// We are root (phase 1) or the file is ours
    Direct,
    /// Pipe the new content through `sudo tee`
    Sudo,
}

pub struct FileEditor<'a> {
    host: &'a dyn Host,
}

impl<'a> FileEditor<'a> {
    pub fn new(host: &'a dyn Host) -> Self {
        Self { host }
    }

    pub fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }

    /// Like [`read`](Self::read), but a missing file reads as empty.
    pub fn read_or_empty(&self, path: &Path) -> Result<String> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn write(&self, path: &Path, content: &str, elevation: Elevation) -> Result<()> {
        if self.host.dry_run() {
            println!("[DRY RUN] write {} ({} bytes)", path.display(), content.len());
            return Ok(());
        }
        match elevation {
            Elevation::Direct => {
                fs::write(path, content).with_context(|| format!("writing {}", path.display()))
            }
            Elevation::Sudo => {
                let mut cmd = Command::new("sudo");
                cmd.arg("tee").arg(path);
                self.host
                    .run_with_input(&mut cmd, content)
                    .with_context(|| format!("writing {} through sudo", path.display()))
            }
        }
    }

    /// Apply `edit` to the file and write it back if it changed. Returns
    /// whether the file was modified.
    fn apply(
        &self,
        path: &Path,
        content: String,
        elevation: Elevation,
        edit: impl FnOnce(&str) -> Option<String>,
    ) -> Result<bool> {
        match edit(&content) {
            Some(updated) => {
                self.write(path, &updated, elevation)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run one of the string edits above against a file that may not exist yet.
    pub fn update(
        &self,
        path: &Path,
        elevation: Elevation,
        edit: impl FnOnce(&str) -> Option<String>,
    ) -> Result<bool> {
        let content = self.read_or_empty(path)?;
        self.apply(path, content, elevation, edit)
    }

    pub fn ensure_assignment(
        &self,
        path: &Path,
        key: &str,
        line: &str,
        elevation: Elevation,
    ) -> Result<bool> {
        self.update(path, elevation, |c| ensure_assignment(c, key, line, None))
    }

    /// The file must exist; uncommenting inside a file we had to create
    /// would hide a broken system.
    pub fn ensure_uncommented(
        &self,
        path: &Path,
        pattern: &str,
        elevation: Elevation,
    ) -> Result<bool> {
        let content = self.read(path)?;
        self.apply(path, content, elevation, |c| ensure_uncommented(c, pattern))
    }

    pub fn ensure_ini_value(
        &self,
        path: &Path,
        section: &str,
        key: &str,
        value: &str,
        elevation: Elevation,
    ) -> Result<bool> {
        self.update(path, elevation, |c| {
            ensure_ini_value(c, section, key, value)
        })
    }
}
