// ==============================================================================
// Project Layout Detection
// ==============================================================================
//
// Marker-file probes over the analyzed file's ancestor directories: the
// well-known web-framework layout (stage 4) and project bootstrap scripts
// (stage 5). Probes are rooted explicitly at the file's location; nothing
// here touches the process working directory.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use scry_eval::{Diagnostic, Session};

/// Marker for the well-known web-framework project layout.
pub const DJANGO_MARKER: &str = "manage.py";

/// Marker for a project managed by bootstrap tooling with generated scripts.
pub const BOOTSTRAP_MARKER: &str = "buildout.cfg";

/// Ancestor directories of `path`, innermost first.
pub fn traverse_parents(path: &Path) -> impl Iterator<Item = &Path> {
    std::iter::successors(path.parent(), |p| p.parent())
}

/// Nearest ancestor directory containing `marker` as a regular file.
pub fn parent_with_file(path: &Path, marker: &str) -> Option<PathBuf> {
    traverse_parents(path)
        .find(|parent| parent.join(marker).is_file())
        .map(Path::to_path_buf)
}

/// Stage 4: every ancestor that looks like a framework project root is a
/// search-path entry (apps import relative to it).
pub fn framework_paths(file_path: &Path) -> Vec<PathBuf> {
    traverse_parents(file_path)
        .filter(|parent| parent.join(DJANGO_MARKER).is_file())
        .inspect(|parent| log::debug!("found django path: {}", parent.display()))
        .map(Path::to_path_buf)
        .collect()
}

/// Stage 5 candidates: files in the project's `bin/` directory whose first
/// line is an interpreter shebang for the analyzed language. Enumeration is
/// sorted so the resolved path is reproducible.
pub fn bootstrap_script_candidates(file_path: &Path, session: &mut Session) -> Vec<PathBuf> {
    let Some(project_root) = parent_with_file(file_path, BOOTSTRAP_MARKER) else {
        return Vec::new();
    };
    let bin_dir = project_root.join("bin");
    let Ok(entries) = fs::read_dir(&bin_dir) else {
        return Vec::new();
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();

    let mut scripts = Vec::new();
    for path in candidates {
        match first_line(&path) {
            Ok(Some(line)) if line.starts_with("#!") && line.contains("python") => {
                scripts.push(path);
            }
            Ok(_) => {}
            // Binary file, permission error, or the file vanished.
            Err(_) => session.report(Diagnostic::UnreadableFile { path }),
        }
    }
    scripts
}

fn first_line(path: &Path) -> std::io::Result<Option<String>> {
    let file = fs::File::open(path)?;
    let mut line = String::new();
    // Fails with InvalidData on non-UTF-8 contents, which is how binaries in
    // bin/ get filtered out.
    BufReader::new(file).read_line(&mut line)?;
    Ok((!line.is_empty()).then_some(line))
}
