// ==============================================================================
// Isolated Environments & Legacy Link Files
// ==============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::parent_with_file;

/// Marker file at the root of an isolated interpreter environment.
pub const ENV_MARKER: &str = "pyvenv.cfg";

const LINK_FILE_EXT: &str = "egg-link";

/// Stages 1 and 2: the base interpreter path, with the isolated environment's
/// expanded package directories shadowing it (inserted ahead, base appended
/// after) when the analyzed file lives inside one.
pub fn environment_search_path(file_path: &Path, base: &[PathBuf]) -> Vec<PathBuf> {
    let Some(site_dir) = detect_environment(file_path) else {
        return base.to_vec();
    };
    log::debug!("resolved isolated environment site dir: {}", site_dir.display());
    let mut result = expand_link_files(&[site_dir]);
    result.extend(base.iter().cloned());
    result
}

fn detect_environment(file_path: &Path) -> Option<PathBuf> {
    let env_root = parent_with_file(file_path, ENV_MARKER)?;
    site_packages_dir(&env_root)
}

/// `<env>/lib/<python*>/site-packages`, probing versioned dirs in sorted
/// order, with the flat `lib/site-packages` layout as fallback.
fn site_packages_dir(env_root: &Path) -> Option<PathBuf> {
    let lib = env_root.join("lib");
    let mut versioned: Vec<PathBuf> = fs::read_dir(&lib)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("python"))
        .map(|entry| entry.path().join("site-packages"))
        .collect();
    versioned.sort();

    if let Some(dir) = versioned.into_iter().find(|dir| dir.is_dir()) {
        return Some(dir);
    }
    let flat = lib.join("site-packages");
    flat.is_dir().then_some(flat)
}

/// Expand legacy link files: each link file's target directory is inserted
/// immediately before the directory the link was found in. Dev installs
/// referenced this way are invisible to the normal import mechanism, which
/// is exactly why the resolver has to surface them.
pub fn expand_link_files(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut result = Vec::new();
    for dir in dirs {
        for link in sorted_link_files(dir) {
            if let Some(target) = link_file_target(&link) {
                result.push(target);
            }
        }
        result.push(dir.clone());
    }
    result
}

fn sorted_link_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut links: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.to_string_lossy() == LINK_FILE_EXT)
        })
        .collect();
    // Directory enumeration order is filesystem-dependent; sort for a
    // reproducible search path.
    links.sort();
    links
}

/// Only the first non-blank line of a link file is interpreted; relative
/// targets are joined onto the link file's own directory.
fn link_file_target(link: &Path) -> Option<PathBuf> {
    let contents = fs::read_to_string(link).ok()?;
    let line = contents.lines().map(str::trim).find(|line| !line.is_empty())?;
    Some(link.parent()?.join(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, "").unwrap();
    }

    #[test]
    fn link_targets_precede_their_directory_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().to_path_buf();
        fs::write(site.join("zeta.egg-link"), "/pkgs/zeta\n").unwrap();
        fs::write(site.join("alpha.egg-link"), "\n/pkgs/alpha\nsecond line ignored\n").unwrap();
        touch(&site.join("unrelated.txt"));

        let expanded = expand_link_files(&[site.clone()]);
        assert_eq!(
            expanded,
            vec![
                PathBuf::from("/pkgs/alpha"),
                PathBuf::from("/pkgs/zeta"),
                site,
            ]
        );
    }

    #[test]
    fn relative_link_target_joined_onto_link_dir() {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().to_path_buf();
        fs::write(site.join("dev.egg-link"), "../src/dev-pkg\n").unwrap();

        let expanded = expand_link_files(&[site.clone()]);
        assert_eq!(expanded, vec![site.join("../src/dev-pkg"), site]);
    }

    #[test]
    fn blank_or_unreadable_link_files_contribute_nothing() {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().to_path_buf();
        fs::write(site.join("empty.egg-link"), "\n  \n").unwrap();
        // A directory with the link extension is unreadable as a file.
        fs::create_dir(site.join("weird.egg-link")).unwrap();

        let expanded = expand_link_files(&[site.clone()]);
        assert_eq!(expanded, vec![site]);
    }

    #[test]
    fn versioned_site_dir_found_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path();
        touch(&env.join(ENV_MARKER));
        fs::create_dir_all(env.join("lib/python3.11/site-packages")).unwrap();
        fs::create_dir_all(env.join("lib/python3.9/site-packages")).unwrap();

        let site = site_packages_dir(env).unwrap();
        // "python3.11" sorts before "python3.9" lexicographically.
        assert_eq!(site, env.join("lib/python3.11/site-packages"));
    }

    #[test]
    fn flat_site_dir_is_the_fallback() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path();
        fs::create_dir_all(env.join("lib/site-packages")).unwrap();

        assert_eq!(site_packages_dir(env).unwrap(), env.join("lib/site-packages"));
    }

    #[test]
    fn no_environment_means_base_path_unchanged() {
        let tmp = TempDir::new().unwrap();
        let base = vec![PathBuf::from("/usr/lib/py")];
        let file = tmp.path().join("app.py");

        assert_eq!(environment_search_path(&file, &base), base);
    }
}
