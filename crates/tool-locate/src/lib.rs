//! # tool-locate
//!
//! Find the external programs the docforge pipelines drive: a Chromium-family
//! browser for headless rendering, and the marp CLI (directly or through
//! `npx`) for slide decks.
//!
//! ## Resolution order
//!
//! Chrome:
//! 1. `CHROME_PATH`: explicit executable; used when the file exists.
//! 2. Known executable names on `PATH`.
//! 3. Well-known install locations (macOS app bundles, Windows Program Files).
//!
//! marp:
//! 1. `MARP_CLI_PATH`: explicit executable; used when the file exists.
//! 2. `marp` on `PATH`.
//! 3. `npx` on `PATH`, but only if `npx @marp-team/marp-cli --version`
//!    succeeds within the probe timeout.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tool_locate::{locate_chrome, locate_marp};
//!
//! let chrome = locate_chrome().expect("no browser");
//! let marp = locate_marp(Duration::from_secs(10)).expect("no marp");
//! println!("{} {:?}", chrome.display(), marp.prefix_args());
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Env var holding an explicit browser executable.
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

/// Env var holding an explicit marp executable.
pub const MARP_PATH_ENV: &str = "MARP_CLI_PATH";

/// npm package name of the marp CLI, used with `npx`.
pub const MARP_NPX_PACKAGE: &str = "@marp-team/marp-cli";

/// Executable names tried on `PATH`, most specific first.
const CHROME_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "msedge",
];

/// Install instructions printed when marp cannot be found.
pub const MARP_INSTALL_HINT: &str = "Install the Marp CLI with one of:\n\
  • npm install -g @marp-team/marp-cli\n\
  • npx @marp-team/marp-cli --version   (no global install)\n\
  • brew install marp-cli               (macOS)";

/// Install instructions printed when no browser can be found.
pub const CHROME_INSTALL_HINT: &str = "Install Google Chrome or Chromium, or point \
CHROME_PATH at an existing Chromium-based browser executable.";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tool-locate operations.
#[derive(Error, Debug)]
pub enum ToolLocateError {
    /// No candidate for the tool exists on this machine.
    #[error("{tool} not found.\n{hint}")]
    NotFound { tool: &'static str, hint: &'static str },

    /// An env-var override points at a file that does not exist.
    #[error("{var} is set to '{path}' but that file does not exist")]
    OverrideMissing { var: &'static str, path: PathBuf },
}

// ── marp runner ──────────────────────────────────────────────────────────────

/// How to invoke the marp CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarpRunner {
    /// A `marp` executable.
    Direct(PathBuf),
    /// `npx @marp-team/marp-cli`.
    Npx(PathBuf),
}

impl MarpRunner {
    /// The executable to spawn.
    pub fn program(&self) -> &Path {
        match self {
            MarpRunner::Direct(p) | MarpRunner::Npx(p) => p,
        }
    }

    /// Arguments that must precede the marp arguments.
    pub fn prefix_args(&self) -> Vec<OsString> {
        match self {
            MarpRunner::Direct(_) => Vec::new(),
            MarpRunner::Npx(_) => vec![OsString::from(MARP_NPX_PACKAGE)],
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            MarpRunner::Direct(_) => "marp",
            MarpRunner::Npx(_) => "npx",
        }
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Searches the directories of `PATH` for an executable called `name`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    find_in_dirs(name, std::env::split_paths(&path))
}

/// Searches `dirs` in order for an executable called `name`.
///
/// On Windows the `.exe` and `.cmd` suffixes are also tried.
pub fn find_in_dirs<I>(name: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    for dir in dirs {
        for candidate in candidate_names(name) {
            let p = dir.join(&candidate);
            if is_executable(&p) {
                return Some(p);
            }
        }
    }
    None
}

/// Locates a Chromium-family browser executable.
pub fn locate_chrome() -> Result<PathBuf, ToolLocateError> {
    if let Some(p) = env_override(CHROME_PATH_ENV)? {
        return Ok(p);
    }

    for name in CHROME_NAMES {
        if let Some(p) = find_on_path(name) {
            return Ok(p);
        }
    }

    well_known_chrome_locations()
        .into_iter()
        .find(|p| p.is_file())
        .ok_or(ToolLocateError::NotFound {
            tool: "Chrome/Chromium",
            hint: CHROME_INSTALL_HINT,
        })
}

/// Locates the marp CLI.
///
/// The `npx` fallback runs `npx @marp-team/marp-cli --version` and waits at
/// most `probe_timeout` for it; this call therefore blocks.
pub fn locate_marp(probe_timeout: Duration) -> Result<MarpRunner, ToolLocateError> {
    if let Some(p) = env_override(MARP_PATH_ENV)? {
        return Ok(MarpRunner::Direct(p));
    }

    if let Some(p) = find_on_path("marp") {
        return Ok(MarpRunner::Direct(p));
    }

    if let Some(npx) = find_on_path("npx") {
        if probe_succeeds(&npx, &[MARP_NPX_PACKAGE, "--version"], probe_timeout) {
            return Ok(MarpRunner::Npx(npx));
        }
    }

    Err(ToolLocateError::NotFound {
        tool: "Marp CLI",
        hint: MARP_INSTALL_HINT,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn env_override(var: &'static str) -> Result<Option<PathBuf>, ToolLocateError> {
    match std::env::var_os(var) {
        Some(v) if !v.is_empty() => {
            let p = PathBuf::from(v);
            if p.is_file() {
                Ok(Some(p))
            } else {
                Err(ToolLocateError::OverrideMissing { var, path: p })
            }
        }
        _ => Ok(None),
    }
}

fn candidate_names(name: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![format!("{name}.exe"), format!("{name}.cmd"), name.to_string()]
    } else {
        vec![name.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    p.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(p: &Path) -> bool {
    p.is_file()
}

fn well_known_chrome_locations() -> Vec<PathBuf> {
    let mut out = Vec::new();
    match std::env::consts::OS {
        "macos" => {
            let bundles = [
                "Google Chrome.app/Contents/MacOS/Google Chrome",
                "Chromium.app/Contents/MacOS/Chromium",
                "Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            ];
            for b in bundles {
                out.push(Path::new("/Applications").join(b));
                if let Some(home) = dirs::home_dir() {
                    out.push(home.join("Applications").join(b));
                }
            }
        }
        "windows" => {
            for base in ["C:\\Program Files", "C:\\Program Files (x86)"] {
                out.push(Path::new(base).join("Google\\Chrome\\Application\\chrome.exe"));
                out.push(Path::new(base).join("Microsoft\\Edge\\Application\\msedge.exe"));
            }
        }
        _ => {
            out.push(PathBuf::from("/usr/bin/google-chrome"));
            out.push(PathBuf::from("/usr/bin/chromium"));
            out.push(PathBuf::from("/snap/bin/chromium"));
        }
    }
    out
}

/// Runs `program args` with stdio discarded, killing it after `timeout`.
fn probe_succeeds(program: &Path, args: &[&str], timeout: Duration) -> bool {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(c) => c,
        Err(_) => return false,
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(50)),
            Err(_) => return false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        p
    }

    fn make_executable(dir: &Path, name: &str) -> PathBuf {
        write_script(dir, name, "exit 0")
    }

    #[test]
    fn find_in_dirs_respects_order() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        make_executable(b.path(), "mytool");
        let first = make_executable(a.path(), "mytool");

        let found = find_in_dirs("mytool", vec![a.path().to_path_buf(), b.path().to_path_buf()]).unwrap();
        assert_eq!(found, first);
    }

    #[test]
    fn find_in_dirs_misses_absent_tool() {
        let a = tempdir().unwrap();
        assert!(find_in_dirs("definitely-not-here", vec![a.path().to_path_buf()]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_file_is_ignored() {
        let a = tempdir().unwrap();
        std::fs::write(a.path().join("plainfile"), "data").unwrap();
        assert!(find_in_dirs("plainfile", vec![a.path().to_path_buf()]).is_none());
    }

    #[test]
    fn npx_runner_prefixes_package() {
        let r = MarpRunner::Npx(PathBuf::from("/usr/bin/npx"));
        assert_eq!(r.prefix_args(), vec![OsString::from(MARP_NPX_PACKAGE)]);
        assert_eq!(r.program(), Path::new("/usr/bin/npx"));
        assert_eq!(r.label(), "npx");

        let d = MarpRunner::Direct(PathBuf::from("/usr/local/bin/marp"));
        assert!(d.prefix_args().is_empty());
        assert_eq!(d.label(), "marp");
    }

    #[cfg(unix)]
    #[test]
    fn probe_reports_exit_status() {
        let a = tempdir().unwrap();
        let ok = make_executable(a.path(), "ok-tool");
        assert!(probe_succeeds(&ok, &[], Duration::from_secs(5)));

        let bad = write_script(a.path(), "bad-tool", "exit 3");
        assert!(!probe_succeeds(&bad, &[], Duration::from_secs(5)));
    }

    #[cfg(unix)]
    #[test]
    fn probe_times_out() {
        let a = tempdir().unwrap();
        let slow = write_script(a.path(), "slow-tool", "sleep 5");
        let start = Instant::now();
        assert!(!probe_succeeds(&slow, &[], Duration::from_millis(200)));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_probe_program_is_false() {
        assert!(!probe_succeeds(
            Path::new("/nonexistent/tool-locate/program"),
            &[],
            Duration::from_secs(1)
        ));
    }

    #[test]
    fn not_found_message_carries_hint() {
        let e = ToolLocateError::NotFound {
            tool: "Marp CLI",
            hint: MARP_INSTALL_HINT,
        };
        let msg = e.to_string();
        assert!(msg.contains("Marp CLI not found"));
        assert!(msg.contains("npm install -g @marp-team/marp-cli"));
        assert!(msg.contains("brew install marp-cli"));
    }
}
