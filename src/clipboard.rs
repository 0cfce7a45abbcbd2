/*!
 * Clipboard support
 *
 * Pipes text into the first clipboard command available on this system.
 */

use std::env;
use std::io::{self, Write};
use std::process::{Command, Stdio};

use thiserror::Error;

/// Error type for clipboard operations
#[derive(Error, Debug)]
pub enum ClipboardError {
    /// Failed to run the clipboard command
    #[error("Clipboard command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// No suitable clipboard mechanism was found
    #[error("No clipboard command found (tried {0})")]
    NoClipboardFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A command that reads the clipboard contents from stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClipboardCommand {
    program: &'static str,
    args: &'static [&'static str],
}

const PBCOPY: ClipboardCommand = ClipboardCommand {
    program: "pbcopy",
    args: &[],
};
const CLIP_EXE: ClipboardCommand = ClipboardCommand {
    program: "clip.exe",
    args: &[],
};
const WL_COPY: ClipboardCommand = ClipboardCommand {
    program: "wl-copy",
    args: &[],
};
const XCLIP: ClipboardCommand = ClipboardCommand {
    program: "xclip",
    args: &["-selection", "clipboard", "-in"],
};
const XSEL: ClipboardCommand = ClipboardCommand {
    program: "xsel",
    args: &["-b", "-i"],
};
const TMUX: ClipboardCommand = ClipboardCommand {
    program: "tmux",
    args: &["load-buffer", "-w", "-"],
};

/// Candidates for this platform, most specific first
fn candidates() -> Vec<ClipboardCommand> {
    let mut list = Vec::new();
    if env::var_os("TMUX").is_some() {
        list.push(TMUX);
    }
    if cfg!(target_os = "macos") {
        list.push(PBCOPY);
    } else if cfg!(target_os = "windows") || env::var_os("WSL_DISTRO_NAME").is_some() {
        list.push(CLIP_EXE);
    } else {
        if env::var_os("WAYLAND_DISPLAY").is_some() {
            list.push(WL_COPY);
        }
        list.push(XCLIP);
        list.push(XSEL);
    }
    list
}

/// Check if a program can be found on the PATH
pub fn command_exists(program: &str) -> bool {
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

fn run(command: ClipboardCommand, text: &str) -> Result<(), ClipboardError> {
    let failed = |reason: String| ClipboardError::CommandFailed {
        command: command.program.to_string(),
        reason,
    };

    let mut child = Command::new(command.program)
        .args(command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| failed(e.to_string()))?;

    child
        .stdin
        .take()
        .ok_or_else(|| failed("stdin unavailable".to_string()))?
        .write_all(text.as_bytes())?;

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(failed(format!("exited with {}", status)))
    }
}

/// Copy text to the clipboard using the first available command
pub fn copy_to_clipboard(text: &str) -> Result<(), ClipboardError> {
    let available: Vec<ClipboardCommand> = candidates()
        .into_iter()
        .filter(|c| command_exists(c.program))
        .collect();

    let mut last_error = None;
    for command in available {
        match run(command, text) {
            Ok(()) => {
                log::debug!("Copied {} bytes with {}", text.len(), command.program);
                return Ok(());
            }
            Err(e) => {
                log::debug!("{}", e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        let tried: Vec<&str> = candidates().iter().map(|c| c.program).collect();
        ClipboardError::NoClipboardFound(tried.join(", "))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn command_lookup_uses_path() {
        assert!(command_exists("sh"));
        assert!(!command_exists("nonexistentcommandxyz"));
    }

    #[test]
    fn every_platform_has_a_candidate() {
        assert!(!candidates().is_empty());
    }
}
