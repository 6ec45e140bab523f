use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::{
    agent::{
        agent_model::{Action, ActionCandidate, Point, ScrollDirection},
        error::DeviceFault,
        task::Task,
    },
    device::device_model::{Ack, DeviceCollaborator},
    screen::{
        hierarchy::parse_hierarchy,
        screen_model::{ImageRef, Resolution, ScreenSnapshot, StructuralTree},
    },
};

const DUMP_PATH: &str = "/sdcard/window_dump.xml";
const APP_LAUNCH_SETTLE: Duration = Duration::from_secs(5);

/// Device driven through the `adb` command-line tool.
pub struct AdbDevice {
    adb: String,
    serial: String,
    timeout: Duration,
    settle: Duration,
    resolution: Option<Resolution>,

    /// Signature of a partly executed action and the index of the command
    /// that failed. A retry of the same action resumes there, so text that
    /// was already typed is not typed twice.
    resume: Option<(String, usize)>,
}

impl AdbDevice {
    /// Attach to `serial`, or to the first listed device when `None`.
    pub fn connect(
        adb: &str,
        serial: Option<&str>,
        timeout: Duration,
        settle: Duration,
    ) -> Result<Self, DeviceFault> {
        let serial = match serial {
            Some(s) => s.to_string(),
            None => {
                let listing = run_command(adb, &["devices".to_string()], timeout)?;
                first_attached_device(&String::from_utf8_lossy(&listing))
                    .ok_or(DeviceFault::NoDevice)?
            }
        };

        info!(%serial, "attached to device");
        Ok(Self {
            adb: adb.to_string(),
            serial,
            timeout,
            settle,
            resolution: None,
            resume: None,
        })
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    fn adb(&self, args: &[String]) -> Result<Vec<u8>, DeviceFault> {
        let mut full = vec!["-s".to_string(), self.serial.clone()];
        full.extend_from_slice(args);
        run_command(&self.adb, &full, self.timeout)
    }

    fn capture_hierarchy(&self) -> Result<StructuralTree, DeviceFault> {
        self.adb(&shell(&["uiautomator", "dump", DUMP_PATH]))?;
        let xml = self.adb(&args(&["exec-out", "cat", DUMP_PATH]))?;
        Ok(parse_hierarchy(&String::from_utf8_lossy(&xml)))
    }
}

impl DeviceCollaborator for AdbDevice {
    fn prepare(&mut self, task: &Task) -> Result<(), DeviceFault> {
        let Some(app) = &task.app else {
            return Ok(());
        };

        info!(package = %app.package, "launching target app");
        self.adb(&shell(&["am", "force-stop", &app.package]))?;
        self.adb(&shell(&[
            "monkey",
            "-p",
            &app.package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ]))?;
        thread::sleep(APP_LAUNCH_SETTLE);
        Ok(())
    }

    fn capture_snapshot(&mut self) -> Result<ScreenSnapshot, DeviceFault> {
        let png = self.adb(&args(&["exec-out", "screencap", "-p"]))?;
        let resolution = png_dimensions(&png)
            .ok_or_else(|| DeviceFault::Capture(format!("screencap returned {} bytes, not a PNG", png.len())))?;
        self.resolution = Some(resolution);

        // a missing hierarchy degrades the structural strategy, nothing more
        let tree = match self.capture_hierarchy() {
            Ok(tree) => tree,
            Err(e) => {
                warn!(err = %e, "ui hierarchy dump failed, continuing with empty tree");
                StructuralTree::default()
            }
        };

        Ok(ScreenSnapshot {
            image: ImageRef::from_bytes(png),
            tree,
            resolution,
        })
    }

    fn execute(&mut self, candidate: &ActionCandidate) -> Result<Ack, DeviceFault> {
        let resolution = self
            .resolution
            .ok_or_else(|| DeviceFault::Other("execute before first capture".into()))?;

        let signature = candidate.signature();
        let start = match self.resume.take() {
            Some((pending, index)) if pending == signature => index,
            _ => 0,
        };

        if let Action::Wait { millis } = candidate.action {
            thread::sleep(Duration::from_millis(millis));
            return Ok(Ack);
        }

        let commands = input_commands(&candidate.action, resolution);
        for (index, command) in commands.iter().enumerate().skip(start) {
            debug!(?command, "adb input");
            if let Err(e) = self.adb(command) {
                self.resume = Some((signature, index));
                return Err(e);
            }
        }
        thread::sleep(self.settle);
        Ok(Ack)
    }
}

// ============================================================================
// Command building
// ============================================================================

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn shell(parts: &[&str]) -> Vec<String> {
    let mut out = vec!["shell".to_string()];
    out.extend(parts.iter().map(|s| s.to_string()));
    out
}

/// adb argument lists realising one action. `Wait` needs none.
pub fn input_commands(action: &Action, resolution: Resolution) -> Vec<Vec<String>> {
    let tap = |p: &Point| shell(&["input", "tap", &p.x.to_string(), &p.y.to_string()]);

    match action {
        Action::Tap { at } => vec![tap(at)],
        Action::TypeText { target, text } => {
            let mut commands = Vec::new();
            if let Some(p) = target {
                commands.push(tap(p));
            }
            commands.push(shell(&["input", "text", &escape_input_text(text)]));
            commands.push(shell(&["input", "keyevent", "KEYCODE_ENTER"]));
            commands
        }
        Action::Scroll { direction, extent } => {
            let x = (resolution.width / 2) as i32;
            let mid = resolution.height as f64 / 2.0;
            let half = resolution.height as f64 * extent.fraction() / 2.0;
            let (from, to) = match direction {
                // content moves up, finger moves up
                ScrollDirection::Down => (mid + half, mid - half),
                ScrollDirection::Up => (mid - half, mid + half),
            };
            vec![shell(&[
                "input",
                "swipe",
                &x.to_string(),
                &(from.round() as i32).to_string(),
                &x.to_string(),
                &(to.round() as i32).to_string(),
            ])]
        }
        Action::GoBack => vec![shell(&["input", "keyevent", "KEYCODE_BACK"])],
        Action::Wait { .. } => Vec::new(),
    }
}

/// Escape text for `adb shell input text`: spaces become `%s`, shell
/// metacharacters are backslash-escaped.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '&' | '(' | ')' | '<' | '>' | '|' | ';' | '*' | '\\' | '"' | '\'' | '`' | '$' | '~'
            | '?' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Width and height from a PNG's IHDR chunk.
pub fn png_dimensions(bytes: &[u8]) -> Option<Resolution> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.len() < 24 || &bytes[..8] != SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    if width == 0 || height == 0 {
        return None;
    }
    Some(Resolution::new(width, height))
}

/// First serial in `adb devices` output whose state is `device`.
pub fn first_attached_device(listing: &str) -> Option<String> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            (parts.next()? == "device").then(|| serial.to_string())
        })
        .next()
}

// ============================================================================
// Process execution
// ============================================================================

fn run_command(program: &str, args: &[String], timeout: Duration) -> Result<Vec<u8>, DeviceFault> {
    let rendered = format!("{} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DeviceFault::Spawn {
            program: program.to_string(),
            source,
        })?;

    // drain pipes concurrently; screencap output exceeds the pipe buffer
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || read_all(stdout));
    let stderr_reader = thread::spawn(move || read_all(stderr));

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            abandon(&mut child);
            return Err(DeviceFault::Timeout {
                command: rendered,
                timeout,
            });
        }
        Err(e) => {
            abandon(&mut child);
            return Err(DeviceFault::Other(format!("waiting for `{}`: {}", rendered, e)));
        }
    };

    let out = stdout_reader.join().unwrap_or_default();
    let err = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(DeviceFault::CommandFailed {
            command: rendered,
            code: status.code(),
            stderr: String::from_utf8_lossy(&err).trim().to_string(),
        });
    }

    Ok(out)
}

/// Kill and reap a child we stopped waiting for. Its pipes close with it,
/// which ends the reader threads.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn read_all<R: Read>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut s) = stream {
        let _ = s.read_to_end(&mut buf);
    }
    buf
}
