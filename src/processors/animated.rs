// webpnorm/src/processors/animated.rs
use crate::core::{NormalizeError, Result, SourceDescriptor, ToolConfig};
use crate::processors::writer::{commit_with, write_atomic};
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Outputs smaller than this are treated as a failed conversion even when
/// the tool exits cleanly.
pub const MIN_OUTPUT_BYTES: u64 = 100;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How an animated source ended up being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatedOutcome {
    /// The external tool produced an animated WebP.
    Animated,
    /// Only the first frame was encoded.
    StaticFallback,
}

/// True when the GIF at `path` has more than one frame. Stops decoding at
/// the second frame.
pub fn is_animated_gif(path: &Path) -> Result<bool> {
    let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
    let frames = decoder
        .into_frames()
        .take(2)
        .take_while(|frame| frame.is_ok())
        .count();
    Ok(frames > 1)
}

/// Argument orderings accepted by the different gif2webp builds in the wild.
fn command_templates(quality: u8, source: &Path, output: &Path) -> Vec<Vec<String>> {
    let q = quality.to_string();
    let src = source.to_string_lossy().into_owned();
    let out = output.to_string_lossy().into_owned();

    vec![
        vec!["-q".into(), q.clone(), "-mixed".into(), src.clone(), "-o".into(), out.clone()],
        vec!["-q".into(), q, src, "-o".into(), out],
    ]
}

fn capture<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Wait for `child`, killing it once `timeout` has passed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::result::Result<ExitStatus, String> {
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                if let Err(e) = child.kill() {
                    log::warn!("Failed to kill timed out process {}: {}", child.id(), e);
                }
                let _ = child.wait();
                return Err(format!("timed out after {:?}", timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(format!("failed to wait for process: {}", e)),
        }
    }
}

/// Two-tier conversion for multi-frame GIFs: the external converter first,
/// then a static encode of the first frame.
pub struct AnimatedHandler {
    tool: ToolConfig,
    quality: u8,
}

impl AnimatedHandler {
    pub fn new(tool: ToolConfig, quality: u8) -> Self {
        Self { tool, quality }
    }

    /// `still_frame` renders the first frame through the still pipeline and
    /// is only invoked when the external tool cannot be used.
    pub fn convert<F>(&self, source: &SourceDescriptor, target: &Path, still_frame: F) -> Result<AnimatedOutcome>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        match self.convert_with_tool(source, target) {
            Ok(()) => {
                log::info!(
                    "Converted animated GIF {} to animated WebP {}",
                    source.path.display(),
                    target.display()
                );
                return Ok(AnimatedOutcome::Animated);
            }
            Err(e) => {
                log::warn!("Animated conversion unavailable for {}: {}", source.path.display(), e);
            }
        }

        let bytes = still_frame()?;
        write_atomic(target, &bytes)?;

        log::warn!(
            "Degraded {} to a static WebP of its first frame ({}); install {} for animated output",
            source.path.display(),
            target.display(),
            self.tool.program
        );

        Ok(AnimatedOutcome::StaticFallback)
    }

    pub fn locate_tool(&self) -> Result<PathBuf> {
        let program = Path::new(&self.tool.program);
        if program.is_absolute() {
            return if program.is_file() {
                Ok(program.to_path_buf())
            } else {
                Err(NormalizeError::ExternalTool(format!("{} does not exist", program.display())))
            };
        }

        which::which(&self.tool.program).map_err(|e| {
            NormalizeError::ExternalTool(format!("{} not found on PATH: {}", self.tool.program, e))
        })
    }

    fn convert_with_tool(&self, source: &SourceDescriptor, target: &Path) -> Result<()> {
        let program = self.locate_tool()?;

        commit_with(target, |temp| {
            let mut causes = Vec::new();

            for (i, args) in command_templates(self.quality, &source.path, temp).iter().enumerate() {
                log::debug!("Attempt {}: {} {}", i + 1, program.display(), args.join(" "));

                match self.run_attempt(&program, args, temp) {
                    Ok(size) => {
                        log::debug!("Attempt {} produced {} bytes", i + 1, size);
                        return Ok(());
                    }
                    Err(cause) => {
                        log::debug!("Attempt {} failed: {}", i + 1, cause);
                        causes.push(format!("attempt {}: {}", i + 1, cause));
                    }
                }
            }

            Err(NormalizeError::ExternalTool(causes.join("; ")))
        })
    }

    /// One invocation; returns the produced file size.
    fn run_attempt(&self, program: &Path, args: &[String], output: &Path) -> std::result::Result<u64, String> {
        // Truncate rather than remove: the temp file handle owns this path.
        File::create(output).map_err(|e| format!("cannot reset output: {}", e))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to start: {}", e))?;

        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());

        // On timeout the reader threads are left to drain on their own.
        let status = wait_with_timeout(&mut child, self.tool.timeout)?;

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !stdout.trim().is_empty() {
            log::debug!("stdout: {}", stdout.trim());
        }
        if !stderr.trim().is_empty() {
            log::debug!("stderr: {}", stderr.trim());
        }

        if !status.success() {
            return Err(format!("exited with {}: {}", status, stderr.trim()));
        }

        let size = std::fs::metadata(output)
            .map(|m| m.len())
            .map_err(|e| format!("no output produced: {}", e))?;

        if size < MIN_OUTPUT_BYTES {
            return Err(format!("output is only {} bytes", size));
        }

        Ok(size)
    }
}
