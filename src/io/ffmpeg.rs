use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::fingerprint::Fingerprint;
#[cfg(feature = "media-ffmpeg")]
use crate::fingerprint::StableHasher;
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::{Frame, PixelFormat};
use crate::foundation::math::mul_div255_u16;
use crate::io::sink::{FrameSink, SinkConfig, ensure_parent_dir};
use crate::io::source::{DecodeError, FrameSource, SourceInfo};
#[cfg(feature = "media-ffmpeg")]
use crate::io::source::{hash_file, hash_info};

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
    /// Background used to flatten straight alpha of RGBA frames.
    pub bg_rgba: [u8; 4],
}

impl FfmpegSinkOpts {
    /// Create options for outputting an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw frames to its stdin (h264, yuv420p).
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
        }
    }
}

fn raw_pix_fmt(format: PixelFormat) -> &'static str {
    match format {
        PixelFormat::Gray8 => "gray",
        PixelFormat::Rgb8 => "rgb24",
        PixelFormat::Rgba8 => "rgba",
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> FramelabResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(FramelabError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(FramelabError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(FramelabError::validation(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(FramelabError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(FramelabError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if self.opts.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            raw_pix_fmt(cfg.format),
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            FramelabError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FramelabError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FramelabError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.scratch = vec![0u8; cfg.format.buffer_len(cfg.width, cfg.height)];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        tracing::debug!(path = %self.opts.out_path.display(), "ffmpeg encoder started");
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> FramelabResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| FramelabError::encode("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(FramelabError::encode(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width() != cfg.width || frame.height() != cfg.height || frame.format() != cfg.format
        {
            return Err(FramelabError::validation(format!(
                "frame mismatch: got {}x{} {:?}, expected {}x{} {:?}",
                frame.width(),
                frame.height(),
                frame.format(),
                cfg.width,
                cfg.height,
                cfg.format
            )));
        }

        let bytes: &[u8] = if cfg.format == PixelFormat::Rgba8 {
            flatten_over_bg(&mut self.scratch, frame.data(), self.opts.bg_rgba)?;
            &self.scratch
        } else {
            frame.data()
        };

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(FramelabError::encode("ffmpeg sink is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(bytes).map_err(|e| {
            FramelabError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn end(&mut self) -> FramelabResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| FramelabError::encode("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            FramelabError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| FramelabError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| FramelabError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(FramelabError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        self.cfg = None;
        Ok(())
    }
}

/// Composite straight-alpha RGBA8 over an opaque background.
fn flatten_over_bg(dst: &mut [u8], src: &[u8], bg_rgba: [u8; 4]) -> FramelabResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(FramelabError::validation(
            "flatten_over_bg expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            let v = mul_div255_u16(u16::from(s[c]), a) + mul_div255_u16(u16::from(bg_rgba[c]), inv);
            d[c] = v.min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

struct DecodeStream {
    child: Child,
    stdout: ChildStdout,
    next: FrameIndex,
}

impl DecodeStream {
    fn stop(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Video file decoder backed by `ffprobe` and `ffmpeg` (RGB8 frames).
///
/// Sequential reads stream from one running `ffmpeg` process; any other index restarts decoding
/// with a seek to that frame.
pub struct FfmpegSource {
    path: PathBuf,
    info: SourceInfo,
    fingerprint: Fingerprint,
    stream: Option<DecodeStream>,
}

impl FfmpegSource {
    /// Probe `path` and prepare for decoding.
    #[cfg(feature = "media-ffmpeg")]
    pub fn open(path: impl AsRef<Path>) -> FramelabResult<Self> {
        let path = path.as_ref();
        let info = probe(path)?;
        tracing::debug!(path = %path.display(), frames = info.frame_count, "opened video source");
        let mut h = StableHasher::new();
        h.write_str("ffmpeg");
        hash_info(&mut h, &info);
        hash_file(&mut h, path);
        Ok(Self {
            path: path.to_path_buf(),
            info,
            fingerprint: h.finish(),
            stream: None,
        })
    }

    /// Probe `path` and prepare for decoding.
    ///
    /// Returns an error when the `media-ffmpeg` feature is disabled.
    #[cfg(not(feature = "media-ffmpeg"))]
    pub fn open(path: impl AsRef<Path>) -> FramelabResult<Self> {
        Err(FramelabError::decode(format!(
            "decoding '{}' requires the 'media-ffmpeg' feature",
            path.as_ref().display()
        )))
    }

    fn start_stream(&self, idx: FrameIndex) -> Result<DecodeStream, DecodeError> {
        let corrupt = |message: String| DecodeError::Corrupt {
            frame: idx,
            message,
        };
        let t = self.info.fps.frames_to_secs(idx.0);
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{t:.9}")])
            .arg("-i")
            .arg(&self.path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| corrupt(format!("failed to run ffmpeg for video decode: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| corrupt("failed to open ffmpeg stdout (unexpected)".to_owned()))?;
        Ok(DecodeStream {
            child,
            stdout,
            next: idx,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn read(&mut self, idx: FrameIndex) -> Result<Frame, DecodeError> {
        if idx.0 >= self.info.frame_count {
            return Err(DecodeError::EndOfStream(idx));
        }
        if self.stream.as_ref().is_none_or(|s| s.next != idx) {
            if let Some(old) = self.stream.take() {
                old.stop();
            }
            self.stream = Some(self.start_stream(idx)?);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(DecodeError::EndOfStream(idx));
        };

        let mut buf = vec![0u8; self.info.format.buffer_len(self.info.width, self.info.height)];
        if let Err(e) = stream.stdout.read_exact(&mut buf) {
            if let Some(old) = self.stream.take() {
                old.stop();
            }
            return Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DecodeError::EndOfStream(idx)
            } else {
                DecodeError::Corrupt {
                    frame: idx,
                    message: format!("ffmpeg read failed: {e}"),
                }
            });
        }
        stream.next = FrameIndex(idx.0 + 1);
        Frame::new(idx, self.info.width, self.info.height, self.info.format, buf).map_err(|e| {
            DecodeError::Corrupt {
                frame: idx,
                message: e.to_string(),
            }
        })
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(s) = self.stream.take() {
            s.stop();
        }
    }
}

#[cfg(feature = "media-ffmpeg")]
fn probe(path: &Path) -> FramelabResult<SourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        nb_frames: Option<String>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
    }

    let out = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| FramelabError::decode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(FramelabError::decode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| FramelabError::decode(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| FramelabError::decode("no video stream found"))?;
    let width = video
        .width
        .ok_or_else(|| FramelabError::decode("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| FramelabError::decode("missing video height from ffprobe"))?;
    let fps = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .ok_or_else(|| FramelabError::decode("missing or invalid frame rate from ffprobe"))?;
    let frame_count = match video.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(n) => n,
        None => video
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .map(|secs| (secs * fps.as_f64()).round() as u64)
            .ok_or_else(|| FramelabError::decode("ffprobe reported neither frame count nor duration"))?,
    };

    Ok(SourceInfo {
        frame_count,
        width,
        height,
        fps,
        format: PixelFormat::Rgb8,
    })
}

/// Parse an ffprobe rate such as `30000/1001`.
#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
fn parse_rational(s: &str) -> Option<Fps> {
    let (num, den) = s.split_once('/').unwrap_or((s, "1"));
    Fps::new(num.trim().parse().ok()?, den.trim().parse().ok()?).ok()
}

#[cfg(test)]
#[path = "../../tests/unit/io/ffmpeg.rs"]
mod tests;
