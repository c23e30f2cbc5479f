//! Planning for cutting marked clips out of a video. The cutting itself is
//! done by an external tool behind [`ClipRenderer`].

use crate::clips::ClipEntry;
use crate::error::{CatalogError, Result};
use crate::media::preview_path;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub stop: f64,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlan {
    pub source: PathBuf,
    pub segments: Vec<Segment>,
    /// Target height/width of the short side; 1 keeps the source streams.
    pub resolution: u32,
    pub preview: Option<PathBuf>,
}

impl ClipPlan {
    pub fn new(source: &Path, clips: &[ClipEntry], resolution: u32, gen_preview: bool) -> Self {
        let dir = source.parent().unwrap_or_else(|| Path::new(""));
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let segments = clips
            .iter()
            .map(|c| Segment {
                start: c.start,
                stop: c.stop,
                output: dir.join(format!("{}_{}_{}{}", stem, c.start, c.stop, ext)),
            })
            .collect();
        Self {
            source: source.to_path_buf(),
            segments,
            resolution,
            preview: gen_preview.then(|| preview_path(source)),
        }
    }

    pub fn copies_streams(&self) -> bool {
        self.resolution <= 1
    }
}

/// Scales the short side to `target`; the long side is rounded down to an
/// even number. Unknown source dimensions yield a square.
pub fn scaled_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (target, target);
    }
    if width > height {
        let w = (u64::from(width) * u64::from(target) / u64::from(height)) as u32 / 2 * 2;
        (w, target)
    } else {
        let h = (u64::from(height) * u64::from(target) / u64::from(width)) as u32 / 2 * 2;
        (target, h)
    }
}

pub trait ClipRenderer {
    fn render(&self, plan: &ClipPlan) -> Result<()>;
}

/// Runs `ffmpeg`/`ffprobe` from `PATH`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRenderer;

impl FfmpegRenderer {
    fn probe(&self, file: &Path) -> (u32, u32) {
        let output = Command::new("ffprobe")
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height", "-of", "csv=p=0"])
            .arg(file)
            .output();
        let Ok(output) = output else {
            return (0, 0);
        };
        let text = String::from_utf8_lossy(&output.stdout);
        let mut dims = text
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split(',')
            .map(|n| n.parse::<u32>().unwrap_or(0));
        (dims.next().unwrap_or(0), dims.next().unwrap_or(0))
    }

    fn run(&self, cmd: &mut Command) -> Result<()> {
        let status = cmd.status().map_err(|e| CatalogError::io("ffmpeg", e))?;
        if status.success() {
            Ok(())
        } else {
            Err(CatalogError::io(
                "ffmpeg",
                io::Error::new(io::ErrorKind::Other, format!("ffmpeg exited with {}", status)),
            ))
        }
    }
}

impl ClipRenderer for FfmpegRenderer {
    fn render(&self, plan: &ClipPlan) -> Result<()> {
        let scale = if plan.copies_streams() {
            None
        } else {
            let (w, h) = self.probe(&plan.source);
            Some(scaled_dimensions(w, h, plan.resolution))
        };
        for seg in &plan.segments {
            let mut cmd = Command::new("ffmpeg");
            cmd.args(["-v", "error", "-y", "-i"]).arg(&plan.source);
            match scale {
                Some((w, h)) => cmd.args(["-vf".to_string(), format!("scale={}:{}", w, h)]),
                None => cmd.args(["-c", "copy"]),
            };
            cmd.args(["-ss".to_string(), seg.start.to_string(), "-to".to_string(), seg.stop.to_string()])
                .arg(&seg.output);
            self.run(&mut cmd)?;
        }
        info!("{} clip(s) generated for {}", plan.segments.len(), plan.source.display());

        let Some(preview) = &plan.preview else {
            return Ok(());
        };
        if let Some(dir) = preview.parent() {
            std::fs::create_dir_all(dir).map_err(|e| CatalogError::io(dir, e))?;
        }
        let list: String = plan
            .segments
            .iter()
            .map(|s| format!("file '{}'\n", s.output.display()))
            .collect();
        let list_path = std::env::temp_dir().join("gallery_clip_concat.txt");
        std::fs::write(&list_path, list).map_err(|e| CatalogError::io(&list_path, e))?;
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .arg(preview);
        self.run(&mut cmd)?;
        info!("preview generated at {}", preview.display());
        Ok(())
    }
}
