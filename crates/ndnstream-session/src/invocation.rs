//! Command lines for the three session children.

use std::path::Path;

use ndnstream_core::VideoSize;

use crate::settings::{CaptureSettings, ToolSettings};
use crate::supervisor::{OutputBinding, ProcessSpec, Role};
use crate::workspace::Workspace;

const RAW_PIXEL_FORMAT: &str = "yuv420p";

/// Preview player reading raw frames from the preview pipe.
///
/// Its stderr is the session's monitored stream.
pub fn player_spec(tools: &ToolSettings, size: VideoSize, workspace: &Workspace) -> ProcessSpec {
    let overlay = escape_filter_value(&workspace.overlay_file());
    let drawtext = format!(
        "drawtext=textfile='{overlay}':reload=1:fontcolor=white:fontsize=16:box=1:boxcolor=black@0.5:x=10:y=10"
    );

    ProcessSpec::new(Role::Player, &tools.ffplay)
        .args(["-hide_banner", "-f", "rawvideo", "-pixel_format", RAW_PIXEL_FORMAT])
        .arg("-video_size")
        .arg(size.to_string())
        .arg("-vf")
        .arg(drawtext)
        .arg("-i")
        .arg(workspace.preview_pipe().to_string_lossy())
        .stdout(OutputBinding::Drain(workspace.log_sink(Role::Player.log_name(), "out")))
        .stderr(OutputBinding::Monitored)
}

/// Encoder capturing the camera and writing two raw outputs: the publisher's
/// source pipe and the player's preview pipe.
pub fn encoder_spec(
    tools: &ToolSettings,
    capture: &CaptureSettings,
    size: VideoSize,
    workspace: &Workspace,
) -> ProcessSpec {
    let scale = format!("scale={}:{}", size.width, size.height);
    let mut spec = ProcessSpec::new(Role::Encoder, &tools.ffmpeg)
        .args(["-hide_banner", "-nostdin", "-f"])
        .arg(&capture.input_format)
        .arg("-framerate")
        .arg(capture.framerate.to_string())
        .args(capture.input_args.iter().cloned())
        .arg("-i")
        .arg(&capture.device);

    for output in [workspace.camera_pipe(), workspace.preview_pipe()] {
        spec = spec
            .args(["-vf", scale.as_str(), "-pix_fmt", RAW_PIXEL_FORMAT, "-f", "rawvideo", "-y"])
            .arg(output.to_string_lossy());
    }

    spec.stdout(OutputBinding::Drain(workspace.log_sink(Role::Encoder.log_name(), "out")))
        .stderr(OutputBinding::Drain(workspace.log_sink(Role::Encoder.log_name(), "err")))
}

/// Publisher reading the camera pipe as configured in `producer.cfg`.
pub fn publisher_spec(tools: &ToolSettings, identity: &str, instance: &str, workspace: &Workspace) -> ProcessSpec {
    ProcessSpec::new(Role::Publisher, &tools.ndnrtc_client)
        .arg("-c")
        .arg(workspace.producer_config().to_string_lossy())
        .arg("-s")
        .arg(identity)
        .arg("-p")
        .arg(workspace.policy_file().to_string_lossy())
        .arg("-i")
        .arg(instance)
        .stderr(OutputBinding::Drain(workspace.log_sink(Role::Publisher.log_name(), "err")))
}

/// Escapes a path for use as a quoted filter option value.
fn escape_filter_value(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.to_string_lossy().chars() {
        match c {
            '\'' => escaped.push_str("'\\''"),
            '\\' | ':' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}
