//! FFmpeg filter graph definitions.

use reel_models::{PaddingPolicy, Resolution, TransitionKind};

/// Box blur applied to the background copy of a still image.
pub const BACKGROUND_BLUR: &str = "boxblur=20:5";

/// Trailing filters every rendered frame ends with.
pub const FRAME_FINISH: &str = "setsar=1,format=yuv420p";

/// Label of the video stream produced by [`padding_filter`].
pub const PADDED_VIDEO_LABEL: &str = "[v]";

/// Scale a frame to fit inside the target box, preserving aspect ratio.
pub fn filter_fit(resolution: Resolution) -> String {
    format!(
        "scale={}:{}:force_original_aspect_ratio=decrease",
        resolution.width, resolution.height
    )
}

/// Centre a fitted frame on a canvas of the target size.
pub fn filter_center_pad(resolution: Resolution) -> String {
    format!(
        "pad={}:{}:(ow-iw)/2:(oh-ih)/2",
        resolution.width, resolution.height
    )
}

/// Build the filter graph that turns input 0 into a full-frame picture
/// labelled `[v]`, following the given padding policy.
///
/// The graph only depends on the policy and resolution, so the same image
/// always renders identically.
pub fn padding_filter(policy: PaddingPolicy, resolution: Resolution) -> String {
    let (w, h) = (resolution.width, resolution.height);
    match policy {
        PaddingPolicy::BlurredBackground => format!(
            "[0:v]split=2[bg][fg];\
             [bg]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},{blur}[blurred];\
             [fg]{fit}[fitted];\
             [blurred][fitted]overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2,{finish}{label}",
            blur = BACKGROUND_BLUR,
            fit = filter_fit(resolution),
            finish = FRAME_FINISH,
            label = PADDED_VIDEO_LABEL,
        ),
        PaddingPolicy::Black => format!(
            "[0:v]{fit},{pad}:black,{finish}{label}",
            fit = filter_fit(resolution),
            pad = filter_center_pad(resolution),
            finish = FRAME_FINISH,
            label = PADDED_VIDEO_LABEL,
        ),
    }
}

/// Plain scale+pad normalisation used for time-lapse frames.
pub fn filter_normalize(resolution: Resolution) -> String {
    format!(
        "{},{},setsar=1",
        filter_fit(resolution),
        filter_center_pad(resolution)
    )
}

/// Crossfade between input 0 and input 1 starting at the first frame.
pub fn filter_xfade(kind: TransitionKind, duration_secs: f64) -> String {
    format!(
        "[0:v][1:v]xfade=transition={}:duration={:.3}:offset=0,format=yuv420p[v]",
        kind.as_xfade_name(),
        duration_secs
    )
}

/// Caption drawn horizontally centred near the top of the frame.
pub fn filter_label(text: &str, resolution: Resolution) -> String {
    let font_size = (resolution.width * 13 / 100).max(10);
    let border = (font_size / 20).max(2);
    format!(
        "drawtext=text={}:expansion=none:fontsize={}:fontcolor=yellow:borderw={}:bordercolor=white:x=(w-text_w)/2:y=20",
        escape_drawtext(text),
        font_size,
        border
    )
}

/// Escape a string for an unquoted drawtext `text` option inside a
/// filtergraph.
///
/// FFmpeg unescapes twice: once when splitting the graph into filters and
/// once when splitting the filter's `key=value` options. Quoting does not
/// nest across the two passes, so each pass gets its own backslash layer.
pub fn escape_drawtext(text: &str) -> String {
    let option_level = escape_with(text, &['\\', '\'', ':']);
    escape_with(&option_level, &['\\', '\'', ',', ';', '[', ']'])
}

fn escape_with(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' | '\r' => out.push(' '),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_filters() {
        let res = Resolution::SHORTS;

        let blur = padding_filter(PaddingPolicy::BlurredBackground, res);
        assert!(blur.contains("force_original_aspect_ratio=increase,crop=1080:1920"));
        assert!(blur.contains("boxblur"));
        assert!(blur.contains("overlay"));
        assert!(blur.ends_with("format=yuv420p[v]"));

        let black = padding_filter(PaddingPolicy::Black, res);
        assert!(black.contains("pad=1080:1920:(ow-iw)/2:(oh-ih)/2:black"));
        assert!(!black.contains("boxblur"));
        assert!(black.ends_with("format=yuv420p[v]"));

        assert_eq!(blur, padding_filter(PaddingPolicy::BlurredBackground, res));
    }

    #[test]
    fn test_normalize_has_no_blur() {
        let f = filter_normalize(Resolution::new(720, 1280));
        assert_eq!(
            f,
            "scale=720:1280:force_original_aspect_ratio=decrease,pad=720:1280:(ow-iw)/2:(oh-ih)/2,setsar=1"
        );
    }

    #[test]
    fn test_xfade_filter() {
        let f = filter_xfade(TransitionKind::WipeLeft, 1.0);
        assert!(f.contains("xfade=transition=wipeleft:duration=1.000:offset=0"));
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("1999"), "1999");
        assert_eq!(escape_drawtext("10:30"), r"10\\:30");
        assert_eq!(escape_drawtext("it's"), r"it\\\'s");
        assert_eq!(escape_drawtext("Tom's, 1999"), r"Tom\\\'s\, 1999");
        assert_eq!(escape_drawtext("a\nb"), "a b");

        let label = filter_label("O'Hare", Resolution::SHORTS);
        assert!(label.starts_with(r"drawtext=text=O\\\'Hare:expansion=none:"));
        assert!(filter_label("2001", Resolution::SHORTS).contains("text=2001:"));
    }
}
