use std::fmt::Write;

/// Font height as a fraction of the canvas height.
const FONT_SIZE_DIVISOR: u32 = 20;

/// The single style every dialogue event uses.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    pub primary_colour: String,
    pub secondary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub outline: u32,
    pub shadow: u32,
    /// Numpad-style position; 2 is bottom centre.
    pub alignment: u32,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

impl SubtitleStyle {
    /// White text with a black outline, sized relative to the canvas height.
    pub fn for_canvas_height(height: u32) -> Self {
        Self {
            name: "Default".to_string(),
            font_name: "Arial".to_string(),
            font_size: height / FONT_SIZE_DIVISOR,
            primary_colour: "&H00FFFFFF".to_string(),
            secondary_colour: "&H000000FF".to_string(),
            outline_colour: "&H00000000".to_string(),
            back_colour: "&H00000000".to_string(),
            outline: 2,
            shadow: 2,
            alignment: 2,
            margin_l: 10,
            margin_r: 10,
            margin_v: 10,
        }
    }
}

/// One timed subtitle line. Times are in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogueEvent {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A complete Advanced SubStation Alpha (ASS) script.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleDocument {
    width: u32,
    height: u32,
    style: SubtitleStyle,
    events: Vec<DialogueEvent>,
}

impl SubtitleDocument {
    pub fn new(width: u32, height: u32, style: SubtitleStyle, events: Vec<DialogueEvent>) -> Self {
        Self {
            width,
            height,
            style,
            events,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn style(&self) -> &SubtitleStyle {
        &self.style
    }

    pub fn events(&self) -> &[DialogueEvent] {
        &self.events
    }

    /// Renders the script: header, one style, then one line per event.
    pub fn render(&self) -> String {
        let s = &self.style;
        let mut out = String::new();

        out.push_str("[Script Info]\n");
        out.push_str("ScriptType: v4.00+\n");
        let _ = writeln!(out, "PlayResX: {}", self.width);
        let _ = writeln!(out, "PlayResY: {}", self.height);
        out.push_str("ScaledBorderAndShadow: yes\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str(
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
             BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
             BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
        );
        let _ = writeln!(
            out,
            "Style: {},{},{},{},{},{},{},0,0,0,0,100,100,0,0,1,{},{},{},{},{},{},1",
            s.name,
            s.font_name,
            s.font_size,
            s.primary_colour,
            s.secondary_colour,
            s.outline_colour,
            s.back_colour,
            s.outline,
            s.shadow,
            s.alignment,
            s.margin_l,
            s.margin_r,
            s.margin_v,
        );
        out.push('\n');

        out.push_str("[Events]\n");
        out.push_str(
            "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
        );
        for event in &self.events {
            let _ = writeln!(
                out,
                "Dialogue: 0,{},{},{},,0,0,0,,{}",
                format_timestamp(event.start),
                format_timestamp(event.end),
                s.name,
                escape_text(&event.text),
            );
        }

        out
    }
}

/// Formats seconds as `H:MM:SS.cc`. Negative and non-finite values clamp to zero.
pub fn format_timestamp(seconds: f64) -> String {
    let centis = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 100.0).round() as u64
    } else {
        0
    };
    let hours = centis / 360_000;
    let minutes = (centis / 6_000) % 60;
    let secs = (centis / 100) % 60;
    let cs = centis % 100;
    format!("{hours}:{minutes:02}:{secs:02}.{cs:02}")
}

/// Line breaks become `\N`; carriage returns are dropped.
fn escape_text(text: &str) -> String {
    text.trim().replace('\r', "").replace('\n', "\\N")
}
