/// Running SGR state folded from `ESC [ ... m` sequences.
///
/// Colours are palette indices: 0..=7 standard, 8..=15 bright. Extended
/// 256-colour and truecolour selections are consumed by the parser but never
/// stored, so they leave the current colour untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnsiStyle {
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
    pub fg: Option<u8>,
    pub bg: Option<u8>,
}

pub const PLAIN_TOKEN: &str = "text";

impl AnsiStyle {
    pub fn is_plain(&self) -> bool {
        *self == AnsiStyle::default()
    }

    /// Space-joined class list in a fixed order, or `"text"` when unstyled.
    pub fn token(&self) -> String {
        if self.is_plain() {
            return PLAIN_TOKEN.to_string();
        }

        let flags = [
            (self.bold, "bold"),
            (self.dim, "dim"),
            (self.italic, "italic"),
            (self.underline, "underline"),
            (self.blink, "blink"),
            (self.inverse, "inverse"),
            (self.hidden, "hidden"),
            (self.strikethrough, "strikethrough"),
        ];
        let mut classes: Vec<String> = flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| name.to_string())
            .collect();
        if let Some(fg) = self.fg {
            classes.push(color_class("fg", fg));
        }
        if let Some(bg) = self.bg {
            classes.push(color_class("bg", bg));
        }
        classes.join(" ")
    }

    /// Fold one SGR parameter list into the style. An empty list resets.
    pub fn apply_sgr(&mut self, params: &str) {
        let mut codes = params.split(';').map(|raw| {
            if raw.is_empty() {
                0
            } else {
                raw.parse::<u16>().unwrap_or(u16::MAX)
            }
        });

        while let Some(code) = codes.next() {
            match code {
                0 => *self = AnsiStyle::default(),
                1 => self.bold = true,
                2 => self.dim = true,
                3 => self.italic = true,
                4 => self.underline = true,
                5 => self.blink = true,
                7 => self.inverse = true,
                8 => self.hidden = true,
                9 => self.strikethrough = true,
                22 => {
                    self.bold = false;
                    self.dim = false;
                }
                23 => self.italic = false,
                24 => self.underline = false,
                25 => self.blink = false,
                27 => self.inverse = false,
                28 => self.hidden = false,
                29 => self.strikethrough = false,
                30..=37 => self.fg = Some((code - 30) as u8),
                38 | 48 => skip_extended_color(&mut codes),
                39 => self.fg = None,
                40..=47 => self.bg = Some((code - 40) as u8),
                49 => self.bg = None,
                90..=97 => self.fg = Some((code - 90 + 8) as u8),
                100..=107 => self.bg = Some((code - 100 + 8) as u8),
                _ => {}
            }
        }
    }
}

fn skip_extended_color(codes: &mut impl Iterator<Item = u16>) {
    match codes.next() {
        Some(5) => {
            codes.next();
        }
        Some(2) => {
            for _ in 0..3 {
                codes.next();
            }
        }
        _ => {}
    }
}

fn color_class(prefix: &str, index: u8) -> String {
    if index < 8 {
        format!("{prefix}-{index}")
    } else {
        format!("{prefix}-bright-{}", index - 8)
    }
}
