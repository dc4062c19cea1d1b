use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f32,
    pub weight: FontWeight,
    pub italic: bool,
}

impl TextStyle {
    pub const LABEL: Self = Self {
        font_size: 14.0,
        weight: FontWeight::Bold,
        italic: false,
    };
    pub const TECHNOLOGY: Self = Self {
        font_size: 11.0,
        weight: FontWeight::Regular,
        italic: true,
    };
    pub const DESCRIPTION: Self = Self {
        font_size: 12.0,
        weight: FontWeight::Regular,
        italic: false,
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextSize {
    pub width: f32,
    pub height: f32,
}

/// Text measurement capability injected into the sizing phase.
///
/// Implementations must be pure: identical input yields identical output.
pub trait TextMeasurer: Send + Sync {
    fn measure(&self, text: &str, style: &TextStyle) -> TextSize;
}

/// Width estimate based on terminal cell widths: wide glyphs count double.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMeasurer {
    /// Advance of one narrow cell, relative to the font size.
    pub char_width_ratio: f32,
    /// Line height relative to the font size.
    pub line_height_ratio: f32,
    pub bold_factor: f32,
}

impl Default for MonospaceMeasurer {
    fn default() -> Self {
        Self {
            char_width_ratio: 0.6,
            line_height_ratio: 1.4,
            bold_factor: 1.08,
        }
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextSize {
        let mut advance = style.font_size * self.char_width_ratio;
        if style.weight == FontWeight::Bold {
            advance *= self.bold_factor;
        }

        let lines: Vec<&str> = text.lines().collect();
        let widest = lines
            .iter()
            .map(|line| UnicodeWidthStr::width(*line))
            .max()
            .unwrap_or(0);

        TextSize {
            width: widest as f32 * advance,
            height: lines.len().max(1) as f32 * style.font_size * self.line_height_ratio,
        }
    }
}

/// Greedy word wrap using the measurer; words wider than `max_width` get a line of their own.
pub fn wrap_text(
    measurer: &dyn TextMeasurer,
    text: &str,
    style: &TextStyle,
    max_width: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if measurer.measure(&candidate, style).width <= max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_glyphs_count_double() {
        let m = MonospaceMeasurer::default();
        let narrow = m.measure("User", &TextStyle::DESCRIPTION);
        let wide = m.measure("ユーザ", &TextStyle::DESCRIPTION);
        // 4 narrow cells vs 6 cells
        assert!((wide.width / narrow.width - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_bold_is_wider() {
        let m = MonospaceMeasurer::default();
        let regular = TextStyle {
            weight: FontWeight::Regular,
            ..TextStyle::LABEL
        };
        let bold = m.measure("Billing", &TextStyle::LABEL);
        assert!(bold.width > m.measure("Billing", &regular).width);
    }

    #[test]
    fn test_multiline_height() {
        let m = MonospaceMeasurer::default();
        let one = m.measure("a", &TextStyle::DESCRIPTION);
        let two = m.measure("a\nb", &TextStyle::DESCRIPTION);
        assert!((two.height - 2.0 * one.height).abs() < 1e-4);
    }

    #[test]
    fn test_wrap_text_respects_width() {
        let m = MonospaceMeasurer::default();
        let style = TextStyle::DESCRIPTION;
        let lines = wrap_text(
            &m,
            "Handles customer orders and payment reconciliation",
            &style,
            120.0,
        );
        assert!(lines.len() > 1);
        for line in &lines {
            if line.contains(' ') {
                assert!(m.measure(line, &style).width <= 120.0);
            }
        }
    }
}
