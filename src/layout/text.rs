//! Text measurement
//!
//! The layout engine never talks to a font stack directly. It asks a
//! [`TextMeasurer`] for natural widths and wrapped lines; hosts with real
//! fonts plug in their own implementation.

use crate::parser::ast::FontWeight;

/// Font parameters of a text run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Font {
    pub size: f64,
    pub weight: FontWeight,
}

/// Lines and extent of a wrapped text run
#[derive(Debug, Clone, PartialEq)]
pub struct TextMetrics {
    pub lines: Vec<String>,
    pub width: f64,
    pub height: f64,
}

pub trait TextMeasurer: Send + Sync {
    /// Width of `text` on a single line
    fn line_width(&self, text: &str, font: Font) -> f64;

    fn line_height(&self, font: Font) -> f64;

    /// Widest paragraph when nothing wraps
    fn natural_width(&self, text: &str, font: Font) -> f64 {
        text.split('\n')
            .map(|paragraph| self.line_width(paragraph, font))
            .fold(0.0, f64::max)
    }

    /// Break `text` into lines no wider than `max_width`.
    ///
    /// `max_lines == 0` means unlimited. Truncated output ends with an
    /// ellipsis.
    fn wrap(&self, text: &str, font: Font, max_width: f64, max_lines: u32) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            wrap_paragraph(self, paragraph, font, max_width, &mut lines);
        }
        if max_lines > 0 && lines.len() > max_lines as usize {
            lines.truncate(max_lines as usize);
            if let Some(last) = lines.last_mut() {
                *last = ellipsize(self, last, font, max_width);
            }
        }
        lines
    }

    fn measure(&self, text: &str, font: Font, max_width: f64, max_lines: u32) -> TextMetrics {
        let lines = self.wrap(text, font, max_width, max_lines);
        let width = lines
            .iter()
            .map(|line| self.line_width(line, font))
            .fold(0.0, f64::max);
        let height = lines.len().max(1) as f64 * self.line_height(font);
        TextMetrics {
            lines,
            width,
            height,
        }
    }
}

fn wrap_paragraph<M: TextMeasurer + ?Sized>(
    measurer: &M,
    paragraph: &str,
    font: Font,
    max_width: f64,
    lines: &mut Vec<String>,
) {
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measurer.line_width(&candidate, font) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        // Break words that cannot fit on a line of their own
        for ch in word.chars() {
            current.push(ch);
            if current.chars().count() > 1 && measurer.line_width(&current, font) > max_width {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }
    lines.push(current);
}

fn ellipsize<M: TextMeasurer + ?Sized>(measurer: &M, line: &str, font: Font, max_width: f64) -> String {
    let mut truncated: String = line.to_string();
    loop {
        let candidate = format!("{}…", truncated.trim_end());
        if truncated.is_empty() || measurer.line_width(&candidate, font) <= max_width {
            return candidate;
        }
        truncated.pop();
    }
}

/// Fixed-advance measurer: every glyph is `char_width_ratio * size` wide
#[derive(Debug, Clone)]
pub struct ApproximateTextMeasurer {
    pub char_width_ratio: f64,
    pub line_height_ratio: f64,
}

impl ApproximateTextMeasurer {
    pub fn new(char_width_ratio: f64, line_height_ratio: f64) -> Self {
        Self {
            char_width_ratio,
            line_height_ratio,
        }
    }
}

impl Default for ApproximateTextMeasurer {
    fn default() -> Self {
        Self::new(0.6, 1.2)
    }
}

impl TextMeasurer for ApproximateTextMeasurer {
    fn line_width(&self, text: &str, font: Font) -> f64 {
        let advance = font.size * self.char_width_ratio;
        let weight = match font.weight {
            FontWeight::Normal => 1.0,
            FontWeight::Bold => 1.05,
        };
        text.chars().count() as f64 * advance * weight
    }

    fn line_height(&self, font: Font) -> f64 {
        font.size * self.line_height_ratio
    }
}
