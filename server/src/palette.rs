use std::sync::Arc;

pub const DEFAULT_PALETTE: [&str; 6] = [
    "#1abc9c", "#3498db", "#9b59b6", "#f1c40f", "#e74c3c", "#2ecc71",
];

pub fn default_palette() -> Arc<[String]> {
    DEFAULT_PALETTE.iter().map(|color| color.to_string()).collect()
}

/// Parses a comma separated color list. Blank items are skipped and an empty
/// result falls back to the default palette.
pub fn parse_palette(value: &str) -> Arc<[String]> {
    let colors = value
        .split(',')
        .map(str::trim)
        .filter(|color| !color.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if colors.is_empty() {
        return default_palette();
    }
    colors.into()
}

/// Round-robin color assignment. Colors are handed out again once the palette
/// wraps, even if a client currently present already holds the same one.
#[derive(Clone, Debug)]
pub struct ColorAllocator {
    palette: Arc<[String]>,
    cursor: usize,
}

impl ColorAllocator {
    pub fn new(palette: Arc<[String]>) -> Self {
        let palette = if palette.is_empty() {
            default_palette()
        } else {
            palette
        };
        Self { palette, cursor: 0 }
    }

    pub fn next_color(&mut self) -> String {
        let color = self.palette[self.cursor % self.palette.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around_the_palette() {
        let mut colors = ColorAllocator::new(parse_palette("red, green"));
        assert_eq!(colors.next_color(), "red");
        assert_eq!(colors.next_color(), "green");
        assert_eq!(colors.next_color(), "red");
    }

    #[test]
    fn empty_palette_uses_defaults() {
        assert_eq!(parse_palette(" , ").len(), DEFAULT_PALETTE.len());
        let mut colors = ColorAllocator::new(Vec::<String>::new().into());
        assert_eq!(colors.next_color(), DEFAULT_PALETTE[0]);
    }
}
