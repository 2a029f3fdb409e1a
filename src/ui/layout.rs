//! Simple stack-based layout

/// Rectangular region of the terminal, 1-based like [`crate::screen::Screen`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, row: u16, col: u16) -> bool {
        row >= self.y && row < self.y + self.height &&
        col >= self.x && col < self.x + self.width
    }

    /// Area left after removing a border of `n` cells on every side
    pub fn inset(&self, n: u16) -> Rect {
        Rect {
            x: self.x + n,
            y: self.y + n,
            width: self.width.saturating_sub(n * 2),
            height: self.height.saturating_sub(n * 2),
        }
    }

    /// A `width` x `height` rectangle centered in this one, clipped to it
    pub fn centered(&self, width: u16, height: u16) -> Rect {
        let width = width.min(self.width);
        let height = height.min(self.height);
        Rect {
            x: self.x + (self.width - width) / 2,
            y: self.y + (self.height - height) / 2,
            width,
            height,
        }
    }
}

/// Size constraint along the stacking axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Size {
    /// Fixed size in characters
    Fixed(u16),
    /// Takes up remaining space proportionally (weight)
    Flex(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// Split `bounds` along `axis`. Fixed items get their size first (clipped to
/// what is left), flex items share the remainder by weight, and the last
/// flex item absorbs rounding.
pub fn split(bounds: Rect, axis: Axis, sizes: &[Size]) -> Vec<Rect> {
    let total = match axis {
        Axis::Vertical => bounds.height,
        Axis::Horizontal => bounds.width,
    };

    let fixed_total: u16 = sizes
        .iter()
        .map(|s| match s {
            Size::Fixed(n) => *n,
            Size::Flex(_) => 0,
        })
        .fold(0u16, |a, b| a.saturating_add(b));
    let flex_weight: u16 = sizes
        .iter()
        .map(|s| match s {
            Size::Fixed(_) => 0,
            Size::Flex(w) => *w,
        })
        .sum();
    let flex_space = total.saturating_sub(fixed_total);
    let last_flex = sizes.iter().rposition(|s| matches!(s, Size::Flex(_)));

    let mut rects = Vec::with_capacity(sizes.len());
    let mut offset = 0u16;
    let mut flex_used = 0u16;
    for (i, size) in sizes.iter().enumerate() {
        let remaining = total.saturating_sub(offset);
        let len = match size {
            Size::Fixed(n) => (*n).min(remaining),
            Size::Flex(_) if Some(i) == last_flex => flex_space.saturating_sub(flex_used).min(remaining),
            Size::Flex(w) if flex_weight > 0 => {
                let len = (flex_space as u32 * *w as u32 / flex_weight as u32) as u16;
                flex_used += len;
                len.min(remaining)
            }
            Size::Flex(_) => 0,
        };
        rects.push(match axis {
            Axis::Vertical => Rect::new(bounds.x, bounds.y + offset, bounds.width, len),
            Axis::Horizontal => Rect::new(bounds.x + offset, bounds.y, len, bounds.height),
        });
        offset += len;
    }
    rects
}

/// Regions of the main screen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppLayout {
    pub toolbar: Rect,
    pub editor: Rect,
    pub simulator: Option<Rect>,
    pub status: Rect,
}

/// Toolbar on top, status line at the bottom, the editor beside the
/// simulator window when one is open
pub fn app_layout(width: u16, height: u16, simulator_width: Option<u16>) -> AppLayout {
    let rows = split(
        Rect::new(1, 1, width, height),
        Axis::Vertical,
        &[Size::Fixed(1), Size::Flex(1), Size::Fixed(1)],
    );
    let (editor, simulator) = match simulator_width {
        Some(w) => {
            let cols = split(rows[1], Axis::Horizontal, &[Size::Flex(1), Size::Fixed(w)]);
            (cols[0], Some(cols[1]))
        }
        None => (rows[1], None),
    };
    AppLayout {
        toolbar: rows[0],
        editor,
        simulator,
        status: rows[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fixed_and_flex() {
        let rects = split(
            Rect::new(1, 1, 10, 20),
            Axis::Vertical,
            &[Size::Fixed(1), Size::Flex(1), Size::Fixed(2)],
        );
        assert_eq!(rects[0], Rect::new(1, 1, 10, 1));
        assert_eq!(rects[1], Rect::new(1, 2, 10, 17));
        assert_eq!(rects[2], Rect::new(1, 19, 10, 2));
    }

    #[test]
    fn test_split_clips_when_too_small() {
        let rects = split(Rect::new(1, 1, 5, 1), Axis::Horizontal, &[Size::Fixed(4), Size::Fixed(4)]);
        assert_eq!(rects[0].width, 4);
        assert_eq!(rects[1], Rect::new(5, 1, 1, 1));
    }

    #[test]
    fn test_app_layout_with_simulator() {
        let layout = app_layout(120, 40, Some(84));
        assert_eq!(layout.toolbar, Rect::new(1, 1, 120, 1));
        assert_eq!(layout.status, Rect::new(1, 40, 120, 1));
        assert_eq!(layout.editor, Rect::new(1, 2, 36, 38));
        assert_eq!(layout.simulator, Some(Rect::new(37, 2, 84, 38)));
    }

    #[test]
    fn test_centered() {
        let r = Rect::new(1, 1, 20, 10).centered(10, 4);
        assert_eq!(r, Rect::new(6, 4, 10, 4));
        assert!(r.contains(4, 6));
        assert!(!r.contains(8, 6));
    }
}
