use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenLayout {
    pub status: Rect,
    pub blocks: Rect,
    pub input: Rect,
}

/// Status row on top, block list in the middle, one input row at the bottom.
pub fn split_screen(area: Rect) -> ScreenLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    ScreenLayout {
        status: rows[0],
        blocks: rows[1],
        input: rows[2],
    }
}
