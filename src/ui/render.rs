use crate::ansi::ParsedSpan;
use crate::state::{BlockStatus, BlockStore, CommandBlock, SearchMatch};
use crate::types::{BlockId, Millis, SectionType};
use crate::util::{char_display_width, display_width, format_duration_ms, truncate_to_display_width};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::ops::Range;

/// Lines of a collapsed section that stay visible under its marker.
pub const COLLAPSED_TAIL_LINES: usize = 3;
const INPUT_PROMPT: &str = "> ";

/// Map an ANSI class token (`"bold fg-1"`, `"text"`) onto a ratatui style.
pub fn style_for_token(token: &str) -> Style {
    let mut style = Style::default();
    for class in token.split_whitespace() {
        style = match class {
            "bold" => style.add_modifier(Modifier::BOLD),
            "dim" => style.add_modifier(Modifier::DIM),
            "italic" => style.add_modifier(Modifier::ITALIC),
            "underline" => style.add_modifier(Modifier::UNDERLINED),
            "blink" => style.add_modifier(Modifier::SLOW_BLINK),
            "inverse" => style.add_modifier(Modifier::REVERSED),
            "hidden" => style.add_modifier(Modifier::HIDDEN),
            "strikethrough" => style.add_modifier(Modifier::CROSSED_OUT),
            other => match palette_class(other) {
                Some(("fg", color)) => style.fg(color),
                Some((_, color)) => style.bg(color),
                None => style,
            },
        };
    }
    style
}

fn palette_class(class: &str) -> Option<(&str, Color)> {
    let (layer, rest) = class.split_once('-')?;
    if layer != "fg" && layer != "bg" {
        return None;
    }
    let index = match rest.strip_prefix("bright-") {
        Some(bright) => bright.parse::<u8>().ok()?.checked_add(8)?,
        None => rest.parse::<u8>().ok()?,
    };
    (index < 16).then_some((layer, Color::Indexed(index)))
}

fn styled_line(indent: &'static str, spans: Vec<ParsedSpan>, base: Style) -> Line<'static> {
    let mut out = Vec::with_capacity(spans.len() + 1);
    out.push(Span::raw(indent));
    for span in spans {
        let style = base.patch(style_for_token(&span.style_token));
        out.push(Span::styled(span.text, style));
    }
    Line::from(out)
}

fn status_badge(block: &CommandBlock, now: Millis) -> (String, Style) {
    let elapsed = block
        .metrics
        .duration_ms
        .map(format_duration_ms)
        .unwrap_or_default();
    match &block.status {
        BlockStatus::Queued => ("… queued".to_string(), Style::default().fg(Color::DarkGray)),
        BlockStatus::Running { started_at } => (
            format!("● {}", format_duration_ms(now.saturating_sub(*started_at))),
            Style::default().fg(Color::Yellow),
        ),
        BlockStatus::Finished { exit_code: 0, .. } => {
            (format!("✓ {elapsed}"), Style::default().fg(Color::Green))
        }
        BlockStatus::Finished { exit_code, .. } => (
            format!("✗ {exit_code} {elapsed}"),
            Style::default().fg(Color::Red),
        ),
        BlockStatus::Cancelled { reason, .. } => (
            format!("⊘ {reason}"),
            Style::default().fg(Color::Magenta),
        ),
    }
}

pub fn block_header(block: &CommandBlock, selected: bool, now: Millis) -> Line<'static> {
    let (badge, badge_style) = status_badge(block, now);
    let marker = if block.is_collapsed { "▸" } else { "▾" };
    let mut command_style = Style::default().add_modifier(Modifier::BOLD);
    if selected {
        command_style = command_style.add_modifier(Modifier::REVERSED);
    }
    Line::from(vec![
        Span::styled(format!("{marker} #{} ", block.id), Style::default().fg(Color::DarkGray)),
        Span::styled(badge.trim_end().to_string(), badge_style),
        Span::raw("  "),
        Span::styled(block.command_text.clone(), command_style),
        Span::styled(
            format!("  {}:{}", block.host_label, block.cwd_label),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn section_style(section_type: SectionType) -> Style {
    match section_type {
        SectionType::Command => Style::default().fg(Color::Cyan),
        SectionType::Thinking => Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        SectionType::Output | SectionType::Response => Style::default(),
    }
}

/// Rows a block occupies in the list: its header plus the visible body.
/// Counted from section ranges; no line is parsed.
pub fn block_height(block: &CommandBlock) -> usize {
    if block.is_collapsed {
        return 1;
    }
    let output = block.output();
    let body: usize = output
        .sections()
        .iter()
        .map(|section| {
            let total = output
                .section_line_range(section.id)
                .map_or(0, |range| range.len());
            if section.collapsed && total > COLLAPSED_TAIL_LINES {
                1 + COLLAPSED_TAIL_LINES
            } else {
                total
            }
        })
        .sum();
    1 + body
}

/// Body lines for one block: every section in order, collapsed sections
/// reduced to a marker and their last few lines.
pub fn block_body(block: &CommandBlock) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    push_body_rows(block, 0..usize::MAX, &mut lines);
    lines
}

/// Append the body rows of `block` that fall inside `window`, counted from
/// the first row under the header. Only lines inside the window are parsed.
fn push_body_rows(block: &CommandBlock, window: Range<usize>, out: &mut Vec<Line<'static>>) {
    let output = block.output();
    let mut row = 0usize;
    for section in output.sections() {
        if row >= window.end {
            break;
        }
        let Some(range) = output.section_line_range(section.id) else {
            continue;
        };
        let total = range.len();
        let folded = section.collapsed && total > COLLAPSED_TAIL_LINES;
        let visible = if folded {
            range.end - COLLAPSED_TAIL_LINES..range.end
        } else {
            range
        };
        let section_rows = usize::from(folded) + visible.len();
        if row + section_rows <= window.start {
            row += section_rows;
            continue;
        }

        if folded {
            if window.contains(&row) {
                out.push(Line::styled(
                    format!(
                        "  ▸ {} · {} earlier lines",
                        section.section_type.label(),
                        total - COLLAPSED_TAIL_LINES
                    ),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            row += 1;
        }

        let base = section_style(section.section_type);
        let first = visible.start + window.start.saturating_sub(row).min(visible.len());
        let last = visible.start + window.end.saturating_sub(row).min(visible.len());
        for index in first..last {
            out.push(styled_line("  ", output.line(index).spans, base));
        }
        row += visible.len();
    }
}

/// The rows of the block list that fit in a pane.
#[derive(Debug, Default)]
pub struct BlockViewport {
    pub lines: Vec<Line<'static>>,
    /// Largest scroll offset that still shows content.
    pub max_scroll: usize,
}

/// Window of the block list (oldest first, blank row between blocks)
/// `scroll` rows up from the bottom. Only rows inside the window are built.
pub fn block_viewport(store: &BlockStore, now: Millis, height: usize, scroll: usize) -> BlockViewport {
    if height == 0 {
        return BlockViewport::default();
    }
    let blocks = store.blocks();
    let heights: Vec<usize> = blocks.iter().map(|block| block_height(block)).collect();
    let total = heights.iter().sum::<usize>() + blocks.len().saturating_sub(1);
    let max_scroll = total.saturating_sub(height);
    let end = total - scroll.min(max_scroll);
    let start = end.saturating_sub(height);
    let window = start..end;

    let selected = store.selection().block_id();
    let mut lines = Vec::with_capacity(end - start);
    let mut row = 0usize;
    for (position, (block, block_rows)) in blocks.into_iter().zip(heights).enumerate() {
        if position > 0 {
            if window.contains(&row) {
                lines.push(Line::default());
            }
            row += 1;
        }
        if row >= end {
            break;
        }
        if row + block_rows > start {
            if window.contains(&row) {
                lines.push(block_header(block, selected == Some(block.id), now));
            }
            if !block.is_collapsed {
                let body_top = row + 1;
                push_body_rows(block, start.saturating_sub(body_top)..end - body_top, &mut lines);
            }
        }
        row += block_rows;
    }
    BlockViewport { lines, max_scroll }
}

/// Everything the block view shows, reduced to what changes it. Two equal
/// stamps render the same frame unless a block is running (its header
/// carries a live timer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewStamp {
    blocks: Vec<(BlockId, u64, &'static str, bool)>,
    selection: Option<BlockId>,
    following: bool,
    search: Option<String>,
    ai_thinking: bool,
    ai_error: Option<String>,
    host_label: String,
}

impl ViewStamp {
    pub fn capture(store: &BlockStore) -> Self {
        Self {
            blocks: store
                .blocks()
                .into_iter()
                .map(|block| {
                    (
                        block.id,
                        block.output().version(),
                        block.status.label(),
                        block.is_collapsed,
                    )
                })
                .collect(),
            selection: store.selection().block_id(),
            following: store.is_following(),
            search: store
                .is_search_open()
                .then(|| store.search_query().to_string()),
            ai_thinking: store.is_ai_thinking(),
            ai_error: store.ai_error().map(|error| error.message.clone()),
            host_label: store.host_label().to_string(),
        }
    }

    pub fn has_running_block(&self) -> bool {
        self.blocks.iter().any(|(_, _, status, _)| *status == "running")
    }
}

pub fn search_lines(store: &BlockStore) -> Vec<Line<'static>> {
    let results = store.current_search_results();
    let mut lines = vec![Line::styled(
        format!("search: {} · {} results", store.search_query(), results.len()),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    for result in results {
        let label = Span::styled(format!("#{:<4} ", result.block_id), Style::default().fg(Color::DarkGray));
        let text = match result.matched {
            SearchMatch::Command => {
                let command = store
                    .block(result.block_id)
                    .map(|block| block.command_text.clone())
                    .unwrap_or_default();
                Span::styled(format!("$ {command}"), Style::default().fg(Color::Cyan))
            }
            SearchMatch::Output {
                line_index,
                preview,
            } => Span::raw(format!("{:>5}: {preview}", line_index + 1)),
        };
        lines.push(Line::from(vec![label, text]));
    }
    lines
}

/// Draw the bottom of `lines`, `scroll` lines up from the end. Returns the
/// largest scroll offset that still shows content.
pub fn render_lines(
    frame: &mut Frame<'_>,
    area: Rect,
    lines: Vec<Line<'static>>,
    scroll: usize,
) -> usize {
    if area.height == 0 || area.width == 0 {
        return 0;
    }
    let height = area.height as usize;
    let max_scroll = lines.len().saturating_sub(height);
    let scroll = scroll.min(max_scroll);
    let end = lines.len() - scroll;
    let start = end.saturating_sub(height);
    let visible: Vec<Line<'static>> = lines.into_iter().skip(start).take(end - start).collect();
    frame.render_widget(Paragraph::new(visible), area);
    max_scroll
}

/// Draw the block list into `area`. Returns the largest usable scroll offset.
pub fn render_block_viewport(
    frame: &mut Frame<'_>,
    area: Rect,
    store: &BlockStore,
    now: Millis,
    scroll: usize,
) -> usize {
    if area.height == 0 || area.width == 0 {
        return 0;
    }
    let viewport = block_viewport(store, now, area.height as usize, scroll);
    frame.render_widget(Paragraph::new(viewport.lines), area);
    viewport.max_scroll
}

pub fn render_status_line(frame: &mut Frame<'_>, area: Rect, status: &str) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let text = truncate_line(status, area.width as usize);
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

/// Single-row input with horizontal scrolling that keeps the cursor visible.
pub fn render_input(frame: &mut Frame<'_>, area: Rect, input: &str, cursor_byte: usize) {
    if area.height == 0 || area.width <= 2 {
        return;
    }
    let width = area.width.saturating_sub(2) as usize;
    let (visible, cursor_col) = input_window(input, cursor_byte, width);
    frame.render_widget(
        Paragraph::new(format!("{INPUT_PROMPT}{visible}"))
            .style(Style::default().fg(Color::Gray).bg(Color::Rgb(24, 24, 24))),
        area,
    );
    let cursor_x = area
        .x
        .saturating_add(2 + cursor_col as u16)
        .min(area.x.saturating_add(area.width.saturating_sub(1)));
    frame.set_cursor_position((cursor_x, area.y));
}

/// Slice of `input` that fits in `width` columns with the cursor on screen,
/// plus the cursor's column within that slice.
pub fn input_window(input: &str, cursor_byte: usize, width: usize) -> (String, usize) {
    let width = width.max(1);
    let cursor_byte = cursor_byte.min(input.len());
    let before = input.get(..cursor_byte).unwrap_or(input);

    let mut start = 0;
    let mut before_width = display_width(before);
    for ch in before.chars() {
        if before_width < width {
            break;
        }
        start += ch.len_utf8();
        before_width -= char_display_width(ch);
    }

    let visible = truncate_to_display_width(&input[start..], width);
    (visible, before_width)
}

fn truncate_line(input: &str, width: usize) -> String {
    let width = width.max(1);
    if display_width(input) <= width {
        return input.to_string();
    }
    if width < 4 {
        return truncate_to_display_width(input, width);
    }
    let mut out = truncate_to_display_width(input, width - 3);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FlushTarget;
    use crate::types::{BlockSource, TerminalEvent};

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    fn store_with_output(command: &str, output: &str) -> BlockStore {
        let mut store = BlockStore::with_labels("local", "~");
        store.reduce(&TerminalEvent::BlockCreated {
            block_id: 1,
            command_text: command.to_string(),
            source: BlockSource::User,
        });
        let echo = format!("$ {command}\n");
        store.append_text(1, &echo, SectionType::Command);
        store.append_text(1, output, SectionType::Output);
        store.on_flush(1, output);
        store
    }

    #[test]
    fn test_style_tokens_map_to_modifiers_and_palette() {
        let style = style_for_token("bold underline fg-1 bg-bright-4");
        assert!(style.add_modifier.contains(Modifier::BOLD));
        assert!(style.add_modifier.contains(Modifier::UNDERLINED));
        assert_eq!(style.fg, Some(Color::Indexed(1)));
        assert_eq!(style.bg, Some(Color::Indexed(12)));
        assert_eq!(style_for_token("text"), Style::default());
        assert_eq!(style_for_token("fg-bright-9"), Style::default());
    }

    #[test]
    fn test_collapsed_output_shows_marker_and_tail() {
        let store = store_with_output("seq 5", "1\n2\n3\n4\n5\n");
        let block = store.block(1).unwrap();
        let texts: Vec<String> = block_body(block).iter().map(line_text).collect();
        assert_eq!(
            texts,
            vec![
                "  $ seq 5".to_string(),
                "  ▸ output · 2 earlier lines".to_string(),
                "  3".to_string(),
                "  4".to_string(),
                "  5".to_string(),
            ]
        );
    }

    #[test]
    fn test_expanded_output_shows_every_line() {
        let mut store = store_with_output("seq 5", "1\n2\n3\n4\n5\n");
        store.set_section_collapsed(1, 1, false);
        let block = store.block(1).unwrap();
        assert_eq!(block_body(block).len(), 6);
    }

    #[test]
    fn test_collapsed_block_renders_header_only() {
        let mut store = store_with_output("ls", "a\n");
        store.toggle_block_collapsed(1);
        assert_eq!(block_height(store.block(1).unwrap()), 1);
        let viewport = block_viewport(&store, 0, 10, 0);
        assert_eq!(viewport.lines.len(), 1);
        assert!(line_text(&viewport.lines[0]).contains("ls"));
    }

    fn numbered_output(count: usize) -> String {
        (1..=count).map(|n| format!("{n}\n")).collect()
    }

    fn viewport_texts(store: &BlockStore, height: usize, scroll: usize) -> (Vec<String>, usize) {
        let viewport = block_viewport(store, 0, height, scroll);
        (viewport.lines.iter().map(line_text).collect(), viewport.max_scroll)
    }

    #[test]
    fn test_block_height_matches_rendered_body() {
        let mut store = store_with_output("seq 5", "1\n2\n3\n4\n5\n");
        let block = store.block(1).unwrap();
        assert_eq!(block_height(block), 1 + block_body(block).len());
        store.set_section_collapsed(1, 1, false);
        let block = store.block(1).unwrap();
        assert_eq!(block_height(block), 1 + block_body(block).len());
        assert_eq!(block_height(block), 7);
    }

    #[test]
    fn test_viewport_builds_only_visible_rows_of_long_output() {
        let mut store = store_with_output("seq 50000", &numbered_output(50_000));
        store.set_section_collapsed(1, 1, false);

        let (bottom, max_scroll) = viewport_texts(&store, 4, 0);
        assert_eq!(max_scroll, 50_002 - 4);
        assert_eq!(bottom, vec!["  49997", "  49998", "  49999", "  50000"]);

        let (top, _) = viewport_texts(&store, 4, max_scroll);
        assert!(top[0].contains("seq 50000"));
        assert_eq!(&top[1..], ["  $ seq 50000", "  1", "  2"]);

        let (middle, _) = viewport_texts(&store, 3, 25_000);
        assert_eq!(middle, vec!["  24998", "  24999", "  25000"]);
    }

    #[test]
    fn test_viewport_window_matches_full_list() {
        let mut store = store_with_output("seq 5", "1\n2\n3\n4\n5\n");
        store.reduce(&TerminalEvent::BlockCreated {
            block_id: 2,
            command_text: "seq 2".to_string(),
            source: BlockSource::User,
        });
        store.append_text(2, "$ seq 2\n", SectionType::Command);
        store.append_text(2, "1\n2\n", SectionType::Output);

        let mut full = Vec::new();
        for (position, block) in store.blocks().into_iter().enumerate() {
            if position > 0 {
                full.push(String::new());
            }
            full.push(line_text(&block_header(block, false, 0)));
            full.extend(block_body(block).iter().map(line_text));
        }

        let (everything, max_scroll) = viewport_texts(&store, 100, 0);
        assert_eq!(everything, full);
        assert_eq!(max_scroll, 0);
        for scroll in 0..full.len() - 3 {
            let (window, _) = viewport_texts(&store, 3, scroll);
            let end = full.len() - scroll;
            assert_eq!(window, full[end - 3..end].to_vec(), "scroll {scroll}");
        }
    }

    #[test]
    fn test_view_stamp_tracks_output_and_view_changes() {
        let mut store = store_with_output("ls", "a\n");
        let stamp = ViewStamp::capture(&store);
        assert_eq!(ViewStamp::capture(&store), stamp);
        assert!(!stamp.has_running_block());

        store.append_text(1, "b\n", SectionType::Output);
        let appended = ViewStamp::capture(&store);
        assert_ne!(appended, stamp);

        store.reduce(&TerminalEvent::UserScrolled);
        assert_ne!(ViewStamp::capture(&store), appended);

        store.reduce(&TerminalEvent::BlockStarted {
            block_id: 1,
            started_at: 5,
        });
        assert!(ViewStamp::capture(&store).has_running_block());
    }

    #[test]
    fn test_header_reports_exit_status() {
        let mut store = store_with_output("false", "");
        store.reduce(&TerminalEvent::BlockStarted {
            block_id: 1,
            started_at: 1_000,
        });
        store.reduce(&TerminalEvent::BlockEnded {
            block_id: 1,
            exit_code: 1,
            ended_at: 1_250,
        });
        let header = line_text(&block_header(store.block(1).unwrap(), false, 0));
        assert!(header.contains("✗ 1 250ms"), "{header}");
        assert!(header.contains("local:~"));
    }

    #[test]
    fn test_ansi_spans_are_styled() {
        let mut store = store_with_output("ls", "\x1b[31mred\x1b[0m plain\n");
        store.set_section_collapsed(1, 1, false);
        let body = block_body(store.block(1).unwrap());
        let red = &body[1].spans[1];
        assert_eq!(red.content.as_ref(), "red");
        assert_eq!(red.style.fg, Some(Color::Indexed(1)));
        assert_eq!(line_text(&body[1]), "  red plain");
    }

    #[test]
    fn test_search_lines_list_matches() {
        let mut store = store_with_output("grep err", "no errors\n");
        store.reduce(&TerminalEvent::UserToggledSearch { open: true });
        store.set_search_query("err");
        let texts: Vec<String> = search_lines(&store).iter().map(line_text).collect();
        assert_eq!(texts[0], "search: err · 3 results");
        assert_eq!(texts[1], "#1    $ grep err");
    }

    #[test]
    fn test_input_window_keeps_cursor_visible() {
        assert_eq!(input_window("hello", 5, 10), ("hello".to_string(), 5));
        let (visible, col) = input_window("abcdefghij", 10, 4);
        assert_eq!(col, 3);
        assert_eq!(visible, "hij");
        let (visible, col) = input_window("abcdefghij", 0, 4);
        assert_eq!((visible.as_str(), col), ("abcd", 0));
    }

    #[test]
    fn test_truncate_line_adds_ellipsis() {
        assert_eq!(truncate_line("status", 10), "status");
        assert_eq!(truncate_line("a long status line", 8), "a lon...");
    }
}
