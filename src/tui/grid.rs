// Draws the track lanes: a gutter of track controls, then the clips laid out
// on the timeline, with the playhead and the drop cursor on top.
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::pipeline::timeline::TRACK_ORIGIN_PX;
use crate::shared::{ClipView, DisplayState, LaneView};

const RULER_EVERY: usize = 10; // columns between time labels

// Terminal column holding a timeline pixel
fn column_of(px: f64, cell_px: f64) -> usize {
    if cell_px <= 0.0 || px <= 0.0 {
        return 0;
    }
    (px / cell_px).floor() as usize
}

fn gutter_columns(cell_px: f64) -> usize {
    if cell_px <= 0.0 {
        return 0;
    }
    (TRACK_ORIGIN_PX / cell_px).ceil() as usize
}

// Columns [from, to) a clip covers; every clip gets at least one
pub fn clip_columns(clip: &ClipView, cell_px: f64, columns: usize) -> Option<(usize, usize)> {
    let from = column_of(clip.start_px, cell_px);
    if from >= columns {
        return None;
    }
    let end = column_of(clip.start_px + clip.width_px, cell_px).max(from + 1);
    Some((from, end.min(columns)))
}

pub fn gutter_text(lane: &LaneView, width: usize) -> String {
    let text = format!(
        "{}{:>2} {} {:>3}%",
        if lane.selected { '▸' } else { ' ' },
        lane.number,
        if lane.looping { '⟳' } else { '·' },
        (lane.volume * 100.0).round() as u32,
    );
    let mut text: String = text.chars().take(width).collect();
    while text.chars().count() < width {
        text.push(' ');
    }
    text
}

fn clip_style(clip: &ClipView) -> Style {
    let bg = if clip.decoding {
        Color::DarkGray
    } else if clip.sounding {
        Color::Green
    } else {
        Color::Blue
    };
    let mut style = Style::default().fg(Color::White).bg(bg);
    // turned-down clips read fainter
    if clip.volume < 0.5 {
        style = style.add_modifier(Modifier::DIM);
    }
    if clip.selected {
        style.fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::REVERSED)
    } else {
        style
    }
}

fn lane_line(lane: &LaneView, state: &DisplayState, columns: usize) -> Line<'static> {
    let gutter = gutter_columns(state.cell_px).min(columns);
    let base = if lane.selected {
        Style::default().bg(Color::Rgb(30, 30, 40))
    } else {
        Style::default()
    };

    let mut cells: Vec<(char, Style)> = vec![(' ', base); columns];
    for (i, c) in gutter_text(lane, gutter).chars().enumerate() {
        cells[i] = (c, base.fg(Color::Gray));
    }

    for clip in &lane.clips {
        let Some((from, to)) = clip_columns(clip, state.cell_px, columns) else {
            continue;
        };
        let style = clip_style(clip);
        let mut label = clip.label.chars();
        for cell in cells[from..to].iter_mut() {
            *cell = (label.next().unwrap_or(' '), style);
        }
    }

    if lane.selected {
        let cursor = column_of(state.cursor_px, state.cell_px);
        if let Some(cell) = cells.get_mut(cursor) {
            cell.1 = cell.1.add_modifier(Modifier::UNDERLINED);
            if cell.0 == ' ' {
                cell.0 = '▾';
            }
        }
    }

    let playhead = column_of(state.playhead_px, state.cell_px);
    if let Some(cell) = cells.get_mut(playhead) {
        *cell = ('│', cell.1.fg(Color::Red));
    }

    Line::from(
        cells
            .into_iter()
            .map(|(c, style)| Span::styled(c.to_string(), style))
            .collect::<Vec<_>>(),
    )
}

fn ruler_line(state: &DisplayState, columns: usize) -> Line<'static> {
    let gutter = gutter_columns(state.cell_px).min(columns);
    let mut text: Vec<char> = vec![' '; columns];
    let mut col = gutter;
    while col < columns {
        let secs = state.timeline.pixel_to_time(col as f64 * state.cell_px);
        for (i, c) in format!("|{secs:.0}s").chars().enumerate() {
            if let Some(slot) = text.get_mut(col + i) {
                *slot = c;
            }
        }
        col += RULER_EVERY;
    }
    Line::styled(text.into_iter().collect::<String>(), Style::default().fg(Color::DarkGray))
}

pub fn draw_lanes(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let columns = area.width as usize;
    let mut lines = vec![ruler_line(state, columns)];
    lines.extend(state.lanes.iter().map(|lane| lane_line(lane, state, columns)));
    frame.render_widget(Paragraph::new(lines), area);
}
