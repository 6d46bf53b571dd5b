use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::grid;
use super::mode::TuiState;
use crate::pipeline::instrument::SampleId;
use crate::shared::DisplayState;

const HELP: [&str; 12] = [
    "space  play / stop        s  stop",
    "r      record mixdown     d  download mix",
    "m      record mic",
    "up/dn  select track       a  add track",
    "S-up/dn  move clip to the next track",
    "1-7    drop instrument at the cursor",
    "lt/rt  move cursor (or the selected clip)",
    "tab    select next clip   esc  clear clip",
    "del    delete clip, else track",
    "l      loop track",
    "[ ]    clip volume        - =  track volume",
    "q      quit",
];

fn sections(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // transport bar
            Constraint::Min(3),    // lanes
            Constraint::Length(1), // instruments
            Constraint::Length(1), // status / alert
        ])
        .split(area)
}

// Where the lanes are drawn; the timeline width is derived from this
pub fn lanes_area(area: Rect) -> Rect {
    sections(area)[1]
}

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let sections = sections(area);

    draw_transport(frame, sections[0], state);
    grid::draw_lanes(frame, sections[1], state);
    draw_instruments(frame, sections[2]);
    draw_status(frame, sections[3], state);

    if ts.show_help {
        draw_help(frame, area);
    }
}

fn indicator(label: &str, on: bool, color: Color) -> Span<'static> {
    let style = if on {
        Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!(" {label} "), style)
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let line = Line::from(vec![
        Span::styled(" clipdeck ", Style::default().add_modifier(Modifier::BOLD)),
        indicator(if state.playing { "▶ PLAY" } else { "■ STOP" }, state.playing, Color::Green),
        Span::raw(" "),
        indicator("● MIX", state.recording_mix, Color::Red),
        Span::raw(" "),
        indicator("● MIC", state.recording_mic, Color::Magenta),
        Span::raw(" "),
        match state.mix_secs {
            Some(secs) => indicator(&format!("MIX {secs:.1}s"), true, Color::Cyan),
            None => indicator("MIX --", false, Color::Cyan),
        },
        Span::styled(
            format!(
                "  {:.0}s timeline, {}/{} samples   ? help",
                state.timeline.duration,
                state.samples_loaded,
                SampleId::INSTRUMENTS.len()
            ),
            Style::default().fg(Color::Gray),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_instruments(frame: &mut Frame, area: Rect) {
    let spans: Vec<Span> = SampleId::INSTRUMENTS
        .iter()
        .enumerate()
        .map(|(i, id)| {
            Span::styled(format!(" {} {} ", i + 1, id.label()), Style::default().fg(Color::Gray))
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let line = match &state.alert {
        Some(alert) => Line::styled(
            format!(" ! {alert}"),
            Style::default().fg(Color::White).bg(Color::Red),
        ),
        None => Line::styled(format!(" {}", state.status), Style::default().fg(Color::Gray)),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let width = 48.min(area.width);
    let height = (HELP.len() as u16 + 2).min(area.height);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    let lines: Vec<Line> = HELP.iter().map(|l| Line::raw(format!(" {l}"))).collect();
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" keys ")),
        popup,
    );
}
