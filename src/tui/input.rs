use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

use super::mode::TuiState;
use crate::pipeline::arrangement::Direction;
use crate::pipeline::instrument::SampleId;
use crate::shared::{InputEvent, VOLUME_STEP};

// poll for input from the terminal and resolve key presses into events for
// the middle layer
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, key.modifiers, ts));
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode, modifiers: KeyModifiers, ts: &mut TuiState) -> Vec<InputEvent> {
    // the help overlay swallows the key that closes it
    if ts.show_help {
        ts.show_help = false;
        return vec![];
    }

    let shift = modifiers.contains(KeyModifiers::SHIFT);
    let event = match code {
        KeyCode::Char('?') => {
            ts.show_help = true;
            return vec![];
        }
        KeyCode::Char('q') => InputEvent::Quit,
        KeyCode::Char(' ') => InputEvent::TogglePlay,
        KeyCode::Char('s') => InputEvent::Stop,
        KeyCode::Char('r') => InputEvent::ToggleRecord,
        KeyCode::Char('m') => InputEvent::ToggleMic,
        KeyCode::Char('d') => InputEvent::Download,
        KeyCode::Delete | KeyCode::Backspace => InputEvent::DeleteSelected,

        KeyCode::Up if shift => InputEvent::MoveClip(Direction::Up),
        KeyCode::Down if shift => InputEvent::MoveClip(Direction::Down),
        KeyCode::Up => InputEvent::SelectTrack(Direction::Up),
        KeyCode::Down => InputEvent::SelectTrack(Direction::Down),
        KeyCode::Left => InputEvent::Nudge(-1),
        KeyCode::Right => InputEvent::Nudge(1),
        KeyCode::Tab => InputEvent::NextClip,
        KeyCode::Esc => InputEvent::ClearClipSelection,

        // instruments 1-7
        KeyCode::Char(c @ '1'..='7') => match SampleId::from_slot(c as u8 - b'1') {
            Some(id) => InputEvent::DropSample(id),
            None => return vec![],
        },

        KeyCode::Char('l') => InputEvent::ToggleLoop,
        KeyCode::Char('a') => InputEvent::AddTrack,

        // volume "knobs"
        KeyCode::Char('[') => InputEvent::ClipVolume(-VOLUME_STEP),
        KeyCode::Char(']') => InputEvent::ClipVolume(VOLUME_STEP),
        KeyCode::Char('-') => InputEvent::TrackVolume(-VOLUME_STEP),
        KeyCode::Char('=') => InputEvent::TrackVolume(VOLUME_STEP),

        _ => return vec![],
    };
    vec![event]
}
