// state local to the tui, never seen by the middle layer
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub show_help: bool, // '?' opens, the next key closes
}
