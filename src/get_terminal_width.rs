use terminal_size::{Width, terminal_size};

/// The terminal width for `clap` help output, reduced by `margin`;
/// falls back to 80 columns when not attached to a terminal.
pub fn get_terminal_width(margin: usize) -> usize {
    if let Some((Width(width), _height)) = terminal_size() {
        usize::from(width).saturating_sub(margin).max(20)
    } else {
        80
    }
}
