use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar in the style used for every registry sweep.
///
/// Hidden when `visible` is false, e.g. while an interactive prompt owns the terminal.
pub fn bar(len: usize, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    let style = ProgressStyle::default_bar()
        .template("  [{bar:40}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb
}
