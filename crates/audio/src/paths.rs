//! Sound file lookup relative to the game directory.

use std::path::{Path, PathBuf};

/// Directory under the game directory that holds sound files.
pub const SOUND_DIR: &str = "sound";

/// Full path of `relative` inside the game's sound directory.
///
/// Backslashes in `relative` become forward slashes, so content authored with
/// Windows paths resolves everywhere. `game_dir` is joined as-is.
pub fn sound_path(game_dir: impl AsRef<Path>, relative: &str) -> PathBuf {
    game_dir
        .as_ref()
        .join(SOUND_DIR)
        .join(relative.replace('\\', "/"))
}
