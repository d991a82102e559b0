//! Music handle table.
//!
//! Songs are classified and kept as raw bytes. Nothing here decodes or plays
//! them; the mixer's music input stays silent.

use std::sync::Arc;

use espdoom_shared::constants::MAX_SONGS;
use tracing::{debug, info, warn};

/// Standard MIDI file magic.
pub const MIDI_MAGIC: &[u8; 4] = b"MThd";

/// Longest song still treated as MIDI.
pub const MAX_MIDI_LENGTH: usize = 96 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongFormat {
    Midi,
    Mus,
}

impl SongFormat {
    /// MIDI when the data starts with `MThd` and is shorter than
    /// [`MAX_MIDI_LENGTH`], MUS otherwise.
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(MIDI_MAGIC) && data.len() < MAX_MIDI_LENGTH {
            SongFormat::Midi
        } else {
            SongFormat::Mus
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing { looping: bool },
    Paused { looping: bool },
}

#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error("all {} song handles in use", MAX_SONGS)]
    NoFreeHandle,

    #[error("invalid song handle {0}")]
    InvalidHandle(i32),

    #[error("music from files is not supported")]
    Unsupported,
}

#[derive(Debug)]
struct Song {
    data: Arc<[u8]>,
    format: SongFormat,
    state: PlaybackState,
}

/// Fixed table of [`MAX_SONGS`] registered songs.
#[derive(Debug, Default)]
pub struct SongTable {
    songs: [Option<Song>; MAX_SONGS],
    volume: i32,
}

impl SongTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a song in the first free handle.
    pub fn register_song(&mut self, data: Arc<[u8]>) -> Result<i32, MusicError> {
        let format = SongFormat::detect(&data);
        let len = data.len();
        let (handle, entry) = self
            .songs
            .iter_mut()
            .enumerate()
            .find(|(_, entry)| entry.is_none())
            .ok_or(MusicError::NoFreeHandle)?;
        *entry = Some(Song {
            data,
            format,
            state: PlaybackState::Stopped,
        });
        info!("register_song: {} bytes as {:?}, handle {}", len, format, handle);
        Ok(handle as i32)
    }

    /// Free a handle. Unused or invalid handles are ignored.
    pub fn unregister_song(&mut self, handle: i32) {
        match self.slot_mut(handle) {
            Ok(entry) => {
                if entry.take().is_some() {
                    debug!("unregister_song: handle {}", handle);
                }
            }
            Err(e) => warn!("unregister_song: {}", e),
        }
    }

    pub fn play_song(&mut self, handle: i32, looping: bool) -> Result<(), MusicError> {
        info!("play_song: handle {}, looping {}", handle, looping);
        self.song_mut(handle)?.state = PlaybackState::Playing { looping };
        Ok(())
    }

    pub fn pause_song(&mut self, handle: i32) -> Result<(), MusicError> {
        let song = self.song_mut(handle)?;
        if let PlaybackState::Playing { looping } = song.state {
            song.state = PlaybackState::Paused { looping };
        }
        Ok(())
    }

    pub fn resume_song(&mut self, handle: i32) -> Result<(), MusicError> {
        let song = self.song_mut(handle)?;
        if let PlaybackState::Paused { looping } = song.state {
            song.state = PlaybackState::Playing { looping };
        }
        Ok(())
    }

    pub fn stop_song(&mut self, handle: i32) -> Result<(), MusicError> {
        self.song_mut(handle)?.state = PlaybackState::Stopped;
        Ok(())
    }

    pub fn set_music_volume(&mut self, volume: i32) {
        debug!("set_music_volume: {}", volume);
        self.volume = volume;
    }

    pub fn music_volume(&self) -> i32 {
        self.volume
    }

    /// Music by file name. Always fails.
    pub fn register_music(&mut self, filename: Option<&str>) -> Result<i32, MusicError> {
        info!("register_music: '{}' not supported", filename.unwrap_or("null"));
        Err(MusicError::Unsupported)
    }

    pub fn format(&self, handle: i32) -> Option<SongFormat> {
        self.song(handle).map(|song| song.format)
    }

    pub fn state(&self, handle: i32) -> Option<PlaybackState> {
        self.song(handle).map(|song| song.state)
    }

    pub fn data(&self, handle: i32) -> Option<&[u8]> {
        self.song(handle).map(|song| &*song.data)
    }

    fn song(&self, handle: i32) -> Option<&Song> {
        usize::try_from(handle)
            .ok()
            .and_then(|i| self.songs.get(i))
            .and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, handle: i32) -> Result<&mut Option<Song>, MusicError> {
        usize::try_from(handle)
            .ok()
            .and_then(|i| self.songs.get_mut(i))
            .ok_or(MusicError::InvalidHandle(handle))
    }

    fn song_mut(&mut self, handle: i32) -> Result<&mut Song, MusicError> {
        self.slot_mut(handle)?
            .as_mut()
            .ok_or(MusicError::InvalidHandle(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midi(len: usize) -> Arc<[u8]> {
        let mut data = vec![0u8; len.max(4)];
        data[..4].copy_from_slice(MIDI_MAGIC);
        data.into()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SongFormat::detect(&midi(64)), SongFormat::Midi);
        assert_eq!(SongFormat::detect(&midi(MAX_MIDI_LENGTH)), SongFormat::Mus);
        assert_eq!(SongFormat::detect(b"MUS\x1a...."), SongFormat::Mus);
        assert_eq!(SongFormat::detect(b""), SongFormat::Mus);
    }

    #[test]
    fn test_table_fills_and_reuses_handles() {
        let mut table = SongTable::new();
        for expected in 0..MAX_SONGS as i32 {
            assert_eq!(table.register_song(midi(16)).unwrap(), expected);
        }
        assert!(matches!(
            table.register_song(midi(16)),
            Err(MusicError::NoFreeHandle)
        ));
        table.unregister_song(2);
        assert!(table.format(2).is_none());
        assert_eq!(table.register_song(Arc::from(&b"MUS"[..])).unwrap(), 2);
        assert_eq!(table.format(2), Some(SongFormat::Mus));
        assert_eq!(table.data(2), Some(&b"MUS"[..]));
    }

    #[test]
    fn test_playback_state_transitions() {
        let mut table = SongTable::new();
        let handle = table.register_song(midi(16)).unwrap();
        assert_eq!(table.state(handle), Some(PlaybackState::Stopped));
        table.play_song(handle, true).unwrap();
        table.pause_song(handle).unwrap();
        assert_eq!(table.state(handle), Some(PlaybackState::Paused { looping: true }));
        table.resume_song(handle).unwrap();
        assert_eq!(table.state(handle), Some(PlaybackState::Playing { looping: true }));
        table.stop_song(handle).unwrap();
        assert_eq!(table.state(handle), Some(PlaybackState::Stopped));
    }

    #[test]
    fn test_invalid_handles() {
        let mut table = SongTable::new();
        assert!(matches!(table.play_song(0, false), Err(MusicError::InvalidHandle(0))));
        assert!(matches!(table.stop_song(-1), Err(MusicError::InvalidHandle(-1))));
        table.unregister_song(99);
        assert!(matches!(table.register_music(None), Err(MusicError::Unsupported)));
    }

    #[test]
    fn test_volume_recorded() {
        let mut table = SongTable::new();
        table.set_music_volume(9);
        assert_eq!(table.music_volume(), 9);
    }
}
