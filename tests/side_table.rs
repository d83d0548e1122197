//! A replacement that only observes: it forwards to the original and records
//! what the original returned.

use hashbrown::HashMap;
use parking_lot::Mutex;
use redirect::Redirection;
use std::{hint::black_box, sync::OnceLock};

static SONG_PATHS: Mutex<Option<HashMap<u32, String>>> = Mutex::new(None);
static LOAD_SONG: OnceLock<Redirection<fn(u32) -> String>> = OnceLock::new();

#[inline(never)]
fn load_song(id: u32) -> String {
    format!("CustomSongs/{}/song.ogg", black_box(id))
}

fn recording_load_song(id: u32) -> String {
    let path = LOAD_SONG.get().unwrap().invoke_original((id,)).unwrap();
    SONG_PATHS
        .lock()
        .get_or_insert_with(HashMap::new)
        .insert(id, path.clone());
    path
}

#[test]
fn replacement_records_results_without_altering_them() {
    let redirection = unsafe {
        Redirection::<fn(u32) -> String>::new(load_song, recording_load_song, true)
    }
    .unwrap();
    let redirection = LOAD_SONG.get_or_init(|| redirection);
    let load = black_box(load_song as fn(u32) -> String);

    assert_eq!(load(3), "CustomSongs/3/song.ogg");
    assert_eq!(load(9), "CustomSongs/9/song.ogg");
    {
        let table = SONG_PATHS.lock();
        let table = table.as_ref().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[&9], "CustomSongs/9/song.ogg");
    }

    redirection.dispose().unwrap();
    assert_eq!(load(4), "CustomSongs/4/song.ogg");
    assert!(!SONG_PATHS.lock().as_ref().unwrap().contains_key(&4));
}
