// Integration tests for soundstage
// These drive the public library API end to end: files on disk, background
// loading, playback over a simulated clock and the events that come out.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use soundstage::{
    AudioBuffer, BackendKind, LibraryConfig, PlayOptions, SoundError, SoundEvent, SoundLibrary,
    SoundOptions, SoundSpriteData,
};

const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Scratch directory unique to one test
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("soundstage-it-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a silent mono 16-bit WAV
fn write_wav(path: &Path, seconds: f64, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..(seconds * sample_rate as f64) as usize {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn library() -> SoundLibrary {
    SoundLibrary::new(&LibraryConfig {
        sample_rate: 8000,
        ..Default::default()
    })
}

fn buffer(seconds: f64) -> AudioBuffer {
    AudioBuffer::new(1, (seconds * 1000.0) as usize, 1000)
}

fn drain(rx: &Receiver<SoundEvent>) -> Vec<SoundEvent> {
    rx.try_iter().collect()
}

fn count(events: &[SoundEvent], pred: impl Fn(&SoundEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[test]
fn test_load_file_and_play_to_end() {
    let dir = scratch_dir("play");
    let path = dir.join("short.wav");
    write_wav(&path, 0.1, 8000);

    let mut library = library();
    let (rx, _) = library.events().subscribe();
    library.add(
        "short",
        SoundOptions::from_url(path.to_string_lossy()).with_preload(true),
    );
    assert!(library.is_loading());
    library.flush_loads(LOAD_TIMEOUT);

    let sound = library.find("short");
    assert!(sound.is_playable());
    assert!((library.duration("short") - 0.1).abs() < 0.01);

    let id = library.play("short", ()).instance().unwrap();
    library.update(0.05);
    assert!(library.is_playing());
    library.update(0.1);
    assert!(!library.is_playing());

    let events = drain(&rx);
    assert!(matches!(events.first(), Some(SoundEvent::Loaded { .. })));
    assert_eq!(
        count(&events, |e| matches!(e, SoundEvent::Started { .. })),
        1
    );
    assert_eq!(
        count(&events, |e| matches!(e, SoundEvent::Ended { .. })),
        1
    );
    assert_eq!(
        events.last(),
        Some(&SoundEvent::Ended {
            alias: "short".into(),
            instance: id
        })
    );
    let last_progress = events
        .iter()
        .filter_map(|e| match e {
            SoundEvent::Progress { progress, .. } => Some(*progress),
            _ => None,
        })
        .last();
    assert_eq!(last_progress, Some(1.0));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_single_instance_keeps_one_voice() {
    let mut library = library();
    let (rx, _) = library.events().subscribe();
    library.add("voice", SoundOptions::from_buffer(buffer(1.0)).with_single_instance(true));

    for _ in 0..4 {
        library.play("voice", ());
    }
    assert_eq!(library.find("voice").instance_count(), 1);

    let events = drain(&rx);
    assert_eq!(count(&events, |e| matches!(e, SoundEvent::Started { .. })), 4);
    assert_eq!(count(&events, |e| matches!(e, SoundEvent::Stopped { .. })), 3);
}

#[test]
fn test_layered_plays_then_stop_all() {
    let mut library = library();
    let (rx, _) = library.events().subscribe();
    library.add("layer", buffer(1.0));

    for _ in 0..4 {
        library.play("layer", ());
    }
    assert_eq!(library.find("layer").instance_count(), 4);

    library.stop_all();
    assert!(!library.is_playing());
    assert_eq!(library.pool().len(), 4);
    assert_eq!(
        count(&drain(&rx), |e| matches!(e, SoundEvent::Stopped { .. })),
        4
    );

    // pooled instances are reused by the next plays
    library.play("layer", ());
    library.play("layer", ());
    assert_eq!(library.pool().len(), 2);
}

#[test]
fn test_play_before_load_resolves() {
    let dir = scratch_dir("pending");
    let path = dir.join("later.wav");
    write_wav(&path, 0.2, 8000);

    let mut library = library();
    library.add("later", SoundOptions::from_url(path.to_string_lossy()));
    assert!(!library.find("later").is_loaded());

    let pending = library.play("later", ()).into_pending().unwrap();
    let id = library
        .resolve(&pending, LOAD_TIMEOUT)
        .expect("load finished")
        .expect("play started");
    assert!(library.find("later").instance(id).is_some());
    assert!(library.is_playing());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_play_of_missing_file_is_rejected() {
    let mut library = library();
    let (rx, _) = library.events().subscribe();
    library.add("ghost", "/nonexistent/ghost.wav");

    let pending = library.play("ghost", ()).into_pending().unwrap();
    let result = library.resolve(&pending, LOAD_TIMEOUT).expect("load settled");
    assert!(matches!(result, Err(SoundError::LoadFailed { .. })));
    assert!(library.find("ghost").load_error().is_some());
    assert_eq!(
        count(&drain(&rx), |e| matches!(e, SoundEvent::LoadFailed { .. })),
        1
    );
}

#[test]
fn test_sprite_plays_its_range() {
    let mut library = library();
    library.add(
        "sheet",
        SoundOptions::from_buffer(buffer(1.0)).with_sprite("blip", SoundSpriteData::new(0.2, 0.5)),
    );

    library.play("sheet", "blip");
    library.update(0.2);
    assert!(library.is_playing());
    library.update(0.2);
    assert!(!library.is_playing());
}

#[test]
fn test_completion_callback() {
    let mut library = library();
    library.add("done", buffer(0.1));
    let calls = Rc::new(Cell::new(0));

    let seen = calls.clone();
    library.play(
        "done",
        PlayOptions::default().on_complete(move |sound| {
            assert_eq!(sound.alias(), "done");
            seen.set(seen.get() + 1);
        }),
    );
    library.update(0.2);
    assert_eq!(calls.get(), 1);

    // stopped plays do not complete
    let seen = calls.clone();
    library.play(
        "done",
        PlayOptions::default().on_complete(move |_| seen.set(seen.get() + 1)),
    );
    library.stop("done");
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_pause_and_resume_all() {
    let mut library = library();
    let (rx, _) = library.events().subscribe();
    library.add("long", buffer(1.0));
    library.play("long", ());

    library.pause_all();
    library.update(5.0);
    assert!(library.is_playing());

    library.resume_all();
    library.update(1.1);
    assert!(!library.is_playing());

    let events = drain(&rx);
    let paused = events.iter().position(|e| matches!(e, SoundEvent::Paused { .. }));
    let resumed = events.iter().position(|e| matches!(e, SoundEvent::Resumed { .. }));
    let ended = events.iter().position(|e| matches!(e, SoundEvent::Ended { .. }));
    assert!(paused < resumed && resumed < ended);
    assert!(paused.is_some());
}

#[test]
fn test_config_manifest() {
    let dir = scratch_dir("manifest");
    let path = dir.join("cheer.wav");
    write_wav(&path, 0.1, 8000);

    let mut config = LibraryConfig {
        sample_rate: 8000,
        ..Default::default()
    };
    config.sounds.insert(
        "cheer".into(),
        SoundOptions::from_url(path.to_string_lossy())
            .with_preload(true)
            .with_volume(0.5),
    );
    let config_path = dir.join("library.json");
    config.save(&config_path).unwrap();

    let loaded = LibraryConfig::load(&config_path).unwrap();
    let mut library = SoundLibrary::from_config(&loaded);
    library.flush_loads(LOAD_TIMEOUT);
    assert!(library.find("cheer").is_playable());
    assert_eq!(library.volume("cheer"), 0.5);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_element_backend_plays_to_end() {
    let dir = scratch_dir("element");
    let path = dir.join("legacy.wav");
    write_wav(&path, 0.1, 8000);

    let mut library = SoundLibrary::new(&LibraryConfig {
        use_legacy: true,
        sample_rate: 8000,
        ..Default::default()
    });
    let (rx, _) = library.events().subscribe();
    library.add(
        "legacy",
        SoundOptions::from_url(path.to_string_lossy()).with_preload(true),
    );
    library.flush_loads(LOAD_TIMEOUT);
    assert_eq!(library.find("legacy").media().kind(), BackendKind::Element);

    library.play("legacy", ());
    library.update(0.2);
    assert!(!library.is_playing());
    assert_eq!(
        count(&drain(&rx), |e| matches!(e, SoundEvent::Ended { .. })),
        1
    );

    let _ = std::fs::remove_dir_all(dir);
}
