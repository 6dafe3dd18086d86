use mediafile::{
    AudioProperties, AudioTag, Error, Key, MediaFile, MemoryEngine, OpenOptions, ReadStyle,
    TagField, Variant, VariantMap,
};

fn sky_tag() -> AudioTag {
    AudioTag {
        title: Some("Sky".to_string()),
        artist: Some("Ana".to_string()),
        year: Some(2021),
        track: Some(3),
        ..AudioTag::default()
    }
}

fn picture_entry() -> VariantMap {
    let mut entry = VariantMap::new();
    entry.insert("mimeType".into(), Variant::from("image/png"));
    entry.insert("pictureType".into(), Variant::from("Front Cover"));
    entry
}

#[test]
fn test_open_with_no_flags_fetches_nothing() {
    let engine = MemoryEngine::new()
        .with_tag(sky_tag())
        .with_property("GENRE", &["Ambient"]);
    let _file = MediaFile::open(engine.clone(), OpenOptions::new()).unwrap();

    assert!(engine.calls().is_empty());
}

#[test]
fn test_open_prefetches_requested_sources() {
    let engine = MemoryEngine::new()
        .with_tag(sky_tag())
        .with_property("GENRE", &["Ambient"])
        .with_complex("PICTURE", vec![picture_entry()]);
    let _file = MediaFile::open(
        engine.clone(),
        OpenOptions::new()
            .tag()
            .properties()
            .audio(ReadStyle::Accurate)
            .complex(mediafile::ComplexRetrieval::All),
    )
    .unwrap();

    let calls = engine.calls();
    assert!(calls.contains(&"read_audio_properties".to_string()));
    assert!(calls.contains(&"read_tag".to_string()));
    assert!(calls.contains(&"read_properties".to_string()));
    assert!(calls.contains(&"read_complex_keys".to_string()));
    assert!(calls.contains(&"read_complex:PICTURE".to_string()));
}

#[test]
fn test_fetch_title_without_default_raises_key_not_found() {
    let mut file = MediaFile::open(MemoryEngine::new(), OpenOptions::new()).unwrap();
    let err = file.fetch(&Key::property("TITLE")).unwrap_err();
    assert!(matches!(err, Error::KeyNotFound(_)));
}

#[test]
fn test_fetch_tag_field_returns_value() {
    let engine = MemoryEngine::new().with_tag(sky_tag());
    let mut file = MediaFile::open(engine, OpenOptions::new().tag()).unwrap();
    assert_eq!(
        file.fetch(&Key::Tag(TagField::Title)).unwrap(),
        Some(Variant::Text("Sky".into()))
    );
    assert_eq!(file.title().unwrap().as_deref(), Some("Sky"));
    assert_eq!(file.year().unwrap(), Some(2021));
}

#[test]
fn test_each_source_is_fetched_at_most_once() {
    let engine = MemoryEngine::new()
        .with_tag(sky_tag())
        .with_property("GENRE", &["Ambient"])
        .with_complex("PICTURE", vec![picture_entry()]);
    let mut file = MediaFile::open(engine.clone(), OpenOptions::new()).unwrap();

    for _ in 0..3 {
        file.title().unwrap();
        file.fetch(&Key::property("GENRE")).unwrap();
        file.complex_property("PICTURE").unwrap();
        file.complex_property_keys().unwrap();
    }

    assert_eq!(engine.call_count("read_tag"), 1);
    assert_eq!(engine.call_count("read_properties"), 1);
    assert_eq!(engine.call_count("read_complex_keys"), 1);
    assert_eq!(engine.call_count("read_complex:PICTURE"), 1);
}

#[test]
fn test_absent_results_are_cached_too() {
    let engine = MemoryEngine::new();
    let mut file = MediaFile::open(engine.clone(), OpenOptions::new()).unwrap();

    for _ in 0..2 {
        assert!(file.get(&Key::property("MISSING")).unwrap().is_none());
    }

    assert_eq!(engine.call_count("read_properties"), 1);
    assert_eq!(engine.call_count("read_complex_keys"), 1);
    // Established (empty) key list short-circuits: no entry fetch at all.
    assert_eq!(engine.call_count("read_complex:MISSING"), 0);
}

#[test]
fn test_reading_after_close_uses_cache_only() {
    let engine = MemoryEngine::new()
        .with_tag(sky_tag())
        .with_property("GENRE", &["Ambient"]);
    let mut file = MediaFile::open(engine.clone(), OpenOptions::new().tag()).unwrap();
    file.close();

    // Cached before close: still readable.
    assert_eq!(file.title().unwrap().as_deref(), Some("Sky"));
    // Never fetched: reads as not found, engine untouched.
    assert!(file.get(&Key::property("GENRE")).unwrap().is_none());
    assert_eq!(engine.call_count("read_properties"), 0);
    assert_eq!(engine.call_count("read_tag"), 1);
}

#[test]
fn test_close_is_idempotent_and_releases_once() {
    let engine = MemoryEngine::new();
    let mut file = MediaFile::open(engine.clone(), OpenOptions::new()).unwrap();
    for _ in 0..4 {
        file.close();
    }
    assert!(file.is_closed());
    assert_eq!(engine.release_count(), 1);
}

#[test]
fn test_audio_properties_survive_close() {
    let props = AudioProperties {
        length_ms: 215_000,
        bitrate_kbps: 192,
        sample_rate_hz: 44_100,
        channels: 2,
    };
    let engine = MemoryEngine::new().with_audio(props);
    let mut file =
        MediaFile::open(engine.clone(), OpenOptions::new().audio(ReadStyle::Average)).unwrap();
    file.close();

    assert_eq!(file.audio_properties(), Some(&props));
    assert_eq!(engine.call_count("read_audio_properties"), 1);
}

#[test]
fn test_complex_retrieval_of_specific_keys() {
    let engine = MemoryEngine::new()
        .with_complex("PICTURE", vec![picture_entry()])
        .with_complex("GENERALOBJECT", vec![VariantMap::new()]);
    let mut file = MediaFile::open(
        engine.clone(),
        OpenOptions::new().complex(mediafile::ComplexRetrieval::Keys(vec![
            "PICTURE".to_string()
        ])),
    )
    .unwrap();

    assert_eq!(engine.call_count("read_complex:PICTURE"), 1);
    assert_eq!(engine.call_count("read_complex:GENERALOBJECT"), 0);

    let picture = file.complex_property("PICTURE").unwrap().unwrap();
    assert_eq!(picture.len(), 1);
    assert_eq!(
        picture[0].get("mimeType"),
        Some(&Variant::Text("image/png".into()))
    );
    // Served from cache, not refetched.
    assert_eq!(engine.call_count("read_complex:PICTURE"), 1);
}

#[test]
fn test_unified_view_reaches_complex_values_through_property_keys() {
    let engine = MemoryEngine::new().with_complex("PICTURE", vec![picture_entry()]);
    let mut file = MediaFile::open(engine, OpenOptions::new()).unwrap();

    let first = file.fetch(&Key::property("PICTURE")).unwrap().unwrap();
    assert_eq!(first, Variant::Map(picture_entry()));

    let all = file.fetch_all(&Key::property("PICTURE")).unwrap().unwrap();
    assert_eq!(all, Variant::List(vec![Variant::Map(picture_entry())]));
}

#[test]
fn test_snapshot_serializes_with_absent_fields_omitted() {
    let engine = MemoryEngine::new()
        .with_tag(AudioTag {
            title: Some("Sky".to_string()),
            ..AudioTag::default()
        })
        .with_property("GENRE", &["Ambient", "Drone"]);
    let mut file = MediaFile::open(engine, OpenOptions::new()).unwrap();
    file.set_track(Some(9)).unwrap();

    let snapshot = file.snapshot().unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "tag": { "title": "Sky", "track": 9 },
            "properties": { "GENRE": ["Ambient", "Drone"] },
        })
    );
}

#[test]
fn test_snapshot_applies_staged_deletions() {
    let engine = MemoryEngine::new()
        .with_tag(sky_tag())
        .with_property("GENRE", &["Ambient"]);
    let mut file = MediaFile::open(engine, OpenOptions::new()).unwrap();
    file.delete(Key::property("GENRE")).unwrap();
    file.set_title(None).unwrap();

    let snapshot = file.snapshot().unwrap();
    assert!(!snapshot.properties.contains_key("GENRE"));
    let tag = snapshot.tag.expect("artist/year/track still present");
    assert_eq!(tag.title, None);
    assert_eq!(tag.artist.as_deref(), Some("Ana"));
}
