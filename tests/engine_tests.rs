//! PlaybackEngine behaviour against a mock output backend
//!
//! Covers device fan-out, per-device failure isolation, volume clamping and
//! propagation, stop variants, natural completion, and the mic mute signal.

mod helpers;

use std::time::Duration;

use helpers::{device, sound, sound_from, TestEngine};
use soundboard::{DeviceTarget, Error, PlaybackEngine, SoundboardSettings};
use std::sync::Arc;

#[test]
fn play_opens_one_stream_per_device_at_current_volume() {
    let (d1, d2) = (device("1"), device("2"));
    let test = TestEngine::on_devices(&[d1.clone(), d2.clone()]);
    test.engine.set_volume(0.7);

    let report = test.engine.play(&sound("horn.wav"), None);

    assert_eq!(report.started, vec![d1.clone(), d2.clone()]);
    assert!(report.failed.is_empty());

    let streams = test.factory.streams();
    assert_eq!(streams.len(), 2);
    for stream in &streams {
        assert_eq!(stream.plays(), 1);
        assert_eq!(stream.volume(), 0.7);
        assert_eq!(stream.request.path.to_str(), Some("horn.wav"));
    }
    assert_eq!(streams[0].device(), &d1);
    assert_eq!(streams[1].device(), &d2);

    assert!(test.engine.is_playing());
    assert_eq!(test.engine.active_devices(), vec![d1, d2]);
    assert_eq!(test.mic.calls(), vec![true]);
}

#[test]
fn natural_completion_of_one_device_keeps_the_other_playing() {
    let (d1, d2) = (device("1"), device("2"));
    let test = TestEngine::on_devices(&[d1.clone(), d2.clone()]);
    test.engine.play(&sound("horn.wav"), None);

    let on_d1 = &test.factory.streams_on(&d1)[0];
    assert!(on_d1.complete());

    assert_eq!(test.engine.active_devices(), vec![d2]);
    assert!(test.engine.is_playing());
    assert_eq!(on_d1.releases(), 1);
    assert_eq!(on_d1.stops(), 0);
    // No unmute while something is still audible
    assert_eq!(test.mic.calls(), vec![true]);
}

#[test]
fn stopping_the_last_device_unmutes_exactly_once() {
    let (d1, d2) = (device("1"), device("2"));
    let test = TestEngine::on_devices(&[d1.clone(), d2.clone()]);
    test.engine.play(&sound("horn.wav"), None);
    test.factory.streams_on(&d1)[0].complete();

    test.engine.stop_sounds_on_device(Some(&d2));

    let on_d2 = &test.factory.streams_on(&d2)[0];
    assert_eq!(on_d2.stops(), 1);
    assert_eq!(on_d2.releases(), 1);
    assert!(!test.engine.is_playing());
    assert_eq!(test.engine.active_stream_count(), 0);
    assert_eq!(test.mic.calls(), vec![true, false]);
}

#[test]
fn empty_target_set_plays_nothing() {
    let test = TestEngine::on_devices(&[]);

    let report = test.engine.play(&sound("horn.wav"), None);

    assert!(report.is_empty());
    assert_eq!(test.factory.opened(), 0);
    assert!(!test.engine.is_playing());
    assert!(test.mic.calls().is_empty());
}

#[test]
fn empty_target_set_leaves_running_streams_alone() {
    let d1 = device("1");
    let test = TestEngine::on_devices(&[d1.clone()]);
    test.engine.play(&sound("a.wav"), None);

    test.engine.set_playback_devices(Vec::new());
    test.engine.play(&sound("b.wav"), None);

    assert_eq!(test.factory.opened(), 1);
    assert!(test.engine.is_playing());
}

#[test]
fn volume_is_clamped_and_applied_to_active_streams() {
    let test = TestEngine::on_devices(&[device("1"), device("2")]);
    test.engine.play(&sound("horn.wav"), None);

    test.engine.set_volume(1.5);
    assert_eq!(test.engine.volume(), 1.0);
    for stream in test.factory.streams() {
        assert_eq!(stream.volume(), 1.0);
    }

    test.engine.set_volume(-0.2);
    assert_eq!(test.engine.volume(), 0.0);
    for stream in test.factory.streams() {
        assert_eq!(stream.volume(), 0.0);
    }

    test.engine.set_volume(f32::NAN);
    assert_eq!(test.engine.volume(), 0.0);
}

#[test]
fn volume_applies_to_later_plays() {
    let test = TestEngine::on_devices(&[device("1")]);
    test.engine.set_volume(0.3);

    test.engine.play(&sound("a.wav"), None);
    test.engine.play(&sound("b.wav"), None);

    for stream in test.factory.streams() {
        assert_eq!(stream.volume(), 0.3);
    }
}

#[test]
fn initial_volume_comes_from_settings() {
    let test = TestEngine::with_settings(SoundboardSettings {
        volume_normalized: 0.25,
        ..Default::default()
    });
    assert_eq!(test.engine.volume(), 0.25);
}

#[test]
fn failed_device_does_not_block_the_rest() {
    let (d1, d2, d3) = (device("1"), device("2"), device("3"));
    let test = TestEngine::on_devices(&[d1.clone(), d2.clone(), d3.clone()]);
    test.factory.fail_device(&d2);

    let report = test.engine.play(&sound("horn.wav"), None);

    assert_eq!(report.started, vec![d1.clone(), d3.clone()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].device, d2);
    assert!(matches!(report.failed[0].error, Error::Device(_)));
    assert!(!report.all_failed());

    assert_eq!(test.engine.active_devices(), vec![d1, d3]);
    assert_eq!(test.mic.calls(), vec![true]);
}

#[test]
fn every_device_failing_leaves_engine_idle_and_usable() {
    let (d1, d2) = (device("1"), device("2"));
    let test = TestEngine::on_devices(&[d1.clone()]);
    test.factory.fail_device(&d1);

    let report = test.engine.play(&sound("horn.wav"), None);
    assert!(report.all_failed());
    assert!(!test.engine.is_playing());
    assert!(test.mic.calls().is_empty());

    test.engine.set_playback_device(Some(d2.clone()));
    let report = test.engine.play(&sound("horn.wav"), None);
    assert_eq!(report.started, vec![d2]);
    assert!(test.engine.is_playing());
}

#[test]
fn mute_policy_disabled_never_mutes_but_still_unmutes() {
    let test = TestEngine::with_settings(SoundboardSettings::default());
    test.engine.set_playback_device(Some(device("1")));

    test.engine.play(&sound("horn.wav"), None);
    test.factory.streams()[0].complete();

    assert_eq!(test.mic.calls(), vec![false]);
}

#[test]
fn mute_policy_is_read_at_play_time() {
    let test = TestEngine::with_settings(SoundboardSettings::default());
    test.engine.set_playback_device(Some(device("1")));

    test.settings.update(|s| s.mute_microphone_while_playing = true);
    test.engine.play(&sound("horn.wav"), None);

    assert_eq!(test.mic.calls(), vec![true]);
}

#[test]
fn mute_is_requested_only_on_first_stream() {
    let test = TestEngine::on_devices(&[device("1"), device("2")]);

    test.engine.play(&sound("a.wav"), None);
    test.engine.play(&sound("b.wav"), None);

    assert_eq!(test.engine.active_stream_count(), 4);
    assert_eq!(test.mic.calls(), vec![true]);
}

#[test]
fn last_natural_completion_unmutes_once() {
    let test = TestEngine::on_devices(&[device("1"), device("2")]);
    test.engine.play(&sound("a.wav"), None);

    for stream in test.factory.streams() {
        stream.complete();
    }

    assert!(!test.engine.is_playing());
    assert_eq!(test.mic.calls(), vec![true, false]);
}

#[test]
fn repeated_stops_are_silent_no_ops() {
    let d1 = device("1");
    let test = TestEngine::on_devices(&[d1.clone()]);
    test.engine.play(&sound("a.wav"), None);

    test.engine.stop_sounds_on_device(Some(&d1));
    test.engine.stop_sounds_on_device(Some(&d1));
    // Completion arriving after the stop is ignored
    let stream = &test.factory.streams()[0];
    assert!(!stream.complete());

    assert_eq!(stream.stops(), 1);
    assert_eq!(stream.releases(), 1);
    assert_eq!(test.mic.calls(), vec![true, false]);
}

#[test]
fn completion_after_stop_all_is_ignored() {
    let test = TestEngine::on_devices(&[device("1")]);
    test.engine.play(&sound("a.wav"), None);

    let stream = test.factory.streams()[0].clone();
    test.engine.stop_all_sounds();
    stream.complete();

    assert_eq!(stream.releases(), 1);
    assert_eq!(test.mic.calls(), vec![true, false]);
}

#[test]
fn stop_on_device_leaves_other_devices_untouched() {
    let (d1, d2) = (device("1"), device("2"));
    let test = TestEngine::on_devices(&[d1.clone(), d2.clone()]);
    test.engine.play(&sound("a.wav"), None);
    test.engine.play(&sound("b.wav"), None);

    test.engine.stop_sounds_on_device(Some(&d1));

    for stream in test.factory.streams_on(&d1) {
        assert_eq!(stream.stops(), 1);
    }
    for stream in test.factory.streams_on(&d2) {
        assert_eq!(stream.stops(), 0);
        assert_eq!(stream.releases(), 0);
    }
    assert_eq!(test.engine.active_devices(), vec![d2.clone(), d2]);
    assert_eq!(test.mic.calls(), vec![true]);
}

#[test]
fn stop_on_absent_or_idle_device_is_a_no_op() {
    let d1 = device("1");
    let test = TestEngine::on_devices(&[d1.clone()]);
    test.engine.play(&sound("a.wav"), None);

    test.engine.stop_sounds_on_device(None);
    test.engine.stop_sounds_on_device(Some(&device("other")));

    assert_eq!(test.engine.active_stream_count(), 1);
    assert_eq!(test.mic.calls(), vec![true]);
}

#[test]
fn stop_all_releases_every_stream_before_returning() {
    let test = TestEngine::on_devices(&[device("1"), device("2"), device("3")]);
    test.engine.play(&sound("a.wav"), None);

    test.engine.stop_all_sounds();

    for stream in test.factory.streams() {
        assert_eq!(stream.stops(), 1);
        assert_eq!(stream.releases(), 1);
    }
    assert!(!test.engine.is_playing());
    assert_eq!(test.mic.calls(), vec![true, false]);
}

#[test]
fn stop_all_unmutes_even_when_idle() {
    let test = TestEngine::new();
    test.engine.stop_all_sounds();
    test.engine.stop_all_sounds();
    assert_eq!(test.mic.calls(), vec![false, false]);
}

#[test]
fn start_offset_defaults_to_sound_and_can_be_overridden() {
    let test = TestEngine::on_devices(&[device("1")]);
    let clip = sound_from("a.wav", Duration::from_secs(2));

    test.engine.play(&clip, None);
    test.engine.play(&clip, Some(Duration::from_millis(500)));

    let streams = test.factory.streams();
    assert_eq!(streams[0].request.start, Duration::from_secs(2));
    assert_eq!(streams[1].request.start, Duration::from_millis(500));
}

#[test]
fn duplicate_devices_get_a_single_stream() {
    let (d1, d2) = (device("1"), device("2"));
    let test = TestEngine::on_devices(&[d1.clone(), d1.clone(), d2.clone()]);

    let report = test.engine.play(&sound("a.wav"), None);

    assert_eq!(report.started, vec![d1, d2]);
    assert_eq!(test.factory.opened(), 2);
}

#[test]
fn single_device_none_makes_play_a_no_op() {
    let test = TestEngine::new();
    test.engine.set_playback_device(None);

    assert!(test.engine.play(&sound("a.wav"), None).is_empty());
    assert_eq!(test.engine.target(), DeviceTarget::Private(Vec::new()));
}

#[test]
fn configured_devices_are_read_live() {
    let (d1, d2) = (device("1"), device("2"));
    let test = TestEngine::new();
    assert_eq!(test.engine.target(), DeviceTarget::Configured);

    test.settings.update(|s| s.selected_playback_devices = vec![d1.clone()]);
    assert_eq!(test.engine.play(&sound("a.wav"), None).started, vec![d1.clone()]);

    test.settings.update(|s| s.selected_playback_devices.push(d2.clone()));
    assert_eq!(
        test.engine.play(&sound("a.wav"), None).started,
        vec![d1.clone(), d2.clone()]
    );

    // A private list shadows the configuration until switched back
    test.engine.set_playback_devices(vec![d2.clone()]);
    assert_eq!(test.engine.target_devices(), vec![d2.clone()]);
    test.engine.use_configured_devices();
    assert_eq!(test.engine.target_devices(), vec![d1, d2]);
}

#[test]
fn preview_engine_targets_only_the_preview_device() {
    let (speakers, headphones) = (device("spk"), device("hp"));
    let test = TestEngine::with_settings(SoundboardSettings {
        selected_playback_devices: vec![speakers.clone()],
        selected_preview_device: Some(headphones.clone()),
        ..Default::default()
    });

    let preview = PlaybackEngine::preview(
        Arc::new(test.settings.clone()),
        test.factory.clone(),
        test.mic.clone(),
    );

    let report = preview.play(&sound("a.wav"), None);
    assert_eq!(report.started, vec![headphones]);

    // Switching preview device stops what is playing first
    preview.switch_preview_device(Some(speakers.clone()));
    assert!(!preview.is_playing());
    assert_eq!(test.factory.streams()[0].stops(), 1);
    assert_eq!(preview.target_devices(), vec![speakers]);
}

#[test]
fn completion_inside_play_does_not_deadlock() {
    let test = TestEngine::on_devices(&[device("1"), device("2")]);
    test.factory.complete_immediately(true);

    let report = test.engine.play(&sound("blip.wav"), None);

    assert_eq!(report.started.len(), 2);
    assert!(!test.engine.is_playing());
    for stream in test.factory.streams() {
        assert_eq!(stream.releases(), 1);
        assert_eq!(stream.stops(), 0);
    }
    // Each stream was the only one alive during its short life
    assert_eq!(test.mic.calls(), vec![true, false, true, false]);
}

#[test]
fn completion_before_registration_is_not_leaked() {
    let test = TestEngine::on_devices(&[device("1"), device("2")]);
    test.factory.complete_during_open(true);

    let report = test.engine.play(&sound("blip.wav"), None);

    assert_eq!(report.started.len(), 2);
    assert!(report.failed.is_empty());
    assert!(!test.engine.is_playing());
    for stream in test.factory.streams() {
        assert_eq!(stream.releases(), 1);
        assert_eq!(stream.plays(), 0);
        assert_eq!(stream.stops(), 0);
    }
    // Never audible, so the mic was never touched
    assert!(test.mic.calls().is_empty());

    // Later plays are unaffected
    test.factory.complete_during_open(false);
    test.engine.play(&sound("a.wav"), None);
    assert_eq!(test.engine.active_stream_count(), 2);
}

#[test]
fn dropping_the_engine_stops_playback() {
    let test = TestEngine::on_devices(&[device("1")]);
    test.engine.play(&sound("a.wav"), None);

    let TestEngine {
        engine,
        factory,
        mic,
        ..
    } = test;
    let stream = factory.streams()[0].clone();
    drop(engine);

    assert_eq!(stream.stops(), 1);
    assert_eq!(stream.releases(), 1);
    assert_eq!(mic.calls(), vec![true, false]);

    // The engine is gone; a late completion must not panic
    assert!(!stream.complete());
}
